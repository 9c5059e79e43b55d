//! # Delivery Service 設定
//!
//! 環境変数から配信エンジンの設定を読み込む。
//!
//! 未設定の変数は既定値を使い、値が不正な場合は [`ConfigError`] を返す。

use std::{env, str::FromStr, time::Duration};

use ichiba_domain::notification::preference::SystemSettings;
use thiserror::Error;

use crate::usecase::notification::RetryPolicy;

/// 設定読み込みのエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// 値が解釈できない
    #[error("{key} の値が不正です: {value:?}（{expected}）")]
    Invalid {
        key:      &'static str,
        value:    String,
        expected: &'static str,
    },
}

/// メール送信バックエンド
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum EmailBackend {
    /// SMTP サーバー経由（開発環境では Mailpit）
    Smtp,
    /// Amazon SES v2 経由
    Ses,
    /// 送信しない（ログ出力のみ）
    #[default]
    Noop,
}

/// リアルタイム配信バックエンド
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RealtimeBackend {
    /// Redis pub/sub（WebSocket ゲートウェイが購読する）
    Redis,
    /// 配信しない（ログ出力のみ）
    #[default]
    Noop,
}

/// メールチャネルの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub backend:      EmailBackend,
    /// SMTP ホスト（backend=smtp の場合に使用）
    pub smtp_host:    String,
    /// SMTP ポート（backend=smtp の場合に使用）
    pub smtp_port:    u16,
    /// 送信元メールアドレス
    pub from_address: String,
    /// フロントエンド URL（メール内リンク用）
    pub base_url:     String,
}

/// リアルタイムチャネルの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    pub backend:   RealtimeBackend,
    /// Redis 接続 URL（backend=redis の場合に使用）
    pub redis_url: String,
}

/// 配信エンジン全体の設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// システム全体・チャネル単位の有効/無効
    pub system:   SystemSettings,
    pub email:    EmailConfig,
    pub realtime: RealtimeConfig,
    /// 遅延リトライの方針
    pub retry:    RetryPolicy,
}

impl DeliveryConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 任意の参照関数から設定を読み込む
    ///
    /// `lookup` が `None` を返したキーは既定値になる。
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars { lookup };
        let defaults = RetryPolicy::default();

        Ok(Self {
            system:   SystemSettings {
                enabled:           vars.flag("NOTIFICATIONS_ENABLED", true)?,
                email_enabled:     vars.flag("NOTIFICATIONS_EMAIL_ENABLED", true)?,
                websocket_enabled: vars.flag("NOTIFICATIONS_WEBSOCKET_ENABLED", true)?,
            },
            email:    EmailConfig {
                backend:      vars.parsed("EMAIL_BACKEND", EmailBackend::Noop, "smtp | ses | noop")?,
                smtp_host:    vars.string("SMTP_HOST", "localhost"),
                smtp_port:    vars.parsed("SMTP_PORT", 1025, "ポート番号")?,
                from_address: vars.string("NOTIFICATION_FROM_ADDRESS", "noreply@ichiba.example.com"),
                base_url:     vars.string("NOTIFICATION_BASE_URL", "http://localhost:5173"),
            },
            realtime: RealtimeConfig {
                backend:   vars.parsed("REALTIME_BACKEND", RealtimeBackend::Noop, "redis | noop")?,
                redis_url: vars.string("REDIS_URL", "redis://localhost:6379"),
            },
            retry:    RetryPolicy {
                max_attempts:  vars.parsed(
                    "NOTIFICATION_RETRY_MAX_ATTEMPTS",
                    defaults.max_attempts,
                    "0 以上の整数",
                )?,
                initial_delay: vars.millis(
                    "NOTIFICATION_RETRY_INITIAL_DELAY_MS",
                    defaults.initial_delay,
                )?,
                max_delay:     vars.millis("NOTIFICATION_RETRY_MAX_DELAY_MS", defaults.max_delay)?,
            },
        })
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: FromStr>(
        &self,
        key: &'static str,
        default: T,
        expected: &'static str,
    ) -> Result<T, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key,
                value,
                expected,
            }),
        }
    }

    fn flag(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        let Some(value) = self.get(key) else {
            return Ok(default);
        };
        match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                value,
                expected: "true | false",
            }),
        }
    }

    fn millis(&self, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
        self.parsed(key, default_ms, "ミリ秒（0 以上の整数）")
            .map(Duration::from_millis)
    }
}
