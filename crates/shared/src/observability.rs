//! # ログ出力の初期化
//!
//! 配信エンジンを組み込むプロセスで使う tracing subscriber を組み立てる。
//!
//! - `LOG_FORMAT`: `json`（本番）または `pretty`（開発、既定）
//! - `RUST_LOG`: フィルタ。未設定ならプロセスごとの既定フィルタを使う

/// `RUST_LOG` 未設定時のフィルタ
pub const DEFAULT_LOG_FILTER: &str = "info,ichiba=debug";

/// ログ出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 1 行 1 イベントの JSON
    Json,
    #[default]
    Pretty,
}

impl LogFormat {
    /// 大文字小文字を区別せずにパースする。未知の値は `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }

    /// `LOG_FORMAT` から読み取る
    ///
    /// subscriber 初期化前に呼ばれるため、未知の値の警告は stderr に出す。
    pub fn from_env() -> Self {
        let Ok(value) = std::env::var("LOG_FORMAT") else {
            return Self::default();
        };
        Self::parse(&value).unwrap_or_else(|| {
            eprintln!("WARNING: unknown LOG_FORMAT={value:?}, falling back to pretty");
            Self::default()
        })
    }
}

/// subscriber の初期化設定
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// 起動ログの `service` フィールド
    pub service_name:   String,
    pub log_format:     LogFormat,
    /// `RUST_LOG` 未設定時のフィルタ
    pub default_filter: String,
}

impl TracingConfig {
    pub fn new(service_name: impl Into<String>, log_format: LogFormat) -> Self {
        Self {
            service_name: service_name.into(),
            log_format,
            default_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }

    pub fn from_env(service_name: impl Into<String>) -> Self {
        Self::new(service_name, LogFormat::from_env())
    }

    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }
}

/// グローバル subscriber を登録する
///
/// `ErrorLayer` を含めるため、`InfraError` は生成時点の SpanTrace を保持できる。
/// 登録済みなら何もしない。
#[cfg(feature = "observability")]
pub fn init_tracing(config: TracingConfig) {
    use tracing_subscriber::{EnvFilter, Layer as _, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let fmt_layer = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().with_target(false).boxed(),
    };

    let registered = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(tracing_error::ErrorLayer::default())
        .try_init()
        .is_ok();

    if registered {
        tracing::info!(
            service = %config.service_name,
            log_format = ?config.log_format,
            filter = %config.default_filter,
            "ログ出力を初期化しました"
        );
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("json", Some(LogFormat::Json))]
    #[case("JSON", Some(LogFormat::Json))]
    #[case(" pretty ", Some(LogFormat::Pretty))]
    #[case("yaml", None)]
    #[case("", None)]
    fn log_formatのパース(#[case] value: &str, #[case] expected: Option<LogFormat>) {
        assert_eq!(LogFormat::parse(value), expected);
    }

    #[test]
    fn 既定フィルタを差し替えられる() {
        let config = TracingConfig::new("delivery-service", LogFormat::Json)
            .with_default_filter("warn");

        assert_eq!(config.service_name, "delivery-service");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.default_filter, "warn");
    }

    #[cfg(feature = "observability")]
    #[test]
    fn 二度目の初期化は無視される() {
        init_tracing(TracingConfig::new("test", LogFormat::Pretty));
        init_tracing(TracingConfig::new("test", LogFormat::Json));
    }
}
