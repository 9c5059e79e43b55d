//! # 配信プリファレンスの解決
//!
//! システム全体のトグル、ユーザーごとのプリファレンス、種別・カテゴリ単位の
//! オプトアウトを合成して、チャネルごとの配信可否を決める。
//!
//! ## 合成ルール
//!
//! ベンダー設定とユーザー設定は「より制限的な方が勝つ」。どちらか一方でも
//! チャネルを無効にしていれば、そのチャネルには配信しない。
//!
//! ## 既定値
//!
//! プリファレンスのキーはすべて省略可能で、省略時は「許可」とみなす。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::kind::{Category, DEFAULT_TYPE_CONFIG, NotificationType, TypeConfig};

fn default_true() -> bool {
    true
}

/// チャネル単位のプリファレンス
///
/// `{ "enabled": false, "LOW_STOCK": false }` のように、チャネル全体の有効/無効と
/// 種別ごとの上書きを同じオブジェクトに持つ。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelPreferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(flatten)]
    pub types:   BTreeMap<String, bool>,
}

impl ChannelPreferences {
    /// チャネルが明示的に無効化されていない
    pub fn is_enabled(&self) -> bool {
        self.enabled != Some(false)
    }

    /// 種別が明示的に無効化されていない
    pub fn allows(&self, notification_type: &str) -> bool {
        self.types.get(notification_type) != Some(&false)
    }
}

/// ユーザーの通知プリファレンス
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationPreferences {
    pub email:      ChannelPreferences,
    pub websocket:  ChannelPreferences,
    pub categories: BTreeMap<String, bool>,
    pub types:      BTreeMap<String, bool>,
}

impl NotificationPreferences {
    /// メールチャネルの有効/無効を設定する
    pub fn with_email(mut self, enabled: bool) -> Self {
        self.email.enabled = Some(enabled);
        self
    }

    /// リアルタイムチャネルの有効/無効を設定する
    pub fn with_websocket(mut self, enabled: bool) -> Self {
        self.websocket.enabled = Some(enabled);
        self
    }

    /// 種別単位の受信可否を設定する
    pub fn with_type(mut self, kind: NotificationType, enabled: bool) -> Self {
        self.types.insert(kind.as_str().to_string(), enabled);
        self
    }

    /// カテゴリ単位の受信可否を設定する
    pub fn with_category(mut self, category: Category, enabled: bool) -> Self {
        self.categories.insert(category.to_string(), enabled);
        self
    }
}

/// ベンダー単位の通知設定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorNotificationSettings {
    #[serde(default = "default_true")]
    pub email: bool,
    #[serde(default = "default_true")]
    pub sms:   bool,
    #[serde(default = "default_true")]
    pub push:  bool,
}

impl Default for VendorNotificationSettings {
    fn default() -> Self {
        Self {
            email: true,
            sms:   true,
            push:  true,
        }
    }
}

/// システム全体の通知設定（設定ファイル・環境変数由来）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSettings {
    pub enabled:           bool,
    pub email_enabled:     bool,
    pub websocket_enabled: bool,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            enabled:           true,
            email_enabled:     true,
            websocket_enabled: true,
        }
    }
}

/// チャネルごとの配信可否
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelEligibility {
    pub email:     bool,
    pub websocket: bool,
}

/// ユーザー設定にベンダー設定を重ねる
///
/// どちらかが無効にしたチャネルは無効になる。ベンダー設定はユーザーの
/// 無効化を解除しない。SMS チャネルは配信対象外のため参照しない。
pub fn merge(
    user: NotificationPreferences,
    vendor: Option<&VendorNotificationSettings>,
) -> NotificationPreferences {
    let Some(vendor) = vendor else {
        return user;
    };
    let mut merged = user;
    if !vendor.email {
        merged.email.enabled = Some(false);
    }
    if !vendor.push {
        merged.websocket.enabled = Some(false);
    }
    merged
}

/// 種別文字列から設定を引く
///
/// 未知の種別には既定設定を返す。リクエストの検証とは別の、解決時の防御的な扱い。
pub fn type_config(notification_type: &str) -> &'static TypeConfig {
    notification_type
        .parse::<NotificationType>()
        .map(NotificationType::config)
        .unwrap_or(&DEFAULT_TYPE_CONFIG)
}

/// プリファレンスリゾルバ
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferenceResolver {
    system: SystemSettings,
}

impl PreferenceResolver {
    pub fn new(system: SystemSettings) -> Self {
        Self { system }
    }

    pub fn system(&self) -> SystemSettings {
        self.system
    }

    /// 受信者がこの種別の通知を受け取るか
    pub fn should_receive(&self, notification_type: &str, prefs: &NotificationPreferences) -> bool {
        if !self.system.enabled {
            return false;
        }
        let config = type_config(notification_type);
        let category: &'static str = config.category.into();
        if prefs.categories.get(category) == Some(&false) {
            return false;
        }
        prefs.types.get(notification_type) != Some(&false)
    }

    /// チャネルごとの配信可否を決める
    ///
    /// システムのチャネル設定、種別のチャネル対応、受信可否、チャネルの有効/無効、
    /// チャネル内の種別設定の 5 条件すべてを満たす場合のみ配信する。
    pub fn channels(
        &self,
        notification_type: &str,
        prefs: &NotificationPreferences,
    ) -> ChannelEligibility {
        let config = type_config(notification_type);
        let receive = self.should_receive(notification_type, prefs);

        ChannelEligibility {
            email:     self.system.email_enabled
                && config.email_capable
                && receive
                && prefs.email.is_enabled()
                && prefs.email.allows(notification_type),
            websocket: self.system.websocket_enabled
                && config.realtime_capable
                && receive
                && prefs.websocket.is_enabled()
                && prefs.websocket.allows(notification_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn resolver() -> PreferenceResolver {
        PreferenceResolver::default()
    }

    #[test]
    fn 既定では両チャネルに配信する() {
        let eligibility = resolver().channels("LOW_STOCK", &NotificationPreferences::default());
        assert_eq!(
            eligibility,
            ChannelEligibility {
                email:     true,
                websocket: true,
            }
        );
    }

    #[test]
    fn メール無効は他の設定に関係なくメールを止める() {
        for kind in NotificationType::all() {
            let prefs = NotificationPreferences::default()
                .with_email(false)
                .with_type(kind, true);

            let eligibility = resolver().channels(kind.as_str(), &prefs);

            assert!(!eligibility.email, "{kind}");
        }
    }

    #[rstest]
    #[case::全体停止(SystemSettings { enabled: false, ..Default::default() })]
    #[case::チャネル両方停止(SystemSettings { email_enabled: false, websocket_enabled: false, ..Default::default() })]
    fn システム停止時はどのチャネルにも配信しない(#[case] system: SystemSettings) {
        let resolver = PreferenceResolver::new(system);
        for kind in NotificationType::all() {
            assert_eq!(
                resolver.channels(kind.as_str(), &NotificationPreferences::default()),
                ChannelEligibility::default()
            );
        }
    }

    #[test]
    fn 種別のオプトアウトは両チャネルを止める() {
        let prefs = NotificationPreferences::default()
            .with_email(true)
            .with_websocket(true)
            .with_type(NotificationType::LowStock, false);

        assert!(!resolver().should_receive("LOW_STOCK", &prefs));
        assert_eq!(
            resolver().channels("LOW_STOCK", &prefs),
            ChannelEligibility::default()
        );
        assert!(resolver().should_receive("NEW_ORDER", &prefs));
    }

    #[test]
    fn カテゴリのオプトアウトは同カテゴリの種別すべてを止める() {
        let prefs = NotificationPreferences::default().with_category(Category::Inventory, false);

        assert!(!resolver().should_receive("LOW_STOCK", &prefs));
        assert!(!resolver().should_receive("CUBIC_VOLUME_ALERT", &prefs));
        assert!(resolver().should_receive("COMMISSION_UPDATE", &prefs));
    }

    #[test]
    fn メール非対応の種別はメールに配信しない() {
        let eligibility =
            resolver().channels("CUBIC_VOLUME_ALERT", &NotificationPreferences::default());
        assert!(!eligibility.email);
        assert!(eligibility.websocket);
    }

    #[test]
    fn チャネル内の種別設定はそのチャネルだけを止める() {
        let prefs: NotificationPreferences = serde_json::from_value(json!({
            "websocket": {"NEW_ORDER": false}
        }))
        .unwrap();

        let eligibility = resolver().channels("NEW_ORDER", &prefs);

        assert!(eligibility.email);
        assert!(!eligibility.websocket);
    }

    #[test]
    fn 未知の種別には既定設定を返す() {
        let config = type_config("PRICE_DROP");
        assert_eq!(config, &DEFAULT_TYPE_CONFIG);

        let eligibility = resolver().channels("PRICE_DROP", &NotificationPreferences::default());
        assert!(eligibility.email && eligibility.websocket);
    }

    #[test]
    fn ベンダー設定の無効化はユーザー設定より優先される() {
        let user = NotificationPreferences::default().with_email(true);
        let vendor = VendorNotificationSettings {
            email: false,
            ..Default::default()
        };

        let merged = merge(user, Some(&vendor));

        assert_eq!(merged.email.enabled, Some(false));
        assert!(merged.websocket.is_enabled());
    }

    #[test]
    fn ベンダー設定はユーザーの無効化を解除しない() {
        let user = NotificationPreferences::default().with_websocket(false);

        let merged = merge(user, Some(&VendorNotificationSettings::default()));

        assert_eq!(merged.websocket.enabled, Some(false));
        assert!(merged.email.is_enabled());
    }

    #[test]
    fn プリファレンスはjsonのキー省略を許可として読む() {
        let prefs: NotificationPreferences = serde_json::from_value(json!({
            "email": {"enabled": true},
            "categories": {"finance": false}
        }))
        .unwrap();

        assert!(prefs.email.is_enabled());
        assert!(prefs.websocket.is_enabled());
        assert_eq!(prefs.categories.get("finance"), Some(&false));
        assert!(!resolver().should_receive("COMMISSION_UPDATE", &prefs));
    }
}
