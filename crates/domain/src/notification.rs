//! # 通知
//!
//! マーケットプレイスのバックオフィスで発生するビジネスイベント（在庫不足、
//! 新規注文、手数料更新など）を受信者に届けるためのドメインモデルを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 備考 |
//! |---|------------|------|
//! | [`Notification`] | 通知 | 受信者ごとに 1 件。既読状態と配信結果のみ更新される |
//! | [`NotificationType`] | 通知種別 | 7 種類の閉じた集合（[`kind`] モジュール） |
//! | [`DeliveryResults`] | 配信結果 | チャネルごとの試行・成否、フォールバック、リトライ予定 |
//! | [`CreateNotificationInput`] | 通知作成リクエスト | トリガー（在庫更新など）から渡される生の入力 |
//!
//! ## 設計方針
//!
//! - **閉じた直和型**: 種別ごとのメタデータは [`NotificationMetadata`] で表現し、網羅的な match で扱う
//! - **純粋関数**: 検証・整形・プリファレンス解決・ダイジェストは副作用を持たない
//! - **配信結果は追記のみ**: 一度記録した [`DeliveryResults`] は消去しない

pub mod digest;
pub mod formatter;
pub mod kind;
pub mod metadata;
pub mod preference;
pub mod validator;

use chrono::{DateTime, Utc};
pub use formatter::{FormattedMetadata, NotificationView};
pub use kind::{Category, NotificationType, Priority, TypeConfig};
pub use metadata::{NotificationMetadata, RawMetadata};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::user::UserId;

define_uuid_id! {
    /// 通知 ID（一意識別子）
    ///
    /// UUID v7 を使用するため、生成順にソートできる。
    pub struct NotificationId;
}

/// 通知チャネルのエラー
///
/// チャネル単位で捕捉され、配信結果に記録される。呼び出し元には伝播しない。
#[derive(Debug, Error)]
pub enum NotificationError {
    /// 送信に失敗（メールプロバイダやゲートウェイのエラー）
    #[error("送信に失敗: {0}")]
    SendFailed(String),

    /// 受信者がリアルタイムチャネルに接続していない
    #[error("受信者が接続していません: {0}")]
    NotConnected(String),

    /// テンプレートレンダリングに失敗
    #[error("テンプレートレンダリングに失敗: {0}")]
    TemplateFailed(String),
}

/// メールメッセージ
///
/// テンプレートレンダリングの出力。EmailGateway に渡される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// 送信先メールアドレス
    pub to:        String,
    /// 件名
    pub subject:   String,
    /// HTML 本文
    pub html_body: String,
    /// プレーンテキスト本文
    pub text_body: String,
}

/// メール送信の受領情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailReceipt {
    /// プロバイダが払い出したメッセージ ID
    pub message_id: String,
}

/// リアルタイムチャネルに送るペイロード
#[derive(Debug, Clone, Serialize)]
pub struct RealtimePayload {
    pub event:        &'static str,
    pub notification: NotificationView,
}

impl RealtimePayload {
    /// 通知イベントのペイロードを作る
    pub fn notification(view: NotificationView) -> Self {
        Self {
            event:        "notification",
            notification: view,
        }
    }
}

fn default_true() -> bool {
    true
}

/// 通知作成リクエスト
///
/// `title` と `message` は省略時に種別とメタデータから生成される。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationInput {
    pub user_id: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub metadata: RawMetadata,
    #[serde(default = "default_true")]
    pub send_email: bool,
    #[serde(default = "default_true", rename = "sendWebSocket")]
    pub send_websocket: bool,
}

impl CreateNotificationInput {
    pub fn new(
        user_id: impl Into<String>,
        notification_type: NotificationType,
        metadata: RawMetadata,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            notification_type: notification_type.as_str().to_string(),
            title: None,
            message: None,
            metadata,
            send_email: true,
            send_websocket: true,
        }
    }

    /// 送信チャネルの要求を指定する
    pub fn with_channels(mut self, send_email: bool, send_websocket: bool) -> Self {
        self.send_email = send_email;
        self.send_websocket = send_websocket;
        self
    }

    /// 宛先だけを差し替えた複製を作る（ロール単位の一斉配信用）
    pub fn for_recipient(&self, user_id: &UserId) -> Self {
        Self {
            user_id: user_id.as_str().to_string(),
            ..self.clone()
        }
    }
}

/// 1 チャネルの配信結果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelOutcome {
    pub attempted: bool,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error:     Option<String>,
}

impl ChannelOutcome {
    /// 試行しなかった
    pub fn skipped() -> Self {
        Self::default()
    }

    /// 理由付きで試行しなかった（メールアドレス未登録など）
    pub fn skipped_because(reason: impl Into<String>) -> Self {
        Self {
            attempted: false,
            succeeded: false,
            error:     Some(reason.into()),
        }
    }

    pub fn succeeded() -> Self {
        Self {
            attempted: true,
            succeeded: true,
            error:     None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            attempted: true,
            succeeded: false,
            error:     Some(error.into()),
        }
    }

    /// 試行して失敗した
    pub fn is_failure(&self) -> bool {
        self.attempted && !self.succeeded
    }
}

/// 配信結果
///
/// 最初の配信試行まで存在せず、以後は消去されない。
/// 遅延リトライは再試行したチャネルの結果を上書きし、`attempt` を進める。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResults {
    pub email:           ChannelOutcome,
    pub websocket:       ChannelOutcome,
    pub fallback_used:   bool,
    pub retry_scheduled: bool,
    /// 配信試行の回数（初回は 1）
    pub attempt:         u32,
}

impl DeliveryResults {
    /// 1 つ以上のチャネルを試行し、すべて失敗した
    pub fn all_attempted_failed(&self) -> bool {
        let attempted = [&self.email, &self.websocket]
            .into_iter()
            .filter(|c| c.attempted)
            .collect::<Vec<_>>();
        !attempted.is_empty() && attempted.iter().all(|c| !c.succeeded)
    }

    /// いずれかのチャネルで届いた
    pub fn any_succeeded(&self) -> bool {
        self.email.succeeded || self.websocket.succeeded
    }
}

/// 通知エンティティ
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    id:                NotificationId,
    user_id:           UserId,
    #[serde(rename = "type")]
    notification_type: NotificationType,
    title:             String,
    message:           String,
    metadata:          FormattedMetadata,
    is_read:           bool,
    read_at:           Option<DateTime<Utc>>,
    created_at:        DateTime<Utc>,
    priority:          Priority,
    category:          Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    delivery_results:  Option<DeliveryResults>,
}

/// 新規通知の作成パラメータ
pub struct NewNotification {
    pub id:       NotificationId,
    pub user_id:  UserId,
    pub title:    String,
    pub message:  String,
    pub metadata: FormattedMetadata,
    pub now:      DateTime<Utc>,
}

impl Notification {
    /// 新しい通知を作成する
    ///
    /// 種別・優先度・カテゴリは整形済みメタデータから決まる。
    pub fn new(params: NewNotification) -> Self {
        let notification_type = params.metadata.details.kind();
        Self {
            id: params.id,
            user_id: params.user_id,
            notification_type,
            title: params.title,
            message: params.message,
            priority: params.metadata.priority,
            category: params.metadata.category,
            metadata: params.metadata,
            is_read: false,
            read_at: None,
            created_at: params.now,
            delivery_results: None,
        }
    }

    pub fn id(&self) -> &NotificationId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn notification_type(&self) -> NotificationType {
        self.notification_type
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn metadata(&self) -> &FormattedMetadata {
        &self.metadata
    }

    pub fn is_read(&self) -> bool {
        self.is_read
    }

    pub fn read_at(&self) -> Option<DateTime<Utc>> {
        self.read_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn delivery_results(&self) -> Option<&DeliveryResults> {
        self.delivery_results.as_ref()
    }

    /// 既読にする
    ///
    /// 既に既読の場合は最初の既読日時を保持する。
    pub fn mark_as_read(self, now: DateTime<Utc>) -> Self {
        if self.is_read {
            return self;
        }
        Self {
            is_read: true,
            read_at: Some(now),
            ..self
        }
    }

    /// 配信結果を記録する
    pub fn with_delivery_results(self, results: DeliveryResults) -> Self {
        Self {
            delivery_results: Some(results),
            ..self
        }
    }
}


#[cfg(test)]
mod tests {
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::{test_support::notification, *};

    #[test]
    fn 新規通知は未読で配信結果を持たない() {
        let now = Utc::now();
        let n = notification(NotificationType::LowStock, now, false);

        assert!(!n.is_read());
        assert_eq!(n.read_at(), None);
        assert_eq!(n.delivery_results(), None);
        assert_eq!(n.priority(), Priority::High);
        assert_eq!(n.category(), Category::Inventory);
        assert_eq!(n.created_at(), now);
    }

    #[test]
    fn 既読化は最初の既読日時を保持する() {
        let now = Utc::now();
        let first = now + Duration::minutes(5);
        let n = notification(NotificationType::NewOrder, now, false)
            .mark_as_read(first)
            .mark_as_read(first + Duration::hours(1));

        assert!(n.is_read());
        assert_eq!(n.read_at(), Some(first));
    }

    #[test]
    fn 配信結果は全試行チャネルの失敗を判定できる() {
        let mut results = DeliveryResults {
            email: ChannelOutcome::failed("smtp timeout"),
            websocket: ChannelOutcome::failed("not connected"),
            attempt: 1,
            ..Default::default()
        };
        assert!(results.all_attempted_failed());

        results.email = ChannelOutcome::skipped();
        assert!(results.all_attempted_failed());

        results.websocket = ChannelOutcome::skipped();
        assert!(!results.all_attempted_failed(), "試行なしは失敗扱いしない");

        results.email = ChannelOutcome::succeeded();
        assert!(!results.all_attempted_failed());
        assert!(results.any_succeeded());
    }

    #[test]
    fn シリアライズはcamel_caseで種別をtypeとして出す() {
        let n = notification(NotificationType::ProductArchived, Utc::now(), false);
        let value = serde_json::to_value(&n).unwrap();

        assert_eq!(value["type"], json!("PRODUCT_ARCHIVED"));
        assert_eq!(value["userId"], json!("507f1f77bcf86cd799439011"));
        assert_eq!(value["isRead"], json!(false));
        assert_eq!(value["priority"], json!("low"));
        assert_eq!(value["metadata"]["actionUrl"], json!("/products/p-3"));
        assert!(value.get("deliveryResults").is_none());
    }

    #[test]
    fn 作成リクエストは送信フラグを既定でtrueとして読む() {
        let input: CreateNotificationInput = serde_json::from_value(json!({
            "userId": "507f1f77bcf86cd799439011",
            "type": "LOW_STOCK",
            "metadata": {"productId": "p-1"}
        }))
        .unwrap();

        assert!(input.send_email);
        assert!(input.send_websocket);
        assert_eq!(input.title, None);
    }

    #[test]
    fn for_recipientは宛先だけを差し替える() {
        let input = CreateNotificationInput::new(
            "507f1f77bcf86cd799439011",
            NotificationType::SystemAlert,
            RawMetadata::new(),
        )
        .with_channels(false, true);
        let other = UserId::parse("65a1b2c3d4e5f60718293a4b").unwrap();

        let copy = input.for_recipient(&other);

        assert_eq!(copy.user_id, "65a1b2c3d4e5f60718293a4b");
        assert_eq!(copy.notification_type, input.notification_type);
        assert!(!copy.send_email);
    }
}
