//! # 通知ユースケース
//!
//! 業務イベントに伴う通知の検証・配信・記録と、配信済み通知の参照を統合する。
//!
//! ## モジュール構成
//!
//! - [`coordinator`] - 検証 → プリファレンス解決 → 2 チャネル配信 → フォールバック → 永続化
//! - [`retry`] - 全チャネル失敗時の遅延リトライ
//! - [`metrics`] - フォールバック・リトライのカウンタ
//! - [`template_renderer`] - tera テンプレートエンジンによるメール生成
//! - [`inbox`] - 一覧・集計・ダイジェスト・既読化・期限切れ削除

mod channel;
pub mod coordinator;
pub mod inbox;
pub mod metrics;
pub mod retry;
pub mod template_renderer;

pub use coordinator::{
    Collaborators,
    CoordinatorSettings,
    NotificationCoordinator,
    RecipientFailure,
    RoleBroadcastReport,
};
pub use inbox::NotificationInbox;
pub use metrics::{AtomicDeliveryMetrics, DeliveryCounter, DeliveryMetrics, FallbackStats};
pub use retry::{RetryPolicy, RetryScheduler};
pub use template_renderer::TemplateRenderer;
