//! # メール配信
//!
//! メールチャネルの送信を担当するインフラストラクチャモジュール。
//!
//! ## 設計方針
//!
//! - **trait による抽象化**: `EmailGateway` trait でメール送信を抽象化
//! - **3 つの実装**: SMTP（Mailpit 開発用）、SES（本番用）、Noop（テスト用）
//! - **起動時に 1 度だけ選択**: `EMAIL_BACKEND` で決めた実装を以後使い続ける

mod noop;
mod ses;
mod smtp;

use async_trait::async_trait;
use ichiba_domain::notification::{EmailMessage, EmailReceipt, NotificationError};
pub use noop::NoopEmailGateway;
pub use ses::SesEmailGateway;
pub use smtp::SmtpEmailGateway;

/// メール送信トレイト
///
/// 成功時はプロバイダのメッセージ ID を返す。失敗はチャネル単位で
/// 捕捉されるため、呼び出し元の処理を止めない。
#[async_trait]
pub trait EmailGateway: Send + Sync {
    /// メールを送信する
    async fn send_email(&self, email: &EmailMessage) -> Result<EmailReceipt, NotificationError>;
}
