//! Noop メール送信実装
//!
//! メールを実際に送信せず、ログ出力のみ行う。
//! 開発環境やメール配信を無効化した環境で使用する。

use async_trait::async_trait;
use ichiba_domain::notification::{EmailMessage, EmailReceipt, NotificationError};

use super::EmailGateway;

/// Noop メール送信（ログ出力のみ）
#[derive(Debug, Clone, Default)]
pub struct NoopEmailGateway;

#[async_trait]
impl EmailGateway for NoopEmailGateway {
    async fn send_email(&self, email: &EmailMessage) -> Result<EmailReceipt, NotificationError> {
        let message_id = format!("noop-{}", uuid::Uuid::new_v4());
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            message_id = %message_id,
            "Noop: メール送信をスキップ"
        );
        Ok(EmailReceipt { message_id })
    }
}
