//! # テンプレートレンダラー
//!
//! tera テンプレートエンジンで通知メールを HTML/plaintext 両形式で生成する。
//!
//! - テンプレートは `include_str!` でバイナリに埋め込む
//! - 件名は `[Ichiba] {title}`
//! - `actionUrl` が相対パスの場合は `base_url` を前置してリンクにする

use ichiba_domain::notification::{EmailMessage, Notification, NotificationError};
use tera::{Context, Tera};

const SUBJECT_PREFIX: &str = "[Ichiba]";

/// テンプレートレンダラー
#[derive(Clone)]
pub struct TemplateRenderer {
    engine: Tera,
}

impl TemplateRenderer {
    /// 埋め込みテンプレートを登録したレンダラーを作成する
    pub fn new() -> Result<Self, NotificationError> {
        let mut engine = Tera::default();

        engine
            .add_raw_templates(vec![
                (
                    "base.html",
                    include_str!("../../../templates/notifications/base.html"),
                ),
                (
                    "notification.html",
                    include_str!("../../../templates/notifications/notification.html"),
                ),
                (
                    "notification.txt",
                    include_str!("../../../templates/notifications/notification.txt"),
                ),
            ])
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?;

        Ok(Self { engine })
    }

    /// 通知からメールメッセージを生成する
    ///
    /// # 引数
    ///
    /// - `notification`: 永続化前の通知
    /// - `recipient_email`: 受信者のメールアドレス
    /// - `base_url`: アプリケーションのベース URL（例: `http://localhost:5173`）
    pub fn render(
        &self,
        notification: &Notification,
        recipient_email: &str,
        base_url: &str,
    ) -> Result<EmailMessage, NotificationError> {
        let context = build_context(notification, base_url);

        let html_body = self
            .engine
            .render("notification.html", &context)
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?;
        let text_body = self
            .engine
            .render("notification.txt", &context)
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?;

        Ok(EmailMessage {
            to: recipient_email.to_string(),
            subject: format!("{SUBJECT_PREFIX} {}", notification.title()),
            html_body,
            text_body,
        })
    }
}

fn build_context(notification: &Notification, base_url: &str) -> Context {
    let mut context = Context::new();
    context.insert("title", notification.title());
    context.insert("message", notification.message());
    context.insert("type", notification.notification_type().as_str());
    context.insert("priority", &notification.priority().to_string());
    context.insert("priority_label", notification.priority().label());
    context.insert("category_label", notification.category().label());
    context.insert(
        "action_url",
        &absolute_url(base_url, &notification.metadata().action_url),
    );
    context
}

fn absolute_url(base_url: &str, action_url: &str) -> String {
    if action_url.starts_with('/') {
        format!("{}{action_url}", base_url.trim_end_matches('/'))
    } else {
        action_url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use ichiba_domain::{
        notification::{NewNotification, NotificationId, NotificationType, formatter},
        user::UserId,
    };
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn low_stock(title: &str) -> Notification {
        let raw = json!({
            "productId": "p-100",
            "productName": "Oak Shelf",
            "currentQuantity": 2,
            "threshold": 5
        });
        let metadata =
            formatter::metadata_from_raw(NotificationType::LowStock, raw.as_object().unwrap())
                .unwrap();
        Notification::new(NewNotification {
            id: NotificationId::new(),
            user_id: UserId::generate(),
            title: title.to_string(),
            message: formatter::message(&metadata.details),
            metadata,
            now: Utc::now(),
        })
    }

    #[test]
    fn 件名にプレフィックスとタイトルを含む() {
        let renderer = TemplateRenderer::new().unwrap();

        let email = renderer
            .render(
                &low_stock("Low Stock Alert: Oak Shelf"),
                "vendor@example.com",
                "http://localhost:5173",
            )
            .unwrap();

        assert_eq!(email.to, "vendor@example.com");
        assert_eq!(email.subject, "[Ichiba] Low Stock Alert: Oak Shelf");
    }

    #[test]
    fn 本文にメッセージとリンクを含む() {
        let renderer = TemplateRenderer::new().unwrap();

        let email = renderer
            .render(
                &low_stock("Low Stock Alert: Oak Shelf"),
                "vendor@example.com",
                "https://back.ichiba.example.com/",
            )
            .unwrap();

        let link = "https://back.ichiba.example.com/products/p-100";
        assert!(email.html_body.contains(link));
        assert!(email.text_body.contains(link));
        assert!(
            email
                .text_body
                .contains("Oak Shelf is running low on stock. Current quantity: 2 (threshold: 5).")
        );
        assert!(email.html_body.contains("inventory notifications"));
    }

    #[test]
    fn htmlではタイトルがエスケープされる() {
        let renderer = TemplateRenderer::new().unwrap();

        let email = renderer
            .render(
                &low_stock("Tables & Chairs"),
                "vendor@example.com",
                "http://localhost:5173",
            )
            .unwrap();

        assert!(email.html_body.contains("Tables &amp; Chairs"));
        assert!(email.text_body.contains("Tables & Chairs"));
    }

    #[rstest]
    #[case("/orders/1", "http://localhost:5173/orders/1")]
    #[case("https://carrier.example.com/track", "https://carrier.example.com/track")]
    fn 相対パスだけにベースurlを前置する(#[case] action_url: &str, #[case] expected: &str) {
        assert_eq!(absolute_url("http://localhost:5173", action_url), expected);
    }
}
