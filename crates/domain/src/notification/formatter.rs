//! # 通知の整形
//!
//! 種別とメタデータから人が読むタイトル・本文を生成し、UI 向けの投影
//! （経過時間、優先度・カテゴリのラベル、サマリー、並び替え）を提供する。
//! すべて副作用のない純粋関数。

use std::{cmp::Reverse, collections::BTreeMap};

use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::{
    Notification,
    kind::{Category, NotificationType, Priority},
    metadata::{CommissionAction, NotificationMetadata, RawMetadata},
    validator::{TITLE_MAX_CHARS, ValidationError},
};

/// 整形済みメタデータ
///
/// 種別ごとの詳細に、遷移先 URL と種別設定由来の優先度・カテゴリを付与したもの。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedMetadata {
    #[serde(flatten)]
    pub details:    NotificationMetadata,
    pub action_url: String,
    pub priority:   Priority,
    pub category:   Category,
}

/// UI 向けの通知表現
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    #[serde(flatten)]
    pub notification:   Notification,
    pub time_ago:       String,
    pub priority_label: &'static str,
    pub category_label: &'static str,
}

/// 通知一覧のサマリー
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSummary {
    pub total:         usize,
    pub unread:        usize,
    pub by_type:       BTreeMap<NotificationType, usize>,
    pub by_priority:   BTreeMap<Priority, usize>,
    pub by_category:   BTreeMap<Category, usize>,
    pub last_24_hours: usize,
}

/// タイトルを生成する（最大 200 文字）
pub fn title(metadata: &NotificationMetadata) -> String {
    let title = match metadata {
        NotificationMetadata::LowStock(m) => format!("Low Stock Alert: {}", m.product_name),
        NotificationMetadata::NewOrder(m) => format!("New Order #{}", m.order_number),
        NotificationMetadata::CubicVolumeAlert(m) => {
            format!("Cubic Volume Alert: {}", m.product_name)
        }
        NotificationMetadata::CommissionUpdate(m) => {
            format!("Commission {}", capitalize(&m.action.to_string()))
        }
        NotificationMetadata::ProductArchived(m) => format!("Product Archived: {}", m.product_name),
        NotificationMetadata::VendorStatusChange(m) => {
            format!("Vendor Status Changed: {}", m.vendor_name)
        }
        NotificationMetadata::SystemAlert(m) => format!("System Alert: {}", m.alert_type),
    };
    truncate(&title, TITLE_MAX_CHARS)
}

/// 本文を生成する
pub fn message(metadata: &NotificationMetadata) -> String {
    match metadata {
        NotificationMetadata::LowStock(m) => format!(
            "{} is running low on stock. Current quantity: {} (threshold: {}).",
            m.product_name, m.current_quantity, m.threshold
        ),
        NotificationMetadata::NewOrder(m) => format!(
            "You have received a new order #{}. Total amount: ${:.2}",
            m.order_number, m.total_amount
        ),
        NotificationMetadata::CubicVolumeAlert(m) => {
            let unit = m
                .unit
                .as_deref()
                .map(|u| format!(" {u}"))
                .unwrap_or_default();
            format!(
                "{} has a cubic volume of {}{unit} which exceeds the threshold of {}{unit}.",
                m.product_name, m.cubic_volume, m.threshold
            )
        }
        NotificationMetadata::CommissionUpdate(m) => match m.action {
            CommissionAction::Generated => {
                format!("A new commission of ${:.2} has been generated.", m.amount)
            }
            CommissionAction::Approved => {
                format!("Your commission of ${:.2} has been approved.", m.amount)
            }
            CommissionAction::Paid => format!("Your commission of ${:.2} has been paid.", m.amount),
            CommissionAction::Disputed => {
                format!("Your commission of ${:.2} is under dispute.", m.amount)
            }
        },
        NotificationMetadata::ProductArchived(m) => {
            let mut message = format!("{} has been archived.", m.product_name);
            if let Some(reason) = &m.reason {
                message.push_str(&format!(" Reason: {reason}"));
            }
            message
        }
        NotificationMetadata::VendorStatusChange(m) => {
            let mut message = match m.previous_status {
                Some(previous) => format!(
                    "{} status changed from {previous} to {}.",
                    m.vendor_name, m.new_status
                ),
                None => format!("{} status changed to {}.", m.vendor_name, m.new_status),
            };
            if let Some(reason) = &m.reason {
                message.push_str(&format!(" Reason: {reason}"));
            }
            message
        }
        NotificationMetadata::SystemAlert(m) => match &m.details {
            Some(details) => details.clone(),
            None => format!("A {} system alert was raised: {}.", m.severity, m.alert_type),
        },
    }
}

/// 整形済みメタデータを作る
///
/// `action_url` が省略された場合は種別ごとの既定値を使う。
pub fn metadata(details: NotificationMetadata, action_url: Option<String>) -> FormattedMetadata {
    let config = details.kind().config();
    let action_url = action_url.unwrap_or_else(|| details.default_action_url());
    FormattedMetadata {
        details,
        action_url,
        priority: config.default_priority,
        category: config.category,
    }
}

/// 生のメタデータを整形する（数値文字列の変換を含む）
pub fn metadata_from_raw(
    kind: NotificationType,
    raw: &RawMetadata,
) -> Result<FormattedMetadata, Vec<ValidationError>> {
    let details = NotificationMetadata::parse(kind, raw)?;
    let action_url = match raw.get("actionUrl") {
        Some(JsonValue::String(url)) if !url.trim().is_empty() => Some(url.trim().to_string()),
        _ => None,
    };
    Ok(metadata(details, action_url))
}

/// UI 向けの表現に変換する
pub fn for_ui(notification: &Notification, now: DateTime<Utc>) -> NotificationView {
    NotificationView {
        time_ago:       time_ago(notification.created_at(), now),
        priority_label: notification.priority().label(),
        category_label: notification.category().label(),
        notification:   notification.clone(),
    }
}

/// 経過時間を「n minutes ago」形式で表す
///
/// 未来の日時は "just now" とする。
pub fn time_ago(date: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - date).num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = seconds / 60;
    if minutes < 60 {
        return plural(minutes, "minute");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return plural(hours, "hour");
    }
    let days = hours / 24;
    if days < 7 {
        return plural(days, "day");
    }
    if days < 28 {
        return plural(days / 7, "week");
    }
    let months = (days / 30).max(1);
    if months < 12 {
        return plural(months, "month");
    }
    plural((days / 365).max(1), "year")
}

/// 未読を先に、同じ既読状態では優先度順、同じ優先度では新しい順に並べる
pub fn sort_by_priority(mut notifications: Vec<Notification>) -> Vec<Notification> {
    notifications.sort_by_key(|n| (n.is_read(), n.priority(), Reverse(n.created_at())));
    notifications
}

/// 通知一覧のサマリーを作る
pub fn summary(notifications: &[Notification], now: DateTime<Utc>) -> NotificationSummary {
    let since = now - Duration::hours(24);
    NotificationSummary {
        total:         notifications.len(),
        unread:        notifications.iter().filter(|n| !n.is_read()).count(),
        by_type:       count_by(notifications, Notification::notification_type),
        by_priority:   count_by(notifications, Notification::priority),
        by_category:   count_by(notifications, Notification::category),
        last_24_hours: notifications
            .iter()
            .filter(|n| n.created_at() > since)
            .count(),
    }
}

fn count_by<K: Ord + Copy + std::hash::Hash>(
    notifications: &[Notification],
    key: impl Fn(&Notification) -> K,
) -> BTreeMap<K, usize> {
    notifications
        .iter()
        .map(key)
        .counts()
        .into_iter()
        .collect()
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::notification::test_support::notification;

    fn parse(kind: NotificationType, value: JsonValue) -> NotificationMetadata {
        NotificationMetadata::parse(kind, value.as_object().unwrap()).unwrap()
    }

    #[test]
    fn 新規注文の本文は金額を小数2桁で表示する() {
        let details = parse(
            NotificationType::NewOrder,
            json!({"orderId": "o-1", "orderNumber": "1042", "totalAmount": "99.5"}),
        );

        assert_eq!(title(&details), "New Order #1042");
        assert_eq!(
            message(&details),
            "You have received a new order #1042. Total amount: $99.50"
        );
    }

    #[test]
    fn 在庫不足のタイトルと本文() {
        let details = parse(
            NotificationType::LowStock,
            json!({
                "productId": "p-1", "productName": "Walnut Shelf",
                "currentQuantity": 2, "threshold": 5
            }),
        );

        assert_eq!(title(&details), "Low Stock Alert: Walnut Shelf");
        assert_eq!(
            message(&details),
            "Walnut Shelf is running low on stock. Current quantity: 2 (threshold: 5)."
        );
    }

    #[test]
    fn 手数料のタイトルはアクションを先頭大文字にする() {
        let details = parse(
            NotificationType::CommissionUpdate,
            json!({"commissionId": "c-1", "action": "disputed", "amount": 3}),
        );

        assert_eq!(title(&details), "Commission Disputed");
        assert_eq!(message(&details), "Your commission of $3.00 is under dispute.");
    }

    #[test]
    fn ベンダーステータス変更は変更前後を表示する() {
        let details = parse(
            NotificationType::VendorStatusChange,
            json!({
                "vendorId": "v-1", "vendorName": "Oak & Co",
                "newStatus": "suspended", "previousStatus": "active"
            }),
        );

        assert_eq!(
            message(&details),
            "Oak & Co status changed from active to suspended."
        );
    }

    #[test]
    fn 長い商品名のタイトルは200文字に切り詰める() {
        let details = parse(
            NotificationType::ProductArchived,
            json!({"productId": "p-1", "productName": "x".repeat(300)}),
        );

        assert_eq!(title(&details).chars().count(), 200);
    }

    #[test]
    fn 整形済みメタデータに既定のurlと種別設定が付く() {
        let raw = json!({
            "productId": "p-2", "productName": "Crate",
            "cubicVolume": "3.2", "threshold": 2.5
        });

        let formatted =
            metadata_from_raw(NotificationType::CubicVolumeAlert, raw.as_object().unwrap())
                .unwrap();

        assert_eq!(formatted.action_url, "/products/p-2");
        assert_eq!(formatted.priority, Priority::Medium);
        assert_eq!(formatted.category, Category::Inventory);
        assert_eq!(
            serde_json::to_value(&formatted).unwrap(),
            json!({
                "productId": "p-2", "productName": "Crate",
                "cubicVolume": 3.2, "threshold": 2.5,
                "actionUrl": "/products/p-2",
                "priority": "medium", "category": "inventory"
            })
        );
    }

    #[test]
    fn 指定されたaction_urlは既定値より優先される() {
        let raw = json!({"alertType": "billing", "severity": "critical", "actionUrl": "/billing"});

        let formatted =
            metadata_from_raw(NotificationType::SystemAlert, raw.as_object().unwrap()).unwrap();

        assert_eq!(formatted.action_url, "/billing");
    }

    #[rstest]
    #[case::直後(0, "just now")]
    #[case::未来(-120, "just now")]
    #[case::秒(59, "just now")]
    #[case::分_90秒(90, "1 minute ago")]
    #[case::分_複数(150, "2 minutes ago")]
    #[case::時間_3700秒(3_700, "1 hour ago")]
    #[case::日(2 * 86_400, "2 days ago")]
    #[case::週(8 * 86_400, "1 week ago")]
    #[case::週_上限(27 * 86_400, "3 weeks ago")]
    #[case::月_28日(28 * 86_400, "1 month ago")]
    #[case::月(65 * 86_400, "2 months ago")]
    #[case::年(400 * 86_400, "1 year ago")]
    #[case::年_複数(800 * 86_400, "2 years ago")]
    fn time_agoのバケット境界(#[case] seconds_ago: i64, #[case] expected: &str) {
        let now = Utc::now();
        assert_eq!(time_ago(now - Duration::seconds(seconds_ago), now), expected);
    }

    #[test]
    fn 優先度順は未読_優先度_新しい順() {
        let now = Utc::now();
        let read_high = notification(NotificationType::LowStock, now, true);
        let unread_low = notification(NotificationType::ProductArchived, now, false);
        let unread_high_old =
            notification(NotificationType::NewOrder, now - Duration::hours(2), false);
        let unread_high_new = notification(NotificationType::SystemAlert, now, false);
        let unread_medium = notification(NotificationType::CommissionUpdate, now, false);

        let sorted = sort_by_priority(vec![
            read_high.clone(),
            unread_low.clone(),
            unread_high_old.clone(),
            unread_medium.clone(),
            unread_high_new.clone(),
        ]);

        let ids: Vec<_> = sorted.iter().map(|n| n.id().clone()).collect();
        assert_eq!(
            ids,
            vec![
                unread_high_new.id().clone(),
                unread_high_old.id().clone(),
                unread_medium.id().clone(),
                unread_low.id().clone(),
                read_high.id().clone(),
            ]
        );
    }

    #[test]
    fn サマリーは種別_優先度_カテゴリ別に集計する() {
        let now = Utc::now();
        let list = vec![
            notification(NotificationType::LowStock, now, false),
            notification(NotificationType::LowStock, now - Duration::days(2), true),
            notification(NotificationType::NewOrder, now - Duration::hours(3), false),
        ];

        let summary = summary(&list, now);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.unread, 2);
        assert_eq!(summary.by_type[&NotificationType::LowStock], 2);
        assert_eq!(summary.by_priority[&Priority::High], 3);
        assert_eq!(summary.by_category[&Category::Orders], 1);
        assert_eq!(summary.last_24_hours, 2);
    }

    #[test]
    fn for_uiは経過時間とラベルを付与する() {
        let now = Utc::now();
        let n = notification(NotificationType::ProductArchived, now - Duration::seconds(90), false);

        let view = for_ui(&n, now);
        let value = serde_json::to_value(&view).unwrap();

        assert_eq!(value["timeAgo"], json!("1 minute ago"));
        assert_eq!(value["priorityLabel"], json!("Low Priority"));
        assert_eq!(value["categoryLabel"], json!("Products"));
        assert_eq!(value["title"], json!("Product Archived: Lamp"));
    }
}
