//! # ダイジェストと保持期間
//!
//! 永続化済みの通知を日付ごとにまとめ、期間ダイジェストを作り、
//! 種別ごとの保持期間に対して有効/期限切れを判定する。
//!
//! このモジュールは判定のみを行い、削除は永続化層に委ねる。

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::{Notification, formatter, kind::Category, kind::Priority};

/// ダイジェストに含める通知の上限
pub const DIGEST_TOP_NOTIFICATIONS: usize = 10;
/// ダイジェストに含める日付グループの上限
pub const DIGEST_DATE_GROUPS: usize = 7;
/// ダイジェストに含める上位カテゴリの数
pub const DIGEST_TOP_CATEGORIES: usize = 5;

/// ダイジェストの対象期間
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DigestPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl DigestPeriod {
    /// 期間の長さ
    pub fn window(self) -> Duration {
        match self {
            Self::Daily => Duration::days(1),
            Self::Weekly => Duration::days(7),
            Self::Monthly => Duration::days(30),
        }
    }
}

/// 日付ごとのグループ
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateGroup {
    /// ローカル日付（`YYYY-MM-DD`）
    pub date:          String,
    pub count:         usize,
    pub unread_count:  usize,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestSummary {
    pub total:         usize,
    pub unread:        usize,
    pub high_priority: usize,
    pub categories:    BTreeMap<Category, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: Category,
    pub count:    usize,
}

/// 期間ダイジェスト
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Digest {
    pub period:          DigestPeriod,
    pub summary:         DigestSummary,
    pub notifications:   Vec<Notification>,
    pub grouped_by_date: Vec<DateGroup>,
    pub top_categories:  Vec<CategoryCount>,
}

/// 有効/期限切れの分類結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetentionPartition {
    pub active:  Vec<Notification>,
    pub expired: Vec<Notification>,
}

/// 通知をローカル日付ごとにまとめる（新しい日付が先）
///
/// グループ内は新しい順に並べる。
pub fn group_by_date<Tz: TimeZone>(notifications: &[Notification], tz: &Tz) -> Vec<DateGroup> {
    let groups: BTreeMap<NaiveDate, Vec<Notification>> = notifications
        .iter()
        .cloned()
        .into_group_map_by(|n| n.created_at().with_timezone(tz).date_naive())
        .into_iter()
        .collect();

    groups
        .into_iter()
        .rev()
        .map(|(date, mut notifications)| {
            notifications.sort_by_key(|n| std::cmp::Reverse(n.created_at()));
            DateGroup {
                date: date.format("%Y-%m-%d").to_string(),
                count: notifications.len(),
                unread_count: notifications.iter().filter(|n| !n.is_read()).count(),
                notifications,
            }
        })
        .collect()
}

/// 期間ダイジェストを作る
///
/// `now` から期間の長さだけ遡った範囲の通知を対象にする。
pub fn digest<Tz: TimeZone>(
    notifications: &[Notification],
    period: DigestPeriod,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Digest {
    let since = now - period.window();
    let in_period: Vec<Notification> = notifications
        .iter()
        .filter(|n| n.created_at() >= since)
        .cloned()
        .collect();

    let categories: BTreeMap<Category, usize> = in_period
        .iter()
        .map(Notification::category)
        .counts()
        .into_iter()
        .collect();

    let top_categories = categories
        .iter()
        .map(|(&category, &count)| CategoryCount { category, count })
        .sorted_by(|a, b| b.count.cmp(&a.count).then(a.category.cmp(&b.category)))
        .take(DIGEST_TOP_CATEGORIES)
        .collect();

    let summary = DigestSummary {
        total: in_period.len(),
        unread: in_period.iter().filter(|n| !n.is_read()).count(),
        high_priority: in_period
            .iter()
            .filter(|n| n.priority() == Priority::High)
            .count(),
        categories,
    };

    let grouped_by_date = group_by_date(&in_period, tz)
        .into_iter()
        .take(DIGEST_DATE_GROUPS)
        .collect();

    let notifications = formatter::sort_by_priority(in_period)
        .into_iter()
        .take(DIGEST_TOP_NOTIFICATIONS)
        .collect();

    Digest {
        period,
        summary,
        notifications,
        grouped_by_date,
        top_categories,
    }
}

/// 保持期間を過ぎているか
///
/// 作成日時に保持日数を足した時刻を `now` が超えた場合に期限切れとする。
pub fn is_expired(notification: &Notification, now: DateTime<Utc>) -> bool {
    let retention_days = notification.notification_type().config().retention_days;
    now > notification.created_at() + Duration::days(i64::from(retention_days))
}

/// 有効な通知と期限切れの通知に分ける
pub fn filter_by_retention(
    notifications: Vec<Notification>,
    now: DateTime<Utc>,
) -> RetentionPartition {
    let (expired, active): (Vec<_>, Vec<_>) = notifications
        .into_iter()
        .partition(|n| is_expired(n, now));
    RetentionPartition { active, expired }
}
