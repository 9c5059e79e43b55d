//! # 受信箱
//!
//! 永続化済みの通知を参照・既読化・整理するユースケース。
//!
//! 並び替え、集計、ダイジェスト、保持期間の判定はドメイン層の純粋関数に任せ、
//! ここでは通知ストアとの入出力だけを扱う。

use std::sync::Arc;

use chrono::TimeZone;
use ichiba_domain::{
    clock::Clock,
    notification::{
        Notification,
        NotificationId,
        NotificationView,
        digest::{self, Digest, DigestPeriod},
        formatter::{self, NotificationSummary},
    },
    user::UserId,
};
use ichiba_infra::repository::NotificationRepository;
use ichiba_shared::{event_log::event, log_business_event};

use crate::error::DeliveryError;

/// 受信箱ユースケース
#[derive(Clone)]
pub struct NotificationInbox {
    repository: Arc<dyn NotificationRepository>,
    clock:      Arc<dyn Clock>,
}

impl NotificationInbox {
    pub fn new(repository: Arc<dyn NotificationRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// UI 向けに並べた通知一覧
    ///
    /// 未読が先、同じ既読状態なら優先度の高い順、同じ優先度なら新しい順。
    pub async fn list_for_ui(&self, user_id: &UserId) -> Result<Vec<NotificationView>, DeliveryError> {
        let notifications = self.load(user_id).await?;
        let now = self.clock.now();
        Ok(formatter::sort_by_priority(notifications)
            .iter()
            .map(|n| formatter::for_ui(n, now))
            .collect())
    }

    /// 件数の集計
    pub async fn summary(&self, user_id: &UserId) -> Result<NotificationSummary, DeliveryError> {
        let notifications = self.load(user_id).await?;
        Ok(formatter::summary(&notifications, self.clock.now()))
    }

    /// 期間ダイジェスト
    ///
    /// 日付のグループ分けは `tz` のローカル日付で行う。
    pub async fn digest<Tz: TimeZone>(
        &self,
        user_id: &UserId,
        period: DigestPeriod,
        tz: &Tz,
    ) -> Result<Digest, DeliveryError> {
        let notifications = self.load(user_id).await?;
        Ok(digest::digest(&notifications, period, self.clock.now(), tz))
    }

    /// 通知を既読にする
    ///
    /// 既読済みの通知はそのまま返し、既読日時を更新しない。
    pub async fn mark_as_read(
        &self,
        user_id: &UserId,
        id: &NotificationId,
    ) -> Result<Notification, DeliveryError> {
        let notification = self
            .repository
            .find_by_id(user_id, id)
            .await
            .map_err(DeliveryError::Repository)?
            .ok_or_else(|| DeliveryError::NotFound(id.to_string()))?;
        if notification.is_read() {
            return Ok(notification);
        }

        let notification = notification.mark_as_read(self.clock.now());
        self.repository
            .update_read_state(&notification)
            .await
            .map_err(DeliveryError::Repository)?;
        Ok(notification)
    }

    /// 未読の通知をすべて既読にし、更新件数を返す
    pub async fn mark_all_as_read(&self, user_id: &UserId) -> Result<usize, DeliveryError> {
        let now = self.clock.now();
        let unread: Vec<_> = self
            .load(user_id)
            .await?
            .into_iter()
            .filter(|n| !n.is_read())
            .collect();

        for notification in &unread {
            self.repository
                .update_read_state(&notification.clone().mark_as_read(now))
                .await
                .map_err(DeliveryError::Repository)?;
        }
        tracing::debug!(notification.recipient = %user_id, count = unread.len(), "すべて既読に更新");
        Ok(unread.len())
    }

    /// 保持期間を過ぎた通知の件数
    pub async fn expired_count(&self, user_id: &UserId) -> Result<u64, DeliveryError> {
        self.repository
            .count_expired(user_id, self.clock.now())
            .await
            .map_err(DeliveryError::Repository)
    }

    /// 保持期間を過ぎた通知を削除し、削除件数を返す
    ///
    /// 期限切れの判定はここで行い、削除そのものは通知ストアに委ねる。
    pub async fn purge_expired(&self, user_id: &UserId) -> Result<u64, DeliveryError> {
        let partition = digest::filter_by_retention(self.load(user_id).await?, self.clock.now());
        if partition.expired.is_empty() {
            return Ok(0);
        }

        let ids: Vec<NotificationId> = partition.expired.iter().map(|n| n.id().clone()).collect();
        let deleted = self
            .repository
            .delete(&ids)
            .await
            .map_err(DeliveryError::Repository)?;

        log_business_event!(
            event.category = event::category::NOTIFICATION,
            event.action = event::action::EXPIRED_PURGED,
            event.result = event::result::SUCCESS,
            notification.recipient = %user_id,
            notification.expired = ids.len(),
            notification.deleted = deleted,
            notification.active = partition.active.len(),
            "期限切れの通知を削除"
        );
        Ok(deleted)
    }

    async fn load(&self, user_id: &UserId) -> Result<Vec<Notification>, DeliveryError> {
        self.repository
            .find_by_user(user_id)
            .await
            .map_err(DeliveryError::Repository)
    }
}
