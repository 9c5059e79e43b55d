//! # NotificationRepository
//!
//! 通知の永続化を担当するリポジトリトレイト。
//!
//! エンジン自身は通知を削除しない。保持期間を過ぎた通知の削除は
//! 判定結果を受け取ったこのリポジトリの実装が行う。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ichiba_domain::{
    notification::{DeliveryResults, Notification, NotificationId},
    user::UserId,
};

use crate::error::InfraError;

/// 通知リポジトリトレイト
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// 通知を挿入する
    async fn insert(&self, notification: &Notification) -> Result<(), InfraError>;

    /// ID で通知を検索する（受信者本人の通知のみ）
    async fn find_by_id(
        &self,
        user_id: &UserId,
        id: &NotificationId,
    ) -> Result<Option<Notification>, InfraError>;

    /// 受信者の通知をすべて取得する
    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Notification>, InfraError>;

    /// 配信結果を更新する（遅延リトライ後）
    async fn update_delivery_results(
        &self,
        id: &NotificationId,
        results: &DeliveryResults,
    ) -> Result<(), InfraError>;

    /// 既読状態を更新する
    async fn update_read_state(&self, notification: &Notification) -> Result<(), InfraError>;

    /// 通知を削除し、削除件数を返す
    async fn delete(&self, ids: &[NotificationId]) -> Result<u64, InfraError>;

    /// 保持期間を過ぎた通知の件数を数える
    async fn count_expired(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<u64, InfraError>;
}
