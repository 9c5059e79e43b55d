//! # リアルタイム配信
//!
//! 接続中のユーザーに通知をプッシュするチャネル。
//!
//! ## 設計方針
//!
//! - **trait による抽象化**: `RealtimeGateway` trait でプッシュ先を抽象化
//! - **2 つの実装**: Redis pub/sub（WebSocket ゲートウェイが購読）、Noop（テスト用）
//! - **未接続は失敗**: 受信者が購読していなければチャネル失敗として扱い、
//!   メールへのフォールバックの判断材料にする

mod noop;
mod redis_pubsub;

use async_trait::async_trait;
use ichiba_domain::{
    notification::{NotificationError, RealtimePayload},
    user::UserId,
};
pub use noop::NoopRealtimeGateway;
pub use redis_pubsub::{RedisRealtimeGateway, user_channel};

/// リアルタイム配信トレイト
#[async_trait]
pub trait RealtimeGateway: Send + Sync {
    /// ユーザーに通知をプッシュする
    async fn push_to_user(
        &self,
        user_id: &UserId,
        payload: &RealtimePayload,
    ) -> Result<(), NotificationError>;
}
