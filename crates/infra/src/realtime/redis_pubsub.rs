//! Redis pub/sub によるリアルタイム配信
//!
//! ## チャネル設計
//!
//! | チャネル | メッセージ |
//! |-----|-----|
//! | `ichiba:notifications:{user_id}` | `{"event":"notification","notification":{...}}` (JSON) |
//!
//! WebSocket ゲートウェイがユーザーの接続中だけチャネルを購読する。
//! PUBLISH の受信者数が 0 の場合は未接続とみなす。

use async_trait::async_trait;
use ichiba_domain::{
    notification::{NotificationError, RealtimePayload},
    user::UserId,
};
use redis::{AsyncCommands, aio::ConnectionManager};

use super::RealtimeGateway;

/// ユーザーごとのチャネル名
pub fn user_channel(user_id: &UserId) -> String {
    format!("ichiba:notifications:{}", user_id.as_str())
}

/// Redis pub/sub を使用したリアルタイム配信
pub struct RedisRealtimeGateway {
    conn: ConnectionManager,
}

impl RedisRealtimeGateway {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl RealtimeGateway for RedisRealtimeGateway {
    #[tracing::instrument(skip_all, level = "debug", fields(user_id = %user_id))]
    async fn push_to_user(
        &self,
        user_id: &UserId,
        payload: &RealtimePayload,
    ) -> Result<(), NotificationError> {
        let message = serde_json::to_string(payload)
            .map_err(|e| NotificationError::SendFailed(format!("ペイロードのシリアライズ失敗: {e}")))?;
        let channel = user_channel(user_id);

        let mut conn = self.conn.clone();
        let receivers: i64 = conn
            .publish(&channel, message)
            .await
            .map_err(|e| NotificationError::SendFailed(format!("Redis PUBLISH 失敗: {e}")))?;

        if receivers == 0 {
            return Err(NotificationError::NotConnected(user_id.to_string()));
        }

        tracing::debug!(channel = %channel, receivers, "リアルタイム通知を配信しました");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn チャネル名はユーザーidを含む() {
        let user_id = UserId::parse("507f1f77bcf86cd799439011").unwrap();
        assert_eq!(
            user_channel(&user_id),
            "ichiba:notifications:507f1f77bcf86cd799439011"
        );
    }

    #[test]
    fn トレイトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RedisRealtimeGateway>();
    }
}
