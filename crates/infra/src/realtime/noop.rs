//! Noop リアルタイム配信実装
//!
//! 実際には配信せず、ログ出力のみ行う。常に成功を返す。

use async_trait::async_trait;
use ichiba_domain::{
    notification::{NotificationError, RealtimePayload},
    user::UserId,
};

use super::RealtimeGateway;

/// Noop リアルタイム配信（ログ出力のみ）
#[derive(Debug, Clone, Default)]
pub struct NoopRealtimeGateway;

#[async_trait]
impl RealtimeGateway for NoopRealtimeGateway {
    async fn push_to_user(
        &self,
        user_id: &UserId,
        payload: &RealtimePayload,
    ) -> Result<(), NotificationError> {
        tracing::info!(
            user_id = %user_id,
            event = payload.event,
            title = %payload.notification.notification.title(),
            "Noop: リアルタイム配信をスキップ"
        );
        Ok(())
    }
}
