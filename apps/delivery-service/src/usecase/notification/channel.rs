//! チャネル単位の送信
//!
//! 送信エラーはここで捕捉し、[`ChannelOutcome`] に変換する。呼び出し元に
//! エラーとして伝播させない。

use ichiba_domain::{
    notification::{ChannelOutcome, EmailMessage, NotificationId, RealtimePayload},
    user::UserId,
};
use ichiba_infra::{email::EmailGateway, realtime::RealtimeGateway};
use ichiba_shared::{
    event_log::{self, event},
    log_business_event,
};

/// メールを送信し、結果を記録用の形に変換する
pub(crate) async fn send_email(
    gateway: &dyn EmailGateway,
    notification_id: &NotificationId,
    message: &EmailMessage,
) -> ChannelOutcome {
    match gateway.send_email(message).await {
        Ok(receipt) => {
            tracing::debug!(
                notification.id = %notification_id,
                email.message_id = %receipt.message_id,
                "メールチャネルで送信"
            );
            ChannelOutcome::succeeded()
        }
        Err(e) => {
            log_business_event!(
                event.category = event::category::NOTIFICATION,
                event.action = event::action::CHANNEL_FAILED,
                event.entity_type = event::entity_type::NOTIFICATION,
                event.entity_id = %notification_id,
                event.result = event::result::FAILURE,
                notification.channel = event::channel::EMAIL,
                error.category = event_log::error::category::EXTERNAL_SERVICE,
                error.kind = event_log::error::kind::EMAIL_TRANSPORT,
                error = %e,
                "メールチャネルの送信に失敗"
            );
            ChannelOutcome::failed(e.to_string())
        }
    }
}

/// リアルタイムチャネルにプッシュし、結果を記録用の形に変換する
pub(crate) async fn push_realtime(
    gateway: &dyn RealtimeGateway,
    notification_id: &NotificationId,
    user_id: &UserId,
    payload: &RealtimePayload,
) -> ChannelOutcome {
    match gateway.push_to_user(user_id, payload).await {
        Ok(()) => {
            tracing::debug!(
                notification.id = %notification_id,
                notification.recipient = %user_id,
                "リアルタイムチャネルで送信"
            );
            ChannelOutcome::succeeded()
        }
        Err(e) => {
            log_business_event!(
                event.category = event::category::NOTIFICATION,
                event.action = event::action::CHANNEL_FAILED,
                event.entity_type = event::entity_type::NOTIFICATION,
                event.entity_id = %notification_id,
                event.result = event::result::FAILURE,
                notification.channel = event::channel::WEBSOCKET,
                notification.recipient = %user_id,
                error.category = event_log::error::category::EXTERNAL_SERVICE,
                error.kind = event_log::error::kind::REALTIME_TRANSPORT,
                error = %e,
                "リアルタイムチャネルの送信に失敗"
            );
            ChannelOutcome::failed(e.to_string())
        }
    }
}
