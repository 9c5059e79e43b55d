//! # 遅延リトライ
//!
//! すべてのチャネルで配信に失敗した通知を、指数バックオフで再送する。
//!
//! - 再送は tokio のタスクで行い、`create_notification` の呼び出しをブロックしない
//! - 前回失敗したチャネルだけを再送する
//! - 試行ごとに通知ストアの配信結果を更新し、`attempt` を進める
//! - プロセスの再起動をまたいだ再送は行わない

use std::{sync::Arc, time::Duration};

use ichiba_domain::{
    notification::{DeliveryResults, EmailMessage, NotificationId, RealtimePayload},
    user::UserId,
};
use ichiba_infra::{
    email::EmailGateway,
    realtime::RealtimeGateway,
    repository::NotificationRepository,
};
use ichiba_shared::{event_log::event, log_business_event};
use rand::Rng;
use tokio::task::JoinHandle;

use super::{
    channel,
    metrics::{DeliveryCounter, DeliveryMetrics},
};

/// 遅延の揺らぎ幅（±25%）
const JITTER_RATIO: f64 = 0.25;

/// リトライ方針
///
/// `retry` 回目（1 始まり）の遅延は `initial_delay * 2^(retry-1)` を
/// `max_delay` で頭打ちにしたもの。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 遅延リトライの最大回数（0 で無効）
    pub max_attempts:  u32,
    pub initial_delay: Duration,
    pub max_delay:     Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts:  3,
            initial_delay: Duration::from_secs(5),
            max_delay:     Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// `retry` 回目の遅延リトライを予約できるか
    pub fn allows(&self, retry: u32) -> bool {
        (1..=self.max_attempts).contains(&retry)
    }

    /// 揺らぎを含まない遅延
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.initial_delay
            .saturating_mul(1 << exponent)
            .min(self.max_delay)
    }

    /// ±25% の揺らぎを加えた遅延
    pub fn delay(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        let factor = rand::rng().random_range(1.0 - JITTER_RATIO..=1.0 + JITTER_RATIO);
        Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(base)
    }
}

/// 再送に必要な情報
///
/// 初回配信時に組み立てたメールとペイロードをそのまま再利用する。
#[derive(Debug, Clone)]
pub struct RetryJob {
    pub notification_id: NotificationId,
    pub user_id:         UserId,
    /// 受信者のメールアドレスが解決できなかった場合は `None`
    pub email:           Option<EmailMessage>,
    pub payload:         RealtimePayload,
    /// 直前の試行の配信結果
    pub results:         DeliveryResults,
}

/// 遅延リトライのスケジューラ
#[derive(Clone)]
pub struct RetryScheduler {
    policy:     RetryPolicy,
    email:      Arc<dyn EmailGateway>,
    realtime:   Arc<dyn RealtimeGateway>,
    repository: Arc<dyn NotificationRepository>,
    metrics:    Arc<dyn DeliveryMetrics>,
}

impl RetryScheduler {
    pub fn new(
        policy: RetryPolicy,
        email: Arc<dyn EmailGateway>,
        realtime: Arc<dyn RealtimeGateway>,
        repository: Arc<dyn NotificationRepository>,
        metrics: Arc<dyn DeliveryMetrics>,
    ) -> Self {
        Self {
            policy,
            email,
            realtime,
            repository,
            metrics,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// 再送タスクを起動する
    ///
    /// タスクは成功するか最大回数に達するまで再送を続け、最後の配信結果を返す。
    pub fn schedule(&self, job: RetryJob) -> JoinHandle<DeliveryResults> {
        tokio::spawn(self.clone().run(job))
    }

    async fn run(self, mut job: RetryJob) -> DeliveryResults {
        loop {
            let retry = job.results.attempt;
            let delay = self.policy.delay(retry);
            tracing::debug!(
                notification.id = %job.notification_id,
                retry,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "遅延リトライを待機"
            );
            tokio::time::sleep(delay).await;

            let mut results = self.resend(&job).await;
            if results.any_succeeded() {
                self.metrics.increment(DeliveryCounter::SuccessfulRetries);
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::RETRY_SUCCEEDED,
                    event.entity_type = event::entity_type::NOTIFICATION,
                    event.entity_id = %job.notification_id,
                    event.result = event::result::SUCCESS,
                    notification.attempt = results.attempt,
                    "遅延リトライで配信成功"
                );
            } else if self.policy.allows(results.attempt) {
                results.retry_scheduled = true;
                self.metrics.increment(DeliveryCounter::RetryAttempts);
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::RETRY_SCHEDULED,
                    event.entity_type = event::entity_type::NOTIFICATION,
                    event.entity_id = %job.notification_id,
                    event.result = event::result::FAILURE,
                    notification.attempt = results.attempt,
                    "遅延リトライを再予約"
                );
            } else {
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::RETRY_EXHAUSTED,
                    event.entity_type = event::entity_type::NOTIFICATION,
                    event.entity_id = %job.notification_id,
                    event.result = event::result::FAILURE,
                    notification.attempt = results.attempt,
                    "遅延リトライの上限に到達"
                );
            }

            if let Err(e) = self
                .repository
                .update_delivery_results(&job.notification_id, &results)
                .await
            {
                tracing::warn!(
                    error = %e,
                    notification.id = %job.notification_id,
                    "配信結果の更新に失敗"
                );
            }

            job.results = results;
            if !job.results.retry_scheduled {
                return job.results;
            }
        }
    }

    /// 前回失敗したチャネルだけを再送する
    async fn resend(&self, job: &RetryJob) -> DeliveryResults {
        let previous = &job.results;

        let email = async {
            match (&job.email, previous.email.is_failure()) {
                (Some(message), true) => {
                    channel::send_email(self.email.as_ref(), &job.notification_id, message).await
                }
                _ => previous.email.clone(),
            }
        };
        let websocket = async {
            if previous.websocket.is_failure() {
                channel::push_realtime(
                    self.realtime.as_ref(),
                    &job.notification_id,
                    &job.user_id,
                    &job.payload,
                )
                .await
            } else {
                previous.websocket.clone()
            }
        };
        let (email, websocket) = tokio::join!(email, websocket);

        DeliveryResults {
            email,
            websocket,
            fallback_used: previous.fallback_used,
            retry_scheduled: false,
            attempt: previous.attempt + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use ichiba_domain::notification::{
        ChannelOutcome,
        NewNotification,
        Notification,
        NotificationType,
        formatter,
    };
    use ichiba_infra::mock::{
        MockEmailGateway,
        MockFailure,
        MockNotificationRepository,
        MockRealtimeGateway,
    };
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::usecase::notification::metrics::AtomicDeliveryMetrics;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    fn stored_notification() -> Notification {
        let raw = json!({"orderId": "o-1", "orderNumber": "1001", "totalAmount": 12.5});
        let metadata =
            formatter::metadata_from_raw(NotificationType::NewOrder, raw.as_object().unwrap())
                .unwrap();
        Notification::new(NewNotification {
            id: NotificationId::new(),
            user_id: UserId::generate(),
            title: formatter::title(&metadata.details),
            message: formatter::message(&metadata.details),
            metadata,
            now: Utc::now(),
        })
    }

    fn failed_job(notification: &Notification) -> RetryJob {
        RetryJob {
            notification_id: notification.id().clone(),
            user_id:         notification.user_id().clone(),
            email:           Some(EmailMessage {
                to:        "vendor@example.com".to_string(),
                subject:   "[Ichiba] New Order #1001".to_string(),
                html_body: "<p>order</p>".to_string(),
                text_body: "order".to_string(),
            }),
            payload:         RealtimePayload::notification(formatter::for_ui(
                notification,
                Utc::now(),
            )),
            results:         DeliveryResults {
                email: ChannelOutcome::failed("smtp down"),
                websocket: ChannelOutcome::failed("not connected"),
                retry_scheduled: true,
                attempt: 1,
                ..Default::default()
            },
        }
    }

    #[rstest]
    #[case(1, 5)]
    #[case(2, 10)]
    #[case(3, 20)]
    #[case(4, 40)]
    #[case(5, 60)]
    #[case(40, 60)]
    fn 遅延は指数的に伸びて上限で止まる(#[case] retry: u32, #[case] expected_secs: u64) {
        assert_eq!(
            RetryPolicy::default().base_delay(retry),
            Duration::from_secs(expected_secs)
        );
    }

    #[test]
    fn 揺らぎは基準の前後25パーセント以内() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = policy.delay(2);
            assert!(delay >= Duration::from_millis(7_500), "{delay:?}");
            assert!(delay <= Duration::from_millis(12_500), "{delay:?}");
        }
    }

    #[test]
    fn 最大回数を超えるリトライは予約できない() {
        let policy = RetryPolicy::default();
        assert!(!policy.allows(0));
        assert!(policy.allows(1));
        assert!(policy.allows(3));
        assert!(!policy.allows(4));
        assert!(!fast_policy(0).allows(1));
    }

    #[tokio::test]
    async fn 再送に成功すると成功回数を記録して終了する() {
        let email = MockEmailGateway::new();
        let realtime = MockRealtimeGateway::with_failure(MockFailure::Always);
        let repository = MockNotificationRepository::new();
        let metrics = Arc::new(AtomicDeliveryMetrics::new());
        let notification = stored_notification();
        repository.add(notification.clone());
        let scheduler = RetryScheduler::new(
            fast_policy(3),
            Arc::new(email.clone()),
            Arc::new(realtime.clone()),
            Arc::new(repository.clone()),
            metrics.clone(),
        );

        let results = scheduler
            .schedule(failed_job(&notification))
            .await
            .unwrap();

        assert_eq!(results.attempt, 2);
        assert!(results.email.succeeded);
        assert!(results.websocket.is_failure());
        assert!(!results.retry_scheduled);
        assert_eq!(email.sent_emails().len(), 1);
        assert_eq!(metrics.snapshot().successful_retries, 1);
        assert_eq!(metrics.snapshot().retry_attempts, 0);

        let stored = repository.all();
        assert_eq!(stored[0].delivery_results(), Some(&results));
    }

    #[tokio::test]
    async fn 失敗が続くと最大回数で打ち切る() {
        let email = MockEmailGateway::with_failure(MockFailure::Always);
        let realtime = MockRealtimeGateway::with_failure(MockFailure::Always);
        let repository = MockNotificationRepository::new();
        let metrics = Arc::new(AtomicDeliveryMetrics::new());
        let notification = stored_notification();
        repository.add(notification.clone());
        let scheduler = RetryScheduler::new(
            fast_policy(3),
            Arc::new(email.clone()),
            Arc::new(realtime.clone()),
            Arc::new(repository),
            metrics.clone(),
        );

        let results = scheduler
            .schedule(failed_job(&notification))
            .await
            .unwrap();

        // 初回 + 遅延リトライ 3 回
        assert_eq!(results.attempt, 4);
        assert!(!results.retry_scheduled);
        assert_eq!(email.attempts(), 3);
        assert_eq!(realtime.attempts(), 3);
        // 初回の予約はコーディネータが数えるため、ここでは再予約の 2 回だけ
        assert_eq!(metrics.snapshot().retry_attempts, 2);
        assert_eq!(metrics.snapshot().successful_retries, 0);
    }

    #[tokio::test]
    async fn 失敗したチャネルだけを再送する() {
        let email = MockEmailGateway::new();
        let realtime = MockRealtimeGateway::new();
        let repository = MockNotificationRepository::new();
        let notification = stored_notification();
        let mut job = failed_job(&notification);
        job.results.email = ChannelOutcome::skipped();
        let scheduler = RetryScheduler::new(
            fast_policy(1),
            Arc::new(email.clone()),
            Arc::new(realtime.clone()),
            Arc::new(repository),
            Arc::new(AtomicDeliveryMetrics::new()),
        );

        let results = scheduler.schedule(job).await.unwrap();

        assert_eq!(results.email, ChannelOutcome::skipped());
        assert!(results.websocket.succeeded);
        assert_eq!(email.attempts(), 0);
        assert_eq!(realtime.attempts(), 1);
    }
}
