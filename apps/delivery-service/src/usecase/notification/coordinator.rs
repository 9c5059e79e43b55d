//! # 配信コーディネータ
//!
//! 通知リクエストを検証し、受信者のプリファレンスに従ってメールとリアルタイムの
//! 2 チャネルに配信し、結果を記録して永続化する。
//!
//! ## 処理の流れ
//!
//! 1. システム全体の無効化を確認する（無効なら何もせず拒否）
//! 2. サニタイズして検証する（不正なら何もせず拒否）
//! 3. ユーザー設定とベンダー設定を合成し、チャネルごとの配信可否を決める
//! 4. 両チャネルへ並行に送信し、両方の完了を待つ
//! 5. リアルタイムが失敗したらメールへフォールバックする
//! 6. 試行したチャネルがすべて失敗したら遅延リトライを予約する
//! 7. 永続化して返す
//!
//! チャネルの送信失敗は呼び出し元に伝播しない。`DeliveryResults` と
//! [`FallbackStats`] にのみ現れる。

use std::sync::Arc;

use futures::future::join_all;
use ichiba_domain::{
    clock::Clock,
    notification::{
        ChannelOutcome,
        CreateNotificationInput,
        DeliveryResults,
        EmailMessage,
        NewNotification,
        Notification,
        NotificationId,
        RealtimePayload,
        formatter,
        preference::{self, ChannelEligibility, NotificationPreferences, PreferenceResolver},
        validator::{self, ValidatedNotification, ValidationResult},
    },
    user::{UserId, UserRole},
};
use ichiba_infra::{
    email::EmailGateway,
    realtime::RealtimeGateway,
    repository::{NotificationRepository, RecipientDirectory},
};
use ichiba_shared::{
    event_log::{self, event},
    log_business_event,
};
use itertools::{Either, Itertools};

use super::{
    TemplateRenderer,
    channel,
    metrics::{DeliveryCounter, DeliveryMetrics, FallbackStats},
    retry::{RetryJob, RetryPolicy, RetryScheduler},
};
use crate::{config::DeliveryConfig, error::DeliveryError};

/// システム無効時に返す理由
pub const SYSTEM_DISABLED_REASON: &str = "notifications are disabled system-wide";
/// メールアドレス未登録時にメールチャネルへ記録する理由
pub const RECIPIENT_NOT_FOUND_REASON: &str = "recipient email not found";
/// プリファレンスを取得できず配信を見送ったときに両チャネルへ記録する理由
pub const PREFERENCES_UNAVAILABLE_REASON: &str = "preferences unavailable";

/// コーディネータが呼び出す外部コラボレータ
#[derive(Clone)]
pub struct Collaborators {
    pub email:      Arc<dyn EmailGateway>,
    pub realtime:   Arc<dyn RealtimeGateway>,
    pub directory:  Arc<dyn RecipientDirectory>,
    pub repository: Arc<dyn NotificationRepository>,
    pub metrics:    Arc<dyn DeliveryMetrics>,
    pub clock:      Arc<dyn Clock>,
}

/// コーディネータの動作設定
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub resolver: PreferenceResolver,
    pub retry:    RetryPolicy,
    /// メール内リンクのベース URL
    pub base_url: String,
}

impl CoordinatorSettings {
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self {
            resolver: PreferenceResolver::new(config.system),
            retry:    config.retry,
            base_url: config.email.base_url.clone(),
        }
    }
}

/// ロール単位の一斉配信の結果
#[derive(Debug)]
pub struct RoleBroadcastReport {
    /// 作成された通知
    pub notifications: Vec<Notification>,
    /// 作成できなかった受信者
    pub failures:      Vec<RecipientFailure>,
}

/// 一斉配信で作成できなかった受信者
#[derive(Debug)]
pub struct RecipientFailure {
    pub user_id: UserId,
    pub error:   DeliveryError,
}

/// メールチャネルの送信準備の結果
enum PreparedEmail {
    Ready(EmailMessage),
    /// 送信できない（理由付き）
    Unavailable(String),
}

/// 配信コーディネータ
pub struct NotificationCoordinator {
    deps:     Collaborators,
    renderer: TemplateRenderer,
    resolver: PreferenceResolver,
    retry:    RetryScheduler,
    base_url: String,
}

impl NotificationCoordinator {
    pub fn new(
        deps: Collaborators,
        renderer: TemplateRenderer,
        settings: CoordinatorSettings,
    ) -> Self {
        let retry = RetryScheduler::new(
            settings.retry,
            deps.email.clone(),
            deps.realtime.clone(),
            deps.repository.clone(),
            deps.metrics.clone(),
        );
        Self {
            deps,
            renderer,
            resolver: settings.resolver,
            retry,
            base_url: settings.base_url,
        }
    }

    /// 通知を作成して配信する
    ///
    /// # エラー
    ///
    /// - `SystemDisabled`: システム全体で通知が無効
    /// - `Validation`: リクエストが不正
    /// - `Repository`: 通知ストアへの保存に失敗（配信は済んでいる）
    ///
    /// チャネルの送信失敗はエラーにならない。
    #[tracing::instrument(
        skip_all,
        fields(notification.kind = %input.notification_type, notification.recipient = %input.user_id)
    )]
    pub async fn create_notification(
        &self,
        input: CreateNotificationInput,
    ) -> Result<Notification, DeliveryError> {
        if !self.resolver.system().enabled {
            log_business_event!(
                event.category = event::category::NOTIFICATION,
                event.action = event::action::NOTIFICATION_REJECTED,
                event.result = event::result::SKIPPED,
                reason = SYSTEM_DISABLED_REASON,
                "システム無効のため通知を作成しない"
            );
            return Err(DeliveryError::SystemDisabled(
                SYSTEM_DISABLED_REASON.to_string(),
            ));
        }

        let input = validator::sanitize(input);
        let validated = validator::check(&input).map_err(|errors| {
            let result = ValidationResult::from_errors(errors);
            log_business_event!(
                event.category = event::category::NOTIFICATION,
                event.action = event::action::NOTIFICATION_REJECTED,
                event.result = event::result::FAILURE,
                error = %result.error_message(),
                "通知リクエストの検証に失敗"
            );
            DeliveryError::Validation(result)
        })?;

        let send_email = validated.send_email;
        let send_websocket = validated.send_websocket;
        let notification = self.build_notification(validated);
        let notification_id = notification.id().clone();
        let user_id = notification.user_id().clone();
        let kind = notification.notification_type();

        let preferences = self.effective_preferences(&user_id).await;
        let eligibility = preferences
            .as_ref()
            .map(|p| self.resolver.channels(kind.as_str(), p))
            .unwrap_or_default();
        let prepared_email = if eligibility.email {
            Some(self.prepare_email(&notification).await)
        } else {
            None
        };
        let payload = RealtimePayload::notification(formatter::for_ui(
            &notification,
            self.deps.clock.now(),
        ));

        let email_request = prepared_email.as_ref().filter(|_| send_email);
        let (email, websocket) = if preferences.is_some() {
            tokio::join!(
                self.dispatch_email(&notification_id, email_request),
                self.dispatch_realtime(
                    &notification_id,
                    &user_id,
                    &payload,
                    eligibility.websocket && send_websocket,
                ),
            )
        } else {
            (
                ChannelOutcome::skipped_because(PREFERENCES_UNAVAILABLE_REASON),
                ChannelOutcome::skipped_because(PREFERENCES_UNAVAILABLE_REASON),
            )
        };
        let mut results = DeliveryResults {
            email,
            websocket,
            attempt: 1,
            ..Default::default()
        };

        self.apply_fallback(
            &notification_id,
            eligibility,
            prepared_email.as_ref(),
            &mut results,
        )
        .await;

        results.retry_scheduled =
            results.all_attempted_failed() && self.retry.policy().allows(1);

        let notification = notification.with_delivery_results(results.clone());
        self.deps
            .repository
            .insert(&notification)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    error.category = event_log::error::category::INFRASTRUCTURE,
                    error.kind = event_log::error::kind::REPOSITORY,
                    error = %e,
                    notification.id = %notification_id,
                    "通知の保存に失敗"
                );
            })
            .map_err(DeliveryError::Repository)?;

        if results.retry_scheduled {
            self.deps.metrics.increment(DeliveryCounter::RetryAttempts);
            log_business_event!(
                event.category = event::category::NOTIFICATION,
                event.action = event::action::RETRY_SCHEDULED,
                event.entity_type = event::entity_type::NOTIFICATION,
                event.entity_id = %notification_id,
                event.result = event::result::FAILURE,
                notification.attempt = results.attempt,
                "全チャネルで失敗したため遅延リトライを予約"
            );
            let email = match prepared_email {
                Some(PreparedEmail::Ready(message)) => Some(message),
                _ => None,
            };
            self.retry.schedule(RetryJob {
                notification_id: notification_id.clone(),
                user_id: user_id.clone(),
                email,
                payload,
                results: results.clone(),
            });
        }

        log_business_event!(
            event.category = event::category::NOTIFICATION,
            event.action = event::action::NOTIFICATION_CREATED,
            event.entity_type = event::entity_type::NOTIFICATION,
            event.entity_id = %notification_id,
            event.result = delivery_result_label(&results),
            notification.kind = kind.as_str(),
            notification.recipient = %user_id,
            notification.email_attempted = results.email.attempted,
            notification.websocket_attempted = results.websocket.attempted,
            notification.fallback_used = results.fallback_used,
            "通知を作成"
        );

        Ok(notification)
    }

    /// ロールを持つ全ユーザーに同じ内容の通知を作成する
    ///
    /// 受信者ごとの失敗は記録して続行する。ロールの解決に失敗した場合のみエラーを返す。
    #[tracing::instrument(skip_all, fields(role = %role))]
    pub async fn send_to_role(
        &self,
        role: UserRole,
        input: CreateNotificationInput,
    ) -> Result<RoleBroadcastReport, DeliveryError> {
        let recipients = self
            .deps
            .directory
            .find_users_by_role(role)
            .await
            .map_err(DeliveryError::Directory)?;

        let outcomes = join_all(recipients.into_iter().map(|user_id| {
            let input = input.for_recipient(&user_id);
            async move { (user_id, self.create_notification(input).await) }
        }))
        .await;

        let (notifications, failures): (Vec<_>, Vec<_>) =
            outcomes
                .into_iter()
                .partition_map(|(user_id, result)| match result {
                    Ok(notification) => Either::Left(notification),
                    Err(error) => {
                        tracing::warn!(
                            error = %error,
                            notification.recipient = %user_id,
                            "一斉配信の受信者への通知作成に失敗"
                        );
                        Either::Right(RecipientFailure { user_id, error })
                    }
                });

        let result = match (notifications.is_empty(), failures.is_empty()) {
            (_, true) => event::result::SUCCESS,
            (true, false) => event::result::FAILURE,
            (false, false) => event::result::PARTIAL,
        };
        log_business_event!(
            event.category = event::category::NOTIFICATION,
            event.action = event::action::ROLE_BROADCAST,
            event.result = result,
            role = %role,
            notification.created = notifications.len(),
            notification.failed = failures.len(),
            "ロール単位の一斉配信"
        );

        Ok(RoleBroadcastReport {
            notifications,
            failures,
        })
    }

    /// 受信者の実効プリファレンス（ユーザー設定にベンダー設定を重ねたもの）を取得する
    ///
    /// ベンダー設定を取得できない場合はユーザー設定だけを返す。
    /// ユーザー設定を取得できない場合は `Directory` エラー。
    pub async fn get_user_notification_preferences(
        &self,
        user_id: &UserId,
    ) -> Result<NotificationPreferences, DeliveryError> {
        let user = self
            .deps
            .directory
            .resolve_preferences(user_id)
            .await
            .map_err(DeliveryError::Directory)?;
        let vendor = match self.deps.directory.resolve_vendor_settings(user_id).await {
            Ok(vendor) => vendor,
            Err(e) => {
                tracing::warn!(
                    error.category = event_log::error::category::EXTERNAL_SERVICE,
                    error.kind = event_log::error::kind::DIRECTORY,
                    error = %e,
                    notification.recipient = %user_id,
                    "ベンダー設定を取得できないためユーザー設定のみで判定する"
                );
                None
            }
        };
        Ok(preference::merge(user, vendor.as_ref()))
    }

    /// フォールバック・リトライのカウンタを読み取る
    pub fn fallback_stats(&self) -> FallbackStats {
        self.deps.metrics.snapshot()
    }

    fn build_notification(&self, validated: ValidatedNotification) -> Notification {
        let title = validated
            .title
            .unwrap_or_else(|| formatter::title(&validated.metadata));
        let message = validated
            .message
            .unwrap_or_else(|| formatter::message(&validated.metadata));
        Notification::new(NewNotification {
            id: NotificationId::new(),
            user_id: validated.user_id,
            title,
            message,
            metadata: formatter::metadata(validated.metadata, validated.action_url),
            now: self.deps.clock.now(),
        })
    }

    /// 配信判定用のプリファレンス
    ///
    /// ユーザー設定を取得できない場合は `None`。オプトアウトを確認できないため
    /// どのチャネルにも配信しない。
    async fn effective_preferences(&self, user_id: &UserId) -> Option<NotificationPreferences> {
        match self.get_user_notification_preferences(user_id).await {
            Ok(preferences) => Some(preferences),
            Err(e) => {
                tracing::warn!(
                    error.category = event_log::error::category::EXTERNAL_SERVICE,
                    error.kind = event_log::error::kind::DIRECTORY,
                    error = %e,
                    notification.recipient = %user_id,
                    "プリファレンスを取得できないため配信を見送る"
                );
                None
            }
        }
    }

    async fn prepare_email(&self, notification: &Notification) -> PreparedEmail {
        let address = match self
            .deps
            .directory
            .resolve_email(notification.user_id())
            .await
        {
            Ok(Some(address)) => address,
            Ok(None) => {
                tracing::info!(
                    notification.recipient = %notification.user_id(),
                    "メールアドレスが未登録のためメールチャネルを使わない"
                );
                return PreparedEmail::Unavailable(RECIPIENT_NOT_FOUND_REASON.to_string());
            }
            Err(e) => {
                tracing::warn!(
                    error.category = event_log::error::category::EXTERNAL_SERVICE,
                    error.kind = event_log::error::kind::DIRECTORY,
                    error = %e,
                    notification.recipient = %notification.user_id(),
                    "メールアドレスの解決に失敗"
                );
                return PreparedEmail::Unavailable(format!("recipient lookup failed: {e}"));
            }
        };

        match self.renderer.render(notification, &address, &self.base_url) {
            Ok(message) => PreparedEmail::Ready(message),
            Err(e) => {
                tracing::error!(
                    error.category = event_log::error::category::INFRASTRUCTURE,
                    error.kind = event_log::error::kind::TEMPLATE,
                    error = %e,
                    notification.kind = notification.notification_type().as_str(),
                    "通知テンプレートのレンダリングに失敗"
                );
                PreparedEmail::Unavailable(e.to_string())
            }
        }
    }

    async fn dispatch_email(
        &self,
        notification_id: &NotificationId,
        request: Option<&PreparedEmail>,
    ) -> ChannelOutcome {
        match request {
            None => ChannelOutcome::skipped(),
            Some(PreparedEmail::Unavailable(reason)) => ChannelOutcome::skipped_because(reason),
            Some(PreparedEmail::Ready(message)) => {
                channel::send_email(self.deps.email.as_ref(), notification_id, message).await
            }
        }
    }

    async fn dispatch_realtime(
        &self,
        notification_id: &NotificationId,
        user_id: &UserId,
        payload: &RealtimePayload,
        enabled: bool,
    ) -> ChannelOutcome {
        if !enabled {
            return ChannelOutcome::skipped();
        }
        channel::push_realtime(
            self.deps.realtime.as_ref(),
            notification_id,
            user_id,
            payload,
        )
        .await
    }

    /// リアルタイムの失敗時、未試行のメールチャネルで送り直す
    ///
    /// メールは種別・プリファレンス上は配信可能で、呼び出し元の指定で
    /// 試行しなかった場合に限る。
    async fn apply_fallback(
        &self,
        notification_id: &NotificationId,
        eligibility: ChannelEligibility,
        prepared_email: Option<&PreparedEmail>,
        results: &mut DeliveryResults,
    ) {
        if !results.websocket.is_failure() {
            return;
        }
        self.deps
            .metrics
            .increment(DeliveryCounter::WebsocketFailures);

        if !eligibility.email || results.email.attempted {
            return;
        }
        let Some(PreparedEmail::Ready(message)) = prepared_email else {
            return;
        };

        self.deps.metrics.increment(DeliveryCounter::EmailFallbacks);
        results.email =
            channel::send_email(self.deps.email.as_ref(), notification_id, message).await;
        results.fallback_used = true;

        log_business_event!(
            event.category = event::category::NOTIFICATION,
            event.action = event::action::FALLBACK,
            event.entity_type = event::entity_type::NOTIFICATION,
            event.entity_id = %notification_id,
            event.result = if results.email.succeeded {
                event::result::SUCCESS
            } else {
                event::result::FAILURE
            },
            notification.channel = event::channel::EMAIL,
            "リアルタイム失敗のためメールにフォールバック"
        );
    }
}

fn delivery_result_label(results: &DeliveryResults) -> &'static str {
    let attempted = [&results.email, &results.websocket]
        .into_iter()
        .filter(|c| c.attempted)
        .count();
    if attempted == 0 {
        event::result::SKIPPED
    } else if results.all_attempted_failed() {
        event::result::FAILURE
    } else if results.email.is_failure() || results.websocket.is_failure() {
        event::result::PARTIAL
    } else {
        event::result::SUCCESS
    }
}
