//! # 配信エンジンの組み立て
//!
//! 設定に従ってメール・リアルタイムのゲートウェイを選び、コーディネータと
//! 受信箱を構築する。ゲートウェイの選択は起動時に 1 度だけ行う。
//!
//! 通知ストアと受信者ディレクトリはエンジンの外側にあるため、呼び出し側が渡す。

use std::sync::Arc;

use aws_config::{BehaviorVersion, meta::region::RegionProviderChain};
use ichiba_domain::{clock::SystemClock, notification::NotificationError};
use ichiba_infra::{
    InfraError,
    email::{EmailGateway, NoopEmailGateway, SesEmailGateway, SmtpEmailGateway},
    realtime::{NoopRealtimeGateway, RealtimeGateway, RedisRealtimeGateway},
    redis::create_connection_manager,
    repository::{NotificationRepository, RecipientDirectory},
};
use ichiba_shared::observability::{TracingConfig, init_tracing};
use thiserror::Error;

use crate::{
    config::{ConfigError, DeliveryConfig, EmailBackend, EmailConfig, RealtimeBackend, RealtimeConfig},
    usecase::notification::{
        AtomicDeliveryMetrics,
        Collaborators,
        CoordinatorSettings,
        NotificationCoordinator,
        NotificationInbox,
        TemplateRenderer,
    },
};

/// ログに出すサービス名
pub const SERVICE_NAME: &str = "delivery-service";

/// SES のリージョン（`AWS_REGION` 未設定時）
const DEFAULT_SES_REGION: &str = "ap-northeast-1";

/// 起動時のエラー
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("設定の読み込みに失敗: {0}")]
    Config(#[from] ConfigError),

    #[error("リアルタイム配信の接続に失敗: {0}")]
    Realtime(#[from] InfraError),

    #[error("メールテンプレートの読み込みに失敗: {0}")]
    Template(#[from] NotificationError),
}

/// 組み立て済みの配信エンジン
pub struct DeliveryEngine {
    pub coordinator: NotificationCoordinator,
    pub inbox:       NotificationInbox,
}

/// トレーシングを初期化する
///
/// `LOG_FORMAT`（json / pretty）と `RUST_LOG` に従う。
pub fn init_observability() {
    init_tracing(TracingConfig::from_env(SERVICE_NAME));
}

/// `.env` を読み込んでから環境変数の設定を読む
pub fn load_config() -> Result<DeliveryConfig, ConfigError> {
    dotenvy::dotenv().ok();
    DeliveryConfig::from_env()
}

/// 設定に従ってメールゲートウェイを作成する
pub async fn build_email_gateway(config: &EmailConfig) -> Arc<dyn EmailGateway> {
    tracing::info!(backend = %config.backend, "メール送信バックエンドを選択");
    match config.backend {
        EmailBackend::Smtp => Arc::new(SmtpEmailGateway::new(
            &config.smtp_host,
            config.smtp_port,
            config.from_address.clone(),
        )),
        EmailBackend::Ses => {
            let region = RegionProviderChain::default_provider().or_else(DEFAULT_SES_REGION);
            let aws_config = aws_config::defaults(BehaviorVersion::latest())
                .region(region)
                .load()
                .await;
            Arc::new(SesEmailGateway::new(
                aws_sdk_sesv2::Client::new(&aws_config),
                config.from_address.clone(),
            ))
        }
        EmailBackend::Noop => Arc::new(NoopEmailGateway),
    }
}

/// 設定に従ってリアルタイムゲートウェイを作成する
///
/// backend=redis の場合は起動時に接続し、失敗すればエラーを返す。
pub async fn build_realtime_gateway(
    config: &RealtimeConfig,
) -> Result<Arc<dyn RealtimeGateway>, InfraError> {
    tracing::info!(backend = %config.backend, "リアルタイム配信バックエンドを選択");
    Ok(match config.backend {
        RealtimeBackend::Redis => {
            let conn = create_connection_manager(&config.redis_url).await?;
            Arc::new(RedisRealtimeGateway::new(conn))
        }
        RealtimeBackend::Noop => Arc::new(NoopRealtimeGateway),
    })
}

/// 配信エンジンを組み立てる
pub async fn build_engine(
    config: &DeliveryConfig,
    directory: Arc<dyn RecipientDirectory>,
    repository: Arc<dyn NotificationRepository>,
) -> Result<DeliveryEngine, BootstrapError> {
    let email = build_email_gateway(&config.email).await;
    let realtime = build_realtime_gateway(&config.realtime).await?;
    let clock = Arc::new(SystemClock);

    let coordinator = NotificationCoordinator::new(
        Collaborators {
            email,
            realtime,
            directory,
            repository: repository.clone(),
            metrics: Arc::new(AtomicDeliveryMetrics::new()),
            clock: clock.clone(),
        },
        TemplateRenderer::new()?,
        CoordinatorSettings::from_config(config),
    );
    let inbox = NotificationInbox::new(repository, clock);

    tracing::info!(
        notifications.enabled = config.system.enabled,
        notifications.email_enabled = config.system.email_enabled,
        notifications.websocket_enabled = config.system.websocket_enabled,
        retry.max_attempts = config.retry.max_attempts,
        "配信エンジンを構築しました"
    );

    Ok(DeliveryEngine { coordinator, inbox })
}
