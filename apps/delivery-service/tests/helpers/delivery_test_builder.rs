//! 配信テストビルダー
//!
//! モックのゲートウェイ・ディレクトリ・ストアを束ね、コーディネータと受信箱を
//! 同じモックの上に組み立てる。

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use ichiba_delivery_service::usecase::notification::{
    AtomicDeliveryMetrics,
    Collaborators,
    CoordinatorSettings,
    DeliveryMetrics,
    FallbackStats,
    NotificationCoordinator,
    NotificationInbox,
    RetryPolicy,
    TemplateRenderer,
};
use ichiba_domain::{
    clock::FixedClock,
    notification::{
        CreateNotificationInput,
        NotificationType,
        RawMetadata,
        preference::{PreferenceResolver, SystemSettings},
    },
    user::UserId,
};
use ichiba_infra::mock::{
    MockEmailGateway,
    MockNotificationRepository,
    MockRealtimeGateway,
    MockRecipientDirectory,
};
use serde_json::json;

/// 配信テストビルダー
///
/// # 使用例
///
/// ```ignore
/// let builder = DeliveryTestBuilder::new();
/// let user_id = builder.recipient("vendor@example.com");
/// let coordinator = builder.build();
///
/// coordinator.create_notification(input_for(&user_id, NotificationType::LowStock)).await?;
/// assert_eq!(builder.email.sent_emails().len(), 1);
/// ```
pub struct DeliveryTestBuilder {
    pub email:      MockEmailGateway,
    pub realtime:   MockRealtimeGateway,
    pub directory:  MockRecipientDirectory,
    pub repository: MockNotificationRepository,
    pub metrics:    Arc<AtomicDeliveryMetrics>,
    pub clock:      Arc<FixedClock>,
    system:         SystemSettings,
    retry:          RetryPolicy,
}

impl DeliveryTestBuilder {
    /// 既定ではリトライを数ミリ秒間隔で行う
    pub fn new() -> Self {
        let now: DateTime<Utc> = DateTime::parse_from_rfc3339("2026-03-10T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        Self {
            email:      MockEmailGateway::new(),
            realtime:   MockRealtimeGateway::new(),
            directory:  MockRecipientDirectory::new(),
            repository: MockNotificationRepository::new(),
            metrics:    Arc::new(AtomicDeliveryMetrics::new()),
            clock:      Arc::new(FixedClock::new(now)),
            system:     SystemSettings::default(),
            retry:      RetryPolicy {
                max_attempts:  3,
                initial_delay: Duration::from_millis(5),
                max_delay:     Duration::from_millis(20),
            },
        }
    }

    pub fn with_system(mut self, system: SystemSettings) -> Self {
        self.system = system;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// メールアドレスを登録した受信者を作る
    pub fn recipient(&self, email: &str) -> UserId {
        let user_id = UserId::generate();
        self.directory.add_email(&user_id, email);
        user_id
    }

    pub fn stats(&self) -> FallbackStats {
        self.metrics.snapshot()
    }

    pub fn build(&self) -> NotificationCoordinator {
        NotificationCoordinator::new(
            Collaborators {
                email:      Arc::new(self.email.clone()),
                realtime:   Arc::new(self.realtime.clone()),
                directory:  Arc::new(self.directory.clone()),
                repository: Arc::new(self.repository.clone()),
                metrics:    self.metrics.clone(),
                clock:      self.clock.clone(),
            },
            TemplateRenderer::new().unwrap(),
            CoordinatorSettings {
                resolver: PreferenceResolver::new(self.system),
                retry:    self.retry,
                base_url: "http://localhost:5173".to_string(),
            },
        )
    }

    pub fn inbox(&self) -> NotificationInbox {
        NotificationInbox::new(Arc::new(self.repository.clone()), self.clock.clone())
    }
}

/// 種別ごとの有効なメタデータ
pub fn valid_metadata(kind: NotificationType) -> RawMetadata {
    let value = match kind {
        NotificationType::LowStock => json!({
            "productId": "p-100", "productName": "Oak Shelf",
            "currentQuantity": 2, "threshold": 5
        }),
        NotificationType::NewOrder => json!({
            "orderId": "o-7", "orderNumber": "1042", "totalAmount": "120.5"
        }),
        NotificationType::CubicVolumeAlert => json!({
            "productId": "p-200", "productName": "Garden Crate",
            "cubicVolume": 3.2, "threshold": 2.5
        }),
        NotificationType::CommissionUpdate => json!({
            "commissionId": "c-9", "action": "approved", "amount": 14.2
        }),
        NotificationType::ProductArchived => json!({
            "productId": "p-300", "productName": "Desk Lamp", "reason": "discontinued"
        }),
        NotificationType::VendorStatusChange => json!({
            "vendorId": "v-1", "vendorName": "Oak & Co",
            "previousStatus": "pending", "newStatus": "active"
        }),
        NotificationType::SystemAlert => json!({
            "alertType": "maintenance", "severity": "warning"
        }),
    };
    value.as_object().cloned().unwrap_or_default()
}

pub fn input_for(user_id: &UserId, kind: NotificationType) -> CreateNotificationInput {
    CreateNotificationInput::new(user_id.as_str(), kind, valid_metadata(kind))
}

/// 条件が満たされるまで待つ（最大 2 秒）
pub async fn wait_until(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
