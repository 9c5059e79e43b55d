//! # テスト用モック
//!
//! ユースケーステストで使用するインメモリのゲートウェイ・リポジトリ。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! ichiba-infra = { workspace = true, features = ["test-utils"] }
//! ```

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ichiba_domain::{
    notification::{
        DeliveryResults,
        EmailMessage,
        EmailReceipt,
        Notification,
        NotificationError,
        NotificationId,
        RealtimePayload,
        digest,
        preference::{NotificationPreferences, VendorNotificationSettings},
    },
    user::{UserId, UserRole},
};
use serde_json::Value as JsonValue;

use crate::{
    email::EmailGateway,
    error::InfraError,
    realtime::RealtimeGateway,
    repository::{NotificationRepository, RecipientDirectory},
};

/// モックの失敗モード
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MockFailure {
    /// 常に成功する
    #[default]
    Never,
    /// 常に失敗する
    Always,
    /// 指定回数だけ失敗し、その後は成功する
    Times(u32),
}

impl MockFailure {
    fn next_fails(&mut self) -> bool {
        match *self {
            Self::Never => false,
            Self::Always => true,
            Self::Times(0) => {
                *self = Self::Never;
                false
            }
            Self::Times(n) => {
                *self = Self::Times(n - 1);
                true
            }
        }
    }
}

// ===== MockEmailGateway =====

#[derive(Clone, Default)]
pub struct MockEmailGateway {
    sent:     Arc<Mutex<Vec<EmailMessage>>>,
    attempts: Arc<Mutex<u32>>,
    failure:  Arc<Mutex<MockFailure>>,
}

impl MockEmailGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure(failure: MockFailure) -> Self {
        let gateway = Self::new();
        gateway.set_failure(failure);
        gateway
    }

    pub fn set_failure(&self, failure: MockFailure) {
        *self.failure.lock().unwrap() = failure;
    }

    /// 送信に成功したメール
    pub fn sent_emails(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// 成否を問わない送信試行回数
    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl EmailGateway for MockEmailGateway {
    async fn send_email(&self, email: &EmailMessage) -> Result<EmailReceipt, NotificationError> {
        *self.attempts.lock().unwrap() += 1;
        if self.failure.lock().unwrap().next_fails() {
            return Err(NotificationError::SendFailed(
                "mock: SMTP connection refused".to_string(),
            ));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(email.clone());
        Ok(EmailReceipt {
            message_id: format!("mock-{}", sent.len()),
        })
    }
}

// ===== MockRealtimeGateway =====

#[derive(Clone, Default)]
pub struct MockRealtimeGateway {
    pushed:   Arc<Mutex<Vec<(UserId, JsonValue)>>>,
    attempts: Arc<Mutex<u32>>,
    failure:  Arc<Mutex<MockFailure>>,
}

impl MockRealtimeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure(failure: MockFailure) -> Self {
        let gateway = Self::new();
        gateway.set_failure(failure);
        gateway
    }

    pub fn set_failure(&self, failure: MockFailure) {
        *self.failure.lock().unwrap() = failure;
    }

    /// 配信に成功したペイロード（JSON）
    pub fn pushed(&self) -> Vec<(UserId, JsonValue)> {
        self.pushed.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl RealtimeGateway for MockRealtimeGateway {
    async fn push_to_user(
        &self,
        user_id: &UserId,
        payload: &RealtimePayload,
    ) -> Result<(), NotificationError> {
        *self.attempts.lock().unwrap() += 1;
        if self.failure.lock().unwrap().next_fails() {
            return Err(NotificationError::NotConnected(user_id.to_string()));
        }
        let value = serde_json::to_value(payload)
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;
        self.pushed.lock().unwrap().push((user_id.clone(), value));
        Ok(())
    }
}

// ===== MockRecipientDirectory =====

#[derive(Default)]
struct DirectoryState {
    emails:          HashMap<UserId, String>,
    preferences:     HashMap<UserId, NotificationPreferences>,
    vendor_settings: HashMap<UserId, VendorNotificationSettings>,
    roles:           HashMap<UserRole, Vec<UserId>>,
    unavailable:     bool,
    failing:         HashSet<DirectoryMethod>,
}

/// 個別に失敗させられるディレクトリの呼び出し
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectoryMethod {
    ResolveEmail,
    ResolvePreferences,
    ResolveVendorSettings,
    FindUsersByRole,
}

#[derive(Clone, Default)]
pub struct MockRecipientDirectory {
    state: Arc<Mutex<DirectoryState>>,
}

impl MockRecipientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_email(&self, user_id: &UserId, email: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .emails
            .insert(user_id.clone(), email.into());
    }

    pub fn set_preferences(&self, user_id: &UserId, preferences: NotificationPreferences) {
        self.state
            .lock()
            .unwrap()
            .preferences
            .insert(user_id.clone(), preferences);
    }

    pub fn set_vendor_settings(&self, user_id: &UserId, settings: VendorNotificationSettings) {
        self.state
            .lock()
            .unwrap()
            .vendor_settings
            .insert(user_id.clone(), settings);
    }

    pub fn assign_role(&self, role: UserRole, user_id: &UserId) {
        self.state
            .lock()
            .unwrap()
            .roles
            .entry(role)
            .or_default()
            .push(user_id.clone());
    }

    /// ディレクトリ全体を利用不可にする
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    /// 指定した呼び出しだけを失敗させる
    pub fn fail_method(&self, method: DirectoryMethod) {
        self.state.lock().unwrap().failing.insert(method);
    }

    fn check_available(&self, method: DirectoryMethod) -> Result<(), InfraError> {
        let state = self.state.lock().unwrap();
        if state.unavailable || state.failing.contains(&method) {
            return Err(InfraError::unavailable(format!(
                "mock: directory unavailable ({method:?})"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RecipientDirectory for MockRecipientDirectory {
    async fn resolve_email(&self, user_id: &UserId) -> Result<Option<String>, InfraError> {
        self.check_available(DirectoryMethod::ResolveEmail)?;
        Ok(self.state.lock().unwrap().emails.get(user_id).cloned())
    }

    async fn resolve_preferences(
        &self,
        user_id: &UserId,
    ) -> Result<NotificationPreferences, InfraError> {
        self.check_available(DirectoryMethod::ResolvePreferences)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .preferences
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn resolve_vendor_settings(
        &self,
        user_id: &UserId,
    ) -> Result<Option<VendorNotificationSettings>, InfraError> {
        self.check_available(DirectoryMethod::ResolveVendorSettings)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .vendor_settings
            .get(user_id)
            .copied())
    }

    async fn find_users_by_role(&self, role: UserRole) -> Result<Vec<UserId>, InfraError> {
        self.check_available(DirectoryMethod::FindUsersByRole)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .roles
            .get(&role)
            .cloned()
            .unwrap_or_default())
    }
}

// ===== MockNotificationRepository =====

#[derive(Clone, Default)]
pub struct MockNotificationRepository {
    notifications: Arc<Mutex<Vec<Notification>>>,
    failing_users: Arc<Mutex<HashSet<UserId>>>,
}

impl MockNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定ユーザー宛ての挿入を失敗させる
    pub fn fail_inserts_for(&self, user_id: &UserId) {
        self.failing_users.lock().unwrap().insert(user_id.clone());
    }

    /// 保存済みの通知をそのまま追加する
    pub fn add(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }

    pub fn all(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationRepository for MockNotificationRepository {
    async fn insert(&self, notification: &Notification) -> Result<(), InfraError> {
        if self
            .failing_users
            .lock()
            .unwrap()
            .contains(notification.user_id())
        {
            return Err(InfraError::unavailable("mock: notification store rejected insert"));
        }
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        user_id: &UserId,
        id: &NotificationId,
    ) -> Result<Option<Notification>, InfraError> {
        Ok(self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.id() == id && n.user_id() == user_id)
            .cloned())
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Notification>, InfraError> {
        Ok(self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_id() == user_id)
            .cloned()
            .collect())
    }

    async fn update_delivery_results(
        &self,
        id: &NotificationId,
        results: &DeliveryResults,
    ) -> Result<(), InfraError> {
        let mut notifications = self.notifications.lock().unwrap();
        let Some(stored) = notifications.iter_mut().find(|n| n.id() == id) else {
            return Err(InfraError::not_found("Notification", id.to_string()));
        };
        *stored = stored.clone().with_delivery_results(results.clone());
        Ok(())
    }

    async fn update_read_state(&self, notification: &Notification) -> Result<(), InfraError> {
        let mut notifications = self.notifications.lock().unwrap();
        let Some(stored) = notifications
            .iter_mut()
            .find(|n| n.id() == notification.id())
        else {
            return Err(InfraError::not_found(
                "Notification",
                notification.id().to_string(),
            ));
        };
        *stored = notification.clone();
        Ok(())
    }

    async fn delete(&self, ids: &[NotificationId]) -> Result<u64, InfraError> {
        let mut notifications = self.notifications.lock().unwrap();
        let before = notifications.len();
        notifications.retain(|n| !ids.contains(n.id()));
        Ok((before - notifications.len()) as u64)
    }

    async fn count_expired(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<u64, InfraError> {
        Ok(self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_id() == user_id && digest::is_expired(n, now))
            .count() as u64)
    }
}
