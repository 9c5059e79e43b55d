//! # RecipientDirectory
//!
//! 受信者のメールアドレス、通知プリファレンス、ベンダー設定、ロールを解決する。
//! ユーザー管理・ベンダー管理の実装に直接依存せず、コンストラクタで注入する。

use async_trait::async_trait;
use ichiba_domain::{
    notification::preference::{NotificationPreferences, VendorNotificationSettings},
    user::{UserId, UserRole},
};

use crate::error::InfraError;

/// 受信者ディレクトリトレイト
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// メールアドレスを解決する
    ///
    /// 登録がなければ `None`。
    async fn resolve_email(&self, user_id: &UserId) -> Result<Option<String>, InfraError>;

    /// ユーザーの通知プリファレンスを取得する
    ///
    /// 未設定の場合は既定値（すべて許可）を返す。
    async fn resolve_preferences(
        &self,
        user_id: &UserId,
    ) -> Result<NotificationPreferences, InfraError>;

    /// ユーザーが所属するベンダーの通知設定を取得する
    ///
    /// ベンダーに所属しないユーザーは `None`。
    async fn resolve_vendor_settings(
        &self,
        user_id: &UserId,
    ) -> Result<Option<VendorNotificationSettings>, InfraError>;

    /// ロールを持つユーザーを列挙する
    async fn find_users_by_role(&self, role: UserRole) -> Result<Vec<UserId>, InfraError>;
}
