//! # 受信者（ユーザー）
//!
//! 通知の受信者を識別する値オブジェクトを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 備考 |
//! |---|------------|------|
//! | [`UserId`] | ユーザー ID | 24 桁の 16 進数（ドキュメントストアの ObjectId 形式） |
//! | [`UserRole`] | ロール | ロール単位の一斉配信（fan-out）の宛先指定に使う |
//!
//! ## 使用例
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use ichiba_domain::user::UserId;
//!
//! let user_id = UserId::parse("507f1f77bcf86cd799439011")?;
//! assert_eq!(user_id.as_str(), "507f1f77bcf86cd799439011");
//! assert!(UserId::parse("not-an-id").is_err());
//! # Ok(())
//! # }
//! ```

use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::DomainError;

/// ユーザー ID の桁数
pub const USER_ID_LENGTH: usize = 24;

/// ユーザー ID（24 桁 16 進数）
///
/// 永続化層が払い出す不透明な識別子。通知エンジンは形式のみ検証し、
/// 大文字は小文字に正規化して保持する。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(try_from = "String", into = "String")]
#[display("{_0}")]
pub struct UserId(String);

impl UserId {
    /// 文字列からユーザー ID を作成する
    ///
    /// # エラー
    ///
    /// 24 桁の 16 進数でない場合は `DomainError::Validation` を返す。
    pub fn parse(value: impl AsRef<str>) -> Result<Self, DomainError> {
        let value = value.as_ref().trim();
        if !Self::is_valid_format(value) {
            return Err(DomainError::Validation(format!(
                "userId は {USER_ID_LENGTH} 桁の 16 進数である必要があります: {value:?}"
            )));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    /// 形式チェックのみを行う
    pub fn is_valid_format(value: &str) -> bool {
        value.len() == USER_ID_LENGTH && value.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// ランダムなユーザー ID を生成する
    ///
    /// UUID v4 の先頭 12 バイトを 16 進表記したもの。テストやシードデータ用。
    pub fn generate() -> Self {
        let uuid = uuid::Uuid::new_v4();
        let hex: String = uuid.as_bytes()[..USER_ID_LENGTH / 2]
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        Self(hex)
    }

    /// 文字列参照を取得する
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

/// ユーザーロール
///
/// マーケットプレイスのバックオフィスで通知の一斉配信先になるロール。
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UserRole {
    /// マーケットプレイス管理者
    Admin,
    /// 出店者（ベンダー）
    Vendor,
    /// 運営スタッフ
    Staff,
}
