//! # Delivery Service エラー定義
//!
//! 配信ユースケースが呼び出し元に返すエラーを定義する。
//!
//! チャネル単位の送信失敗はここに現れない。送信失敗は配信結果
//! （`DeliveryResults`）とフォールバック統計にのみ記録される。

use ichiba_domain::notification::validator::ValidationResult;
use ichiba_infra::InfraError;
use thiserror::Error;

/// 配信ユースケースのエラー
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// リクエストが不正（未知の種別、必須メタデータの欠落など）
    ///
    /// 配信・永続化のいずれも行われていない。
    #[error("通知リクエストが不正です: {}", .0.error_message())]
    Validation(ValidationResult),

    /// システム全体で通知が無効化されている
    #[error("通知は無効化されています: {0}")]
    SystemDisabled(String),

    /// 通知ストアの呼び出しに失敗
    #[error("通知ストアのエラー: {0}")]
    Repository(#[source] InfraError),

    /// 受信者ディレクトリの呼び出しに失敗
    #[error("受信者ディレクトリのエラー: {0}")]
    Directory(#[source] InfraError),

    /// 対象の通知が存在しない
    #[error("通知が見つかりません: {0}")]
    NotFound(String),
}

impl DeliveryError {
    /// 呼び出し元の入力や設定に起因する拒否か
    ///
    /// `true` の場合、同じ入力で再試行しても結果は変わらない。
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::SystemDisabled(_))
    }
}
