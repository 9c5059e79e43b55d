//! # ドメイン層エラー
//!
//! 値オブジェクトの生成失敗を表す。
//!
//! 通知作成リクエストの検証はフィールド単位で結果を集める必要があるため、
//! こちらではなく [`ValidationResult`](crate::notification::validator::ValidationResult)
//! で表現する。

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// 値がビジネスルールに違反している（例: userId が 24 桁の 16 進数ではない）
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// ID の文字列表現が不正
    #[error("{entity} の形式が不正です: {value:?} ({reason})")]
    InvalidId {
        entity: &'static str,
        value:  String,
        reason: String,
    },
}
