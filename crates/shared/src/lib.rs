//! # Ichiba 共有ユーティリティ
//!
//! domain・infra・delivery-service から使うログ関連のユーティリティ。
//! ビジネスロジックは置かない。

pub mod event_log;
pub mod observability;
