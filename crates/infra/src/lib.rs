//! # Ichiba インフラ層
//!
//! 通知配信エンジンが外部システムと通信するためのインフラストラクチャ層。
//!
//! ## 責務
//!
//! - **メール配信**: SMTP / SES / Noop の [`email::EmailGateway`] 実装
//! - **リアルタイム配信**: Redis pub/sub / Noop の [`realtime::RealtimeGateway`] 実装
//! - **外部コラボレータ**: 通知ストアと受信者ディレクトリのトレイト
//! - **Redis 接続管理**: [`redis::create_connection_manager`]
//!
//! ## 依存関係
//!
//! ```text
//! delivery-service → infra → domain
//!          ↘
//!           shared
//! ```
//!
//! ドメイン層はインフラ層に依存しない。

pub mod email;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod realtime;
pub mod redis;
pub mod repository;

pub use error::InfraError;
