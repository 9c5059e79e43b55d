//! # Ichiba Domain
//!
//! 通知配信エンジンのドメイン層。種別レジストリ、バリデーション、整形、
//! プリファレンス解決、ダイジェストと保持期間判定を純粋な関数と値で提供する。
//!
//! ## モジュール構成
//!
//! - [`notification`]: 通知エンティティと種別ごとのルール
//! - [`user`]: 受信者の識別子とロール
//! - [`clock`]: 現在時刻の抽象化
//! - [`error`]: ドメイン層エラー
//!
//! I/O を持たないため、インフラ層やユースケース層から自由に利用できる。

#[macro_use]
mod macros;

pub mod clock;
pub mod error;
pub mod notification;
pub mod user;

pub use error::DomainError;
