//! # ユースケース層
//!
//! - [`notification`] - 通知の配信と受信箱

pub mod notification;
