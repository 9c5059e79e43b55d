//! # Delivery Service ライブラリ
//!
//! 通知の検証・配信・フォールバック・遅延リトライと、受信箱の参照系ユースケースを公開する。
//! 在庫更新や新規注文などの業務イベントのハンドラから呼び出される。
//!
//! ## モジュール構成
//!
//! - [`config`] - 環境変数からの設定読み込み
//! - [`bootstrap`] - 設定からゲートウェイを組み立てて配信エンジンを構築する
//! - [`usecase`] - 配信コーディネータ、遅延リトライ、受信箱
//! - [`error`] - 呼び出し元に返すエラー

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod usecase;

pub use error::DeliveryError;
