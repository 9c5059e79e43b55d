//! 統合テスト用ヘルパー

#![allow(dead_code)]

mod delivery_test_builder;

pub use delivery_test_builder::{DeliveryTestBuilder, input_for, valid_metadata, wait_until};
