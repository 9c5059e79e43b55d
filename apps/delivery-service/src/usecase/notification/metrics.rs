//! # 配信メトリクス
//!
//! フォールバック・リトライの発生回数を数えるカウンタ。
//!
//! コーディネータはプロセス全体の静的変数ではなく、コンストラクタで注入された
//! [`DeliveryMetrics`] に記録する。テストは専用のインスタンスを渡して検証できる。

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// カウンタの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum DeliveryCounter {
    /// リアルタイムチャネルの送信失敗
    WebsocketFailures,
    /// リアルタイム失敗を受けたメールへのフォールバック
    EmailFallbacks,
    /// 遅延リトライの予約
    RetryAttempts,
    /// 遅延リトライでの配信成功
    SuccessfulRetries,
}

/// カウンタのスナップショット
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackStats {
    pub websocket_failures: u64,
    pub email_fallbacks:    u64,
    pub retry_attempts:     u64,
    pub successful_retries: u64,
}

/// 配信メトリクスの記録先
pub trait DeliveryMetrics: Send + Sync {
    /// カウンタを 1 増やす
    fn increment(&self, counter: DeliveryCounter);

    /// 現在の値を読み取る
    fn snapshot(&self) -> FallbackStats;
}

/// アトミック変数によるロックフリー実装
#[derive(Debug, Default)]
pub struct AtomicDeliveryMetrics {
    websocket_failures: AtomicU64,
    email_fallbacks:    AtomicU64,
    retry_attempts:     AtomicU64,
    successful_retries: AtomicU64,
}

impl AtomicDeliveryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, counter: DeliveryCounter) -> &AtomicU64 {
        match counter {
            DeliveryCounter::WebsocketFailures => &self.websocket_failures,
            DeliveryCounter::EmailFallbacks => &self.email_fallbacks,
            DeliveryCounter::RetryAttempts => &self.retry_attempts,
            DeliveryCounter::SuccessfulRetries => &self.successful_retries,
        }
    }
}

impl DeliveryMetrics for AtomicDeliveryMetrics {
    fn increment(&self, counter: DeliveryCounter) {
        let value = self.counter(counter).fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(counter = %counter, value, "配信カウンタを更新");
    }

    fn snapshot(&self) -> FallbackStats {
        FallbackStats {
            websocket_failures: self.websocket_failures.load(Ordering::Relaxed),
            email_fallbacks:    self.email_fallbacks.load(Ordering::Relaxed),
            retry_attempts:     self.retry_attempts.load(Ordering::Relaxed),
            successful_retries: self.successful_retries.load(Ordering::Relaxed),
        }
    }
}
