//! # 配信イベントログ
//!
//! 通知の作成・チャネル失敗・フォールバック・リトライを、JSON ログ上で
//! `jq 'select(.["event.kind"] == "business_event")'` で抽出できる形で出力する。
//!
//! フィールド名はドット区切り（`event.action`、`notification.channel`）。値には
//! [`event`] と [`error`] の定数を使い、表記揺れを防ぐ。

/// `event.kind = "business_event"` を付けて info レベルで出力する
///
/// `event.category`・`event.action`・`event.result` は常に指定する。
/// 対象の通知があれば `event.entity_type` と `event.entity_id` も付ける。
#[macro_export]
macro_rules! log_business_event {
    ($($args:tt)*) => {
        ::tracing::info!(
            event.kind = "business_event",
            $($args)*
        )
    };
}

/// イベントフィールドの定数
pub mod event {
    /// イベントカテゴリ
    pub mod category {
        pub const NOTIFICATION: &str = "notification";
    }

    /// イベントアクション
    pub mod action {
        pub const NOTIFICATION_CREATED: &str = "notification.created";
        pub const NOTIFICATION_REJECTED: &str = "notification.rejected";
        pub const CHANNEL_FAILED: &str = "notification.channel_failed";
        pub const FALLBACK: &str = "notification.fallback";
        pub const RETRY_SCHEDULED: &str = "notification.retry_scheduled";
        pub const RETRY_SUCCEEDED: &str = "notification.retry_succeeded";
        pub const RETRY_EXHAUSTED: &str = "notification.retry_exhausted";
        pub const ROLE_BROADCAST: &str = "notification.role_broadcast";
        pub const EXPIRED_PURGED: &str = "notification.expired_purged";
    }

    /// エンティティ種別
    pub mod entity_type {
        pub const NOTIFICATION: &str = "notification";
    }

    /// 配信チャネル
    pub mod channel {
        pub const EMAIL: &str = "email";
        pub const WEBSOCKET: &str = "websocket";
    }

    /// イベント結果
    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const FAILURE: &str = "failure";
        pub const PARTIAL: &str = "partial";
        pub const SKIPPED: &str = "skipped";
    }
}

/// エラーコンテキストフィールドの定数
pub mod error {
    /// エラーカテゴリ
    pub mod category {
        /// インフラストラクチャ（Redis、通知ストア）
        pub const INFRASTRUCTURE: &str = "infrastructure";
        /// 外部サービス呼び出し（メールプロバイダ、リアルタイムゲートウェイ）
        pub const EXTERNAL_SERVICE: &str = "external_service";
    }

    /// エラー種別
    pub mod kind {
        pub const REPOSITORY: &str = "repository";
        pub const DIRECTORY: &str = "directory";
        pub const TEMPLATE: &str = "template";
        pub const EMAIL_TRANSPORT: &str = "email_transport";
        pub const REALTIME_TRANSPORT: &str = "realtime_transport";
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use tracing_subscriber::fmt::MakeWriter;

    use super::event;

    #[derive(Clone, Default)]
    struct BufferWriter(Arc<Mutex<Vec<u8>>>);

    impl io::Write for BufferWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = BufferWriter;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn log_business_eventがbusiness_eventマーカーを付与する() {
        let writer = BufferWriter::default();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_writer(writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            log_business_event!(
                event.category = event::category::NOTIFICATION,
                event.action = event::action::NOTIFICATION_CREATED,
                event.result = event::result::SUCCESS,
                "通知を作成"
            );
        });

        let output = String::from_utf8(writer.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains(r#""event.kind":"business_event""#), "{output}");
        assert!(output.contains(r#""event.action":"notification.created""#), "{output}");
    }
}
