//! # インフラ層エラー
//!
//! Redis と外部コラボレータ（通知ストア、受信者ディレクトリ）の呼び出しで
//! 起きるエラー。
//!
//! 種別 [`InfraErrorKind`] に、生成時点の [`SpanTrace`] を添えて保持する。
//! どの配信処理の中で失敗したかを、ログの `span_trace` から辿れる。

use std::fmt;

use derive_more::Display;
use thiserror::Error;
use tracing_error::SpanTrace;

/// インフラ層のエラー
///
/// ```ignore
/// match error.kind() {
///     InfraErrorKind::Unavailable(_) => { /* 既定値で続行 */ }
///     _ => return Err(error.into()),
/// }
/// ```
#[derive(Display)]
#[display("{kind}")]
pub struct InfraError {
    kind:       InfraErrorKind,
    span_trace: SpanTrace,
}

#[derive(Debug, Error)]
pub enum InfraErrorKind {
    /// 接続・コマンド実行の失敗
    #[error("Redis エラー: {0}")]
    Redis(#[source] redis::RedisError),

    #[error("シリアライズエラー: {0}")]
    Serialization(#[source] serde_json::Error),

    /// 対象の通知が存在しない、または別の受信者のもの
    #[error("{entity} が見つかりません: {id}")]
    NotFound { entity: String, id: String },

    /// 通知ストア・受信者ディレクトリが応答しない
    #[error("外部サービスが利用できません: {0}")]
    Unavailable(String),

    #[error("予期しないエラー: {0}")]
    Unexpected(String),
}

impl InfraError {
    fn new(kind: InfraErrorKind) -> Self {
        Self {
            kind,
            span_trace: SpanTrace::capture(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(InfraErrorKind::NotFound {
            entity: entity.into(),
            id:     id.into(),
        })
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::new(InfraErrorKind::Unavailable(reason.into()))
    }

    pub fn unexpected(reason: impl Into<String>) -> Self {
        Self::new(InfraErrorKind::Unexpected(reason.into()))
    }

    pub fn kind(&self) -> &InfraErrorKind {
        &self.kind
    }

    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }

    /// 対象が存在しない
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, InfraErrorKind::NotFound { .. })
    }
}

impl fmt::Debug for InfraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfraError")
            .field("kind", &self.kind)
            .field("span_trace", &self.span_trace)
            .finish()
    }
}

impl std::error::Error for InfraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

impl From<redis::RedisError> for InfraError {
    fn from(source: redis::RedisError) -> Self {
        Self::new(InfraErrorKind::Redis(source))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(source: serde_json::Error) -> Self {
        Self::new(InfraErrorKind::Serialization(source))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use pretty_assertions::assert_eq;
    use tracing_subscriber::layer::SubscriberExt as _;

    use super::*;

    /// ErrorLayer を登録したスパンの中で実行する
    fn in_span(name: &'static str, f: impl FnOnce()) {
        let subscriber = tracing_subscriber::registry().with(tracing_error::ErrorLayer::default());
        let _guard = tracing::subscriber::set_default(subscriber);
        let span = tracing::info_span!("infra", op = name);
        let _enter = span.enter();
        f();
    }

    #[test]
    fn redisエラーは生成時のスパンを保持する() {
        in_span("publish", || {
            let err: InfraError = redis::RedisError::from((redis::ErrorKind::Io, "接続失敗")).into();

            assert!(matches!(err.kind(), InfraErrorKind::Redis(_)));
            assert!(err.source().is_some());
            assert!(format!("{}", err.span_trace()).contains("infra"));
        });
    }

    #[test]
    fn ディレクトリ停止は理由付きのunavailableになる() {
        in_span("resolve_email", || {
            let err = InfraError::unavailable("directory timeout");

            assert!(matches!(err.kind(), InfraErrorKind::Unavailable(r) if r == "directory timeout"));
            assert!(err.source().is_none());
            assert!(!err.is_not_found());
        });
    }

    #[test]
    fn not_foundは対象とidを表示する() {
        let err = InfraError::not_found("Notification", "n-1");

        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Notification が見つかりません: n-1");
    }

    #[test]
    fn jsonの失敗はシリアライズエラーになる() {
        let err: InfraError = serde_json::from_str::<u32>("\"x\"").unwrap_err().into();

        assert!(matches!(err.kind(), InfraErrorKind::Serialization(_)));
    }
}
