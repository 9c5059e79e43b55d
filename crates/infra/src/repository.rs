//! # 外部コラボレータ
//!
//! 通知の永続化と受信者情報の参照は、このエンジンの外側にあるサービスが担う。
//! ここではその呼び出し口となるトレイトだけを定義し、具体的な実装は
//! 呼び出し側のアプリケーションが注入する。
//!
//! - [`NotificationRepository`]: 通知の作成・検索・既読化・削除
//! - [`RecipientDirectory`]: メールアドレス・プリファレンス・ロールの解決

pub mod notification_repository;
pub mod recipient_directory;

pub use notification_repository::NotificationRepository;
pub use recipient_directory::RecipientDirectory;
