//! # 通知リクエストのバリデーション
//!
//! 受信した通知作成リクエストの構造と種別固有のメタデータを検証する。
//! どの関数もパニックや `Err` を返さず、すべてのエラーを [`ValidationResult`]
//! に収集して返す。
//!
//! 未知の通知種別と必須メタデータの欠落は常にハードな拒否となり、
//! エラーには問題のフィールド名が含まれる。

use std::{str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::{
    CreateNotificationInput,
    kind::NotificationType,
    metadata::{NotificationMetadata, RawMetadata},
};
use crate::user::UserId;

/// タイトルの最小文字数
pub const TITLE_MIN_CHARS: usize = 3;
/// タイトルの最大文字数
pub const TITLE_MAX_CHARS: usize = 200;
/// 本文の最小文字数
pub const MESSAGE_MIN_CHARS: usize = 5;
/// 本文の最大文字数
pub const MESSAGE_MAX_CHARS: usize = 1000;
/// 一括作成の既定の最大件数
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// バリデーション結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid:  bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid:  true,
            errors: Vec::new(),
        }
    }

    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// 最初のエラー（単一エラーを返す呼び出し元向け）
    pub fn first_error(&self) -> Option<&ValidationError> {
        self.errors.first()
    }

    /// 全エラーのメッセージを連結した文字列
    pub fn error_message(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// バリデーションエラー
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub code:    String,
    pub field:   String,
    pub message: String,
}

impl ValidationError {
    pub fn new(
        code: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code:    code.into(),
            field:   field.into(),
            message: message.into(),
        }
    }

    /// 必須フィールドの欠落
    pub fn missing(field: impl Into<String>) -> Self {
        let field = field.into();
        let message = format!("{field} は必須です");
        Self::new("missing_field", field, message)
    }

    /// フィールド値の型・値域違反
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new("invalid_field", field, message)
    }

    /// 一括作成時に要素のインデックスを前置する
    fn at_index(self, index: usize) -> Self {
        Self {
            code:    self.code,
            field:   format!("[{index}].{}", self.field),
            message: format!("[{index}] {}", self.message),
        }
    }
}

/// 検証済みの通知リクエスト
///
/// [`check`] が成功した場合にのみ得られる。メタデータは種別ごとの型に変換済み。
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedNotification {
    pub user_id:        UserId,
    pub kind:           NotificationType,
    pub title:          Option<String>,
    pub message:        Option<String>,
    pub metadata:       NotificationMetadata,
    pub action_url:     Option<String>,
    pub send_email:     bool,
    pub send_websocket: bool,
}

/// 通知種別を検証する
pub fn validate_type(notification_type: &str) -> ValidationResult {
    ValidationResult::from_errors(parse_type(notification_type).err().into_iter().collect())
}

/// ユーザー ID（24 桁 16 進数）を検証する
pub fn validate_user_id(user_id: &str) -> ValidationResult {
    ValidationResult::from_errors(parse_user_id(user_id).err().into_iter().collect())
}

/// タイトルの文字数を検証する
pub fn validate_title(title: &str) -> ValidationResult {
    ValidationResult::from_errors(
        check_length("title", title, TITLE_MIN_CHARS, TITLE_MAX_CHARS)
            .into_iter()
            .collect(),
    )
}

/// 本文の文字数を検証する
pub fn validate_message(message: &str) -> ValidationResult {
    ValidationResult::from_errors(
        check_length("message", message, MESSAGE_MIN_CHARS, MESSAGE_MAX_CHARS)
            .into_iter()
            .collect(),
    )
}

/// 種別ごとのルールでメタデータを検証する
pub fn validate_metadata(notification_type: &str, metadata: &RawMetadata) -> ValidationResult {
    let kind = match parse_type(notification_type) {
        Ok(kind) => kind,
        Err(error) => return ValidationResult::from_errors(vec![error]),
    };
    let mut errors = NotificationMetadata::parse(kind, metadata)
        .err()
        .unwrap_or_default();
    if let Err(error) = parse_action_url(metadata) {
        errors.push(error);
    }
    ValidationResult::from_errors(errors)
}

/// 通知リクエスト全体を検証する
pub fn validate(input: &CreateNotificationInput) -> ValidationResult {
    match check(input) {
        Ok(_) => ValidationResult::ok(),
        Err(errors) => ValidationResult::from_errors(errors),
    }
}

/// 通知リクエスト全体を検証し、型付きの値に変換する
///
/// 種別が未知の場合はメタデータを検証できないため、その時点で打ち切る。
/// それ以外のエラーはすべて収集する。
pub fn check(input: &CreateNotificationInput) -> Result<ValidatedNotification, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let user_id = parse_user_id(&input.user_id)
        .map_err(|e| errors.push(e))
        .ok();

    let kind = match parse_type(&input.notification_type) {
        Ok(kind) => kind,
        Err(error) => {
            errors.push(error);
            return Err(errors);
        }
    };

    if let Some(title) = &input.title {
        errors.extend(check_length(
            "title",
            title,
            TITLE_MIN_CHARS,
            TITLE_MAX_CHARS,
        ));
    }
    if let Some(message) = &input.message {
        errors.extend(check_length(
            "message",
            message,
            MESSAGE_MIN_CHARS,
            MESSAGE_MAX_CHARS,
        ));
    }

    let metadata = NotificationMetadata::parse(kind, &input.metadata)
        .map_err(|e| errors.extend(e))
        .ok();
    let action_url = parse_action_url(&input.metadata)
        .map_err(|e| errors.push(e))
        .ok()
        .flatten();

    match (user_id, metadata) {
        (Some(user_id), Some(metadata)) if errors.is_empty() => Ok(ValidatedNotification {
            user_id,
            kind,
            title: input.title.clone(),
            message: input.message.clone(),
            metadata,
            action_url,
            send_email: input.send_email,
            send_websocket: input.send_websocket,
        }),
        _ => Err(errors),
    }
}

/// 一括作成リクエストを検証する
///
/// 空のバッチと `max_batch_size` を超えるバッチは拒否する。
/// 各要素のエラーには要素のインデックスを前置する。
pub fn validate_bulk(inputs: &[CreateNotificationInput], max_batch_size: usize) -> ValidationResult {
    if inputs.is_empty() {
        return ValidationResult::from_errors(vec![ValidationError::new(
            "empty_batch",
            "notifications",
            "通知が 1 件も指定されていません",
        )]);
    }
    if inputs.len() > max_batch_size {
        return ValidationResult::from_errors(vec![ValidationError::new(
            "batch_too_large",
            "notifications",
            format!(
                "一度に作成できる通知は {max_batch_size} 件までです（{} 件指定されました）",
                inputs.len()
            ),
        )]);
    }

    let errors = inputs
        .iter()
        .enumerate()
        .flat_map(|(index, input)| {
            validate(input)
                .errors
                .into_iter()
                .map(move |e| e.at_index(index))
        })
        .collect();
    ValidationResult::from_errors(errors)
}

static EVENT_HANDLER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"(?i)\bon[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]*)"#).ok());
static MARKUP_TAG: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]*>").ok());
static SCRIPT_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)javascript\s*:").ok());

fn strip(pattern: &LazyLock<Option<Regex>>, value: &str) -> String {
    match pattern.as_ref() {
        Some(regex) => regex.replace_all(value, "").into_owned(),
        None => value.to_string(),
    }
}

/// 自由記述テキストからマークアップを除去する
pub fn sanitize_text(value: &str) -> String {
    let value = strip(&EVENT_HANDLER, value);
    let value = strip(&MARKUP_TAG, &value);
    let value = strip(&SCRIPT_URL, &value);
    value.trim().to_string()
}

/// タイトル・本文・メタデータの文字列値をサニタイズする
pub fn sanitize(input: CreateNotificationInput) -> CreateNotificationInput {
    let metadata = input
        .metadata
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                JsonValue::String(s) => JsonValue::String(sanitize_text(&s)),
                other => other,
            };
            (key, value)
        })
        .collect();

    CreateNotificationInput {
        user_id: input.user_id.trim().to_string(),
        notification_type: input.notification_type.trim().to_string(),
        title: input.title.as_deref().map(sanitize_text),
        message: input.message.as_deref().map(sanitize_text),
        metadata,
        ..input
    }
}

fn parse_type(notification_type: &str) -> Result<NotificationType, ValidationError> {
    if notification_type.trim().is_empty() {
        return Err(ValidationError::missing("type"));
    }
    NotificationType::from_str(notification_type.trim()).map_err(|_| {
        ValidationError::new(
            "unknown_type",
            "type",
            format!("未知の通知種別です: {notification_type}"),
        )
    })
}

fn parse_user_id(user_id: &str) -> Result<UserId, ValidationError> {
    if user_id.trim().is_empty() {
        return Err(ValidationError::missing("userId"));
    }
    UserId::parse(user_id).map_err(|_| {
        ValidationError::new(
            "invalid_user_id",
            "userId",
            "userId は 24 桁の 16 進数である必要があります",
        )
    })
}

fn check_length(field: &str, value: &str, min: usize, max: usize) -> Option<ValidationError> {
    let length = value.trim().chars().count();
    if length < min || length > max {
        return Some(ValidationError::new(
            format!("invalid_{field}"),
            field,
            format!("{field} は {min} 文字以上 {max} 文字以下である必要があります（{length} 文字）"),
        ));
    }
    None
}

/// `actionUrl` はアプリ内の相対パスか http(s) URL のみ許可する
fn parse_action_url(metadata: &RawMetadata) -> Result<Option<String>, ValidationError> {
    let url = match metadata.get("actionUrl") {
        None | Some(JsonValue::Null) => return Ok(None),
        Some(JsonValue::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(JsonValue::String(s)) => s.trim(),
        Some(_) => {
            return Err(ValidationError::invalid(
                "metadata.actionUrl",
                "metadata.actionUrl は文字列である必要があります",
            ));
        }
    };

    if url.starts_with('/') || url.starts_with("https://") || url.starts_with("http://") {
        Ok(Some(url.to_string()))
    } else {
        Err(ValidationError::invalid(
            "metadata.actionUrl",
            "metadata.actionUrl は / から始まるパスか http(s) URL である必要があります",
        ))
    }
}
