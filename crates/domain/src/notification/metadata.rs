//! # 通知メタデータ
//!
//! 通知種別ごとのメタデータを閉じた直和型 [`NotificationMetadata`] で表現する。
//! 生の JSON オブジェクトからの変換（[`NotificationMetadata::parse`]）で
//! 必須フィールドと値域を検証し、数値文字列は数値に変換する。
//!
//! 種別とバリアントは 1 対 1 で対応し、未知の種別がデフォルト分岐に
//! 落ちることはない。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::{kind::NotificationType, validator::ValidationError};

/// 生のメタデータ（リクエストで受け取った JSON オブジェクト）
pub type RawMetadata = Map<String, JsonValue>;

/// 手数料イベントのアクション
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CommissionAction {
    Approved,
    Paid,
    Disputed,
    Generated,
}

/// ベンダーのステータス
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VendorStatus {
    Active,
    Inactive,
    Suspended,
    Pending,
}

/// システム警告の深刻度
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockMetadata {
    pub product_id:       String,
    pub product_name:     String,
    pub current_quantity: u64,
    pub threshold:        u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku:              Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id:        Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderMetadata {
    pub order_id:      String,
    pub order_number:  String,
    pub total_amount:  f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_count:    Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CubicVolumeAlertMetadata {
    pub product_id:   String,
    pub product_name: String,
    pub cubic_volume: f64,
    pub threshold:    f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit:         Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionUpdateMetadata {
    pub commission_id: String,
    pub action:        CommissionAction,
    pub amount:        f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id:      Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductArchivedMetadata {
    pub product_id:   String,
    pub product_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason:       Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorStatusChangeMetadata {
    pub vendor_id:       String,
    pub vendor_name:     String,
    pub new_status:      VendorStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<VendorStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason:          Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemAlertMetadata {
    pub alert_type: String,
    pub severity:   AlertSeverity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details:    Option<String>,
}

/// 種別ごとのメタデータ
///
/// シリアライズ時はバリアントのタグを出さず、フィールドをそのまま展開する。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NotificationMetadata {
    LowStock(LowStockMetadata),
    NewOrder(NewOrderMetadata),
    CubicVolumeAlert(CubicVolumeAlertMetadata),
    CommissionUpdate(CommissionUpdateMetadata),
    ProductArchived(ProductArchivedMetadata),
    VendorStatusChange(VendorStatusChangeMetadata),
    SystemAlert(SystemAlertMetadata),
}

impl NotificationMetadata {
    /// 生のメタデータを種別ごとの型に変換する
    ///
    /// 必須フィールドの欠落・型不一致・値域違反をすべて収集して返す。
    pub fn parse(kind: NotificationType, raw: &RawMetadata) -> Result<Self, Vec<ValidationError>> {
        let mut fields = FieldReader::new(raw);

        let metadata = match kind {
            NotificationType::LowStock => {
                let product_id = fields.required_string("productId");
                let product_name = fields.required_string("productName");
                let current_quantity = fields.required_count("currentQuantity");
                let threshold = fields.required_count("threshold");
                let sku = fields.optional_string("sku");
                let vendor_id = fields.optional_string("vendorId");
                fields.finish()?;
                Self::LowStock(LowStockMetadata {
                    product_id: product_id.unwrap_or_default(),
                    product_name: product_name.unwrap_or_default(),
                    current_quantity: current_quantity.unwrap_or_default(),
                    threshold: threshold.unwrap_or_default(),
                    sku,
                    vendor_id,
                })
            }
            NotificationType::NewOrder => {
                let order_id = fields.required_string("orderId");
                let order_number = fields.required_string("orderNumber");
                let total_amount = fields.required_amount("totalAmount");
                let customer_name = fields.optional_string("customerName");
                let item_count = fields.optional_count("itemCount");
                fields.finish()?;
                Self::NewOrder(NewOrderMetadata {
                    order_id: order_id.unwrap_or_default(),
                    order_number: order_number.unwrap_or_default(),
                    total_amount: total_amount.unwrap_or_default(),
                    customer_name,
                    item_count,
                })
            }
            NotificationType::CubicVolumeAlert => {
                let product_id = fields.required_string("productId");
                let product_name = fields.required_string("productName");
                let cubic_volume = fields.required_amount("cubicVolume");
                let threshold = fields.required_positive("threshold");
                let unit = fields.optional_string("unit");
                fields.finish()?;
                Self::CubicVolumeAlert(CubicVolumeAlertMetadata {
                    product_id: product_id.unwrap_or_default(),
                    product_name: product_name.unwrap_or_default(),
                    cubic_volume: cubic_volume.unwrap_or_default(),
                    threshold: threshold.unwrap_or_default(),
                    unit,
                })
            }
            NotificationType::CommissionUpdate => {
                let commission_id = fields.required_string("commissionId");
                let action = fields.required_enum::<CommissionAction>(
                    "action",
                    "approved, paid, disputed, generated",
                );
                let amount = fields.required_amount("amount");
                let order_id = fields.optional_string("orderId");
                fields.finish()?;
                let Some(action) = action else {
                    return Err(vec![ValidationError::missing("metadata.action")]);
                };
                Self::CommissionUpdate(CommissionUpdateMetadata {
                    commission_id: commission_id.unwrap_or_default(),
                    action,
                    amount: amount.unwrap_or_default(),
                    order_id,
                })
            }
            NotificationType::ProductArchived => {
                let product_id = fields.required_string("productId");
                let product_name = fields.required_string("productName");
                let reason = fields.optional_string("reason");
                fields.finish()?;
                Self::ProductArchived(ProductArchivedMetadata {
                    product_id: product_id.unwrap_or_default(),
                    product_name: product_name.unwrap_or_default(),
                    reason,
                })
            }
            NotificationType::VendorStatusChange => {
                let vendor_id = fields.required_string("vendorId");
                let vendor_name = fields.required_string("vendorName");
                let new_status = fields.required_enum::<VendorStatus>(
                    "newStatus",
                    "active, inactive, suspended, pending",
                );
                let previous_status = fields.optional_enum::<VendorStatus>(
                    "previousStatus",
                    "active, inactive, suspended, pending",
                );
                let reason = fields.optional_string("reason");
                fields.finish()?;
                let Some(new_status) = new_status else {
                    return Err(vec![ValidationError::missing("metadata.newStatus")]);
                };
                Self::VendorStatusChange(VendorStatusChangeMetadata {
                    vendor_id: vendor_id.unwrap_or_default(),
                    vendor_name: vendor_name.unwrap_or_default(),
                    new_status,
                    previous_status,
                    reason,
                })
            }
            NotificationType::SystemAlert => {
                let alert_type = fields.required_string("alertType");
                let severity = fields
                    .required_enum::<AlertSeverity>("severity", "info, warning, error, critical");
                let details = fields.optional_string("details");
                fields.finish()?;
                let Some(severity) = severity else {
                    return Err(vec![ValidationError::missing("metadata.severity")]);
                };
                Self::SystemAlert(SystemAlertMetadata {
                    alert_type: alert_type.unwrap_or_default(),
                    severity,
                    details,
                })
            }
        };

        Ok(metadata)
    }

    /// 対応する通知種別を返す
    pub fn kind(&self) -> NotificationType {
        match self {
            Self::LowStock(_) => NotificationType::LowStock,
            Self::NewOrder(_) => NotificationType::NewOrder,
            Self::CubicVolumeAlert(_) => NotificationType::CubicVolumeAlert,
            Self::CommissionUpdate(_) => NotificationType::CommissionUpdate,
            Self::ProductArchived(_) => NotificationType::ProductArchived,
            Self::VendorStatusChange(_) => NotificationType::VendorStatusChange,
            Self::SystemAlert(_) => NotificationType::SystemAlert,
        }
    }

    /// 種別ごとの既定の遷移先 URL
    pub fn default_action_url(&self) -> String {
        match self {
            Self::LowStock(m) => format!("/products/{}", m.product_id),
            Self::NewOrder(m) => format!("/orders/{}", m.order_id),
            Self::CubicVolumeAlert(m) => format!("/products/{}", m.product_id),
            Self::CommissionUpdate(m) => format!("/commissions/{}", m.commission_id),
            Self::ProductArchived(m) => format!("/products/{}", m.product_id),
            Self::VendorStatusChange(m) => format!("/vendors/{}", m.vendor_id),
            Self::SystemAlert(_) => "/system/alerts".to_string(),
        }
    }
}

/// 生のメタデータからフィールドを読み出し、エラーを蓄積するヘルパー
struct FieldReader<'a> {
    raw:    &'a RawMetadata,
    errors: Vec<ValidationError>,
}

impl<'a> FieldReader<'a> {
    fn new(raw: &'a RawMetadata) -> Self {
        Self {
            raw,
            errors: Vec::new(),
        }
    }

    fn finish(self) -> Result<(), Vec<ValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    /// null と空文字列は「未指定」とみなす
    fn present(&self, field: &str) -> Option<&'a JsonValue> {
        match self.raw.get(field) {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::String(s)) if s.trim().is_empty() => None,
            Some(value) => Some(value),
        }
    }

    fn required_string(&mut self, field: &str) -> Option<String> {
        if self.present(field).is_none() {
            self.errors
                .push(ValidationError::missing(format!("metadata.{field}")));
            return None;
        }
        self.optional_string(field)
    }

    /// 文字列または数値を受け付ける（注文番号が数値で届くことがある）
    fn optional_string(&mut self, field: &str) -> Option<String> {
        match self.present(field)? {
            JsonValue::String(s) => Some(s.trim().to_string()),
            JsonValue::Number(n) => Some(n.to_string()),
            _ => {
                self.errors.push(ValidationError::invalid(
                    format!("metadata.{field}"),
                    format!("metadata.{field} は文字列である必要があります"),
                ));
                None
            }
        }
    }

    fn number(&mut self, field: &str) -> Option<f64> {
        let value = self.present(field)?;
        let parsed = match value {
            JsonValue::Number(n) => n.as_f64(),
            JsonValue::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match parsed {
            Some(n) if n.is_finite() => Some(n),
            _ => {
                self.errors.push(ValidationError::invalid(
                    format!("metadata.{field}"),
                    format!("metadata.{field} は数値である必要があります"),
                ));
                None
            }
        }
    }

    fn required_number(&mut self, field: &str) -> Option<f64> {
        if self.present(field).is_none() {
            self.errors
                .push(ValidationError::missing(format!("metadata.{field}")));
            return None;
        }
        self.number(field)
    }

    /// 0 以上の数値（金額・容積）
    fn required_amount(&mut self, field: &str) -> Option<f64> {
        let value = self.required_number(field)?;
        if value < 0.0 {
            self.errors.push(ValidationError::invalid(
                format!("metadata.{field}"),
                format!("metadata.{field} は 0 以上である必要があります"),
            ));
            return None;
        }
        Some(value)
    }

    /// 0 より大きい数値
    fn required_positive(&mut self, field: &str) -> Option<f64> {
        let value = self.required_number(field)?;
        if value <= 0.0 {
            self.errors.push(ValidationError::invalid(
                format!("metadata.{field}"),
                format!("metadata.{field} は 0 より大きい必要があります"),
            ));
            return None;
        }
        Some(value)
    }

    fn count(&mut self, field: &str, value: f64) -> Option<u64> {
        if value < 0.0 || value.fract() != 0.0 {
            self.errors.push(ValidationError::invalid(
                format!("metadata.{field}"),
                format!("metadata.{field} は 0 以上の整数である必要があります"),
            ));
            return None;
        }
        // u64::MAX as f64 は 2^64 に丸められるため、それ以上は表現できない
        if value >= u64::MAX as f64 {
            self.errors.push(ValidationError::invalid(
                format!("metadata.{field}"),
                format!("metadata.{field} が大きすぎます"),
            ));
            return None;
        }
        // 非負の整数で u64 に収まることを確認済み
        Some(value as u64)
    }

    /// 0 以上の整数（在庫数など）
    fn required_count(&mut self, field: &str) -> Option<u64> {
        let value = self.required_number(field)?;
        self.count(field, value)
    }

    fn optional_count(&mut self, field: &str) -> Option<u64> {
        let value = self.number(field)?;
        self.count(field, value)
    }

    fn optional_enum<T: std::str::FromStr>(&mut self, field: &str, allowed: &str) -> Option<T> {
        let value = self.present(field)?;
        let parsed = value
            .as_str()
            .and_then(|s| s.trim().to_ascii_lowercase().parse::<T>().ok());
        if parsed.is_none() {
            self.errors.push(ValidationError::invalid(
                format!("metadata.{field}"),
                format!("metadata.{field} は {allowed} のいずれかである必要があります"),
            ));
        }
        parsed
    }

    fn required_enum<T: std::str::FromStr>(&mut self, field: &str, allowed: &str) -> Option<T> {
        if self.present(field).is_none() {
            self.errors
                .push(ValidationError::missing(format!("metadata.{field}")));
            return None;
        }
        self.optional_enum(field, allowed)
    }
}
