//! # 通知種別レジストリ
//!
//! 通知種別の閉じた集合と、種別ごとの静的設定（既定の優先度、カテゴリ、
//! チャネル対応、保持期間）を定義する。
//!
//! | 種別 | 優先度 | カテゴリ | メール | リアルタイム | 保持日数 |
//! |---|---|---|---|---|---|
//! | `LOW_STOCK` | high | inventory | ○ | ○ | 30 |
//! | `NEW_ORDER` | high | orders | ○ | ○ | 90 |
//! | `CUBIC_VOLUME_ALERT` | medium | inventory | × | ○ | 30 |
//! | `COMMISSION_UPDATE` | medium | finance | ○ | ○ | 365 |
//! | `PRODUCT_ARCHIVED` | low | products | ○ | ○ | 60 |
//! | `VENDOR_STATUS_CHANGE` | high | account | ○ | ○ | 180 |
//! | `SYSTEM_ALERT` | high | system | ○ | ○ | 30 |

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

/// 通知種別
///
/// 外部表現は `LOW_STOCK` のような SCREAMING_SNAKE_CASE。
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    IntoStaticStr,
    EnumIter,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    /// 在庫数が閾値を下回った
    LowStock,
    /// 新規注文を受け付けた
    NewOrder,
    /// 商品の容積（立方体積）が上限を超えた
    CubicVolumeAlert,
    /// 手数料の状態が変わった
    CommissionUpdate,
    /// 商品がアーカイブされた
    ProductArchived,
    /// ベンダーのステータスが変わった
    VendorStatusChange,
    /// システム全体の警告
    SystemAlert,
}

/// 優先度
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoStaticStr,
    EnumIter,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// 並び替え用の順位（小さいほど優先）
    pub fn rank(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }

    /// UI 表示用ラベル
    pub fn label(self) -> &'static str {
        match self {
            Self::High => "High Priority",
            Self::Medium => "Medium Priority",
            Self::Low => "Low Priority",
        }
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// `High < Medium < Low`（優先度の高いものが先に並ぶ順序）
impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// 通知カテゴリ
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    IntoStaticStr,
    EnumIter,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
    Inventory,
    Orders,
    Finance,
    Products,
    Account,
    System,
    General,
}

impl Category {
    /// UI 表示用ラベル
    pub fn label(self) -> &'static str {
        match self {
            Self::Inventory => "Inventory",
            Self::Orders => "Orders",
            Self::Finance => "Finance",
            Self::Products => "Products",
            Self::Account => "Account",
            Self::System => "System",
            Self::General => "General",
        }
    }
}

/// 種別ごとの静的設定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeConfig {
    pub name:             &'static str,
    pub description:      &'static str,
    pub default_priority: Priority,
    pub category:         Category,
    pub email_capable:    bool,
    pub realtime_capable: bool,
    pub retention_days:   u32,
}

/// 未知の種別文字列に対する防御的な既定設定
///
/// プリファレンス解決でのみ使う。バリデーションは未知の種別を必ず拒否する。
pub const DEFAULT_TYPE_CONFIG: TypeConfig = TypeConfig {
    name:             "Notification",
    description:      "Generic notification",
    default_priority: Priority::Medium,
    category:         Category::General,
    email_capable:    true,
    realtime_capable: true,
    retention_days:   90,
};

const LOW_STOCK: TypeConfig = TypeConfig {
    name:             "Low Stock",
    description:      "Product inventory fell below its restock threshold",
    default_priority: Priority::High,
    category:         Category::Inventory,
    email_capable:    true,
    realtime_capable: true,
    retention_days:   30,
};

const NEW_ORDER: TypeConfig = TypeConfig {
    name:             "New Order",
    description:      "A customer placed a new order",
    default_priority: Priority::High,
    category:         Category::Orders,
    email_capable:    true,
    realtime_capable: true,
    retention_days:   90,
};

const CUBIC_VOLUME_ALERT: TypeConfig = TypeConfig {
    name:             "Cubic Volume Alert",
    description:      "Product cubic volume exceeds the shipping limit",
    default_priority: Priority::Medium,
    category:         Category::Inventory,
    email_capable:    false,
    realtime_capable: true,
    retention_days:   30,
};

const COMMISSION_UPDATE: TypeConfig = TypeConfig {
    name:             "Commission Update",
    description:      "A commission was generated, approved, paid or disputed",
    default_priority: Priority::Medium,
    category:         Category::Finance,
    email_capable:    true,
    realtime_capable: true,
    retention_days:   365,
};

const PRODUCT_ARCHIVED: TypeConfig = TypeConfig {
    name:             "Product Archived",
    description:      "A product was archived and removed from the storefront",
    default_priority: Priority::Low,
    category:         Category::Products,
    email_capable:    true,
    realtime_capable: true,
    retention_days:   60,
};

const VENDOR_STATUS_CHANGE: TypeConfig = TypeConfig {
    name:             "Vendor Status Change",
    description:      "A vendor account changed status",
    default_priority: Priority::High,
    category:         Category::Account,
    email_capable:    true,
    realtime_capable: true,
    retention_days:   180,
};

const SYSTEM_ALERT: TypeConfig = TypeConfig {
    name:             "System Alert",
    description:      "Platform-wide operational alert",
    default_priority: Priority::High,
    category:         Category::System,
    email_capable:    true,
    realtime_capable: true,
    retention_days:   30,
};

impl NotificationType {
    /// 種別の静的設定を返す
    pub fn config(self) -> &'static TypeConfig {
        match self {
            Self::LowStock => &LOW_STOCK,
            Self::NewOrder => &NEW_ORDER,
            Self::CubicVolumeAlert => &CUBIC_VOLUME_ALERT,
            Self::CommissionUpdate => &COMMISSION_UPDATE,
            Self::ProductArchived => &PRODUCT_ARCHIVED,
            Self::VendorStatusChange => &VENDOR_STATUS_CHANGE,
            Self::SystemAlert => &SYSTEM_ALERT,
        }
    }

    /// 外部表現（`LOW_STOCK` など）
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// 全種別を列挙する
    pub fn all() -> impl Iterator<Item = Self> {
        Self::iter()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn notification_typeの文字列変換が正しい() {
        assert_eq!(NotificationType::LowStock.to_string(), "LOW_STOCK");
        assert_eq!(
            NotificationType::VendorStatusChange.to_string(),
            "VENDOR_STATUS_CHANGE"
        );
        assert_eq!(
            NotificationType::from_str("CUBIC_VOLUME_ALERT").unwrap(),
            NotificationType::CubicVolumeAlert
        );
        assert!(NotificationType::from_str("low_stock").is_err());
    }

    #[test]
    fn serdeの表現がstrumと一致する() {
        for kind in NotificationType::all() {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }

    #[test]
    fn 全種別に設定が存在する() {
        assert_eq!(NotificationType::all().count(), 7);
        for kind in NotificationType::all() {
            let config = kind.config();
            assert!(!config.name.is_empty());
            assert!(config.retention_days > 0);
        }
    }

    #[test]
    fn 優先度はhigh_medium_lowの順に並ぶ() {
        let mut priorities = vec![Priority::Low, Priority::High, Priority::Medium];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![Priority::High, Priority::Medium, Priority::Low]
        );
    }

    #[test]
    fn 既定設定はmedium_general_両チャネル_90日() {
        assert_eq!(DEFAULT_TYPE_CONFIG.default_priority, Priority::Medium);
        assert_eq!(DEFAULT_TYPE_CONFIG.category, Category::General);
        assert!(DEFAULT_TYPE_CONFIG.email_capable);
        assert!(DEFAULT_TYPE_CONFIG.realtime_capable);
        assert_eq!(DEFAULT_TYPE_CONFIG.retention_days, 90);
    }
}
