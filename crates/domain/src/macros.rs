/// UUID v7 の ID newtype を定義する
///
/// 生成順にソートでき、serde・`Display` では UUID 文字列として扱う。
/// 外部から受け取った文字列は `parse` で検証してから使う。
///
/// ```rust
/// use ichiba_domain::notification::NotificationId;
///
/// let id = NotificationId::new();
/// assert_eq!(NotificationId::parse(&id.to_string()).unwrap(), id);
/// ```
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        $vis:vis struct $Name:ident;
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
            derive_more::Display,
        )]
        #[serde(transparent)]
        #[display("{_0}")]
        $vis struct $Name(uuid::Uuid);

        impl $Name {
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            /// UUID 文字列から復元する
            pub fn parse(value: &str) -> Result<Self, $crate::DomainError> {
                uuid::Uuid::parse_str(value.trim())
                    .map(Self)
                    .map_err(|e| $crate::DomainError::InvalidId {
                        entity: stringify!($Name),
                        value:  value.to_string(),
                        reason: e.to_string(),
                    })
            }
        }

        impl Default for $Name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::str::FromStr for $Name {
            type Err = $crate::DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}
