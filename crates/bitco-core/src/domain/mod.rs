//! 도메인 모델.
//!
//! 와이어 포맷과 독립적인 게이트웨이의 값 타입을 정의합니다.
//! 거래소가 사용하는 문자열 표현은 각 닫힌 열거형의 `as_str()` 매핑
//! 테이블에서만 결정됩니다.

/// 와이어 문자열과 1:1 매핑되는 닫힌 열거형을 정의합니다.
///
/// `as_str`, `Display`, `FromStr`, serde 직렬화가 하나의 매핑 테이블에서
/// 생성되므로 변형 순서를 바꿔도 매핑이 깨지지 않습니다.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => $wire:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant
            ),+
        }

        impl $name {
            /// 모든 변형.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// 와이어 문자열을 반환합니다.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    other => Err($crate::error::ParseEnumError::new(stringify!($name), other)),
                }
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <String as serde::Deserialize>::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

pub mod market;
pub mod order;

pub use market::*;
pub use order::*;
