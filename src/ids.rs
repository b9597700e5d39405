//! Opaque identifier types used throughout the allocation pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn generate() -> Self {
                Self(crate::generate_id())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

opaque_id!(TaskId);
opaque_id!(RobotId);
opaque_id!(RoundId);

impl RobotId {
    /// Numeric tie-break suffix used by §4.5's secondary ordering, e.g.
    /// `robot_001` -> `Some(1)`. Robots whose id carries no trailing digits
    /// sort after every robot that does (their numeric key is `None`, and
    /// `None` is the largest `Option<u64>`... so compare by `(suffix.is_none(), suffix)`.
    pub fn numeric_suffix(&self) -> Option<u64> {
        let digits: String = self
            .0
            .rsplit(|c: char| !c.is_ascii_digit())
            .next()
            .unwrap_or("")
            .to_string();
        if digits.is_empty() {
            None
        } else {
            digits.parse().ok()
        }
    }

    /// Total order used for the secondary tie-break: smaller numeric suffix
    /// wins when both ids carry one; otherwise falls back to lexicographic
    /// order on the whole id.
    pub fn tie_break_key(&self) -> (bool, Option<u64>, &str) {
        let suffix = self.numeric_suffix();
        (suffix.is_none(), suffix, self.0.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_suffix_extracts_trailing_digits() {
        assert_eq!(RobotId::new("robot_001").numeric_suffix(), Some(1));
        assert_eq!(RobotId::new("robot_042").numeric_suffix(), Some(42));
        assert_eq!(RobotId::new("robot").numeric_suffix(), None);
    }

    #[test]
    fn tie_break_orders_by_numeric_suffix() {
        let a = RobotId::new("robot_001");
        let b = RobotId::new("robot_002");
        assert!(a.tie_break_key() < b.tie_break_key());
    }
}
