use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What the vector store does when a write's dimension differs from the
/// collection's recorded dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionPolicy {
    /// Drop and recreate the collection, losing every stored vector.
    #[default]
    Recreate,
    /// Fail the write with `DomainError::DimensionMismatch`.
    Reject,
}

impl fmt::Display for DimensionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionPolicy::Recreate => write!(f, "recreate"),
            DimensionPolicy::Reject => write!(f, "reject"),
        }
    }
}

impl FromStr for DimensionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "recreate" => Ok(DimensionPolicy::Recreate),
            "reject" => Ok(DimensionPolicy::Reject),
            _ => Err(format!("Unknown dimension policy: {s}")),
        }
    }
}
