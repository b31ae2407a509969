use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller-supplied identifier of a part. Assigned once, never changes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartId(pub String);

/// Type tag of a part. A stage only ever touches parts whose tag equals the
/// stage's accepted type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartType(pub String);

impl PartId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartType {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PartId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PartId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PartType {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PartType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
