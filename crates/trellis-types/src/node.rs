use std::fmt;

use serde::{Deserialize, Serialize};

/// A node in the document tree: a scalar, a mapping, or a sequence.
pub type Node = serde_json::Value;

/// A mapping node holding one entity's fields.
pub type Record = serde_json::Map<String, Node>;

/// How a write combines with whatever already lives at the target path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Discard the previous node and store the new one.
    #[default]
    Replace,
    /// Shallow key-wise union with the previous mapping; new keys win.
    Merge,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace => f.write_str("replace"),
            Self::Merge => f.write_str("merge"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_is_replace() {
        assert_eq!(WriteMode::default(), WriteMode::Replace);
    }

    #[test]
    fn mode_serializes_lowercase() {
        let json = serde_json::to_string(&WriteMode::Merge).unwrap();
        assert_eq!(json, "\"merge\"");
        assert_eq!(WriteMode::Replace.to_string(), "replace");
    }
}
