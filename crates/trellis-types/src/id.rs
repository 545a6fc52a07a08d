use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::path::validate_segment;

/// Identifier of an entity within its category.
///
/// Either generated (UUID v7, simple form, so ids sort by creation time) or
/// derived from a human-chosen name. Ids are unique within a category, not
/// globally.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    /// Generate a new time-ordered id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().simple().to_string())
    }

    /// Wrap an existing id, validating that it is usable as a path segment.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        validate_segment(&id).map_err(|e| TypeError::InvalidId {
            id: id.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self(id))
    }

    /// Derive an id from a display name.
    ///
    /// Lowercases, maps runs of non-alphanumeric characters to a single `-`,
    /// and trims leading/trailing dashes: `"Acme Corp."` becomes `"acme-corp"`.
    pub fn from_name(name: &str) -> Result<Self, TypeError> {
        let mut slug = String::with_capacity(name.len());
        let mut pending_dash = false;
        for ch in name.chars() {
            if ch.is_alphanumeric() {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.extend(ch.to_lowercase());
            } else {
                pending_dash = true;
            }
        }
        if slug.is_empty() {
            return Err(TypeError::InvalidId {
                id: name.to_string(),
                reason: "name has no alphanumeric characters".into(),
            });
        }
        Ok(Self(slug))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short representation (first 8 characters).
    pub fn short_id(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RecordId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_and_valid_segments() {
        let a = RecordId::generate();
        let b = RecordId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(validate_segment(a.as_str()).is_ok());
    }

    #[test]
    fn generated_ids_sort_by_creation() {
        let first = RecordId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = RecordId::generate();
        assert!(first < second);
    }

    #[test]
    fn from_name_slugifies() {
        assert_eq!(RecordId::from_name("Acme Corp.").unwrap().as_str(), "acme-corp");
        assert_eq!(RecordId::from_name("  Big   Data!! Inc ").unwrap().as_str(), "big-data-inc");
        assert!(RecordId::from_name("!!!").is_err());
    }

    #[test]
    fn new_rejects_path_characters() {
        assert!(RecordId::new("ok-id").is_ok());
        assert!(RecordId::new("a/b").is_err());
        assert!(RecordId::new("").is_err());
    }

    #[test]
    fn short_id_truncates() {
        let id = RecordId::new("0123456789abcdef").unwrap();
        assert_eq!(id.short_id(), "01234567");
        let short = RecordId::new("abc").unwrap();
        assert_eq!(short.short_id(), "abc");
    }
}
