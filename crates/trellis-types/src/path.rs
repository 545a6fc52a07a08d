//! Slash-delimited locations in the document tree.
//!
//! Valid segments:
//! - Must be non-empty
//! - Must not contain `/`, `.`, `#`, `$`, `[`, `]`
//! - Must not contain ASCII control characters
//!
//! Leading, trailing and repeated slashes are ignored when parsing, so
//! `"/sponsors//gold/"` and `"sponsors/gold"` name the same node. The empty
//! path is the root of the tree.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Characters that are forbidden anywhere in a path segment.
const FORBIDDEN_CHARS: &[char] = &['/', '.', '#', '$', '[', ']'];

/// Validate a single path segment.
pub fn validate_segment(segment: &str) -> Result<(), TypeError> {
    if segment.is_empty() {
        return Err(invalid(segment, "segment must not be empty"));
    }
    for ch in FORBIDDEN_CHARS {
        if segment.contains(*ch) {
            return Err(invalid(
                segment,
                &format!("contains forbidden character: {ch:?}"),
            ));
        }
    }
    if segment.chars().any(|c| c.is_ascii_control()) {
        return Err(invalid(segment, "contains control character"));
    }
    Ok(())
}

fn invalid(path: &str, reason: &str) -> TypeError {
    TypeError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

/// A validated location in the document tree.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocPath {
    segments: Vec<String>,
}

impl DocPath {
    /// The root of the tree.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a slash-delimited path.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let mut segments = Vec::new();
        for segment in s.split('/').filter(|seg| !seg.is_empty()) {
            validate_segment(segment).map_err(|_| {
                invalid(s, &format!("invalid segment {segment:?}"))
            })?;
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Build a path from individual segments, validating each.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, TypeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut path = Self::root();
        for segment in segments {
            path = path.child(segment)?;
        }
        Ok(path)
    }

    /// Append one validated segment.
    pub fn child(&self, segment: impl Into<String>) -> Result<Self, TypeError> {
        let segment = segment.into();
        validate_segment(&segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment);
        Ok(Self { segments })
    }

    /// Append a sequence index segment.
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(index.to_string());
        Self { segments }
    }

    /// Concatenate two paths.
    pub fn join(&self, other: &DocPath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The last segment, or `None` at the root.
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The enclosing path, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Returns `true` if `prefix` is this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &DocPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("/");
        }
        f.write_str(&self.segments.join("/"))
    }
}

impl fmt::Debug for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocPath({self})")
    }
}

impl FromStr for DocPath {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DocPath {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DocPath> for String {
    fn from(path: DocPath) -> Self {
        path.to_string()
    }
}
