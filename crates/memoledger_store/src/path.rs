//! Document paths.

use crate::error::{StoreError, StoreResult};
use std::fmt;

/// Characters that may not appear inside a path segment.
const FORBIDDEN: &[char] = &['/', '.', '#', '$', '[', ']'];

/// A validated, `/`-separated document path.
///
/// Paths always have at least one segment; the store root is not addressable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocPath {
    segments: Vec<String>,
}

impl DocPath {
    /// Parses a path such as `customers/c1/transactions`.
    ///
    /// Leading and trailing slashes are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPath`] if the path is empty, contains an
    /// empty segment, or a segment contains one of `/ . # $ [ ]`.
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Err(StoreError::invalid_path(raw, "path is empty"));
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            Self::validate_segment(raw, segment)?;
            segments.push(segment.to_string());
        }

        Ok(Self { segments })
    }

    /// Returns a new path with `segment` appended.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPath`] if the segment is not valid.
    pub fn child(&self, segment: &str) -> StoreResult<Self> {
        Self::validate_segment(segment, segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    /// Returns the path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the last segment.
    pub fn key(&self) -> &str {
        // Construction guarantees at least one segment.
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Returns true if `self` is `other` or one of its ancestors.
    pub fn contains(&self, other: &DocPath) -> bool {
        other.segments.len() >= self.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }

    fn validate_segment(raw: &str, segment: &str) -> StoreResult<()> {
        if segment.trim().is_empty() {
            return Err(StoreError::invalid_path(raw, "empty segment"));
        }
        if let Some(c) = segment.chars().find(|c| FORBIDDEN.contains(c)) {
            return Err(StoreError::invalid_path(
                raw,
                format!("segment {segment:?} contains {c:?}"),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}
