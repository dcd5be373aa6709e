//! Dotted attribute paths
//!
//! Provides [`AttrPath`] for addressing components through nested devices,
//! e.g. `sub_cpt2.cpt2`.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Path from a device to one of its (possibly nested) components
///
/// # Examples
/// - `cpt3` → the device's own `cpt3`
/// - `sub_cpt2.cpt2` → `cpt2` of the sub-device `sub_cpt2`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttrPath(Vec<String>);

impl AttrPath {
    /// Create path from segments
    ///
    /// # Errors
    /// Returns error if there are no segments or a segment is not an identifier
    pub fn new(segments: Vec<String>) -> Result<Self, PathError> {
        if segments.is_empty() {
            return Err(PathError::Empty);
        }
        for seg in &segments {
            check_segment(seg)?;
        }
        Ok(Self(segments))
    }

    /// Single-segment path
    ///
    /// # Errors
    /// Returns error if `segment` is not an identifier
    pub fn single(segment: impl Into<String>) -> Result<Self, PathError> {
        Self::new(vec![segment.into()])
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; paths have at least one segment
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First segment: the attribute on the addressed device
    #[inline]
    #[must_use]
    pub fn head(&self) -> &str {
        &self.0[0]
    }

    /// Last segment
    #[inline]
    #[must_use]
    pub fn last(&self) -> &str {
        &self.0[self.0.len() - 1]
    }

    /// Path below the head, `None` for a single segment
    #[must_use]
    pub fn rest(&self) -> Option<Self> {
        if self.0.len() > 1 {
            Some(Self(self.0[1..].to_vec()))
        } else {
            None
        }
    }

    /// Check if this is a plain attribute name
    #[inline]
    #[must_use]
    pub fn is_single(&self) -> bool {
        self.0.len() == 1
    }

    /// Append a segment, returning new path
    ///
    /// # Errors
    /// Returns error if `segment` is not an identifier
    pub fn child(&self, segment: impl Into<String>) -> Result<Self, PathError> {
        let segment = segment.into();
        check_segment(&segment)?;
        let mut new = self.clone();
        new.0.push(segment);
        Ok(new)
    }

    /// Prepend a segment, returning new path
    ///
    /// # Errors
    /// Returns error if `segment` is not an identifier
    pub fn under(&self, segment: impl Into<String>) -> Result<Self, PathError> {
        let segment = segment.into();
        check_segment(&segment)?;
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.push(segment);
        segments.extend(self.0.iter().cloned());
        Ok(Self(segments))
    }

    /// Iterator over segments from head to leaf
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Join segments with custom separator
    #[inline]
    #[must_use]
    pub fn join(&self, separator: &str) -> String {
        self.0.join(separator)
    }
}

/// Check whether `s` is usable as an attribute name
///
/// Identifiers start with a letter or underscore and continue with
/// alphanumerics or underscores.
#[must_use]
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn check_segment(seg: &str) -> Result<(), PathError> {
    if seg.is_empty() {
        Err(PathError::EmptySegment)
    } else if !is_identifier(seg) {
        Err(PathError::InvalidSegment(seg.to_string()))
    } else {
        Ok(())
    }
}

impl Display for AttrPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl FromStr for AttrPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }

        let segments: Vec<String> = s
            .split('.')
            .map(|seg| check_segment(seg).map(|()| seg.to_string()))
            .collect::<Result<_, _>>()?;

        Ok(Self(segments))
    }
}

impl TryFrom<&str> for AttrPath {
    type Error = PathError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Errors related to attribute paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// No segments at all
    #[error("attribute path is empty")]
    Empty,

    /// Empty segment in path
    #[error("attribute path contains empty segment")]
    EmptySegment,

    /// Invalid segment characters
    #[error("invalid segment: {0} (must be an identifier)")]
    InvalidSegment(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_from_str_single() {
        let path: AttrPath = "cpt1".parse().unwrap();
        assert!(path.is_single());
        assert_eq!(path.head(), "cpt1");
        assert!(path.rest().is_none());
    }

    #[test]
    fn path_from_str_dotted() {
        let path: AttrPath = "sub_cpt2.cpt2".parse().unwrap();
        assert_eq!(path.segments(), &["sub_cpt2", "cpt2"]);
        assert_eq!(path.head(), "sub_cpt2");
        assert_eq!(path.last(), "cpt2");
        assert_eq!(path.rest().unwrap().segments(), &["cpt2"]);
    }

    #[test]
    fn path_rest_of_deep_path() {
        let path: AttrPath = "a.b.c".parse().unwrap();
        let rest = path.rest().unwrap();
        assert_eq!(rest.to_string(), "b.c");
        assert_eq!(rest.rest().unwrap().to_string(), "c");
    }

    #[test]
    fn path_from_str_empty() {
        let result: Result<AttrPath, _> = "".parse();
        assert_eq!(result, Err(PathError::Empty));
    }

    #[test]
    fn path_from_str_empty_segment() {
        let result: Result<AttrPath, _> = "a..b".parse();
        assert_eq!(result, Err(PathError::EmptySegment));

        let trailing: Result<AttrPath, _> = "a.".parse();
        assert_eq!(trailing, Err(PathError::EmptySegment));
    }

    #[test]
    fn path_from_str_invalid_chars() {
        let result: Result<AttrPath, _> = "a.b-c".parse();
        assert!(matches!(result, Err(PathError::InvalidSegment(_))));
    }

    #[test]
    fn path_new_requires_segments() {
        assert_eq!(AttrPath::new(Vec::new()), Err(PathError::Empty));
    }

    #[test]
    fn path_child_and_under() {
        let path = AttrPath::single("b").unwrap();
        assert_eq!(path.child("c").unwrap().to_string(), "b.c");
        assert_eq!(path.under("a").unwrap().to_string(), "a.b");
        assert!(path.child("not valid").is_err());
    }

    #[test]
    fn path_join() {
        let path: AttrPath = "a.b".parse().unwrap();
        assert_eq!(path.join("_"), "a_b");
        assert_eq!(path.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("cpt1"));
        assert!(is_identifier("_signals"));
        assert!(!is_identifier("1cpt"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a.b"));
    }
}
