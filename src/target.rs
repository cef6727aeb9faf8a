//! Capture target identity.

use std::sync::Arc;

/// Stable identifier for a video element being captured.
///
/// Sessions are keyed by `TargetId` rather than by a reference to the
/// element, so lookups never depend on pointer identity. Platforms derive it
/// from whatever uniquely names the element (a DOM node id, a locator).
///
/// Cloning is an `Arc` pointer copy.
///
/// # Example
///
/// ```
/// use page_capture::TargetId;
///
/// let a = TargetId::new("video#player");
/// assert_eq!(a, TargetId::from("video#player"));
/// assert_eq!(a.to_string(), "video#player");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(Arc<str>);

impl TargetId {
    /// Creates a target id from a string.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TargetId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for TargetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_equality_is_by_value() {
        assert_eq!(TargetId::new("v1"), TargetId::from(String::from("v1")));
        assert_ne!(TargetId::new("v1"), TargetId::new("v2"));
    }

    #[test]
    fn test_usable_as_map_key() {
        let mut map = HashMap::new();
        map.insert(TargetId::new("v1"), 1);
        map.insert(TargetId::new("v1"), 2);
        assert_eq!(map.len(), 1);
        assert_eq!(map[&TargetId::new("v1")], 2);
    }
}
