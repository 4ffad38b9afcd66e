//! Mount prefix matching.
//!
//! # Design Decisions
//! - Matching is case-sensitive and segment-aligned: `/a` matches `/a` and
//!   `/a/...` but never `/ab`
//! - The empty prefix is the root and matches everything
//! - No regex to guarantee O(n) matching

/// Matches a request path against a mount prefix and strips it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher. Trailing slashes are ignored.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The path relative to the mount (always starting with `/`), or `None`
    /// when the path is outside it.
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_matcher() {
        let matcher = PathPrefixMatcher::new("/api");

        assert_eq!(matcher.strip("/api/v1"), Some("/v1"));
        assert_eq!(matcher.strip("/api"), Some("/"));
        assert_eq!(matcher.strip("/api/"), Some("/"));
        assert_eq!(matcher.strip("/images"), None);
        assert_eq!(matcher.strip("/apiary"), None);
        assert_eq!(matcher.strip("/API/v1"), None);
    }

    #[test]
    fn test_root_matcher() {
        let matcher = PathPrefixMatcher::new("/");
        assert_eq!(matcher.prefix(), "");
        assert_eq!(matcher.strip("/"), Some("/"));
        assert_eq!(matcher.strip("/0/0/0.png"), Some("/0/0/0.png"));
    }

    #[test]
    fn test_nested_prefix() {
        let matcher = PathPrefixMatcher::new("/tiles/_");
        assert_eq!(matcher.strip("/tiles/_/1/2/3.pbf"), Some("/1/2/3.pbf"));
        assert_eq!(matcher.strip("/tiles/1/2/3.pbf"), None);
    }
}
