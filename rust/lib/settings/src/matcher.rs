//! URI routing and observer path patterns.

use std::collections::HashMap;

use crate::paths;

/// Maps `content://{authority}/{path}` URIs to integer codes.
pub struct UriMatcher {
    authority: String,
    codes: HashMap<String, i32>,
}

impl UriMatcher {
    pub fn new(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            codes: HashMap::new(),
        }
    }

    /// Register the exact `path` under `code`.
    pub fn add_path(&mut self, path: &str, code: i32) {
        self.codes.insert(path.trim_matches('/').to_string(), code);
    }

    /// Code for `uri`, or `None` if the authority differs or no path matches.
    pub fn match_uri(&self, uri: &str) -> Option<i32> {
        let (authority, path) = paths::parse_uri(uri)?;
        if authority != self.authority || path.is_empty() {
            return None;
        }
        self.codes.get(path).copied()
    }
}

/// Whether the `/`-separated `pattern` covers `path`.
///
/// `+` matches exactly one level, a trailing `#` matches zero or more.
pub fn pattern_matches(pattern: &str, path: &str) -> bool {
    let mut levels = path.split('/').filter(|s| !s.is_empty());
    for segment in pattern.split('/').filter(|s| !s.is_empty()) {
        match segment {
            "#" => return true,
            "+" => {
                if levels.next().is_none() {
                    return false;
                }
            }
            exact => {
                if levels.next() != Some(exact) {
                    return false;
                }
            }
        }
    }
    levels.next().is_none()
}
