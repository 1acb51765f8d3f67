//! Route paths and `{placeholder}` templates.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error::ValidationError;

/// Trim a trailing slash so `/api/orders/` and `/api/orders` address the same route.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Join an automation base path and an endpoint path into a live route path.
#[must_use]
pub fn join_path(base_path: &str, endpoint_path: &str) -> String {
    let base = base_path.trim_end_matches('/');
    let tail = endpoint_path.trim_start_matches('/');
    normalize_path(&format!("{base}/{tail}"))
}

/// Check that a base path is a literal, URL-safe, absolute path outside
/// [`RESERVED_PREFIXES`].
///
/// # Errors
///
/// Returns [`ValidationError::InvalidBasePath`] otherwise.
pub fn validate_base_path(base_path: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidBasePath(base_path.to_string());
    let normalized = normalize_path(base_path);
    if !base_path.starts_with('/') || normalized == "/" {
        return Err(invalid());
    }
    let first = normalized[1..].split('/').next().unwrap_or_default();
    if RESERVED_PREFIXES.contains(&first) {
        return Err(invalid());
    }
    for segment in normalized[1..].split('/') {
        if segment.is_empty() || !segment.chars().all(is_literal_char) {
            return Err(invalid());
        }
    }
    Ok(())
}

/// First path segments served by the server itself.
pub const RESERVED_PREFIXES: [&str; 2] = ["console", "health"];

fn is_literal_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~')
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A parsed route path such as `/api/orders/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse and validate a path.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidEndpointPath`] when the path is not
    /// absolute, contains unsupported characters, or repeats a placeholder.
    pub fn parse(path: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidEndpointPath(path.to_string());
        if !path.starts_with('/') {
            return Err(invalid());
        }
        let raw = normalize_path(path);
        let mut segments = Vec::new();
        let mut names = HashSet::new();
        if raw != "/" {
            for segment in raw[1..].split('/') {
                if let Some(name) = segment
                    .strip_prefix('{')
                    .and_then(|rest| rest.strip_suffix('}'))
                {
                    if !is_identifier(name) || !names.insert(name.to_string()) {
                        return Err(invalid());
                    }
                    segments.push(Segment::Param(name.to_string()));
                } else if !segment.is_empty() && segment.chars().all(is_literal_char) {
                    segments.push(Segment::Literal(segment.to_string()));
                } else {
                    return Err(invalid());
                }
            }
        }
        Ok(Self { raw, segments })
    }

    /// The normalized textual form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// `true` when the path has no placeholders.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Number of literal segments, used to rank overlapping templates.
    #[must_use]
    pub fn literal_segments(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    /// Placeholder names in declaration order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Match a concrete request path, returning the placeholder values.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let normalized = normalize_path(path);
        let parts: Vec<&str> = if normalized == "/" {
            Vec::new()
        } else {
            normalized[1..].split('/').collect()
        };
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut captured = BTreeMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Param(name) if !part.is_empty() => {
                    captured.insert(name.clone(), part.to_string());
                }
                _ => return None,
            }
        }
        Some(captured)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
