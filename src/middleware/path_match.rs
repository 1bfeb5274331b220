//! Protected-path classification.
//!
//! Patterns are glob-style and matched segment by segment:
//!
//! - `**` matches any number of segments, including none
//! - `*` on its own matches exactly one segment
//! - inside a segment, `*` matches any run of characters and `?` one character
//!   (e.g. `/files/*.json`)
//! - everything else is literal and case-sensitive
//!
//! Empty segments are ignored, so `/a//b/` and `/a/b` are the same path.

use std::sync::Arc;

/// Immutable, ordered set of protected path patterns.
///
/// Built once at startup and shared read-only across requests.
#[derive(Debug, Clone, Default)]
pub struct ProtectedPaths {
    patterns: Arc<Vec<String>>,
}

impl ProtectedPaths {
    /// Build the set from configured patterns, preserving order.
    pub fn new(patterns: Vec<String>) -> Self {
        Self {
            patterns: Arc::new(patterns),
        }
    }

    /// Whether `path` requires authentication.
    ///
    /// Returns on the first matching pattern; an empty set never matches.
    pub fn needs_auth(&self, path: &str) -> bool {
        self.patterns.iter().any(|pattern| glob_match(pattern, path))
    }

    /// Configured patterns in order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Match `path` against a single glob `pattern`.
pub fn glob_match(pattern: &str, path: &str) -> bool {
    let pattern: Vec<&str> = segments(pattern).collect();
    let path: Vec<&str> = segments(path).collect();
    match_segments(&pattern, &path)
}

fn segments(s: &str) -> impl Iterator<Item = &str> {
    s.split('/').filter(|seg| !seg.is_empty())
}

fn match_segments(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((&"**", rest)) => {
            // Try every possible number of consumed segments
            (0..=path.len()).any(|skip| path.get(skip..).is_some_and(|tail| match_segments(rest, tail)))
        }
        Some((head, rest)) => match path.split_first() {
            Some((segment, tail)) => match_segment(head, segment) && match_segments(rest, tail),
            None => false,
        },
    }
}

/// Match one segment with `*` and `?` wildcards.
fn match_segment(pattern: &str, segment: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if !pattern.contains(['*', '?']) {
        return pattern == segment;
    }

    let pattern: Vec<char> = pattern.chars().collect();
    let segment: Vec<char> = segment.chars().collect();

    // Iterative wildcard matching with single-star backtracking
    let (mut p, mut s) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while s < segment.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, s));
                p += 1;
            }
            Some(&c) if c == '?' || Some(&c) == segment.get(s) => {
                p += 1;
                s += 1;
            }
            _ => match star {
                Some((star_p, star_s)) => {
                    p = star_p + 1;
                    s = star_s + 1;
                    star = Some((star_p, star_s + 1));
                }
                None => return false,
            },
        }
    }

    pattern.get(p..).is_some_and(|rest| rest.iter().all(|&c| c == '*'))
}
