//! Route classification for the authentication gate

/// Matches a single path segment against a pattern segment that may
/// contain `*` wildcards, each standing for any run of characters within
/// the segment
fn wildcard_match(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    let (mut p_idx, mut v_idx) = (0usize, 0usize);
    let (mut star_idx, mut match_idx) = (None, 0usize);
    let pattern_bytes = pattern.as_bytes();
    let value_bytes = value.as_bytes();

    while v_idx < value_bytes.len() {
        if p_idx < pattern_bytes.len() && pattern_bytes[p_idx] == b'*' {
            star_idx = Some(p_idx);
            match_idx = v_idx;
            p_idx += 1;
            continue;
        }

        if p_idx < pattern_bytes.len() && pattern_bytes[p_idx] == value_bytes[v_idx] {
            p_idx += 1;
            v_idx += 1;
            continue;
        }

        if let Some(star) = star_idx {
            p_idx = star + 1;
            match_idx += 1;
            v_idx = match_idx;
            continue;
        }

        return false;
    }

    while p_idx < pattern_bytes.len() && pattern_bytes[p_idx] == b'*' {
        p_idx += 1;
    }

    p_idx == pattern_bytes.len()
}

fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Matches path segments against pattern segments, where a `**` pattern
/// segment stands for any number of path segments (including none)
fn match_segments(pattern: &[String], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((seg, rest)) if seg.as_str() == "**" => {
            (0..=path.len()).any(|skip| match_segments(rest, &path[skip..]))
        }
        Some((seg, rest)) => match path.split_first() {
            Some((value, remaining)) => {
                wildcard_match(seg, value) && match_segments(rest, remaining)
            }
            None => false,
        },
    }
}

/// The ordered set of glob path patterns that bypass authentication
///
/// Patterns use `/`-separated segments; `*` matches within a single
/// segment and `**` matches any remaining (or intervening) segments.
/// Built once from configuration at startup and shared read-only across
/// concurrent requests.
///
/// ```
/// use keygate_tower::RouteMatcher;
///
/// let routes = RouteMatcher::new(["/public/**", "/health"]);
/// assert!(routes.is_unprotected("/public/anything/at/all"));
/// assert!(routes.is_unprotected("/health"));
/// assert!(!routes.is_unprotected("/api/data"));
/// ```
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct RouteMatcher {
    patterns: Vec<Vec<String>>,
}

impl RouteMatcher {
    /// Builds a matcher from a list of glob path patterns
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| {
                    split_segments(p.as_ref())
                        .into_iter()
                        .map(ToOwned::to_owned)
                        .collect()
                })
                .collect(),
        }
    }

    /// A matcher that classifies every route as protected
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the request path matches any unprotected pattern
    #[must_use]
    pub fn is_unprotected(&self, path: &str) -> bool {
        let segments = split_segments(path);
        self.patterns
            .iter()
            .any(|pattern| match_segments(pattern, &segments))
    }
}
