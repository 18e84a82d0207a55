//! Glob matching for cache key patterns.

/// Checks if a cache key matches a glob pattern where `*` matches any
/// sequence of characters, including the empty one.
///
/// # Examples
///
/// ```
/// use dynalinq_core::cache::pattern_matches;
///
/// assert!(pattern_matches("dynalinq:Movies:*", "dynalinq:Movies:generation"));
/// assert!(pattern_matches("dynalinq:*:indexes", "dynalinq:GameScores:indexes"));
/// assert!(!pattern_matches("dynalinq:Movies:*", "dynalinq:GameScores:indexes"));
/// ```
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    if pattern.is_empty() {
        return key.is_empty();
    }
    if !pattern.contains('*') {
        return pattern == key;
    }

    let segments: Vec<&str> = pattern.split('*').collect();
    let last = segments.len() - 1;
    let mut remaining = key;

    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i == 0 {
            // Anchored at the start.
            match remaining.strip_prefix(segment) {
                Some(rest) => remaining = rest,
                None => return false,
            }
        } else if i == last {
            // Anchored at the end.
            return remaining.ends_with(segment);
        } else {
            match remaining.find(segment) {
                Some(pos) => remaining = &remaining[pos + segment.len()..],
                None => return false,
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::keys::{generation_key, index_key, table_pattern};

    #[test]
    fn test_exact_match() {
        assert!(pattern_matches("dynalinq:Movies:indexes", "dynalinq:Movies:indexes"));
        assert!(!pattern_matches("dynalinq:Movies:indexes", "dynalinq:Movies:generation"));
    }

    #[test]
    fn test_trailing_wildcard() {
        assert!(pattern_matches("dynalinq:Movies:*", "dynalinq:Movies:_all:index:x"));
        assert!(pattern_matches("dynalinq:Movies:*", "dynalinq:Movies:"));
        assert!(!pattern_matches("dynalinq:Movies:*", "dynalinq:MoviesArchive:indexes"));
    }

    #[test]
    fn test_leading_and_middle_wildcards() {
        assert!(pattern_matches("*:generation", "dynalinq:Movies:generation"));
        assert!(pattern_matches("dynalinq:*:indexes", "dynalinq:GameScores:indexes"));
        assert!(!pattern_matches("dynalinq:*:indexes", "dynalinq:GameScores:generation"));
        assert!(pattern_matches("*:index:*", "dynalinq:Movies:_all:index:sig"));
    }

    #[test]
    fn test_wildcard_only_and_adjacent_wildcards() {
        assert!(pattern_matches("*", ""));
        assert!(pattern_matches("**", "anything"));
        assert!(pattern_matches("dynalinq:**:indexes", "dynalinq:Movies:indexes"));
    }

    #[test]
    fn test_empty_pattern() {
        assert!(pattern_matches("", ""));
        assert!(!pattern_matches("", "dynalinq:Movies:indexes"));
        assert!(!pattern_matches("dynalinq:*", ""));
    }

    #[test]
    fn test_table_pattern_covers_table_keys_only() {
        let pattern = table_pattern("Movies");
        assert!(pattern_matches(&pattern, &generation_key("Movies")));
        assert!(pattern_matches(&pattern, &index_key("Movies", None, "sig")));
        assert!(!pattern_matches(&pattern, &generation_key("GameScores")));
    }
}
