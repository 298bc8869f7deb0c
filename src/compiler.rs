//! Pattern compilation: author patterns to anchored matchers.
//!
//! `&Name` expands to an alternation of the category's items (verbatim, not
//! escaped) and `*` (with optional ignored digits, `*1`) becomes a lazy
//! capture of anything, including nothing. The result must match the whole
//! cleaned message.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use lazy_static::lazy_static;
use regex::{NoExpand, Regex};
use tracing::{trace, warn};

use crate::error::Result;
use crate::types::Category;

lazy_static! {
    static ref WILDCARD: Regex = Regex::new(r"\*[0-9]*").expect("regex ok");
}

/// Rewrites an author pattern into regex source, without anchors.
pub fn expand_pattern(pattern: &str, categories: &[Category]) -> String {
    let mut expanded = pattern.to_string();
    for category in categories {
        let reference = format!("&{}", category.name);
        if expanded.contains(&reference) {
            expanded = expanded.replace(&reference, &format!("({})", category.items.join("|")));
        }
    }
    WILDCARD.replace_all(&expanded, NoExpand("(.*?)")).into_owned()
}

/// Compiles an author pattern into a full-string matcher.
pub fn compile(pattern: &str, categories: &[Category]) -> Result<Regex> {
    let source = format!("^(?:{})$", expand_pattern(pattern, categories));
    Ok(Regex::new(&source)?)
}

/// Compile-once cache keyed by pattern text.
///
/// Entries depend on the category table, so the owner must call
/// [`PatternCompiler::invalidate`] whenever categories change.
#[derive(Debug, Default)]
pub struct PatternCompiler {
    cache: Mutex<HashMap<String, Option<Regex>>>,
}

impl PatternCompiler {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Option<Regex>>> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Returns the cached matcher for `pattern`, compiling it on first use.
    ///
    /// Patterns that fail to compile are remembered as `None` and never match.
    pub fn matcher(&self, pattern: &str, categories: &[Category]) -> Option<Regex> {
        let mut entries = self.entries();
        if let Some(cached) = entries.get(pattern) {
            return cached.clone();
        }
        let compiled = match compile(pattern, categories) {
            Ok(regex) => Some(regex),
            Err(e) => {
                warn!("Pattern '{}' does not compile: {}", pattern, e);
                None
            }
        };
        trace!(pattern, ok = compiled.is_some(), "Compiled pattern");
        entries.insert(pattern.to_string(), compiled.clone());
        compiled
    }

    /// Drops every cached matcher.
    pub fn invalidate(&self) {
        self.entries().clear();
    }

    /// Number of cached pattern texts, including failed ones.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether nothing has been compiled since the last invalidation.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn colors() -> Vec<Category> {
        vec![Category {
            name: "Colors".to_string(),
            items: vec!["red".to_string(), "blue".to_string()],
        }]
    }

    #[test]
    fn test_category_alternation_is_anchored() {
        let regex = compile("&Colors", &colors()).unwrap();
        assert!(regex.is_match("red"));
        assert!(regex.is_match("blue"));
        assert!(!regex.is_match("green"));
        assert!(!regex.is_match("red car"));
        assert!(!regex.is_match("dark blue"));
    }

    #[test]
    fn test_wildcard_matches_empty_and_anything() {
        let regex = compile("*", &[]).unwrap();
        assert!(regex.is_match(""));
        assert!(regex.is_match("anything at all"));
        assert_eq!(&regex.captures("anything at all").unwrap()[1], "anything at all");
    }

    #[test]
    fn test_numbered_wildcards_capture_left_to_right() {
        let regex = compile("from *1 to *2", &[]).unwrap();
        let caps = regex.captures("from Tehran to Shiraz").unwrap();
        assert_eq!(&caps[1], "Tehran");
        assert_eq!(&caps[2], "Shiraz");
    }

    #[test]
    fn test_top_level_alternation_still_needs_full_match() {
        let regex = compile("hi|hello", &[]).unwrap();
        assert!(regex.is_match("hello"));
        assert!(!regex.is_match("hi there"));
    }

    #[test]
    fn test_expand_pattern() {
        assert_eq!(expand_pattern("I like &Colors *", &colors()), "I like (red|blue) (.*?)");
        assert_eq!(expand_pattern("&Unknown", &colors()), "&Unknown");
    }

    #[test]
    fn test_cache_compiles_once_and_invalidates() {
        let compiler = PatternCompiler::new();
        assert!(compiler.matcher("hello *", &[]).is_some());
        assert!(compiler.matcher("hello *", &[]).is_some());
        assert_eq!(compiler.len(), 1);
        compiler.invalidate();
        assert!(compiler.is_empty());
    }

    #[test]
    fn test_invalid_pattern_never_matches() {
        let compiler = PatternCompiler::new();
        assert!(compiler.matcher("(unclosed", &[]).is_none());
        assert_eq!(compiler.len(), 1);
        assert!(compile("(unclosed", &[]).is_err());
    }
}
