//! Response template resolution.
//!
//! Three passes run once each, in order, so text inserted by one pass is never
//! re-read by the same pass:
//!
//! 1. `*i` becomes the i-th capture, trimmed.
//! 2. `=key` becomes the stored variable, or `{missing:key}`; `=key:value`
//!    stores `value` first and renders it.
//! 3. `#key` becomes the definition, or stays as written.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use tracing::trace;

lazy_static! {
    static ref POSITIONAL: Regex = Regex::new(r"\*(\d+)").expect("regex ok");
    static ref VARIABLE: Regex = Regex::new(r"=([^\W\d]\w*)(?::(\S+))?").expect("regex ok");
    static ref DEFINITION: Regex = Regex::new(r"#(\S+)").expect("regex ok");
}

const TRAILING_PUNCTUATION: &[char] = &['.', ',', '!', '?', '؟', '،', ':', ';'];

/// Trimmed capture groups of a match, in left-to-right order.
pub fn captured_groups(captures: &Captures<'_>) -> Vec<String> {
    captures
        .iter()
        .skip(1)
        .map(|group| group.map(|m| m.as_str().trim().to_string()).unwrap_or_default())
        .collect()
}

/// Renders the sentinel shown in place of an unknown variable.
pub fn missing_variable(key: &str) -> String {
    format!("{{missing:{}}}", key)
}

/// Fills a response template. Assignments (`=key:value`) write into `memory`.
pub fn resolve(
    template: &str,
    captures: &[String],
    memory: &mut HashMap<String, String>,
    definitions: &HashMap<String, String>,
) -> String {
    let positional = POSITIONAL.replace_all(template, |caps: &Captures<'_>| {
        caps[1]
            .parse::<usize>()
            .ok()
            .filter(|&i| i >= 1)
            .and_then(|i| captures.get(i - 1))
            .cloned()
            .unwrap_or_else(|| caps[0].to_string())
    });

    let variables = VARIABLE.replace_all(&positional, |caps: &Captures<'_>| {
        let key = &caps[1];
        if let Some(assigned) = caps.get(2) {
            trace!(key, value = assigned.as_str(), "Stored variable");
            memory.insert(key.to_string(), assigned.as_str().to_string());
            return assigned.as_str().to_string();
        }
        match memory.get(key) {
            Some(value) if !value.is_empty() => value.clone(),
            _ => missing_variable(key),
        }
    });

    DEFINITION
        .replace_all(&variables, |caps: &Captures<'_>| {
            let token = &caps[1];
            if let Some(value) = definitions.get(token) {
                return value.clone();
            }
            let key = token.trim_end_matches(TRAILING_PUNCTUATION);
            match definitions.get(key) {
                Some(value) if !key.is_empty() => format!("{}{}", value, &token[key.len()..]),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}
