//! Threshold-gated rule injection.

use tracing::trace;

use crate::types::Rule;

/// Whether `rule` may fire at the given maturity level.
pub fn is_eligible(rule: &Rule, maturity: f64) -> bool {
    maturity <= rule.threshold
}

/// Splices every eligible rule's text after the first occurrence of its trigger.
///
/// Rules run in registration order over the text as modified so far, so an
/// injection can introduce the trigger of a later rule.
pub fn inject(response: &str, rules: &[Rule], maturity: f64) -> String {
    let mut out = response.to_string();
    for rule in rules {
        if !is_eligible(rule, maturity) {
            continue;
        }
        let Some(index) = out.find(rule.trigger.as_str()) else {
            continue;
        };
        let at = index + rule.trigger.len();
        out.insert_str(at, &format!(" {}", rule.response));
        trace!(trigger = %rule.trigger, "Injected rule");
    }
    out
}
