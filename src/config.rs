//! Configuration for the response engine.

use serde::{Deserialize, Serialize};

/// Phrase returned when nothing in the script matches a message.
pub const DEFAULT_FALLBACK_RESPONSE: &str = "متاسفم، متوجه نشدم.";

/// Suffix marking a response as non-final.
pub const DEFAULT_CONTINUATION_MARKER: &str = "!>";

/// Configuration for a [`ScriptEngine`](crate::ScriptEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Response used when no pattern matched
    #[serde(default = "default_fallback_response")]
    pub fallback_response: String,
    /// Two-character marker that turns a response into a continuation
    #[serde(default = "default_continuation_marker")]
    pub continuation_marker: String,
    /// Answer unmatched messages from the script's global responses when it has any
    #[serde(default)]
    pub use_global_responses: bool,
    /// Check every nested dialog instead of only the first declared one
    #[serde(default)]
    pub evaluate_all_nested_dialogs: bool,
    /// Fail the parse when a replacement's source and target lists differ in length
    #[serde(default)]
    pub reject_unequal_replacements: bool,
}

fn default_fallback_response() -> String {
    DEFAULT_FALLBACK_RESPONSE.to_string()
}

fn default_continuation_marker() -> String {
    DEFAULT_CONTINUATION_MARKER.to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fallback_response: default_fallback_response(),
            continuation_marker: default_continuation_marker(),
            use_global_responses: false,
            evaluate_all_nested_dialogs: false,
            reject_unequal_replacements: false,
        }
    }
}

impl EngineConfig {
    /// Create a new config from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("YOOZ_FALLBACK_RESPONSE") {
            if !val.trim().is_empty() {
                config.fallback_response = val;
            }
        }

        if let Ok(val) = std::env::var("YOOZ_CONTINUATION_MARKER") {
            if !val.trim().is_empty() {
                config.continuation_marker = val.trim().to_string();
            }
        }

        if let Ok(val) = std::env::var("YOOZ_USE_GLOBAL_RESPONSES") {
            config.use_global_responses = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("YOOZ_EVALUATE_ALL_NESTED") {
            config.evaluate_all_nested_dialogs = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("YOOZ_STRICT_REPLACEMENTS") {
            config.reject_unequal_replacements = parse_flag(&val);
        }

        config
    }
}

fn parse_flag(val: &str) -> bool {
    matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
