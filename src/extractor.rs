//! Grammar extraction: raw script text to [`ScriptModel`].
//!
//! Every token form is an independent grammar scanned over the whole text, so
//! fragments may feed more than one extractor. The exception is pattern blocks
//! (`(+ ... )`), which are walked once in source order and classified as
//! conditional, nested dialog or normal; the resulting order is the matching
//! precedence the engine relies on.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{Result, YoozError};
use crate::types::{
    Category, ChildPattern, ConditionalPattern, NestedDialog, NormalPattern, Pattern,
    Replacement, Rule, ScriptModel, ALTERNATIVE_DELIMITER, LIST_DELIMITER,
};

lazy_static! {
    static ref CATEGORY: Regex = Regex::new(r"(?s)(\S+)\s*\{(.*?)\}").expect("regex ok");
    static ref DEFINITION: Regex = Regex::new(r"(?s)#(\S+)\s*:\s*(.*?)\s*\.").expect("regex ok");
    static ref REPLACEMENT: Regex =
        Regex::new(r"\{\s*(.*?)\s*\}\s*->\s*\{\s*(.*?)\s*\}").expect("regex ok");
    static ref BLOCK_START: Regex = Regex::new(r"\(\s*\+").expect("regex ok");
    static ref CONDITIONAL_BLOCK: Regex = Regex::new(concat!(
        r"\A\(\s*\+\s*(.*?)\s*\.\s*",
        r"\[(.*?)\]\s*:\s*-\s*(.*?)\s*",
        r"(?:!\[\s*(.*?)\s*\]\s*:\s*-\s*(.*?)\s*)*",
        r"!\s*:\s*-\s*(.*?)\s*\)",
    ))
    .expect("regex ok");
    static ref NESTED_BLOCK: Regex =
        Regex::new(r"(?s)\A\(\s*\+\s*([^()]*?)\s*-\s*([^()]*?)\s*(\(.*?\))\s*\)")
            .expect("regex ok");
    static ref NORMAL_BLOCK: Regex =
        Regex::new(r"(?s)\A\(\s*\+\s*(.*?)\s*-\s*(.*?)\)").expect("regex ok");
    static ref CHILD_BLOCK: Regex =
        Regex::new(r"(?s)\(\s*\+\s*(.*?)\s*-\s*(.*?)\s*\)").expect("regex ok");
    static ref STOPWORDS: Regex = Regex::new(r"(?s)-\s*\{\s*(.*?)\s*\}").expect("regex ok");
    static ref ADDITIONAL_RESPONSE: Regex =
        Regex::new(r"(?s)\+\s*\(\s*(.*?)\s*\)").expect("regex ok");
    static ref MATURITY: Regex = Regex::new(r"\[\[(\d+(?:\.\d+)?)\]\]").expect("regex ok");
    static ref RULE: Regex =
        Regex::new(r"\{\s*\[(\d+(?:\.\d+)?)\]\s*(.*?)\s*>\s*(.*?)\}").expect("regex ok");
    static ref VARIABLE: Regex = Regex::new(r"=\s*(\w+):\s*(\S+)").expect("regex ok");
}

/// Something the extractor skipped or adjusted while reading a script.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseWarning {
    /// Replacement lists of unequal length; the extra items were dropped.
    TruncatedReplacement {
        /// Number of source items
        sources: usize,
        /// Number of target items
        targets: usize,
    },
    /// A `(+` block that no pattern grammar accepted.
    MalformedBlock {
        /// Byte offset of the block in the script text
        offset: usize,
        /// Start of the rejected text
        snippet: String,
    },
    /// A pattern whose compiled form is not a valid matcher.
    UncompilablePattern {
        /// Pattern text as written
        pattern: String,
        /// Compiler error message
        error: String,
    },
    /// The engine already held a model; sequences now contain duplicates.
    DuplicatedEntries,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseWarning::TruncatedReplacement { sources, targets } => write!(
                f,
                "replacement lists differ ({} source(s), {} target(s)); extra items dropped",
                sources, targets
            ),
            ParseWarning::MalformedBlock { offset, snippet } => {
                write!(f, "malformed pattern block at byte {}: {}", offset, snippet)
            }
            ParseWarning::UncompilablePattern { pattern, error } => {
                write!(f, "pattern '{}' does not compile: {}", pattern, error)
            }
            ParseWarning::DuplicatedEntries => write!(
                f,
                "script parsed into a non-empty model; categories, patterns, rules, replacements and nested dialogs were appended again"
            ),
        }
    }
}

/// Summary of one `parse` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseReport {
    /// Categories declared
    pub categories: usize,
    /// Definitions declared
    pub definitions: usize,
    /// Replacement pairs kept
    pub replacements: usize,
    /// Stopwords declared
    pub stopwords: usize,
    /// Normal patterns, including nested-dialog parents
    pub normal_patterns: usize,
    /// Conditional patterns
    pub conditional_patterns: usize,
    /// Responses of empty-pattern blocks
    pub global_responses: usize,
    /// Maturity-gated rules
    pub rules: usize,
    /// Declared variables
    pub variables: usize,
    /// Nested dialogs
    pub nested_dialogs: usize,
    /// Everything skipped or adjusted, in discovery order
    pub warnings: Vec<ParseWarning>,
}

impl ParseReport {
    pub(crate) fn for_model(model: &ScriptModel, warnings: Vec<ParseWarning>) -> Self {
        let conditional_patterns = model
            .patterns
            .iter()
            .filter(|p| matches!(p, Pattern::Conditional(_)))
            .count();
        Self {
            categories: model.categories.len(),
            definitions: model.definitions.len(),
            replacements: model.replacements.len(),
            stopwords: model.stopwords.len(),
            normal_patterns: model.patterns.len() - conditional_patterns,
            conditional_patterns,
            global_responses: model.global_responses.len(),
            rules: model.rules.len(),
            variables: model.variables.len(),
            nested_dialogs: model.nested_dialogs.len(),
            warnings,
        }
    }
}

/// Extracts a standalone model from script text.
///
/// Malformed fragments are skipped and reported as warnings. Ambiguous keyword
/// groups (and, in strict mode, unequal replacement lists) fail the whole call.
pub fn extract(text: &str, config: &EngineConfig) -> Result<(ScriptModel, Vec<ParseWarning>)> {
    let mut model = ScriptModel::default();
    let mut warnings = Vec::new();

    extract_categories(text, &mut model);
    extract_definitions(text, &mut model);
    extract_replacements(text, config, &mut model, &mut warnings)?;
    extract_pattern_blocks(text, &mut model, &mut warnings);
    extract_stopwords(text, &mut model);
    extract_additional_response(text, &mut model);
    extract_rules(text, &mut model);
    extract_variables(text, &mut model);

    for pattern in model.normal_patterns() {
        pattern.keyword_group()?;
    }

    debug!(
        categories = model.categories.len(),
        patterns = model.patterns.len(),
        rules = model.rules.len(),
        nested = model.nested_dialogs.len(),
        warnings = warnings.len(),
        "Extracted script"
    );
    Ok((model, warnings))
}

fn split_list(raw: &str, delimiter: char) -> Vec<String> {
    raw.split(delimiter)
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn split_alternatives(raw: &str) -> Vec<String> {
    raw.split(ALTERNATIVE_DELIMITER)
        .map(|r| r.trim().to_string())
        .collect()
}

fn extract_categories(text: &str, model: &mut ScriptModel) {
    for caps in CATEGORY.captures_iter(text) {
        model.categories.push(Category {
            name: caps[1].trim().to_string(),
            items: split_list(&caps[2], LIST_DELIMITER),
        });
    }
}

fn extract_definitions(text: &str, model: &mut ScriptModel) {
    for caps in DEFINITION.captures_iter(text) {
        model
            .definitions
            .insert(caps[1].trim().to_string(), caps[2].trim().to_string());
    }
}

fn extract_replacements(
    text: &str,
    config: &EngineConfig,
    model: &mut ScriptModel,
    warnings: &mut Vec<ParseWarning>,
) -> Result<()> {
    for caps in REPLACEMENT.captures_iter(text) {
        let sources = split_list(&caps[1], LIST_DELIMITER);
        let targets = split_list(&caps[2], LIST_DELIMITER);
        if sources.len() != targets.len() {
            if config.reject_unequal_replacements {
                return Err(YoozError::ReplacementArity {
                    sources: sources.len(),
                    targets: targets.len(),
                });
            }
            warn!(
                "Replacement lists differ in length ({} vs {}), truncating",
                sources.len(),
                targets.len()
            );
            warnings.push(ParseWarning::TruncatedReplacement {
                sources: sources.len(),
                targets: targets.len(),
            });
        }
        model.replacements.extend(
            sources
                .into_iter()
                .zip(targets)
                .map(|(source, target)| Replacement { source, target }),
        );
    }
    Ok(())
}

fn extract_pattern_blocks(text: &str, model: &mut ScriptModel, warnings: &mut Vec<ParseWarning>) {
    let mut pos = 0;
    while let Some(start) = BLOCK_START.find_at(text, pos) {
        let offset = start.start();
        let rest = &text[offset..];

        // A trigger that runs into the next `(+` means this block never closed properly.
        let conditional = CONDITIONAL_BLOCK
            .captures(rest)
            .filter(|caps| !BLOCK_START.is_match(&caps[1]));
        if let Some(caps) = conditional {
            model.patterns.push(Pattern::Conditional(ConditionalPattern {
                pattern: caps[1].trim().to_string(),
                main_condition: caps[2].trim().to_string(),
                main_response: caps[3].trim().to_string(),
                optional_condition: non_empty(caps.get(4).map(|m| m.as_str())),
                optional_response: non_empty(caps.get(5).map(|m| m.as_str())),
                default_response: caps[6].trim().to_string(),
            }));
            pos = offset + caps[0].len();
            continue;
        }

        if let Some(caps) = NESTED_BLOCK.captures(rest) {
            let parent_trigger = caps[1].trim().to_string();
            if parent_trigger.is_empty() {
                warnings.push(malformed(offset, &caps[0]));
            } else {
                let responses = split_alternatives(&caps[2]);
                let children = CHILD_BLOCK
                    .captures_iter(&caps[3])
                    .map(|child| ChildPattern {
                        pattern: child[1].trim().to_string(),
                        responses: split_alternatives(&child[2]),
                    })
                    .collect();
                model.patterns.push(Pattern::Normal(NormalPattern {
                    user_pattern: parent_trigger.clone(),
                    bot_responses: responses.clone(),
                }));
                model.nested_dialogs.push(NestedDialog {
                    parent_trigger,
                    responses,
                    children,
                });
            }
            pos = offset + caps[0].len();
            continue;
        }

        let normal = NORMAL_BLOCK
            .captures(rest)
            .filter(|caps| !BLOCK_START.is_match(&caps[1]));
        if let Some(caps) = normal {
            let user_pattern = caps[1].trim().to_string();
            let bot_responses = split_alternatives(&caps[2]);
            if user_pattern.is_empty() {
                model.global_responses.extend(bot_responses);
            } else {
                model.patterns.push(Pattern::Normal(NormalPattern {
                    user_pattern,
                    bot_responses,
                }));
            }
            pos = offset + caps[0].len();
            continue;
        }

        warnings.push(malformed(offset, rest));
        pos = start.end();
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn malformed(offset: usize, fragment: &str) -> ParseWarning {
    ParseWarning::MalformedBlock {
        offset,
        snippet: fragment.chars().take(40).collect(),
    }
}

fn extract_stopwords(text: &str, model: &mut ScriptModel) {
    for caps in STOPWORDS.captures_iter(text) {
        model.stopwords.extend(split_list(&caps[1], LIST_DELIMITER));
    }
}

fn extract_additional_response(text: &str, model: &mut ScriptModel) {
    if let Some(caps) = ADDITIONAL_RESPONSE.captures(text) {
        model.additional_response = non_empty(Some(&caps[1]));
    }
}

fn extract_rules(text: &str, model: &mut ScriptModel) {
    if let Some(caps) = MATURITY.captures(text) {
        model.maturity = caps[1].parse().ok();
    }
    for caps in RULE.captures_iter(text) {
        let Ok(threshold) = caps[1].parse::<f64>() else {
            continue;
        };
        model.rules.push(Rule {
            threshold,
            trigger: caps[2].trim().to_string(),
            response: caps[3].trim().to_string(),
        });
    }
}

fn extract_variables(text: &str, model: &mut ScriptModel) {
    for caps in VARIABLE.captures_iter(text) {
        model
            .variables
            .insert(caps[1].to_string(), caps[2].trim().to_string());
    }
}
