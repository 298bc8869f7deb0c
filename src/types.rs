#![allow(missing_docs)]

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, YoozError};

/// Separates items inside `{ ... }` lists (Arabic comma).
pub const LIST_DELIMITER: char = '،';

/// Separates alternative responses, and "any of" keywords.
pub const ALTERNATIVE_DELIMITER: char = '_';

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replacement {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalPattern {
    pub user_pattern: String,
    pub bot_responses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalPattern {
    pub pattern: String,
    pub main_condition: String,
    pub main_response: String,
    pub optional_condition: Option<String>,
    pub optional_response: Option<String>,
    pub default_response: String,
}

/// One entry of the ordered pattern table. Position in the table is precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pattern {
    Normal(NormalPattern),
    Conditional(ConditionalPattern),
}

impl Pattern {
    /// The author-facing matcher text of this entry.
    pub fn trigger(&self) -> &str {
        match self {
            Pattern::Normal(p) => &p.user_pattern,
            Pattern::Conditional(p) => &p.pattern,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordPolicy {
    /// Every keyword must occur in the message (`a، b`)
    All,
    /// One keyword is enough (`a_b`)
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordGroup {
    pub policy: KeywordPolicy,
    pub keywords: Vec<String>,
}

impl KeywordGroup {
    pub fn is_satisfied_by(&self, message: &str) -> bool {
        match self.policy {
            KeywordPolicy::All => self.keywords.iter().all(|k| message.contains(k.as_str())),
            KeywordPolicy::Any => self.keywords.iter().any(|k| message.contains(k.as_str())),
        }
    }
}

impl NormalPattern {
    /// Reads the first `{...}` group of the user pattern as a keyword group.
    ///
    /// A group without either separator is not a keyword group. A group mixing
    /// both separators is an authoring error.
    pub fn keyword_group(&self) -> Result<Option<KeywordGroup>> {
        let Some(open) = self.user_pattern.find('{') else {
            return Ok(None);
        };
        let Some(len) = self.user_pattern[open + 1..].find('}') else {
            return Ok(None);
        };
        let inner = &self.user_pattern[open + 1..open + 1 + len];

        let has_list = inner.contains(LIST_DELIMITER);
        let has_alt = inner.contains(ALTERNATIVE_DELIMITER);
        let (policy, separator) = match (has_list, has_alt) {
            (true, true) => {
                return Err(YoozError::InvalidPatternSyntax {
                    pattern: self.user_pattern.clone(),
                    reason: format!(
                        "keywords must be separated by either '{}' or '{}', not both",
                        LIST_DELIMITER, ALTERNATIVE_DELIMITER
                    ),
                })
            }
            (false, true) => (KeywordPolicy::Any, ALTERNATIVE_DELIMITER),
            (true, false) => (KeywordPolicy::All, LIST_DELIMITER),
            (false, false) => return Ok(None),
        };

        let keywords: Vec<String> = inner
            .split(separator)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            return Ok(None);
        }
        Ok(Some(KeywordGroup { policy, keywords }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub threshold: f64,
    pub trigger: String,
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildPattern {
    pub pattern: String,
    pub responses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedDialog {
    pub parent_trigger: String,
    pub responses: Vec<String>,
    pub children: Vec<ChildPattern>,
}

/// Everything extracted from script text.
///
/// Sequence fields grow on every parse; map fields and scalars are overwritten.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptModel {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub definitions: HashMap<String, String>,
    #[serde(default)]
    pub replacements: Vec<Replacement>,
    #[serde(default)]
    pub stopwords: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<Pattern>,
    #[serde(default)]
    pub global_responses: Vec<String>,
    #[serde(default)]
    pub additional_response: Option<String>,
    #[serde(default)]
    pub maturity: Option<f64>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub variables: HashMap<String, String>,
    #[serde(default)]
    pub nested_dialogs: Vec<NestedDialog>,
}

impl ScriptModel {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
            && self.definitions.is_empty()
            && self.replacements.is_empty()
            && self.stopwords.is_empty()
            && self.patterns.is_empty()
            && self.global_responses.is_empty()
            && self.additional_response.is_none()
            && self.maturity.is_none()
            && self.rules.is_empty()
            && self.variables.is_empty()
            && self.nested_dialogs.is_empty()
    }

    /// Folds a freshly extracted model into this one.
    pub fn merge(&mut self, other: ScriptModel) {
        self.categories.extend(other.categories);
        self.definitions.extend(other.definitions);
        self.replacements.extend(other.replacements);
        self.stopwords.extend(other.stopwords);
        self.patterns.extend(other.patterns);
        self.global_responses.extend(other.global_responses);
        if other.additional_response.is_some() {
            self.additional_response = other.additional_response;
        }
        if other.maturity.is_some() {
            self.maturity = other.maturity;
        }
        self.rules.extend(other.rules);
        self.variables.extend(other.variables);
        self.nested_dialogs.extend(other.nested_dialogs);
    }

    pub fn normal_patterns(&self) -> impl Iterator<Item = &NormalPattern> {
        self.patterns.iter().filter_map(|p| match p {
            Pattern::Normal(n) => Some(n),
            Pattern::Conditional(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normal(user_pattern: &str) -> NormalPattern {
        NormalPattern {
            user_pattern: user_pattern.to_string(),
            bot_responses: vec!["ok".to_string()],
        }
    }

    #[test]
    fn test_keyword_group_all() {
        let group = normal("{سلام، خوبی}").keyword_group().unwrap().unwrap();
        assert_eq!(group.policy, KeywordPolicy::All);
        assert_eq!(group.keywords, vec!["سلام", "خوبی"]);
        assert!(group.is_satisfied_by("سلام تو خوبی"));
        assert!(!group.is_satisfied_by("سلام"));
    }

    #[test]
    fn test_keyword_group_any() {
        let group = normal("{weather_rain}").keyword_group().unwrap().unwrap();
        assert_eq!(group.policy, KeywordPolicy::Any);
        assert!(group.is_satisfied_by("is there rain today"));
        assert!(!group.is_satisfied_by("sunny"));
    }

    #[test]
    fn test_keyword_group_ambiguous_is_error() {
        let err = normal("{a، b_c}").keyword_group().unwrap_err();
        assert!(matches!(err, YoozError::InvalidPatternSyntax { .. }));
    }

    #[test]
    fn test_no_keyword_group() {
        assert!(normal("hello *").keyword_group().unwrap().is_none());
        assert!(normal("} backwards {").keyword_group().unwrap().is_none());
        assert!(normal("{ }").keyword_group().unwrap().is_none());
        assert!(normal("{hello}").keyword_group().unwrap().is_none());
    }

    #[test]
    fn test_merge_appends_sequences_and_overwrites_maps() {
        let mut base = ScriptModel::default();
        base.definitions.insert("city".into(), "Tehran".into());
        base.rules.push(Rule {
            threshold: 1.0,
            trigger: "a".into(),
            response: "b".into(),
        });

        let mut next = base.clone();
        next.definitions.insert("city".into(), "Shiraz".into());
        next.maturity = Some(2.0);

        base.merge(next);
        assert_eq!(base.rules.len(), 2);
        assert_eq!(base.definitions.len(), 1);
        assert_eq!(base.definitions["city"], "Shiraz");
        assert_eq!(base.maturity, Some(2.0));
    }
}
