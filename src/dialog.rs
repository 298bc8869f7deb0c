//! Per-conversation state and two-turn nested dialogs.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::compiler::PatternCompiler;
use crate::error::Result;
use crate::resolver::captured_groups;
use crate::types::{Category, NestedDialog, ScriptModel};

/// Mutable state of one conversation.
///
/// Keep one session per conversation; sessions never share state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// The most recent cleaned message
    pub last_message: String,
    /// Every cleaned message, oldest first
    pub history: Vec<String>,
    /// Variable store, seeded from the script and written by responses
    pub memory: HashMap<String, String>,
    /// Maturity level gating rule injection
    pub maturity: f64,
}

impl Session {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session seeded with a model's declared variables and maturity.
    pub fn seeded(model: &ScriptModel) -> Self {
        let mut session = Self::new();
        session.seed(model);
        session
    }

    /// Overwrites declared variables (and the maturity level, if declared).
    pub fn seed(&mut self, model: &ScriptModel) {
        self.memory
            .extend(model.variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(maturity) = model.maturity {
            self.maturity = maturity;
        }
    }

    /// Records a cleaned message as the current turn.
    pub fn record(&mut self, cleaned: &str) {
        self.last_message = cleaned.to_string();
        self.history.push(cleaned.to_string());
    }

    /// The message of the turn before the current one.
    pub fn previous_message(&self) -> Option<&str> {
        if self.history.len() < 2 {
            return None;
        }
        self.history.get(self.history.len() - 2).map(String::as_str)
    }

    /// Serializes the session.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restores a session produced by [`Session::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A nested-dialog response picked for the current turn, not yet resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedMatch {
    /// Response template
    pub template: String,
    /// Trimmed capture groups of the matching pattern
    pub captures: Vec<String>,
}

/// Looks for a nested-dialog response to `cleaned`.
///
/// `session` must already hold the current turn, so `last_message` is the
/// cleaned message itself and the parent check compares the message with
/// itself. Child patterns are only tried when the previous turn's message
/// equals the parent trigger text. Unless `evaluate_all` is set, only the
/// first declared dialog is considered.
pub fn match_nested<R: Rng + ?Sized>(
    dialogs: &[NestedDialog],
    categories: &[Category],
    compiler: &PatternCompiler,
    session: &Session,
    cleaned: &str,
    evaluate_all: bool,
    rng: &mut R,
) -> Option<NestedMatch> {
    for dialog in dialogs {
        let parent = compiler.matcher(&dialog.parent_trigger, categories);
        let parent_matches_last = parent
            .as_ref()
            .is_some_and(|regex| regex.is_match(&session.last_message));

        if parent_matches_last {
            if let Some(caps) = parent.as_ref().and_then(|regex| regex.captures(cleaned)) {
                if let Some(template) = dialog.responses.choose(rng) {
                    trace!(parent = %dialog.parent_trigger, "Nested dialog parent matched");
                    return Some(NestedMatch {
                        template: template.clone(),
                        captures: captured_groups(&caps),
                    });
                }
            }
        } else if session.previous_message() == Some(dialog.parent_trigger.as_str()) {
            for child in &dialog.children {
                let Some(regex) = compiler.matcher(&child.pattern, categories) else {
                    continue;
                };
                let Some(caps) = regex.captures(cleaned) else {
                    continue;
                };
                if let Some(template) = child.responses.choose(rng) {
                    trace!(
                        parent = %dialog.parent_trigger,
                        child = %child.pattern,
                        "Nested dialog child matched"
                    );
                    return Some(NestedMatch {
                        template: template.clone(),
                        captures: captured_groups(&caps),
                    });
                }
            }
        }

        if !evaluate_all {
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChildPattern;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn dialogs() -> Vec<NestedDialog> {
        vec![
            NestedDialog {
                parent_trigger: "p".to_string(),
                responses: vec!["parent reply".to_string()],
                children: vec![ChildPattern {
                    pattern: "c *".to_string(),
                    responses: vec!["child reply *1".to_string()],
                }],
            },
            NestedDialog {
                parent_trigger: "q".to_string(),
                responses: vec!["second parent".to_string()],
                children: vec![ChildPattern {
                    pattern: "d".to_string(),
                    responses: vec!["second child".to_string()],
                }],
            },
        ]
    }

    fn turn(
        session: &mut Session,
        compiler: &PatternCompiler,
        message: &str,
        evaluate_all: bool,
    ) -> Option<NestedMatch> {
        let mut rng = StdRng::seed_from_u64(7);
        session.record(message);
        match_nested(&dialogs(), &[], compiler, session, message, evaluate_all, &mut rng)
    }

    #[test]
    fn test_parent_then_child() {
        let compiler = PatternCompiler::new();
        let mut session = Session::new();
        let first = turn(&mut session, &compiler, "p", false).unwrap();
        assert_eq!(first.template, "parent reply");
        let second = turn(&mut session, &compiler, "c now", false).unwrap();
        assert_eq!(second.template, "child reply *1");
        assert_eq!(second.captures, vec!["now"]);
    }

    #[test]
    fn test_child_alone_never_matches() {
        let compiler = PatternCompiler::new();
        let mut session = Session::new();
        assert!(turn(&mut session, &compiler, "c now", false).is_none());
        assert!(turn(&mut session, &compiler, "hello", false).is_none());
        assert!(turn(&mut session, &compiler, "c now", false).is_none());
    }

    #[test]
    fn test_only_first_dialog_unless_configured() {
        let compiler = PatternCompiler::new();
        let mut session = Session::new();
        assert!(turn(&mut session, &compiler, "q", false).is_none());
        assert!(turn(&mut session, &compiler, "d", false).is_none());

        let mut session = Session::new();
        assert_eq!(
            turn(&mut session, &compiler, "q", true).unwrap().template,
            "second parent"
        );
        assert_eq!(
            turn(&mut session, &compiler, "d", true).unwrap().template,
            "second child"
        );
    }

    #[test]
    fn test_previous_message() {
        let mut session = Session::new();
        assert_eq!(session.previous_message(), None);
        session.record("one");
        assert_eq!(session.previous_message(), None);
        session.record("two");
        assert_eq!(session.previous_message(), Some("one"));
        assert_eq!(session.last_message, "two");
    }

    #[test]
    fn test_seed_and_json_round_trip() {
        let mut model = ScriptModel::default();
        model.variables.insert("name".into(), "Ali".into());
        model.maturity = Some(3.0);
        let mut session = Session::seeded(&model);
        session.record("hello");
        assert_eq!(session.memory["name"], "Ali");
        assert_eq!(session.maturity, 3.0);

        let restored = Session::from_json(&session.to_json().unwrap()).unwrap();
        assert_eq!(restored, session);
    }
}
