//! The turn state machine.
//!
//! Each turn runs, in order: replacement, stopword removal, nested-dialog
//! check, keyword groups, the ordered pattern loop, and the fallback. Only the
//! nested check, a conditional pattern, or a final normal response end a turn
//! early.
//!
//! Precedence in the pattern loop is the order of [`ScriptModel::patterns`],
//! which is source order. The first conditional pattern reached ends the loop
//! whether or not it matches, so normal patterns declared after it are only
//! reachable when an earlier pattern answers first.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use regex::{NoExpand, Regex};
use tracing::{debug, trace, warn};

use crate::compiler::PatternCompiler;
use crate::condition;
use crate::config::EngineConfig;
use crate::dialog::{match_nested, Session};
use crate::error::{Result, YoozError};
use crate::extractor::{extract, ParseReport, ParseWarning};
use crate::resolver::{captured_groups, resolve};
use crate::rules;
use crate::types::{ConditionalPattern, NormalPattern, Pattern, ScriptModel};

/// A compiled script: the extracted model plus its matchers.
///
/// The engine is read-only while answering, so one engine can serve many
/// [`Session`]s.
#[derive(Debug)]
pub struct ScriptEngine {
    config: EngineConfig,
    model: ScriptModel,
    compiler: PatternCompiler,
    replacements: Vec<(Regex, String)>,
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ScriptEngine {
    /// Creates an engine with an empty model.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            model: ScriptModel::default(),
            compiler: PatternCompiler::new(),
            replacements: Vec::new(),
        }
    }

    /// Builds an engine around an already extracted model.
    pub fn from_model(config: EngineConfig, model: ScriptModel) -> Self {
        let mut engine = Self::new(config);
        engine.model = model;
        engine.rebuild();
        engine
    }

    /// Builds an engine from a model serialized with [`ScriptEngine::model_to_json`].
    pub fn from_model_json(config: EngineConfig, json: &str) -> Result<Self> {
        let model: ScriptModel = serde_json::from_str(json)?;
        Ok(Self::from_model(config, model))
    }

    /// Serializes the extracted model.
    pub fn model_to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.model)?)
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the merged model of every parsed script.
    pub fn model(&self) -> &ScriptModel {
        &self.model
    }

    /// Responses declared with an empty pattern.
    pub fn global_responses(&self) -> &[String] {
        &self.model.global_responses
    }

    /// Extracts `text` and merges it into the model.
    ///
    /// Parsing is not idempotent: sequences (categories, patterns, rules,
    /// replacements, nested dialogs) are appended again while definitions and
    /// variables are overwritten. The report flags this with
    /// [`ParseWarning::DuplicatedEntries`]. On error the model is unchanged.
    pub fn parse(&mut self, text: &str) -> Result<ParseReport> {
        let (fragment, mut warnings) = extract(text, &self.config)?;
        if !self.model.is_empty() {
            warnings.push(ParseWarning::DuplicatedEntries);
        }

        let triggers = matcher_texts(&fragment);
        let mut report = ParseReport::for_model(&fragment, warnings);
        self.model.merge(fragment);
        self.rebuild();

        for trigger in triggers {
            if let Err(e) = crate::compiler::compile(&trigger, &self.model.categories) {
                report.warnings.push(ParseWarning::UncompilablePattern {
                    pattern: trigger,
                    error: e.to_string(),
                });
            }
        }

        debug!(
            patterns = self.model.patterns.len(),
            warnings = report.warnings.len(),
            "Parsed script"
        );
        Ok(report)
    }

    /// Drops the whole model.
    pub fn reset(&mut self) {
        self.model = ScriptModel::default();
        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.compiler.invalidate();
        self.replacements = self
            .model
            .replacements
            .iter()
            .filter(|r| !r.source.is_empty())
            .filter_map(|r| {
                match Regex::new(&format!(r"\b{}\b", regex::escape(&r.source))) {
                    Ok(regex) => Some((regex, r.target.clone())),
                    Err(e) => {
                        warn!("Replacement '{}' does not compile: {}", r.source, e);
                        None
                    }
                }
            })
            .collect();
    }

    /// Applies every replacement pair, in order, on whole words.
    pub fn apply_replacements(&self, message: &str) -> String {
        let mut out = message.to_string();
        for (regex, target) in &self.replacements {
            out = regex.replace_all(&out, NoExpand(target)).into_owned();
        }
        out
    }

    /// Drops tokens equal to a stopword and rejoins with single spaces.
    pub fn strip_stopwords(&self, message: &str) -> String {
        message
            .split_whitespace()
            .filter(|word| !self.model.stopwords.iter().any(|s| s == word))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Runs one turn. Never fails: internal errors degrade to the fallback.
    pub fn respond<R: Rng + ?Sized>(
        &self,
        session: &mut Session,
        message: &str,
        rng: &mut R,
    ) -> String {
        match self.try_respond(session, message, rng) {
            Ok(response) => response,
            Err(e) => {
                warn!("Turn failed, using fallback: {}", e);
                self.fallback(rng)
            }
        }
    }

    fn try_respond<R: Rng + ?Sized>(
        &self,
        session: &mut Session,
        message: &str,
        rng: &mut R,
    ) -> Result<String> {
        let replaced = self.apply_replacements(message);
        let cleaned = self.strip_stopwords(&replaced);
        session.record(&cleaned);
        debug!(cleaned = %cleaned, turn = session.history.len(), "Turn started");

        if let Some(nested) = match_nested(
            &self.model.nested_dialogs,
            &self.model.categories,
            &self.compiler,
            session,
            &cleaned,
            self.config.evaluate_all_nested_dialogs,
            rng,
        ) {
            return Ok(self.render(&nested.template, &nested.captures, session));
        }

        let mut buffer = self.keyword_responses(&cleaned, session.maturity, rng)?;

        let mut visited: HashSet<String> = HashSet::new();
        'scan: loop {
            let mut found = false;
            for pattern in &self.model.patterns {
                let normal = match pattern {
                    Pattern::Conditional(conditional) => {
                        let answer = self.conditional_response(conditional, &cleaned, session);
                        if let Some(response) = answer {
                            return Ok(response);
                        }
                        trace!(pattern = %conditional.pattern, "Conditional pattern ended the scan");
                        break 'scan;
                    }
                    Pattern::Normal(normal) => normal,
                };

                let Some(response) = self.normal_response(normal, &cleaned, session, rng) else {
                    continue;
                };
                if !visited.insert(response.clone()) {
                    continue;
                }
                match response.strip_suffix(self.config.continuation_marker.as_str()) {
                    Some(partial) => {
                        buffer.push_str(partial.trim());
                        buffer.push(' ');
                        found = true;
                    }
                    None => {
                        buffer.push_str(&response);
                        return Ok(self.with_suffix(buffer));
                    }
                }
            }
            if !found {
                break;
            }
        }

        if buffer.trim().is_empty() {
            Ok(self.fallback(rng))
        } else {
            Ok(self.with_suffix(buffer))
        }
    }

    fn keyword_responses<R: Rng + ?Sized>(
        &self,
        cleaned: &str,
        maturity: f64,
        rng: &mut R,
    ) -> Result<String> {
        let mut buffer = String::new();
        for pattern in self.model.normal_patterns() {
            let Some(group) = pattern.keyword_group()? else {
                continue;
            };
            if !group.is_satisfied_by(cleaned) {
                continue;
            }
            let response = pattern.bot_responses.choose(rng).ok_or_else(|| {
                YoozError::General(format!("pattern '{}' has no responses", pattern.user_pattern))
            })?;
            trace!(pattern = %pattern.user_pattern, "Keyword group satisfied");
            buffer.push_str(&rules::inject(response, &self.model.rules, maturity));
            buffer.push(' ');
        }
        Ok(buffer)
    }

    fn normal_response<R: Rng + ?Sized>(
        &self,
        pattern: &NormalPattern,
        cleaned: &str,
        session: &mut Session,
        rng: &mut R,
    ) -> Option<String> {
        let regex = self
            .compiler
            .matcher(&pattern.user_pattern, &self.model.categories)?;
        let caps = regex.captures(cleaned)?;
        let template = pattern.bot_responses.choose(rng)?;
        trace!(pattern = %pattern.user_pattern, "Pattern matched");
        Some(self.render(template, &captured_groups(&caps), session))
    }

    fn conditional_response(
        &self,
        pattern: &ConditionalPattern,
        cleaned: &str,
        session: &mut Session,
    ) -> Option<String> {
        let regex = self
            .compiler
            .matcher(&pattern.pattern, &self.model.categories)?;
        let captures = captured_groups(&regex.captures(cleaned)?);

        let template = if self.holds(&pattern.main_condition, &captures, session) {
            &pattern.main_response
        } else {
            match (&pattern.optional_condition, &pattern.optional_response) {
                (Some(condition), Some(response)) if self.holds(condition, &captures, session) => {
                    response
                }
                _ => &pattern.default_response,
            }
        };
        Some(self.render(template, &captures, session))
    }

    fn holds(&self, condition: &str, captures: &[String], session: &mut Session) -> bool {
        let resolved = resolve(
            condition,
            captures,
            &mut session.memory,
            &self.model.definitions,
        );
        match condition::evaluate(&resolved) {
            Ok(value) => value,
            Err(e) => {
                warn!("Condition '{}' treated as false: {}", resolved, e);
                false
            }
        }
    }

    fn render(&self, template: &str, captures: &[String], session: &mut Session) -> String {
        let resolved = resolve(
            template,
            captures,
            &mut session.memory,
            &self.model.definitions,
        );
        rules::inject(&resolved, &self.model.rules, session.maturity)
    }

    fn with_suffix(&self, response: String) -> String {
        let response = response.trim();
        match &self.model.additional_response {
            Some(additional) => format!("{} {}", response, additional).trim().to_string(),
            None => response.to_string(),
        }
    }

    fn fallback<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let base = if self.config.use_global_responses {
            self.model.global_responses.choose(rng).cloned()
        } else {
            None
        };
        self.with_suffix(base.unwrap_or_else(|| self.config.fallback_response.clone()))
    }
}

fn matcher_texts(model: &ScriptModel) -> Vec<String> {
    let mut texts: Vec<String> = model
        .patterns
        .iter()
        .filter(|p| match p {
            Pattern::Normal(n) => !matches!(n.keyword_group(), Ok(Some(_))),
            Pattern::Conditional(_) => true,
        })
        .map(|p| p.trigger().to_string())
        .collect();
    for dialog in &model.nested_dialogs {
        texts.extend(dialog.children.iter().map(|c| c.pattern.clone()));
    }
    texts
}

/// One engine, one conversation and its random source.
///
/// This is the simplest way to run a script: `parse` it, then call
/// `get_response` once per user message.
///
/// ```rust
/// use yooz::Yooz;
///
/// let mut bot = Yooz::with_seed(1);
/// bot.parse("#city: Tehran.\n(+ where are you - I am in #city)").unwrap();
/// assert_eq!(bot.get_response("where are you"), "I am in Tehran");
/// ```
#[derive(Debug)]
pub struct Yooz {
    engine: ScriptEngine,
    session: Session,
    rng: StdRng,
}

impl Default for Yooz {
    fn default() -> Self {
        Self::new()
    }
}

impl Yooz {
    /// Creates an instance seeded from system entropy.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an instance with a custom configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            engine: ScriptEngine::new(config),
            session: Session::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// A deterministic instance for tests and replays.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            engine: ScriptEngine::default(),
            session: Session::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Parses script text and seeds the conversation with its declarations.
    pub fn parse(&mut self, text: &str) -> Result<ParseReport> {
        let report = self.engine.parse(text)?;
        self.session.seed(self.engine.model());
        Ok(report)
    }

    /// Answers one user message.
    pub fn get_response(&mut self, message: &str) -> String {
        self.engine
            .respond(&mut self.session, message, &mut self.rng)
    }

    /// Returns the underlying engine.
    pub fn engine(&self) -> &ScriptEngine {
        &self.engine
    }

    /// Returns the conversation state.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the conversation state for editing, e.g. to set the maturity level.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Starts a new conversation with the same script.
    pub fn reset_conversation(&mut self) {
        self.session = Session::seeded(self.engine.model());
    }
}
