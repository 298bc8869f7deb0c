//! # Yooz
//!
//! A scripted conversational engine. Authors describe a bot in a small
//! Persian-friendly script language (patterns, categories, definitions,
//! replacements, stopwords, conditional and nested dialogs, maturity-gated
//! rules) and the engine answers user messages from it. No model or network
//! is involved; every answer comes from the script.
//!
//! ## Features
//!
//! - Script extraction into a serializable [`ScriptModel`]
//! - Anchored pattern matching with wildcards and `&Category` alternations
//! - Response templates with captures (`*1`), variables (`=name`) and
//!   definitions (`#key`)
//! - Continuation responses (`!>`) chained within a single turn
//! - Two-turn nested dialogs and keyword groups
//! - Restricted, side-effect free condition evaluation
//! - Per-conversation [`Session`] state, independent of the compiled script
//!
//! ## Example
//!
//! ```rust
//! use yooz::Yooz;
//!
//! let mut bot = Yooz::with_seed(7);
//! bot.parse("=name: Ali\n(+ hi - hello =name)").unwrap();
//! assert_eq!(bot.get_response("hi"), "hello Ali");
//! ```
//!
//! Several conversations can share one compiled script:
//!
//! ```rust
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use yooz::{EngineConfig, ScriptEngine, Session};
//!
//! let mut engine = ScriptEngine::new(EngineConfig::default());
//! engine.parse("(+ ping - pong)").unwrap();
//!
//! let mut rng = StdRng::seed_from_u64(1);
//! let mut alice = Session::seeded(engine.model());
//! let mut bob = Session::seeded(engine.model());
//! assert_eq!(engine.respond(&mut alice, "ping", &mut rng), "pong");
//! assert_eq!(engine.respond(&mut bob, "ping", &mut rng), "pong");
//! ```

#![warn(missing_docs)]

pub mod compiler;
pub mod condition;
pub mod config;
pub mod dialog;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod resolver;
pub mod rules;
pub mod types;

pub use config::EngineConfig;
pub use dialog::Session;
pub use engine::{ScriptEngine, Yooz};
pub use error::{Result, YoozError};
pub use extractor::{ParseReport, ParseWarning};
pub use types::{
    Category, ChildPattern, ConditionalPattern, KeywordGroup, KeywordPolicy, NestedDialog,
    NormalPattern, Pattern, Replacement, Rule, ScriptModel,
};

/// Crate version, as declared in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
