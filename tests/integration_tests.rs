use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use yooz::config::DEFAULT_FALLBACK_RESPONSE;
use yooz::{EngineConfig, ParseWarning, ScriptEngine, Session, Yooz, YoozError};

const SCRIPT: &str = "
Greet { سلام، درود }
#city: تهران.
{سلم} -> {سلام}
- { لطفا }
(+ &Greet - سلام! خوش آمدی)
(+ تو کجایی - من در #city هستم)
(+ چای دوست داری - بله
  (+ چرا - چون گرم است)
)
";

fn bot() -> Yooz {
    let mut bot = Yooz::with_seed(11);
    bot.parse(SCRIPT).unwrap();
    bot
}

#[test]
fn test_definition_in_response() {
    let mut bot = Yooz::with_seed(1);
    bot.parse("#city: Tehran.\n(+ where are you - I am in #city)")
        .unwrap();
    assert_eq!(bot.get_response("where are you"), "I am in Tehran");
}

#[test]
fn test_declared_variable_and_missing_variable() {
    let mut bot = Yooz::with_seed(1);
    bot.parse("=name: Ali\n(+ greet - hi =name)").unwrap();
    assert_eq!(bot.get_response("greet"), "hi Ali");

    let mut bot = Yooz::with_seed(1);
    bot.parse("(+ greet - hi =name)").unwrap();
    assert_eq!(bot.get_response("greet"), "hi {missing:name}");
}

#[test]
fn test_category_replacement_and_stopwords() {
    let mut bot = bot();
    assert_eq!(bot.get_response("درود"), "سلام! خوش آمدی");
    assert_eq!(bot.get_response("سلم"), "سلام! خوش آمدی");
    assert_eq!(bot.get_response("لطفا تو   کجایی"), "من در تهران هستم");
}

#[test]
fn test_nested_dialog_golden_transcript() {
    let mut bot = bot();
    let transcript = vec![
        ("چرا", DEFAULT_FALLBACK_RESPONSE),
        ("چای دوست داری", "بله"),
        ("چرا", "چون گرم است"),
        ("چرا", DEFAULT_FALLBACK_RESPONSE),
    ];
    for (input, expected) in transcript {
        assert_eq!(bot.get_response(input), expected, "input: {input}");
    }
    assert_eq!(bot.session().history.len(), 4);
}

#[test]
fn test_first_conditional_takes_precedence_over_later_normal() {
    let mut bot = Yooz::with_seed(3);
    bot.parse("(+ age * . [*1 > 18]: -adult !: -minor)\n(+ age * - normal)")
        .unwrap();
    assert_eq!(bot.get_response("age 25"), "adult");
    assert_eq!(bot.get_response("age 12"), "minor");
}

#[test]
fn test_continuation_chain_with_additional_response() {
    let mut bot = Yooz::with_seed(5);
    bot.parse("+ ( خداحافظ )\n(+ hello - Hi! !>)\n(+ hello - How are you?)")
        .unwrap();
    assert_eq!(bot.get_response("hello"), "Hi! How are you? خداحافظ");
}

#[test]
fn test_keyword_groups() {
    let mut bot = Yooz::with_seed(5);
    bot.parse("(+ {سلام، خوبی} - ممنون.)\n(+ {باران_برف} - چتر بردار.)")
        .unwrap();
    assert_eq!(bot.get_response("سلام خوبی"), "ممنون.");
    assert_eq!(bot.get_response("برف می آید"), "چتر بردار.");
    assert_eq!(bot.get_response("سلام"), DEFAULT_FALLBACK_RESPONSE);
}

#[test]
fn test_ambiguous_keyword_group_is_rejected() {
    let mut bot = Yooz::with_seed(5);
    let err = bot.parse("(+ {a، b_c} - x)").unwrap_err();
    assert!(matches!(err, YoozError::InvalidPatternSyntax { .. }));
}

#[test]
fn test_maturity_gates_rules() {
    let script = "{ [2] Tehran > (the capital) }\n(+ where - In Tehran now)";

    let mut young = Yooz::with_seed(1);
    young.parse(&format!("[[1]]\n{script}")).unwrap();
    assert_eq!(young.get_response("where"), "In Tehran (the capital) now");

    let mut mature = Yooz::with_seed(1);
    mature.parse(&format!("[[5]]\n{script}")).unwrap();
    assert_eq!(mature.get_response("where"), "In Tehran now");
}

#[test]
fn test_sessions_are_independent() {
    let mut engine = ScriptEngine::new(EngineConfig::default());
    engine
        .parse("(+ my name is * - ok =name:*1)\n(+ who am i - you are =name)")
        .unwrap();
    let mut rng = StdRng::seed_from_u64(9);

    let mut sara = Session::new();
    let mut reza = Session::new();
    engine.respond(&mut sara, "my name is Sara", &mut rng);
    engine.respond(&mut reza, "my name is Reza", &mut rng);
    assert_eq!(engine.respond(&mut sara, "who am i", &mut rng), "you are Sara");
    assert_eq!(engine.respond(&mut reza, "who am i", &mut rng), "you are Reza");
}

#[test]
fn test_session_survives_json() {
    let mut engine = ScriptEngine::default();
    engine.parse("(+ p - parent\n  (+ c - child)\n)").unwrap();
    let mut rng = StdRng::seed_from_u64(2);

    let mut session = Session::new();
    assert_eq!(engine.respond(&mut session, "p", &mut rng), "parent");
    let mut restored = Session::from_json(&session.to_json().unwrap()).unwrap();
    assert_eq!(engine.respond(&mut restored, "c", &mut rng), "child");
}

#[test]
fn test_reparse_is_reported() {
    let mut bot = Yooz::with_seed(1);
    bot.parse("(+ hi - hello)").unwrap();
    let report = bot.parse("(+ hi - hello)").unwrap();
    assert!(report.warnings.contains(&ParseWarning::DuplicatedEntries));
    assert_eq!(report.normal_patterns, 1);
    assert_eq!(bot.engine().model().patterns.len(), 2);
}

#[test]
fn test_custom_fallback_and_global_responses() {
    let config = EngineConfig {
        fallback_response: "?".to_string(),
        ..EngineConfig::default()
    };
    let mut bot = Yooz::with_config(config);
    bot.parse("(+ - global)").unwrap();
    assert_eq!(bot.get_response("nothing"), "?");

    let config = EngineConfig {
        use_global_responses: true,
        ..EngineConfig::default()
    };
    let mut bot = Yooz::with_config(config);
    bot.parse("(+ - global)").unwrap();
    assert_eq!(bot.get_response("nothing"), "global");
}

#[test]
fn test_reset_conversation_keeps_script() {
    let mut bot = bot();
    bot.get_response("چای دوست داری");
    bot.reset_conversation();
    assert!(bot.session().history.is_empty());
    assert_eq!(bot.get_response("چرا"), DEFAULT_FALLBACK_RESPONSE);
}
