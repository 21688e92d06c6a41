//! Wake word matching tests

use sakura_companion::WakeWordMatcher;
use sakura_companion::config::{DEFAULT_IDENTITY_PROMPTS, DEFAULT_WAKE_WORDS};

fn default_matcher() -> WakeWordMatcher {
    WakeWordMatcher::new(
        DEFAULT_WAKE_WORDS.iter().map(ToString::to_string).collect(),
        DEFAULT_IDENTITY_PROMPTS.iter().map(ToString::to_string).collect(),
    )
}

#[test]
fn test_contains_iff_some_phrase_is_substring() {
    let matcher = default_matcher();
    let utterances = [
        "ok sakura what time is it",
        "OKAY SAKURA play music",
        "well, okej sakura, tell me a joke",
        "ok, sakura",
        "okay",
        "sakura",
        "",
        "   ",
    ];

    for u in utterances {
        let expected = DEFAULT_WAKE_WORDS
            .iter()
            .any(|w| u.to_lowercase().contains(w));
        assert_eq!(matcher.contains_wake_word(u), expected, "utterance: {u:?}");
    }
}

#[test]
fn test_strip_is_idempotent() {
    let matcher = default_matcher();
    let utterances = [
        "ok sakura what time is it",
        "  Okay Sakura  ",
        "ok sakura ok sakura twice",
        "no phrase here",
        "okej sakuraok sakura",
        "",
    ];

    for u in utterances {
        let once = matcher.strip_wake_word(u);
        let twice = matcher.strip_wake_word(&once);
        assert_eq!(once, twice, "utterance: {u:?}");
        assert!(!matcher.contains_wake_word(&once), "utterance: {u:?}");
    }
}

#[test]
fn test_strip_scenario() {
    let matcher = WakeWordMatcher::new(vec!["ok sakura".to_string()], Vec::new());
    assert_eq!(
        matcher.strip_wake_word("ok sakura what time is it"),
        "what time is it"
    );
}

#[test]
fn test_strip_without_phrase_only_trims() {
    let matcher = default_matcher();
    assert_eq!(matcher.strip_wake_word("  hello there  "), "hello there");
    assert_eq!(matcher.strip_wake_word("   "), "");
}

#[test]
fn test_identity_questions() {
    let matcher = default_matcher();

    assert!(matcher.is_identity_question("Who made you?"));
    assert!(matcher.is_identity_question("ok sakura, what's your purpose"));
    assert!(!matcher.is_identity_question("what time is it"));
    assert!(!matcher.is_identity_question(""));
}

#[test]
fn test_phrases_normalized() {
    let matcher = WakeWordMatcher::new(
        vec!["  Hey SAKURA ".to_string(), "   ".to_string()],
        vec![" Who Are You ".to_string()],
    );

    assert_eq!(matcher.wake_words(), &["hey sakura"]);
    assert_eq!(matcher.identity_prompts(), &["who are you"]);
}
