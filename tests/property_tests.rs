//! Property-based tests for deploy-credentials
//!
//! These tests verify:
//! - Strength scoring bounds and monotonicity
//! - Validator acceptance exactly matches length and deny-list rules
//! - Generator output shape over many samples
//! - Enum string round-trips

use proptest::prelude::*;
use regex::Regex;

use deploy_credentials::backends::generator::{
    GeneratorOptions, MIN_CLASSES, generate_passphrase, generate_password,
};
use deploy_credentials::strength::{self, MAX_SCORE};
use deploy_credentials::types::{ResolutionMode, SecretKind};

fn kind_strategy() -> impl Strategy<Value = SecretKind> {
    prop_oneof![
        Just(SecretKind::User),
        Just(SecretKind::Root),
        Just(SecretKind::DiskEncryption),
    ]
}

fn mode_strategy() -> impl Strategy<Value = ResolutionMode> {
    prop_oneof![
        Just(ResolutionMode::Auto),
        Just(ResolutionMode::Environment),
        Just(ResolutionMode::File),
        Just(ResolutionMode::Generate),
        Just(ResolutionMode::Interactive),
    ]
}

proptest! {
    /// Score never leaves 0..=6
    #[test]
    fn score_is_bounded(s in "\\PC{0,64}") {
        prop_assert!(strength::score(&s) <= MAX_SCORE);
        prop_assert!(strength::character_classes(&s) <= 4);
    }

    /// Appending characters never lowers the score
    #[test]
    fn score_is_monotonic_under_append(base in "[a-zA-Z0-9!@#]{0,20}", extra in "[a-zA-Z0-9!@#]{0,20}") {
        let longer = format!("{}{}", base, extra);
        prop_assert!(strength::score(&longer) >= strength::score(&base));
    }

    /// Validation accepts exactly the long-enough, non-denied values
    #[test]
    fn validate_matches_rules(s in "[a-zA-Z0-9_.!-]{0,24}", kind in kind_strategy()) {
        let long_enough = s.chars().count() >= kind.min_length();
        let accepted = strength::validate_for(&s, kind).is_ok();
        prop_assert_eq!(accepted, long_enough && !strength::is_denied(&s));
    }

    /// ResolutionMode: to_string → parse round-trip is identity
    #[test]
    fn mode_roundtrip(mode in mode_strategy()) {
        let parsed: ResolutionMode = mode.to_string().parse().expect("Should parse");
        prop_assert_eq!(mode, parsed);
    }

    /// SecretKind: serde and strum spellings agree
    #[test]
    fn kind_serde_matches_display(kind in kind_strategy()) {
        let json = serde_json::to_string(&kind).expect("Should serialize");
        prop_assert_eq!(json, format!("\"{}\"", kind));
    }

    /// Passphrases of any allowed word count have the expected shape
    #[test]
    fn passphrase_shape_for_word_counts(words in 3usize..=16) {
        let phrase = generate_passphrase(words, &GeneratorOptions::default()).expect("Should generate");
        let pattern = format!("^([A-Z][a-z]+-){{{}}}[A-Z][a-z]+[0-9]+$", words - 1);
        prop_assert!(Regex::new(&pattern).expect("valid regex").is_match(&phrase));
    }
}

#[test]
fn ten_thousand_generated_passwords_are_compliant() {
    let options = GeneratorOptions::default();
    for _ in 0..10_000 {
        let pw = generate_password(SecretKind::User, 16, &options).expect("Should generate");
        assert_eq!(pw.chars().count(), 16);
        assert!(strength::character_classes(&pw) >= MIN_CLASSES);
        assert!(!strength::is_denied(&pw));
    }
}

#[test]
fn six_word_passphrase_matches_pattern() {
    let re = Regex::new(r"^([A-Z][a-z]+-){5}[A-Z][a-z]+[0-9]+$").expect("valid regex");
    for _ in 0..200 {
        let phrase = generate_passphrase(6, &GeneratorOptions::default()).expect("Should generate");
        assert!(re.is_match(&phrase));
        assert!(phrase.chars().count() >= SecretKind::DiskEncryption.min_length());
    }
}

#[test]
fn ambiguous_characters_can_be_excluded() {
    let options = GeneratorOptions {
        exclude_ambiguous: true,
        include_special: false,
        ..GeneratorOptions::default()
    };
    for _ in 0..500 {
        let pw = generate_password(SecretKind::Root, 20, &options).expect("Should generate");
        assert!(!pw.chars().any(|c| "0O1lI".contains(c)));
        assert!(pw.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
