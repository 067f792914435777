// Classification tests: normalizer properties and end-to-end classifier
// behavior through the public API, using the keyword oracle.

mod common;

use std::sync::Arc;

use toxwatch::text::normalize;
use toxwatch::toxicity::{Label, ToxicityClassifier};

use common::{keyword_classifier, CountingScorer, FlakyScorer};

// ============================================================
// Normalizer
// ============================================================

#[test]
fn normalize_is_deterministic() {
    let samples = [
        "",
        "Hello WORLD!!",
        "visit https://example.com/x?y=1 now @friend #blessed",
        "Ünïcödé têxt, with émojis 🎉 and numbers 12345",
        "     ",
    ];
    for text in samples {
        assert_eq!(normalize(text), normalize(text), "not deterministic for {text:?}");
    }
}

#[test]
fn normalize_empty_and_link_only() {
    assert_eq!(normalize(""), "");
    assert_eq!(normalize("http://a.b https://c.d/e www.f.g"), "");
    assert_eq!(normalize("@alice @bob #topic"), "");
}

#[test]
fn normalized_tokens_are_long_lowercase_words() {
    let cleaned = normalize("Wow!! The ABSOLUTE state of these zebras, lol. #sad @mod");
    for token in cleaned.split(' ').filter(|t| !t.is_empty()) {
        assert!(token.chars().count() > 2, "short token {token:?} in {cleaned:?}");
        assert_eq!(token, token.to_lowercase());
        assert!(token.chars().all(char::is_alphanumeric));
    }
    assert!(cleaned.contains("zebra"));
    assert!(!cleaned.contains("sad"));
    assert!(!cleaned.contains("mod"));
}

// ============================================================
// Classifier scenarios
// ============================================================

#[tokio::test]
async fn insult_is_toxic() {
    let result = keyword_classifier()
        .classify("I hate you, you stupid idiot")
        .await;
    assert_eq!(result.label, Label::Toxic);
    assert!(result.score >= 0.5, "score {}", result.score);
}

#[tokio::test]
async fn thanks_is_not_toxic() {
    let result = keyword_classifier()
        .classify("Thanks, that's really helpful!")
        .await;
    assert_eq!(result.label, Label::NonToxic);
    assert!(result.score < 0.5);
}

#[tokio::test]
async fn classifier_never_fails_on_odd_input() {
    let classifier = ToxicityClassifier::new(Arc::new(FlakyScorer::default()));
    let long = "zebra ".repeat(5_000);
    let inputs = [
        "",
        "   ",
        "!!!???",
        "https://only.a/link",
        "this will explode",
        "😀😀😀",
        long.as_str(),
    ];
    for text in inputs {
        let result = classifier.classify(text).await;
        assert!(
            (0.0..=1.0).contains(&result.score),
            "score out of range for {text:?}"
        );
        assert!(matches!(
            result.label,
            Label::Toxic | Label::NonToxic | Label::Error
        ));
    }
    assert_eq!(classifier.classify("this will explode").await.label, Label::Error);
}

#[tokio::test]
async fn empty_text_short_circuits_without_scoring() {
    let scorer = Arc::new(CountingScorer::default());
    let classifier = ToxicityClassifier::new(scorer.clone());

    let result = classifier.classify("").await;
    assert_eq!(result.label, Label::NonToxic);
    assert_eq!(result.score, 0.0);

    classifier.classify("@someone https://x.y").await;
    assert_eq!(scorer.calls(), 0);

    classifier.classify("zebra crossing").await;
    assert_eq!(scorer.calls(), 1);
}

#[tokio::test]
async fn unavailable_classifier_answers_unknown() {
    let classifier = ToxicityClassifier::unavailable();
    for text in ["I hate you, you stupid idiot", "", "hello"] {
        let result = classifier.classify(text).await;
        assert_eq!(result.label, Label::Unknown);
        assert_eq!(result.score, 0.0);
    }
}

#[tokio::test]
async fn threshold_is_configurable() {
    let strict = keyword_classifier().with_threshold(0.9);
    let result = strict.classify("I hate you, you stupid idiot").await;
    assert_eq!(result.label, Label::NonToxic);
    assert!((result.score - 0.8).abs() < 1e-9);
}
