// Normalizer: strip URLs, mentions, hashtags and punctuation, lowercase,
// tokenize, drop stop words and short tokens, reduce to base forms.
//
// `normalize` never fails. The only fallible piece is pattern compilation;
// if that ever breaks we return the lightly cleaned text instead.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex_lite::Regex;
use stop_words::{get, LANGUAGE};
use tracing::debug;

use super::lemma::lemmatize;

/// Tokens this short or shorter are dropped.
const MIN_TOKEN_CHARS: usize = 3;

static URL_PATTERN: LazyLock<Result<Regex, regex_lite::Error>> =
    LazyLock::new(|| Regex::new(r"(?m)https?\S+|www\S+"));

static TAG_PATTERN: LazyLock<Result<Regex, regex_lite::Error>> =
    LazyLock::new(|| Regex::new(r"[@#]\w+"));

static STOP_WORDS: LazyLock<HashSet<String>> = LazyLock::new(|| {
    let words: Vec<String> = get(LANGUAGE::English);
    words.into_iter().map(|w| w.to_lowercase()).collect()
});

/// Normalize `text` into a space-joined sequence of base-form tokens.
///
/// Returns `""` for empty or whitespace-only input, and for input made
/// entirely of URLs, mentions, hashtags, punctuation or stop words.
pub fn normalize(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    match strip_patterns(text) {
        Ok(stripped) => reduce_tokens(&finish_light_clean(&stripped)),
        Err(e) => {
            debug!(error = %e, "Pattern compilation failed, using light clean");
            finish_light_clean(text)
        }
    }
}

fn strip_patterns(text: &str) -> Result<String, &'static regex_lite::Error> {
    let urls = URL_PATTERN.as_ref()?;
    let tags = TAG_PATTERN.as_ref()?;
    let without_urls = urls.replace_all(text, "");
    Ok(tags.replace_all(&without_urls, "").into_owned())
}

fn finish_light_clean(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    kept.to_lowercase().trim().to_string()
}

fn reduce_tokens(cleaned: &str) -> String {
    cleaned
        .split_whitespace()
        .filter(|token| token.chars().all(char::is_alphanumeric))
        .filter(|token| token.chars().count() >= MIN_TOKEN_CHARS)
        .filter(|token| !STOP_WORDS.contains(*token))
        .map(lemmatize)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_input_yield_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \n\t"), "");
    }

    #[test]
    fn urls_mentions_and_tags_only_yield_empty() {
        assert_eq!(
            normalize("https://example.com/a?b=c @someone #tag www.reddit.com"),
            ""
        );
    }

    #[test]
    fn strips_punctuation_and_lowercases() {
        let cleaned = normalize("You absolute IDIOT!!!");
        assert!(cleaned.contains("idiot"), "got {cleaned:?}");
        assert!(!cleaned.contains('!'));
        assert_eq!(cleaned, cleaned.to_lowercase());
    }

    #[test]
    fn drops_short_tokens() {
        let cleaned = normalize("ok go xy zebra");
        assert!(!cleaned.split(' ').any(|t| t.chars().count() <= 2));
        assert!(cleaned.contains("zebra"));
    }

    #[test]
    fn drops_stop_words() {
        let cleaned = normalize("the and because zebra");
        assert_eq!(cleaned, "zebra");
    }

    #[test]
    fn reduces_plurals() {
        assert_eq!(normalize("idiots zebras"), "idiot zebra");
    }

    #[test]
    fn single_spaces_between_tokens() {
        let cleaned = normalize("  zebra    giraffe\n\nelephant  ");
        assert_eq!(cleaned, "zebra giraffe elephant");
    }

    #[test]
    fn is_deterministic() {
        let text = "Check https://x.y @bob — you're all idiots, honestly #rant";
        assert_eq!(normalize(text), normalize(text));
    }

    #[test]
    fn keeps_content_words_outside_the_short_list() {
        assert_eq!(normalize("you are nothing"), "nothing");
        assert!(normalize("nobody likes you, get lost").starts_with("nobody like"));
        assert!(normalize("Thanks, that's really helpful!").contains("thank"));
    }
}
