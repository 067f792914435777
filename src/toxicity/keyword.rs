// Keyword scorer: a fixed word list standing in for a real model.
//
// Useful for development, demos and tests where the ONNX model isn't
// downloaded. Scores are coarse: one value for a hit, one for a miss.

use anyhow::Result;
use async_trait::async_trait;

use super::traits::{ToxicityResult, ToxicityScorer};

pub const DEFAULT_KEYWORDS: &[&str] = &["hate", "stupid", "idiot", "kill", "die", "fuck"];

pub const HIT_SCORE: f64 = 0.8;
pub const MISS_SCORE: f64 = 0.2;

/// Keywords shorter than this only match whole tokens ("die" must not
/// match "diet"); longer ones also match as a prefix ("idiot" in "idiotic").
const PREFIX_MATCH_MIN_CHARS: usize = 4;

pub struct KeywordScorer {
    keywords: Vec<String>,
}

impl KeywordScorer {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .collect(),
        }
    }

    fn matches(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .any(|token| {
                self.keywords.iter().any(|kw| {
                    token == kw
                        || (kw.chars().count() >= PREFIX_MATCH_MIN_CHARS && token.starts_with(kw))
                })
            })
    }
}

impl Default for KeywordScorer {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS)
    }
}

#[async_trait]
impl ToxicityScorer for KeywordScorer {
    async fn score_text(&self, text: &str) -> Result<ToxicityResult> {
        let score = if self.matches(text) { HIT_SCORE } else { MISS_SCORE };
        Ok(ToxicityResult::overall(score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hit_and_miss_scores() {
        let scorer = KeywordScorer::default();
        let hit = scorer.score_text("hate stupid idiot").await.unwrap();
        let miss = scorer.score_text("thanks really helpful").await.unwrap();
        assert_eq!(hit.toxicity, HIT_SCORE);
        assert_eq!(miss.toxicity, MISS_SCORE);
    }

    #[test]
    fn short_keywords_need_whole_tokens() {
        let scorer = KeywordScorer::default();
        assert!(scorer.matches("you should die"));
        assert!(!scorer.matches("my diet is going well"));
        assert!(!scorer.matches("skill issue"));
    }

    #[test]
    fn long_keywords_match_inflections() {
        let scorer = KeywordScorer::default();
        assert!(scorer.matches("that was idiotic"));
        assert!(scorer.matches("STUPIDITY everywhere"));
    }

    #[test]
    fn custom_word_list() {
        let scorer = KeywordScorer::new(["Rude"]);
        assert!(scorer.matches("so rude"));
        assert!(!scorer.matches("hate"));
    }
}
