// Per-user analysis: activity items, reports, and the aggregator that
// builds them.

pub mod aggregator;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::FailureKind;
use crate::platform::{Comment, Submission, DELETED_MARKER, REMOVED_MARKER};
use crate::toxicity::{Classification, Label};

pub use aggregator::UserAggregator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Comment,
    Submission,
}

/// One post or comment authored by the user under analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityItem {
    pub kind: ItemKind,
    pub body: String,
    /// Where it was posted (the subreddit name for Reddit).
    pub source_area: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl ActivityItem {
    /// `None` for deleted, removed or empty comments.
    pub fn from_comment(comment: Comment) -> Option<Self> {
        let body = comment.body.trim();
        if is_placeholder(body) {
            return None;
        }
        Some(Self {
            kind: ItemKind::Comment,
            body: body.to_string(),
            source_area: comment.subreddit,
            created_at: comment.created_at,
        })
    }

    /// Title and body joined by a space. `None` when both are empty or the
    /// post was deleted.
    pub fn from_submission(submission: Submission) -> Option<Self> {
        let title = submission.title.trim();
        let selftext = submission.selftext.trim();
        let selftext = if is_placeholder(selftext) { "" } else { selftext };
        let body = match (title.is_empty(), selftext.is_empty()) {
            (true, true) => return None,
            (false, true) => title.to_string(),
            (true, false) => selftext.to_string(),
            (false, false) => format!("{title} {selftext}"),
        };
        if is_placeholder(&body) {
            return None;
        }
        Some(Self {
            kind: ItemKind::Submission,
            body,
            source_area: submission.subreddit,
            created_at: submission.created_at,
        })
    }
}

fn is_placeholder(text: &str) -> bool {
    text.is_empty() || text == DELETED_MARKER || text == REMOVED_MARKER
}

/// An activity item with its classification attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzedItem {
    #[serde(flatten)]
    pub item: ActivityItem,
    #[serde(flatten)]
    pub classification: Classification,
}

/// Aggregate toxicity for one user.
///
/// `toxic_items` holds every Toxic item in fetch order, so
/// `toxic_count == toxic_items.len()` always.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserReport {
    pub username: String,
    pub total_count: usize,
    pub toxic_count: usize,
    /// Items whose classification failed (label Error).
    pub error_count: usize,
    pub toxic_items: Vec<AnalyzedItem>,
}

impl UserReport {
    pub fn from_items(username: &str, items: Vec<AnalyzedItem>) -> Self {
        let total_count = items.len();
        let error_count = items
            .iter()
            .filter(|i| i.classification.label == Label::Error)
            .count();
        let toxic_items: Vec<AnalyzedItem> = items
            .into_iter()
            .filter(|i| i.classification.is_toxic())
            .collect();

        Self {
            username: username.to_string(),
            total_count,
            toxic_count: toxic_items.len(),
            error_count,
            toxic_items,
        }
    }

    /// `toxic_count / total_count`, or `None` when nothing was analyzed.
    pub fn toxicity_rate(&self) -> Option<f64> {
        (self.total_count > 0).then(|| self.toxic_count as f64 / self.total_count as f64)
    }

    /// The `n` highest-scoring toxic items. Equal scores keep fetch order.
    pub fn top_toxic(&self, n: usize) -> Vec<&AnalyzedItem> {
        let mut ranked: Vec<&AnalyzedItem> = self.toxic_items.iter().collect();
        ranked.sort_by(|a, b| b.classification.score.total_cmp(&a.classification.score));
        ranked.truncate(n);
        ranked
    }
}

/// Result of analyzing a user. "No data" and "failed" are distinct from
/// a clean report and from each other.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Report(UserReport),
    /// Nothing to analyze: the user has no (non-deleted) activity.
    Absent,
    Failure(FailureKind),
}

impl AnalysisOutcome {
    pub fn report(&self) -> Option<&UserReport> {
        match self {
            AnalysisOutcome::Report(report) => Some(report),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzed(body: &str, label: Label, score: f64) -> AnalyzedItem {
        AnalyzedItem {
            item: ActivityItem {
                kind: ItemKind::Comment,
                body: body.to_string(),
                source_area: "test".to_string(),
                created_at: None,
            },
            classification: Classification::new(label, score),
        }
    }

    #[test]
    fn report_counts_match_labels() {
        let report = UserReport::from_items(
            "alice",
            vec![
                analyzed("a", Label::Toxic, 0.7),
                analyzed("b", Label::NonToxic, 0.1),
                analyzed("c", Label::Error, 0.0),
                analyzed("d", Label::Toxic, 0.9),
            ],
        );
        assert_eq!(report.total_count, 4);
        assert_eq!(report.toxic_count, 2);
        assert_eq!(report.error_count, 1);
        let bodies: Vec<&str> = report.toxic_items.iter().map(|i| i.item.body.as_str()).collect();
        assert_eq!(bodies, ["a", "d"]);
        assert_eq!(report.toxicity_rate(), Some(0.5));
    }

    #[test]
    fn rate_is_undefined_for_empty_report() {
        let report = UserReport::from_items("nobody", vec![]);
        assert_eq!(report.toxicity_rate(), None);
    }

    #[test]
    fn top_toxic_ranks_by_score_and_keeps_ties_stable() {
        let report = UserReport::from_items(
            "bob",
            vec![
                analyzed("first", Label::Toxic, 0.8),
                analyzed("second", Label::Toxic, 0.95),
                analyzed("third", Label::Toxic, 0.8),
                analyzed("fourth", Label::Toxic, 0.6),
            ],
        );
        let top: Vec<&str> = report
            .top_toxic(3)
            .iter()
            .map(|i| i.item.body.as_str())
            .collect();
        assert_eq!(top, ["second", "first", "third"]);
    }

    #[test]
    fn deleted_items_are_filtered() {
        let deleted = Comment {
            body: "[deleted]".into(),
            subreddit: "x".into(),
            created_at: None,
        };
        assert!(ActivityItem::from_comment(deleted).is_none());

        let removed_post = Submission {
            title: "".into(),
            selftext: "[removed]".into(),
            subreddit: "x".into(),
            created_at: None,
        };
        assert!(ActivityItem::from_submission(removed_post).is_none());
    }

    #[test]
    fn submission_text_joins_title_and_body() {
        let post = Submission {
            title: "Question".into(),
            selftext: "why though".into(),
            subreddit: "x".into(),
            created_at: None,
        };
        let item = ActivityItem::from_submission(post).unwrap();
        assert_eq!(item.body, "Question why though");
        assert_eq!(item.kind, ItemKind::Submission);

        let link_post = Submission {
            title: "Look at this".into(),
            selftext: "[deleted]".into(),
            subreddit: "x".into(),
            created_at: None,
        };
        assert_eq!(ActivityItem::from_submission(link_post).unwrap().body, "Look at this");
    }
}
