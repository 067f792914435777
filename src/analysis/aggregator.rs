// UserAggregator: fetch a user's recent activity, classify each item,
// summarize.
//
// Comments and submissions are fetched separately and either fetch may
// fail. One failure is tolerated as long as the other produced items; if
// nothing usable came back and a fetch failed, the outcome is a Failure
// rather than Absent, so an outage is never reported as "no activity".

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{ActivityItem, AnalysisOutcome, AnalyzedItem, UserReport};
use crate::error::FailureKind;
use crate::platform::Platform;
use crate::toxicity::ToxicityClassifier;

/// Reddit usernames are 3 to 20 characters.
const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=20;

/// Whether `name` is a well-formed Reddit username: ASCII letters, digits,
/// `_` and `-` only. The name ends up in a URL path, so anything else
/// (`/`, `.`, `?`, `#`) is rejected rather than escaped.
pub fn is_valid_username(name: &str) -> bool {
    USERNAME_LEN.contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[derive(Clone)]
pub struct UserAggregator {
    platform: Arc<dyn Platform>,
    classifier: ToxicityClassifier,
}

impl UserAggregator {
    pub fn new(platform: Arc<dyn Platform>, classifier: ToxicityClassifier) -> Self {
        Self {
            platform,
            classifier,
        }
    }

    pub fn classifier(&self) -> &ToxicityClassifier {
        &self.classifier
    }

    /// Analyze up to `max_items` comments and up to `max_items` submissions.
    pub async fn analyze(&self, username: &str, max_items: usize) -> AnalysisOutcome {
        let username = username.trim().trim_start_matches("u/");
        if username.is_empty() {
            return AnalysisOutcome::Failure(FailureKind::InvalidInput(
                "username must not be empty".to_string(),
            ));
        }
        if !is_valid_username(username) {
            warn!(username, "Rejecting malformed username");
            return AnalysisOutcome::Failure(FailureKind::InvalidInput(format!(
                "'{username}' is not a valid Reddit username \
                 (3-20 letters, digits, '_' or '-')"
            )));
        }

        let mut items = Vec::new();
        let mut fetch_errors = Vec::new();

        match self.platform.recent_comments(username, max_items).await {
            Ok(comments) => items.extend(
                comments
                    .into_iter()
                    .take(max_items)
                    .filter_map(ActivityItem::from_comment),
            ),
            Err(e) => {
                warn!(username, error = %e, "Failed to fetch comments");
                fetch_errors.push(format!("{e:#}"));
            }
        }

        match self.platform.recent_submissions(username, max_items).await {
            Ok(submissions) => items.extend(
                submissions
                    .into_iter()
                    .take(max_items)
                    .filter_map(ActivityItem::from_submission),
            ),
            Err(e) => {
                warn!(username, error = %e, "Failed to fetch submissions");
                fetch_errors.push(format!("{e:#}"));
            }
        }

        if items.is_empty() {
            if fetch_errors.is_empty() {
                debug!(username, "No activity found");
                return AnalysisOutcome::Absent;
            }
            return AnalysisOutcome::Failure(FailureKind::Platform(fetch_errors.join("; ")));
        }

        let mut analyzed = Vec::with_capacity(items.len());
        for item in items {
            let classification = self.classifier.classify(&item.body).await;
            analyzed.push(AnalyzedItem {
                item,
                classification,
            });
        }

        let report = UserReport::from_items(username, analyzed);
        info!(
            username,
            total = report.total_count,
            toxic = report.toxic_count,
            errors = report.error_count,
            "Analyzed user"
        );
        AnalysisOutcome::Report(report)
    }
}
