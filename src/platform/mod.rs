// Platform collaborator: where user activity and inbox messages come from.
//
// The core never talks HTTP itself. UserAggregator and InboxMonitor hold a
// `dyn Platform`, RedditClient is the production implementation, and tests
// plug in in-memory fakes. Every method may fail independently.

pub mod rate_limiter;
pub mod reddit;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use reddit::RedditClient;

/// Body text the platform substitutes for deleted content.
pub const DELETED_MARKER: &str = "[deleted]";
/// Body text the platform substitutes for moderator-removed content.
pub const REMOVED_MARKER: &str = "[removed]";

/// A comment authored by the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub body: String,
    pub subreddit: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// A submission (post) authored by the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub title: String,
    pub selftext: String,
    pub subreddit: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// An unread inbox message.
#[derive(Debug, Clone, PartialEq)]
pub struct InboxMessage {
    /// Platform fullname (e.g. `t4_abc123`), used to mark read and reply.
    pub id: String,
    /// `None` when the platform reports no author (system messages).
    pub author: Option<String>,
    pub subject: String,
    pub body: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl InboxMessage {
    /// The sender to analyze, or `None` if the message is anonymous.
    pub fn sender(&self) -> Option<&str> {
        self.author
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty() && *a != DELETED_MARKER)
    }
}

#[async_trait]
pub trait Platform: Send + Sync {
    /// Up to `limit` of the user's most recent comments, newest first.
    async fn recent_comments(&self, username: &str, limit: usize) -> Result<Vec<Comment>>;

    /// Up to `limit` of the user's most recent submissions, newest first.
    async fn recent_submissions(&self, username: &str, limit: usize) -> Result<Vec<Submission>>;

    /// Up to `limit` unread inbox messages.
    async fn unread_messages(&self, limit: usize) -> Result<Vec<InboxMessage>>;

    async fn mark_read(&self, message: &InboxMessage) -> Result<()>;

    /// Reply to a message. Platforms without write access may refuse.
    async fn reply(&self, message: &InboxMessage, text: &str) -> Result<()> {
        let _ = (message, text);
        anyhow::bail!("Replying is not supported by this platform")
    }
}
