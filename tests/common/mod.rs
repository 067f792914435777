// Shared fakes for integration tests: an in-memory platform, a scorer that
// counts its calls, and a sink that records alerts.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use toxwatch::monitor::{Alert, AlertSink, Shutdown};
use toxwatch::platform::{Comment, InboxMessage, Platform, Submission};
use toxwatch::toxicity::keyword::KeywordScorer;
use toxwatch::toxicity::traits::{ToxicityResult, ToxicityScorer};
use toxwatch::toxicity::ToxicityClassifier;

pub fn comment(body: &str) -> Comment {
    Comment {
        body: body.to_string(),
        subreddit: "testing".to_string(),
        created_at: None,
    }
}

pub fn submission(title: &str, selftext: &str) -> Submission {
    Submission {
        title: title.to_string(),
        selftext: selftext.to_string(),
        subreddit: "testing".to_string(),
        created_at: None,
    }
}

pub fn message(id: &str, author: Option<&str>) -> InboxMessage {
    InboxMessage {
        id: id.to_string(),
        author: author.map(String::from),
        subject: "hello".to_string(),
        body: "please check me".to_string(),
        created_at: None,
    }
}

/// What the fake returns for one user.
#[derive(Clone, Default)]
pub struct UserActivity {
    pub comments: Option<Vec<Comment>>,
    pub submissions: Option<Vec<Submission>>,
}

impl UserActivity {
    pub fn with(comments: Vec<Comment>, submissions: Vec<Submission>) -> Self {
        Self {
            comments: Some(comments),
            submissions: Some(submissions),
        }
    }
}

/// In-memory platform. `None` activity lists and scripted inbox errors
/// become `Err` results.
#[derive(Default)]
pub struct FakePlatform {
    pub users: Mutex<HashMap<String, UserActivity>>,
    /// Each unread_messages call pops one entry; `Err(msg)` fails the call.
    pub inbox_script: Mutex<VecDeque<Result<Vec<InboxMessage>, String>>>,
    /// Triggered once the inbox script runs dry.
    pub shutdown_when_done: Mutex<Option<Shutdown>>,
    pub inbox_calls: AtomicUsize,
    pub marked_read: Mutex<Vec<String>>,
    pub replies: Mutex<Vec<(String, String)>>,
    /// Message ids whose mark_read call fails.
    pub fail_mark_read: Vec<String>,
}

impl FakePlatform {
    pub fn with_user(self, name: &str, activity: UserActivity) -> Self {
        self.users
            .lock()
            .unwrap()
            .insert(name.to_string(), activity);
        self
    }

    pub fn with_inbox(self, script: Vec<Result<Vec<InboxMessage>, String>>) -> Self {
        *self.inbox_script.lock().unwrap() = script.into();
        self
    }

    pub fn stop_after_script(self, shutdown: Shutdown) -> Self {
        *self.shutdown_when_done.lock().unwrap() = Some(shutdown);
        self
    }

    pub fn marked_read(&self) -> Vec<String> {
        self.marked_read.lock().unwrap().clone()
    }

    fn activity(&self, username: &str) -> UserActivity {
        self.users
            .lock()
            .unwrap()
            .get(username)
            .cloned()
            .unwrap_or_else(|| UserActivity::with(vec![], vec![]))
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn recent_comments(&self, username: &str, limit: usize) -> Result<Vec<Comment>> {
        match self.activity(username).comments {
            Some(comments) => Ok(comments.into_iter().take(limit).collect()),
            None => anyhow::bail!("comments endpoint unavailable"),
        }
    }

    async fn recent_submissions(&self, username: &str, limit: usize) -> Result<Vec<Submission>> {
        match self.activity(username).submissions {
            Some(subs) => Ok(subs.into_iter().take(limit).collect()),
            None => anyhow::bail!("submissions endpoint unavailable"),
        }
    }

    async fn unread_messages(&self, limit: usize) -> Result<Vec<InboxMessage>> {
        self.inbox_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.inbox_script.lock().unwrap().pop_front();
        match next {
            Some(Ok(messages)) => Ok(messages.into_iter().take(limit).collect()),
            Some(Err(msg)) => anyhow::bail!(msg),
            None => {
                if let Some(shutdown) = self.shutdown_when_done.lock().unwrap().as_ref() {
                    shutdown.trigger();
                }
                Ok(vec![])
            }
        }
    }

    async fn mark_read(&self, message: &InboxMessage) -> Result<()> {
        if self.fail_mark_read.contains(&message.id) {
            anyhow::bail!("mark_read rejected for {}", message.id);
        }
        self.marked_read.lock().unwrap().push(message.id.clone());
        Ok(())
    }

    async fn reply(&self, message: &InboxMessage, text: &str) -> Result<()> {
        self.replies
            .lock()
            .unwrap()
            .push((message.id.clone(), text.to_string()));
        Ok(())
    }
}

/// Keyword scorer that counts how often it is consulted.
#[derive(Default)]
pub struct CountingScorer {
    inner: KeywordScorer,
    pub calls: AtomicUsize,
}

impl CountingScorer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToxicityScorer for CountingScorer {
    async fn score_text(&self, text: &str) -> Result<ToxicityResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.score_text(text).await
    }
}

/// Fails on any text containing "explode", otherwise defers to keywords.
#[derive(Default)]
pub struct FlakyScorer {
    inner: KeywordScorer,
}

#[async_trait]
impl ToxicityScorer for FlakyScorer {
    async fn score_text(&self, text: &str) -> Result<ToxicityResult> {
        if text.contains("explode") {
            anyhow::bail!("inference crashed");
        }
        self.inner.score_text(text).await
    }
}

pub fn keyword_classifier() -> ToxicityClassifier {
    ToxicityClassifier::new(Arc::new(KeywordScorer::default()))
}

#[derive(Clone, Default)]
pub struct RecordingSink {
    pub alerts: Arc<Mutex<Vec<Alert>>>,
}

impl RecordingSink {
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn deliver(&self, alert: &Alert) -> Result<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}
