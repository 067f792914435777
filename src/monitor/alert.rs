// Alerts raised by the inbox monitor and the sinks that deliver them.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::analysis::UserReport;
use crate::error::FailureKind;
use crate::output::{terminal, truncate_chars};
use crate::platform::{InboxMessage, Platform};

/// Toxic items listed in an alert.
pub const TOP_ALERT_ITEMS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    Toxic {
        message: InboxMessage,
        report: UserReport,
    },
    Clean {
        message: InboxMessage,
        report: UserReport,
    },
    /// The sender has no activity to analyze.
    NoData {
        message: InboxMessage,
        username: String,
    },
    Failed {
        message: InboxMessage,
        username: String,
        reason: FailureKind,
    },
}

impl Alert {
    pub fn message(&self) -> &InboxMessage {
        match self {
            Alert::Toxic { message, .. }
            | Alert::Clean { message, .. }
            | Alert::NoData { message, .. }
            | Alert::Failed { message, .. } => message,
        }
    }

    pub fn is_toxic(&self) -> bool {
        matches!(self, Alert::Toxic { .. })
    }

    /// Plain-text verdict, suitable for a reply. `None` for failures, which
    /// are operator business and not something to tell the sender.
    pub fn reply_text(&self) -> Option<String> {
        match self {
            Alert::Toxic { report, .. } => {
                let mut text = format!(
                    "Toxicity check for u/{}: {} of {} recent items look toxic.\n",
                    report.username, report.toxic_count, report.total_count
                );
                for item in report.top_toxic(TOP_ALERT_ITEMS) {
                    text.push_str(&format!(
                        "\n* [{:.2}] {}",
                        item.classification.score,
                        truncate_chars(&item.item.body, 200)
                    ));
                }
                Some(text)
            }
            Alert::Clean { report, .. } => Some(format!(
                "Toxicity check for u/{}: none of {} recent items look toxic.",
                report.username, report.total_count
            )),
            Alert::NoData { username, .. } => Some(format!(
                "Toxicity check for u/{username}: no recent activity to analyze."
            )),
            Alert::Failed { .. } => None,
        }
    }
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, alert: &Alert) -> Result<()>;
}

/// Prints alerts to stdout.
pub struct TerminalSink;

#[async_trait]
impl AlertSink for TerminalSink {
    async fn deliver(&self, alert: &Alert) -> Result<()> {
        terminal::display_alert(alert);
        Ok(())
    }
}

/// Replies to the triggering message with the verdict.
pub struct ReplySink {
    platform: Arc<dyn Platform>,
}

impl ReplySink {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl AlertSink for ReplySink {
    async fn deliver(&self, alert: &Alert) -> Result<()> {
        match alert.reply_text() {
            Some(text) => self.platform.reply(alert.message(), &text).await,
            None => Ok(()),
        }
    }
}

/// Delivers to every inner sink. A failing sink is logged and does not
/// stop the others, and never fails the caller.
pub struct FanoutSink {
    sinks: Vec<Box<dyn AlertSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Box<dyn AlertSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl AlertSink for FanoutSink {
    async fn deliver(&self, alert: &Alert) -> Result<()> {
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(alert).await {
                warn!(message = %alert.message().id, error = %e, "Alert delivery failed");
            }
        }
        Ok(())
    }
}
