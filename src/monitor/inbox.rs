// InboxMonitor: the long-running poll loop.
//
// Idle: fetch unread messages, analyze each sender, deliver an alert,
// mark the message read, pause, then sleep for the poll interval.
// Backoff: a cycle whose inbox fetch fails sleeps for the retry delay and
// goes back to Idle. A message that cannot be marked read is logged and
// counted; the rest of the batch still gets handled. Nothing a cycle does can end the
// loop; only the shutdown signal does, and it is honoured at every sleep.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use super::alert::{Alert, AlertSink};
use super::backoff::{BackoffPolicy, BackoffState};
use super::shutdown::ShutdownListener;
use crate::analysis::{AnalysisOutcome, UserAggregator};
use crate::config::Config;
use crate::platform::{InboxMessage, Platform};

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub inbox_limit: usize,
    pub max_items: usize,
    pub poll_interval: Duration,
    pub message_pause: Duration,
    pub backoff: BackoffPolicy,
}

impl MonitorSettings {
    pub fn from_config(config: &Config) -> Self {
        let backoff = if config.backoff_escalate {
            BackoffPolicy::escalating(config.retry_interval, config.backoff_max)
        } else {
            BackoffPolicy::flat(config.retry_interval)
        };
        Self {
            inbox_limit: config.inbox_limit,
            max_items: config.max_items,
            poll_interval: config.poll_interval,
            message_pause: config.message_pause,
            backoff,
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleStats {
    pub fetched: usize,
    pub analyzed: usize,
    /// Toxic alerts raised.
    pub alerts: usize,
    /// Messages from anonymous senders (marked read, not analyzed).
    pub skipped: usize,
    /// Messages that could not be marked read. They come back next cycle.
    pub failed: usize,
}

pub struct InboxMonitor {
    platform: Arc<dyn Platform>,
    aggregator: UserAggregator,
    sink: Box<dyn AlertSink>,
    settings: MonitorSettings,
    backoff: BackoffState,
}

impl InboxMonitor {
    pub fn new(
        platform: Arc<dyn Platform>,
        aggregator: UserAggregator,
        sink: Box<dyn AlertSink>,
        settings: MonitorSettings,
    ) -> Self {
        let backoff = BackoffState::new(&settings.backoff);
        Self {
            platform,
            aggregator,
            sink,
            settings,
            backoff,
        }
    }

    pub fn backoff_state(&self) -> &BackoffState {
        &self.backoff
    }

    /// Run one Idle cycle without pacing cancellation.
    pub async fn run_cycle(&self) -> Result<CycleStats> {
        self.cycle(None).await
    }

    /// Poll until shutdown is triggered.
    pub async fn run_forever(&mut self, mut shutdown: ShutdownListener) {
        info!(
            poll_secs = self.settings.poll_interval.as_secs(),
            retry_secs = self.settings.backoff.base.as_secs(),
            escalate = self.settings.backoff.escalate,
            "Inbox monitor started"
        );

        while !shutdown.is_triggered() {
            let wait = match self.cycle(Some(&mut shutdown)).await {
                Ok(stats) => {
                    self.backoff.record_success(&self.settings.backoff);
                    info!(
                        fetched = stats.fetched,
                        analyzed = stats.analyzed,
                        alerts = stats.alerts,
                        skipped = stats.skipped,
                        failed = stats.failed,
                        "Cycle complete"
                    );
                    self.settings.poll_interval
                }
                Err(e) => {
                    let delay = self.backoff.record_failure(&self.settings.backoff);
                    error!(
                        error = format!("{e:#}"),
                        consecutive_failures = self.backoff.consecutive_failures,
                        retry_secs = delay.as_secs_f64(),
                        "Cycle failed, backing off"
                    );
                    delay
                }
            };

            if sleep_or_shutdown(wait, &mut shutdown).await {
                break;
            }
        }

        info!("Inbox monitor stopped");
    }

    async fn cycle(&self, mut shutdown: Option<&mut ShutdownListener>) -> Result<CycleStats> {
        let messages = self
            .platform
            .unread_messages(self.settings.inbox_limit)
            .await
            .context("Failed to fetch unread messages")?;

        let mut stats = CycleStats {
            fetched: messages.len(),
            ..Default::default()
        };
        debug!(count = messages.len(), "Fetched unread messages");

        for (i, message) in messages.iter().enumerate() {
            if i > 0 && !self.settings.message_pause.is_zero() {
                let pause = self.settings.message_pause;
                match shutdown.as_deref_mut() {
                    Some(listener) => {
                        if sleep_or_shutdown(pause, listener).await {
                            break;
                        }
                    }
                    None => tokio::time::sleep(pause).await,
                }
            }
            if let Err(e) = self.handle_message(message, &mut stats).await {
                warn!(message = %message.id, error = format!("{e:#}"), "Message handling failed");
                stats.failed += 1;
            }
        }

        Ok(stats)
    }

    async fn handle_message(&self, message: &InboxMessage, stats: &mut CycleStats) -> Result<()> {
        match message.sender() {
            Some(sender) => {
                let alert = self.analyze_sender(message, sender).await;
                stats.analyzed += 1;
                if alert.is_toxic() {
                    stats.alerts += 1;
                }
                if let Err(e) = self.sink.deliver(&alert).await {
                    warn!(message = %message.id, error = %e, "Alert delivery failed");
                }
            }
            None => {
                debug!(message = %message.id, "Anonymous sender, skipping analysis");
                stats.skipped += 1;
            }
        }

        self.platform
            .mark_read(message)
            .await
            .with_context(|| format!("Failed to mark {} read", message.id))
    }

    async fn analyze_sender(&self, message: &InboxMessage, sender: &str) -> Alert {
        let message = message.clone();
        match self.aggregator.analyze(sender, self.settings.max_items).await {
            AnalysisOutcome::Report(report) if report.toxic_count > 0 => {
                Alert::Toxic { message, report }
            }
            AnalysisOutcome::Report(report) => Alert::Clean { message, report },
            AnalysisOutcome::Absent => Alert::NoData {
                message,
                username: sender.to_string(),
            },
            AnalysisOutcome::Failure(reason) => {
                warn!(username = sender, error = %reason, "Analysis failed");
                Alert::Failed {
                    message,
                    username: sender.to_string(),
                    reason,
                }
            }
        }
    }
}

/// Sleep for `duration`; returns true if shutdown fired first.
pub async fn sleep_or_shutdown(duration: Duration, shutdown: &mut ShutdownListener) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown.notified() => true,
    }
}
