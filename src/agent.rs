use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::assistant::ReplyAssistant;
use crate::intent::Intent;
use crate::llm_client::CompletionClient;
use crate::mailbox::{InboxMessage, MessageSource};
use crate::tracker::ProcessingTracker;

/// How a generated reply reaches the mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Send immediately and mark the original as read
    Auto,
    /// Save as a draft for manual review
    Draft,
}

impl DeliveryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryMode::Auto => "auto",
            DeliveryMode::Draft => "draft",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub mode: DeliveryMode,
    pub dry_run: bool,
    pub max_messages: usize,
    pub pause_between_messages: Duration,
    pub skip_spam: bool,
}

/// Counters for one polling cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub new: usize,
    pub delivered: usize,
    pub skipped_spam: usize,
    pub failed: usize,
}

enum Outcome {
    Delivered,
    DryRun,
    SkippedSpam,
}

/// Drives polling cycles: fetch, filter, classify, generate, deliver, track.
pub struct Agent<S: MessageSource, C: CompletionClient> {
    source: S,
    assistant: ReplyAssistant<C>,
    tracker: ProcessingTracker,
    settings: RunSettings,
}

impl<S: MessageSource, C: CompletionClient> Agent<S, C> {
    pub fn new(
        source: S,
        assistant: ReplyAssistant<C>,
        tracker: ProcessingTracker,
        settings: RunSettings,
    ) -> Self {
        info!(
            "Initializing Gmail AI agent (mode: {}, dry-run: {}, {} message(s) already tracked)",
            settings.mode.as_str(),
            settings.dry_run,
            tracker.len()
        );

        Agent {
            source,
            assistant,
            tracker,
            settings,
        }
    }

    pub fn tracker(&self) -> &ProcessingTracker {
        &self.tracker
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn assistant(&self) -> &ReplyAssistant<C> {
        &self.assistant
    }

    /// One polling cycle. A failing fetch aborts the cycle with an error;
    /// failures on individual messages are logged and counted.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        let unread = self
            .source
            .list_unread(self.settings.max_messages)
            .await
            .context("Unable to fetch unread messages")?;
        report.fetched = unread.len();

        let new_messages = self.tracker.filter_new(unread);
        report.new = new_messages.len();

        if new_messages.is_empty() {
            info!("No new unread messages found");
            return Ok(report);
        }

        info!(
            "Found {} new message(s) out of {} unread",
            report.new, report.fetched
        );

        let total = new_messages.len();
        for (index, message) in new_messages.iter().enumerate() {
            info!(
                "📧 Email {}/{} from {} (ID: {})",
                index + 1,
                total,
                message.sender,
                message.id
            );

            match self.process_message(message).await {
                Ok(Outcome::Delivered) => report.delivered += 1,
                Ok(Outcome::DryRun) => {}
                Ok(Outcome::SkippedSpam) => report.skipped_spam += 1,
                Err(e) => {
                    report.failed += 1;
                    error!("Error processing email {}: {:#}", message.id, e);
                }
            }

            if index + 1 < total && !self.settings.pause_between_messages.is_zero() {
                tokio::time::sleep(self.settings.pause_between_messages).await;
            }
        }

        info!(
            "Processing completed: {} delivered, {} spam skipped, {} failed out of {} new",
            report.delivered, report.skipped_spam, report.failed, report.new
        );

        Ok(report)
    }

    async fn process_message(&mut self, message: &InboxMessage) -> Result<Outcome> {
        let intent = self
            .assistant
            .classify(message)
            .await
            .context("Intent classification failed")?;
        info!("Email intent: {}", intent);

        if intent == Intent::Spam && self.settings.skip_spam {
            info!("Skipping spam email {}", message.id);
            if !self.settings.dry_run {
                self.track(&message.id);
            }
            return Ok(Outcome::SkippedSpam);
        }

        let reply = self
            .assistant
            .generate_reply(message, intent)
            .await
            .context("Reply generation failed")?;
        debug!("Generated reply: {}", preview(&reply, 100));

        if self.settings.dry_run {
            log_reply_details(message, &reply, intent, self.settings.mode);
            return Ok(Outcome::DryRun);
        }

        match self.settings.mode {
            DeliveryMode::Auto => {
                self.source
                    .send_reply(message, &reply)
                    .await
                    .context("Unable to send reply")?;

                // The reply is out; tracking must not depend on the label change
                if let Err(e) = self.source.mark_as_read(&message.id).await {
                    warn!("Reply sent but unable to mark {} as read: {:#}", message.id, e);
                }
            }
            DeliveryMode::Draft => {
                self.source
                    .create_draft(message, &reply)
                    .await
                    .context("Unable to save draft")?;
            }
        }

        self.track(&message.id);
        Ok(Outcome::Delivered)
    }

    fn track(&mut self, message_id: &str) {
        self.tracker.mark_processed(message_id);
        if let Err(e) = self.tracker.persist() {
            error!("Could not save processed messages: {:#}", e);
        }
    }

    /// Run cycles until `cancel` fires, sleeping `interval` between them.
    /// Cancellation during a cycle drops it; the current message stays
    /// untracked and is offered again next time.
    pub async fn monitor(&mut self, interval: Duration, cancel: &CancellationToken) -> Result<()> {
        info!(
            "🔄 Starting continuous monitoring in {} mode (checking every {:?})",
            self.settings.mode.as_str(),
            interval
        );

        while !cancel.is_cancelled() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.run_cycle() => {
                    if let Err(e) = result {
                        error!("❌ Polling cycle failed: {:#}", e);
                        warn!("⚠️  Will retry at next interval");
                    }
                }
            }

            info!("Sleeping for {:?}...", interval);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("Monitoring stopped");
        self.shutdown()
    }

    /// Flush tracker state that has not reached disk yet
    pub fn shutdown(&mut self) -> Result<()> {
        if self.tracker.has_unsaved_changes() {
            self.tracker
                .persist()
                .context("Unable to save processed messages on shutdown")?;
        }
        Ok(())
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

fn log_reply_details(message: &InboxMessage, reply: &str, intent: Intent, mode: DeliveryMode) {
    info!("🧪 DRY RUN MODE - Reply not sent/saved");
    info!("{}", "=".repeat(80));
    info!("MODE: {}", mode.as_str().to_uppercase());
    info!("FROM: {}", message.sender);
    info!("SUBJECT: {}", message.subject);
    info!("INTENT: {}", intent);
    info!("ORIGINAL MESSAGE:\n{}", preview(&message.body, 200));
    info!("GENERATED REPLY:\n{}", reply);
    info!("{}", "=".repeat(80));
}
