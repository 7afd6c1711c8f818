use anyhow::{Context, Result};
use async_trait::async_trait;
use log::warn;
use regex::Regex;
use std::sync::OnceLock;

/// An unread message as seen by the agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxMessage {
    pub id: String,
    pub thread_id: Option<String>,
    pub rfc822_message_id: Option<String>,
    pub subject: String,
    pub sender: String,
    pub body: String,
}

/// Draft details used by the `--list-drafts` utility
#[derive(Debug, Clone)]
pub struct DraftSummary {
    pub draft_id: String,
    pub message_id: Option<String>,
    pub thread_id: Option<String>,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl DraftSummary {
    /// Lines printed for this draft by `--list-drafts`, `index` is 1-based
    pub fn listing_lines(&self, index: usize) -> Vec<String> {
        let body_preview: String = self.body.chars().take(100).collect();
        vec![
            format!("{}. TO: {}", index, self.to),
            format!("   SUBJECT: {}", self.subject),
            format!("   DRAFT ID: {}", self.draft_id),
            format!("   MESSAGE ID: {}", self.message_id.as_deref().unwrap_or("-")),
            format!("   THREAD ID: {}", self.thread_id.as_deref().unwrap_or("-")),
            format!("   BODY: {}...", body_preview),
        ]
    }
}

/// Mail provider capabilities consumed by the orchestration loop.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Unread messages, newest first, at most `max_count` of them
    async fn list_unread(&self, max_count: usize) -> Result<Vec<InboxMessage>>;

    /// Sends `body` as a reply to `original`, in its thread
    async fn send_reply(&self, original: &InboxMessage, body: &str) -> Result<()>;

    /// Saves `body` as a draft reply to `original`; returns the draft id
    async fn create_draft(&self, original: &InboxMessage, body: &str) -> Result<String>;

    async fn mark_as_read(&self, message_id: &str) -> Result<()>;
}

/// Parse an RFC 822 message into the fields the agent works with
pub fn parse_raw_message(id: &str, thread_id: Option<String>, raw: &[u8]) -> Result<InboxMessage> {
    let parsed = mail_parser::MessageParser::default()
        .parse(raw)
        .context("Unable to parse email")?;

    let sender = parsed
        .from()
        .and_then(|addrs| addrs.first())
        .map(|addr| match (&addr.name, &addr.address) {
            (Some(name), Some(email)) => format!("{} <{}>", name, email),
            (None, Some(email)) => email.to_string(),
            _ => "Unknown Sender".to_string(),
        })
        .unwrap_or_else(|| "Unknown Sender".to_string());

    let subject = parsed.subject().unwrap_or("No Subject").to_string();

    // body_text falls back to the HTML part converted to text
    let body = parsed
        .body_text(0)
        .map(|text| text.trim().to_string())
        .unwrap_or_else(|| {
            warn!("No readable body in message {}", id);
            String::new()
        });

    Ok(InboxMessage {
        id: id.to_string(),
        thread_id,
        rfc822_message_id: parsed.message_id().map(|m| m.to_string()),
        subject,
        sender,
        body,
    })
}

/// Parse a draft's raw content into a summary
pub fn parse_raw_draft(
    draft_id: &str,
    message_id: Option<String>,
    thread_id: Option<String>,
    raw: &[u8],
) -> Result<DraftSummary> {
    let parsed = mail_parser::MessageParser::default()
        .parse(raw)
        .context("Unable to parse draft")?;

    let to = parsed
        .to()
        .and_then(|addrs| addrs.first())
        .and_then(|addr| addr.address.as_ref().map(|a| a.to_string()))
        .unwrap_or_else(|| "Unknown Recipient".to_string());

    Ok(DraftSummary {
        draft_id: draft_id.to_string(),
        message_id,
        thread_id,
        to,
        subject: parsed.subject().unwrap_or("No Subject").to_string(),
        body: parsed
            .body_text(0)
            .map(|text| text.trim().to_string())
            .unwrap_or_default(),
    })
}

/// "Jane Doe <jane@example.com>" -> "jane@example.com"
pub fn extract_email_address(sender: &str) -> String {
    static ANGLE_ADDR: OnceLock<Regex> = OnceLock::new();
    let re = ANGLE_ADDR.get_or_init(|| Regex::new(r"<([^<>]+)>").expect("valid regex"));

    match re.captures(sender).and_then(|caps| caps.get(1)) {
        Some(addr) => addr.as_str().trim().to_string(),
        None => sender.trim().to_string(),
    }
}

pub fn reply_subject(subject: &str) -> String {
    let trimmed = subject.trim();
    if trimmed.get(..3).is_some_and(|prefix| prefix.eq_ignore_ascii_case("re:")) {
        trimmed.to_string()
    } else {
        format!("Re: {}", trimmed)
    }
}

/// Build the RFC 822 reply uploaded to Gmail for both send and draft
pub fn build_reply_rfc822(original: &InboxMessage, body: &str) -> Vec<u8> {
    let mut email_content = format!("To: {}\r\n", extract_email_address(&original.sender));
    email_content.push_str(&format!("Subject: {}\r\n", reply_subject(&original.subject)));

    if let Some(message_id) = &original.rfc822_message_id {
        email_content.push_str(&format!("In-Reply-To: <{}>\r\n", message_id));
        email_content.push_str(&format!("References: <{}>\r\n", message_id));
    }

    email_content.push_str("MIME-Version: 1.0\r\n");
    email_content.push_str("Content-Type: text/plain; charset=UTF-8\r\n\r\n");
    email_content.push_str(body);

    email_content.into_bytes()
}
