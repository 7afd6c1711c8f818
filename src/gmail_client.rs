use anyhow::{Context, Result};
use async_trait::async_trait;
use google_gmail1::api::{Draft, Message, ModifyMessageRequest, Scope};
use google_gmail1::{hyper, hyper_rustls, Gmail};
use log::{debug, info, warn};
use std::io::Cursor;
use yup_oauth2 as oauth2;

use crate::config::GmailConfig;
use crate::mailbox::{self, DraftSummary, InboxMessage, MessageSource};

const USER_ID: &str = "me";

pub struct GmailClient {
    hub: Gmail<hyper_rustls::HttpsConnector<hyper::client::HttpConnector>>,
    query: String,
}

impl GmailClient {
    pub async fn new(config: &GmailConfig) -> Result<Self> {
        info!("Connecting to Gmail API via OAuth2");

        // Read OAuth2 client credentials from file
        let secret = oauth2::read_application_secret(&config.credentials_path)
            .await
            .context("Unable to read OAuth2 client credentials file")?;

        // Scope::Modify covers reading, sending, drafts and label changes
        let auth = oauth2::InstalledFlowAuthenticator::builder(
            secret,
            oauth2::InstalledFlowReturnMethod::HTTPRedirect,
        )
        .persist_tokens_to_disk(&config.token_cache_path)
        .build()
        .await
        .context("Unable to create OAuth2 authenticator")?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()?
            .https_or_http()
            .enable_http1()
            .build();

        let client = hyper::Client::builder().build(connector);
        let hub = Gmail::new(client, auth);

        info!("✅ Gmail API connection established successfully");

        Ok(GmailClient {
            hub,
            query: config.query.clone(),
        })
    }

    /// Restrict listings to messages received after `epoch_secs`
    pub fn only_after(&mut self, epoch_secs: i64) {
        self.query = format!("{} after:{}", self.query, epoch_secs);
        debug!("Search criteria: {}", self.query);
    }

    pub async fn fetch_message(&self, message_id: &str) -> Result<InboxMessage> {
        debug!("Complete email retrieval for ID: {}", message_id);

        let (_, message) = self
            .hub
            .users()
            .messages_get(USER_ID, message_id)
            .format("raw")
            .add_scope(Scope::Modify)
            .doit()
            .await
            .context("Unable to retrieve email")?;

        // Raw content is already decoded by the Gmail API (RFC822 format)
        let raw = message.raw.context("No raw content in email")?;
        debug!("Email retrieved, size: {} bytes", raw.len());

        mailbox::parse_raw_message(message_id, message.thread_id, &raw)
    }

    pub async fn list_drafts(&self, max_results: u32) -> Result<Vec<DraftSummary>> {
        info!("Retrieving Gmail drafts");

        let (_, result) = self
            .hub
            .users()
            .drafts_list(USER_ID)
            .max_results(max_results)
            .add_scope(Scope::Modify)
            .doit()
            .await
            .context("Unable to list drafts")?;

        let mut drafts = Vec::new();
        for draft_id in result.drafts.unwrap_or_default().into_iter().filter_map(|d| d.id) {
            match self.fetch_draft(&draft_id).await {
                Ok(draft) => drafts.push(draft),
                Err(e) => warn!("Error getting draft {}: {:#}", draft_id, e),
            }
        }

        info!("Retrieved {} draft(s)", drafts.len());
        Ok(drafts)
    }

    async fn fetch_draft(&self, draft_id: &str) -> Result<DraftSummary> {
        let (_, draft) = self
            .hub
            .users()
            .drafts_get(USER_ID, draft_id)
            .format("raw")
            .add_scope(Scope::Modify)
            .doit()
            .await
            .context("Unable to retrieve draft")?;

        let message = draft.message.context("Draft has no message")?;
        let raw = message.raw.context("No raw content in draft")?;

        mailbox::parse_raw_draft(draft_id, message.id, message.thread_id, &raw)
    }

    fn rfc822() -> Result<mime::Mime> {
        "message/rfc822"
            .parse()
            .context("Invalid MIME type for RFC822 upload")
    }
}

/// Gmail takes a u32 page size; saturate rather than wrap
fn page_size(max_count: usize) -> u32 {
    u32::try_from(max_count).unwrap_or(u32::MAX)
}

#[async_trait]
impl MessageSource for GmailClient {
    async fn list_unread(&self, max_count: usize) -> Result<Vec<InboxMessage>> {
        info!("Searching for emails matching '{}'", self.query);

        let (_, result) = self
            .hub
            .users()
            .messages_list(USER_ID)
            .q(&self.query)
            .max_results(page_size(max_count))
            .add_scope(Scope::Modify)
            .doit()
            .await
            .context("Error searching for emails")?;

        let message_ids: Vec<String> = result
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg| msg.id)
            .collect();

        let mut messages = Vec::with_capacity(message_ids.len());
        for message_id in &message_ids {
            match self.fetch_message(message_id).await {
                Ok(message) => messages.push(message),
                Err(e) => warn!("Skipping email {}: {:#}", message_id, e),
            }
        }

        info!("Retrieved {} unread email(s)", messages.len());
        Ok(messages)
    }

    async fn send_reply(&self, original: &InboxMessage, body: &str) -> Result<()> {
        let metadata = Message {
            thread_id: original.thread_id.clone(),
            ..Default::default()
        };
        let reader = Cursor::new(mailbox::build_reply_rfc822(original, body));

        let (_, sent) = self
            .hub
            .users()
            .messages_send(metadata, USER_ID)
            .add_scope(Scope::Modify)
            .upload(reader, Self::rfc822()?)
            .await
            .context("Unable to send reply")?;

        info!(
            "✅ Reply sent to {} (message ID: {})",
            mailbox::extract_email_address(&original.sender),
            sent.id.unwrap_or_default()
        );
        Ok(())
    }

    async fn create_draft(&self, original: &InboxMessage, body: &str) -> Result<String> {
        let draft = Draft {
            message: Some(Message {
                thread_id: original.thread_id.clone(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let reader = Cursor::new(mailbox::build_reply_rfc822(original, body));

        let (_, created) = self
            .hub
            .users()
            .drafts_create(draft, USER_ID)
            .add_scope(Scope::Modify)
            .upload(reader, Self::rfc822()?)
            .await
            .context("Unable to create draft")?;

        let draft_id = created.id.unwrap_or_default();
        info!(
            "✅ Draft saved for {} (draft ID: {})",
            mailbox::extract_email_address(&original.sender),
            draft_id
        );
        Ok(draft_id)
    }

    async fn mark_as_read(&self, message_id: &str) -> Result<()> {
        let modify_request = ModifyMessageRequest {
            remove_label_ids: Some(vec!["UNREAD".to_string()]),
            ..Default::default()
        };

        self.hub
            .users()
            .messages_modify(modify_request, USER_ID, message_id)
            .add_scope(Scope::Modify)
            .doit()
            .await
            .context("Unable to modify email labels")?;

        info!("Message {} marked as read", message_id);
        Ok(())
    }
}
