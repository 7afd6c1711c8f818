use log::{debug, info};

use crate::config::LlmConfig;
use crate::intent::Intent;
use crate::llm_client::{CompletionClient, CompletionRequest, LlmError};
use crate::mailbox::{extract_email_address, InboxMessage};
use crate::prompts;

const CLASSIFY_TEMPERATURE: f32 = 0.3;
const CLASSIFY_MAX_TOKENS: u32 = 50;

/// Intent classification and reply drafting on top of a completion client
pub struct ReplyAssistant<C: CompletionClient> {
    client: C,
    reply_temperature: f32,
    reply_max_tokens: u32,
    trusted_senders: Vec<String>,
}

impl<C: CompletionClient> ReplyAssistant<C> {
    pub fn new(client: C, config: &LlmConfig, trusted_senders: Vec<String>) -> Self {
        ReplyAssistant {
            client,
            reply_temperature: config.reply_temperature,
            reply_max_tokens: config.reply_max_tokens,
            trusted_senders,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn is_trusted(&self, sender: &str) -> bool {
        let address = extract_email_address(sender).to_lowercase();
        self.trusted_senders
            .iter()
            .any(|trusted| address.contains(trusted.as_str()))
    }

    pub async fn classify(&self, message: &InboxMessage) -> Result<Intent, LlmError> {
        if self.is_trusted(&message.sender) {
            debug!("Sender {} is trusted, classifying as BUSINESS", message.sender);
            return Ok(Intent::Business);
        }

        let raw = self
            .client
            .complete(CompletionRequest {
                system: prompts::CLASSIFIER_SYSTEM_PROMPT.to_string(),
                prompt: prompts::classification_prompt(&message.subject, &message.body),
                temperature: CLASSIFY_TEMPERATURE,
                max_tokens: CLASSIFY_MAX_TOKENS,
            })
            .await?;

        let intent = Intent::from_label(&raw);
        if intent == Intent::Other && !raw.trim().eq_ignore_ascii_case("OTHER") {
            debug!("Unrecognised classifier output '{}', using OTHER", raw);
        }

        Ok(intent)
    }

    pub async fn generate_reply(
        &self,
        message: &InboxMessage,
        intent: Intent,
    ) -> Result<String, LlmError> {
        let template = prompts::reply_template(intent);
        debug!("Using '{}' reply template for {}", template.name, message.id);

        let reply = self
            .client
            .complete(CompletionRequest {
                system: prompts::REPLY_SYSTEM_PROMPT.to_string(),
                prompt: prompts::reply_prompt(message, intent),
                temperature: self.reply_temperature,
                max_tokens: self.reply_max_tokens,
            })
            .await?;

        info!("Generated reply for email from {}", message.sender);
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Canned {
        answer: &'static str,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl CompletionClient for Canned {
        async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
            self.seen.lock().unwrap().push(request);
            Ok(self.answer.to_string())
        }
    }

    fn config() -> LlmConfig {
        LlmConfig {
            api_key: Some("k".to_string()),
            api_url: "http://localhost".to_string(),
            model: "m".to_string(),
            timeout_secs: 1,
            reply_temperature: 0.7,
            reply_max_tokens: 500,
        }
    }

    fn message(sender: &str) -> InboxMessage {
        InboxMessage {
            id: "m1".to_string(),
            thread_id: None,
            rfc822_message_id: None,
            subject: "Hello".to_string(),
            sender: sender.to_string(),
            body: "Are you free on Monday?".to_string(),
        }
    }

    #[tokio::test]
    async fn test_classify_uses_low_temperature() {
        let assistant = ReplyAssistant::new(
            Canned { answer: "Meeting", seen: Mutex::new(Vec::new()) },
            &config(),
            Vec::new(),
        );

        let intent = assistant.classify(&message("a@example.com")).await.unwrap();
        assert_eq!(intent, Intent::Meeting);

        let seen = assistant.client().seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].temperature, CLASSIFY_TEMPERATURE);
        assert_eq!(seen[0].max_tokens, CLASSIFY_MAX_TOKENS);
        assert_eq!(seen[0].system, prompts::CLASSIFIER_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn test_trusted_sender_skips_model() {
        let assistant = ReplyAssistant::new(
            Canned { answer: "SPAM", seen: Mutex::new(Vec::new()) },
            &config(),
            vec!["boss@example.com".to_string()],
        );

        let intent = assistant
            .classify(&message("The Boss <Boss@Example.com>"))
            .await
            .unwrap();
        assert_eq!(intent, Intent::Business);
        assert!(assistant.client().seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generate_reply_uses_reply_settings() {
        let assistant = ReplyAssistant::new(
            Canned { answer: "Monday works.", seen: Mutex::new(Vec::new()) },
            &config(),
            Vec::new(),
        );

        let reply = assistant
            .generate_reply(&message("a@example.com"), Intent::Meeting)
            .await
            .unwrap();
        assert_eq!(reply, "Monday works.");

        let seen = assistant.client().seen.lock().unwrap();
        assert_eq!(seen[0].temperature, 0.7);
        assert_eq!(seen[0].max_tokens, 500);
        assert!(seen[0].prompt.contains(prompts::reply_template(Intent::Meeting).guidance));
    }
}
