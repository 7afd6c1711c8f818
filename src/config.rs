use anyhow::Result;
use log::warn;
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub gmail: GmailConfig,
    pub llm: LlmConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GmailConfig {
    pub credentials_path: String,
    pub token_cache_path: String,
    pub query: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub reply_temperature: f32,
    pub reply_max_tokens: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub max_emails: usize,
    pub history_path: String,
    pub message_delay_secs: u64,
    pub skip_spam: bool,
    pub trusted_senders: Vec<String>, // lowercase addresses or fragments
    pub only_new_since_start: bool,
}

impl Config {
    pub fn new() -> Result<Self> {
        Ok(Config {
            gmail: GmailConfig {
                credentials_path: std::env::var("GMAIL_CREDENTIALS_PATH")
                    .unwrap_or_else(|_| "config/credentials.json".to_string()),
                token_cache_path: std::env::var("GMAIL_TOKEN_PATH")
                    .unwrap_or_else(|_| "config/token.json".to_string()),
                query: std::env::var("GMAIL_QUERY")
                    .unwrap_or_else(|_| "is:unread".to_string()),
            },
            llm: LlmConfig {
                api_key: std::env::var("GROQ_API_KEY")
                    .ok()
                    .filter(|key| !key.trim().is_empty()),
                api_url: std::env::var("GROQ_API_URL").unwrap_or_else(|_| {
                    "https://api.groq.com/openai/v1/chat/completions".to_string()
                }),
                model: std::env::var("GROQ_MODEL")
                    .unwrap_or_else(|_| "llama-3.1-8b-instant".to_string()),
                timeout_secs: env_or("GROQ_TIMEOUT_SECS", 30),
                reply_temperature: env_or("REPLY_TEMPERATURE", 0.7),
                reply_max_tokens: env_or("REPLY_MAX_TOKENS", 500),
            },
            agent: AgentConfig {
                max_emails: env_or("MAX_EMAILS_TO_PROCESS", 10),
                history_path: std::env::var("PROCESSED_HISTORY_PATH")
                    .unwrap_or_else(|_| "processed_messages.json".to_string()),
                message_delay_secs: env_or("MESSAGE_DELAY_SECS", 2),
                skip_spam: env_or("SKIP_SPAM", false),
                trusted_senders: parse_list(
                    &std::env::var("TRUSTED_SENDERS").unwrap_or_default(),
                ),
                only_new_since_start: env_or("ONLY_NEW_SINCE_START", false),
            },
        })
    }

    /// Checks what is needed before any polling cycle may start.
    pub fn validate_for_processing(&self) -> Result<()> {
        let mut missing_vars = Vec::new();

        if self.llm.api_key.is_none() {
            missing_vars.push("GROQ_API_KEY");
        }

        if !missing_vars.is_empty() {
            anyhow::bail!(
                "Missing environment variables: {}\n\
                 \n\
                 💡 Solutions:\n\
                 1. Create a .env file with your credentials:\n\
                    GROQ_API_KEY=gsk_...\n\
                    GMAIL_CREDENTIALS_PATH=config/credentials.json\n\
                 \n\
                 2. Or export them manually:\n\
                    export GROQ_API_KEY=gsk_...\n\
                    cargo run -- --mode draft --dry-run",
                missing_vars.join(", ")
            );
        }

        if !std::path::Path::new(&self.gmail.credentials_path).exists() {
            anyhow::bail!(
                "Gmail OAuth2 client credentials not found at '{}' (set GMAIL_CREDENTIALS_PATH)",
                self.gmail.credentials_path
            );
        }

        Ok(())
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Invalid value '{}' for {} - using default", raw, key);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_list(" Boss@Example.com, ,partner.org "),
            vec!["boss@example.com".to_string(), "partner.org".to_string()]
        );
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        std::env::set_var("GMAIL_AGENT_TEST_NUMBER", "not-a-number");
        assert_eq!(env_or("GMAIL_AGENT_TEST_NUMBER", 7usize), 7);
        std::env::set_var("GMAIL_AGENT_TEST_NUMBER", " 12 ");
        assert_eq!(env_or("GMAIL_AGENT_TEST_NUMBER", 7usize), 12);
        assert_eq!(env_or("GMAIL_AGENT_TEST_UNSET_VAR", 0.5f32), 0.5);
    }
}
