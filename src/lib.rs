// Library exports for the gmail-agent crate
// This allows tests and the binary to use the modules

pub mod agent;
pub mod assistant;
pub mod config;
pub mod gmail_client;
pub mod intent;
pub mod llm_client;
pub mod mailbox;
pub mod prompts;
pub mod tracker;
