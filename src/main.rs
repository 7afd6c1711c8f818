use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{error, info};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use gmail_agent::agent::{Agent, DeliveryMode, RunSettings};
use gmail_agent::assistant::ReplyAssistant;
use gmail_agent::config::Config;
use gmail_agent::gmail_client::GmailClient;
use gmail_agent::llm_client::GroqClient;
use gmail_agent::tracker::ProcessingTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Automatically send replies to new emails, once
    Auto,
    /// Save replies as drafts for manual review, once
    Draft,
    /// Continuously monitor and auto-reply
    MonitorAuto,
    /// Continuously monitor and save replies as drafts
    MonitorDraft,
}

impl Mode {
    fn delivery(self) -> DeliveryMode {
        match self {
            Mode::Auto | Mode::MonitorAuto => DeliveryMode::Auto,
            Mode::Draft | Mode::MonitorDraft => DeliveryMode::Draft,
        }
    }

    fn is_continuous(self) -> bool {
        matches!(self, Mode::MonitorAuto | Mode::MonitorDraft)
    }
}

#[derive(Parser)]
#[command(name = "gmail-agent")]
#[command(about = "Gmail AI agent - classifies new emails and replies or drafts with an LLM")]
#[command(version = "0.1.0")]
struct Args {
    /// Operation mode
    #[arg(long, value_enum, default_value_t = Mode::Draft)]
    mode: Mode,

    /// Generate replies but don't send or save them
    #[arg(short, long)]
    dry_run: bool,

    /// Monitoring interval in minutes for monitor modes
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// Maximum number of unread emails fetched per cycle (default: MAX_EMAILS_TO_PROCESS)
    #[arg(short = 'l', long)]
    limit: Option<usize>,

    /// Clear the history of processed messages
    #[arg(long)]
    clear_history: bool,

    /// Show statistics about processed messages
    #[arg(long)]
    stats: bool,

    /// List current draft messages
    #[arg(long)]
    list_drafts: bool,

    /// Check the configuration without connecting
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    dotenv::dotenv().ok();

    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("🚀 Gmail AI agent starting...");

    let config = Config::new()?;

    if args.check_config {
        print_config(&config);
        return Ok(());
    }

    if args.clear_history {
        let mut tracker = ProcessingTracker::load(&config.agent.history_path);
        tracker.clear()?;
        info!("Processed messages history cleared");
        return Ok(());
    }

    if args.stats {
        let tracker = ProcessingTracker::load(&config.agent.history_path);
        let stats = tracker.stats();
        info!("=== AGENT STATISTICS ===");
        info!("History file: {}", tracker.path().display());
        info!("Total processed messages: {}", stats.total_processed);
        info!("History file exists: {}", stats.history_file_exists);
        if let Some(last_updated) = stats.last_updated {
            info!("Last updated: {}", last_updated.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        return Ok(());
    }

    if args.list_drafts {
        let gmail = GmailClient::new(&config.gmail).await?;
        list_drafts(&gmail).await?;
        return Ok(());
    }

    info!("Mode: {:?}", args.mode);
    info!("Dry-run: {}", args.dry_run);

    config.validate_for_processing()?;

    let started_at = chrono::Utc::now().timestamp();

    let mut gmail = GmailClient::new(&config.gmail)
        .await
        .context("Gmail authentication failed")?;
    if config.agent.only_new_since_start {
        gmail.only_after(started_at);
    }

    let groq = GroqClient::new(&config.llm).context("Unable to initialize Groq client")?;
    let assistant = ReplyAssistant::new(groq, &config.llm, config.agent.trusted_senders.clone());
    let tracker = ProcessingTracker::load(&config.agent.history_path);

    let settings = RunSettings {
        mode: args.mode.delivery(),
        dry_run: args.dry_run,
        max_messages: args.limit.unwrap_or(config.agent.max_emails),
        pause_between_messages: Duration::from_secs(config.agent.message_delay_secs),
        skip_spam: config.agent.skip_spam,
    };

    let mut agent = Agent::new(gmail, assistant, tracker, settings);

    if args.mode.is_continuous() {
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Application stopped by user");
                on_signal.cancel();
            }
        });

        info!("⏸️  Press Ctrl+C to stop monitoring");
        agent
            .monitor(Duration::from_secs(args.interval * 60), &cancel)
            .await?;
        return Ok(());
    }

    let result = tokio::select! {
        result = agent.run_cycle() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    match result {
        None => info!("Application stopped by user"),
        Some(Ok(report)) => {
            if args.dry_run {
                info!("✅ Dry-run completed. {} email(s) analyzed.", report.new - report.failed);
            } else {
                info!(
                    "✅ Processing completed. {} email(s) handled.",
                    report.delivered + report.skipped_spam
                );
            }
        }
        Some(Err(e)) => {
            error!("❌ Error while processing emails: {:#}", e);
            agent.shutdown()?;
            return Err(e);
        }
    }

    agent.shutdown()
}

async fn list_drafts(gmail: &GmailClient) -> Result<()> {
    let drafts = gmail.list_drafts(10).await?;

    info!("=== DRAFT MESSAGES ({}) ===", drafts.len());
    for (i, draft) in drafts.iter().enumerate() {
        for line in draft.listing_lines(i + 1) {
            info!("{}", line);
        }
        info!("   {}", "-".repeat(50));
    }

    Ok(())
}

fn print_config(config: &Config) {
    println!("✅ Configuration loaded");
    println!("📧 Gmail API OAuth2");
    println!("🔑 Credentials: {}", config.gmail.credentials_path);
    println!("💾 Token cache: {}", config.gmail.token_cache_path);
    println!("🔍 Query: {}", config.gmail.query);
    println!(
        "🤖 Model: {} ({})",
        config.llm.model,
        if config.llm.api_key.is_some() { "API key set" } else { "API key MISSING" }
    );
    println!("📁 History file: {}", config.agent.history_path);
    println!("📬 Max emails per cycle: {}", config.agent.max_emails);
    println!("🚫 Skip spam: {}", config.agent.skip_spam);
    if !config.agent.trusted_senders.is_empty() {
        println!("🤝 Trusted senders: {}", config.agent.trusted_senders.join(", "));
    }
    if let Err(e) = config.validate_for_processing() {
        println!("⚠️  {}", e);
    }
}
