//! # Concierge: knowledge-base assistant CLI
//!
//! Answers questions from a private knowledge base and captures leads or
//! books visits through LLM tool calling.
//!
//! Usage:
//!   concierge init                      # Write ~/.concierge/config.toml
//!   concierge index                     # Build the index and print stats
//!   concierge search "parking" -k 3     # Raw knowledge search
//!   concierge ask "When do you open?"   # One request
//!   concierge chat                      # One request per stdin line
//!   concierge --dry-run chat            # Records in memory, no calendar

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use concierge_agent::{Agent, Reply};
use concierge_core::ConciergeConfig;
use concierge_core::config::expand_path;
use concierge_knowledge::{BuildStats, KnowledgeBase, load_documents};
use concierge_tools::ToolRegistry;
use concierge_tools::backends::{MemoryLog, UnavailableCalendar, create_append_log, create_calendar};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Shown in `chat` when a request fails; the cause goes to the log.
const CHAT_FAILURE_REPLY: &str = "Sorry, something went wrong on our side. Please try again in a moment.";

#[derive(Parser)]
#[command(name = "concierge", version, about = "🛎️ Concierge: knowledge-base assistant with lead capture and visit booking")]
struct Cli {
    /// Config file (default: ~/.concierge/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON log lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Keep records in memory and skip the calendar
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a single message
    Ask { message: String },
    /// Read messages from stdin, one independent request per line
    Chat,
    /// Build the knowledge index and print its stats
    Index,
    /// Search the knowledge base without the model
    Search {
        query: String,
        #[arg(short, default_value_t = 4)]
        k: usize,
    },
    /// Print the tool schema offered to the model
    Tools,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Text for one `chat` line; failures are logged and answered generically.
fn chat_reply(result: concierge_core::Result<Reply>) -> String {
    match result {
        Ok(reply) => reply.text,
        Err(e) => {
            tracing::error!("❌ Request failed: {e}");
            CHAT_FAILURE_REPLY.to_string()
        }
    }
}

fn init_logging(verbose: bool, json: bool) {
    let default = if verbose {
        "concierge=debug,concierge_agent=debug,concierge_tools=debug,concierge_knowledge=debug,concierge_providers=debug"
    } else {
        "concierge=info,concierge_agent=info,concierge_tools=info,concierge_knowledge=info,concierge_providers=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(cli: &Cli) -> Result<ConciergeConfig> {
    let mut config = match &cli.config {
        Some(path) => ConciergeConfig::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ConciergeConfig::load().context("loading default config")?,
    };
    config.validate().context("invalid configuration")?;
    if cli.dry_run {
        config.records.backend = "memory".into();
        config.visits.calendar.enabled = false;
    }
    Ok(config)
}

async fn build_knowledge(config: &ConciergeConfig) -> Result<(Arc<KnowledgeBase>, BuildStats)> {
    let embedder = concierge_providers::create_embedder(config).context("creating embedder")?;
    let kb = KnowledgeBase::new(embedder, config.knowledge.clone())?
        .with_embed_concurrency(config.embedding.embed_concurrency);

    let documents = match &config.knowledge.source {
        Some(source) => {
            let path = expand_path(source);
            load_documents(&path).with_context(|| format!("reading documents from {}", path.display()))?
        }
        None => {
            tracing::warn!("⚠️ No knowledge.source configured, the index will be empty");
            Vec::new()
        }
    };
    let stats = kb.build(&documents).await.context("building knowledge index")?;
    Ok((Arc::new(kb), stats))
}

async fn build_agent(config: &ConciergeConfig) -> Result<Agent> {
    let (kb, _) = build_knowledge(config).await?;
    let log = create_append_log(&config.records).context("opening record log")?;
    let calendar = create_calendar(&config.visits.calendar).context("creating calendar client")?;
    let tools = ToolRegistry::with_defaults(config, kb, log, calendar)?;
    let provider = concierge_providers::create_provider(config).context("creating completion provider")?;

    let agent = Agent::from_config(config, provider, Arc::new(tools));
    tracing::info!(
        "🛎️ Concierge ready: {} / {} with {} tool(s)",
        agent.provider_name(),
        agent.model_name(),
        agent.tool_definitions().len()
    );
    Ok(agent)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    if let Command::Init { force } = cli.command {
        let path = cli.config.clone().unwrap_or_else(ConciergeConfig::default_path);
        if path.exists() && !force {
            anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
        }
        ConciergeConfig::default()
            .save_to(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("✅ Wrote {}", path.display());
        return Ok(());
    }

    let config = load_config(&cli)?;

    match cli.command {
        Command::Ask { message } => {
            let agent = build_agent(&config).await?;
            let reply = agent.respond(&message).await.context("answering message")?;
            println!("{}", reply.text);
        }
        Command::Chat => {
            let agent = build_agent(&config).await?;
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            let mut stdout = tokio::io::stdout();
            while let Some(line) = lines.next_line().await? {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if matches!(line, "exit" | "quit") {
                    break;
                }
                let text = chat_reply(agent.respond(line).await);
                stdout.write_all(format!("{text}\n").as_bytes()).await?;
                stdout.flush().await?;
            }
        }
        Command::Index => {
            let (_, stats) = build_knowledge(&config).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Search { query, k } => {
            let (kb, _) = build_knowledge(&config).await?;
            let hits = kb.search(&query, k).await.context("searching knowledge base")?;
            println!("{}", serde_json::to_string_pretty(&hits)?);
        }
        Command::Tools => {
            let embedder = concierge_providers::create_embedder(&config)?;
            let kb = Arc::new(KnowledgeBase::new(embedder, config.knowledge.clone())?);
            let tools = ToolRegistry::with_defaults(
                &config,
                kb,
                Arc::new(MemoryLog::new()),
                Arc::new(UnavailableCalendar),
            )?;
            println!("{}", serde_json::to_string_pretty(&tools.list())?);
        }
        Command::Init { .. } => {}
    }

    Ok(())
}
