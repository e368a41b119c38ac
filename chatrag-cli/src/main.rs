//! # chatrag
//!
//! Chat with a Supabase-backed knowledge base from the terminal.
//!
//! ## Usage
//!
//! ```bash
//! # Interactive session
//! chatrag chat
//!
//! # One question, with the retrieved documents listed first
//! chatrag ask "What is the capital of France?" --show-context
//! ```
//!
//! Configuration comes from the environment or a `.env` file
//! (`SUPABASE_URL`, `SUPABASE_ANON_KEY`, `GEMINI_API_KEY`, `CHATRAG_USER`, ...).

mod render;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chatrag::{
    AppConfig, Conversation, EnvIdentity, GeminiClient, GeminiEmbeddingProvider, GeminiGenerator,
    Identity, RagPipeline, Responder, Submission, SupabaseSearch, require_identity,
};
use clap::{Parser, Subcommand};
use render::ContextSlot;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chatrag")]
#[command(about = "Chat with a knowledge base using retrieval-augmented generation", long_about = None)]
#[command(version)]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, value_name = "FILTER", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat {
        /// List the retrieved documents before each answer
        #[arg(long)]
        show_context: bool,
    },
    /// Ask a single question and print the answer
    Ask {
        #[arg(value_name = "QUESTION")]
        question: String,
        /// List the retrieved documents before the answer
        #[arg(long)]
        show_context: bool,
    },
}

/// Logs go to stderr so they never interleave with chat output.
fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn build_pipeline(config: AppConfig) -> anyhow::Result<RagPipeline> {
    if config.gemini.api_key.is_none() {
        warn!("GEMINI_API_KEY is not set, requests will fail until it is provided");
    }

    let gemini = Arc::new(GeminiClient::from_settings(&config.gemini, config.http_timeout));
    let embedder = GeminiEmbeddingProvider::new(
        gemini.clone(),
        &config.pipeline.embedding_model,
        config.pipeline.embedding_dimensions,
    );
    let generator = GeminiGenerator::new(gemini, &config.pipeline.chat_model);
    let search = SupabaseSearch::from_settings(&config.supabase, config.http_timeout)?;

    Ok(RagPipeline::builder()
        .config(config.pipeline)
        .embedding_provider(Arc::new(embedder))
        .search(Arc::new(search))
        .generator(Arc::new(generator))
        .build()?)
}

/// Hands the retrieved documents to the render loop along with the answer.
struct ContextCollector {
    pipeline: Arc<RagPipeline>,
    slot: Arc<ContextSlot>,
}

#[async_trait]
impl Responder for ContextCollector {
    async fn respond(&self, user_message: &str) -> chatrag::Result<String> {
        let answer = self.pipeline.answer(user_message).await?;
        self.slot.put(answer.context);
        Ok(answer.text)
    }
}

fn print_help() {
    println!("Commands:");
    println!("  /clear    start over with an empty conversation");
    println!("  /history  reprint the conversation");
    println!("  /quit     leave the chat");
}

async fn run_chat(
    pipeline: Arc<RagPipeline>,
    show_context: bool,
    identity: &Identity,
) -> anyhow::Result<()> {
    let slot = show_context.then(|| Arc::new(ContextSlot::default()));
    let responder: Arc<dyn Responder> = match &slot {
        Some(slot) => Arc::new(ContextCollector { pipeline, slot: Arc::clone(slot) }),
        None => pipeline,
    };
    let conversation = Conversation::new(responder);
    let renderer = tokio::spawn(render::follow(conversation.subscribe(), slot));

    let mut editor = DefaultEditor::new()?;
    println!("Signed in as {}. Type /help for commands.", identity.user_id);

    loop {
        // readline blocks; keep the runtime's other tasks moving meanwhile.
        let line = tokio::task::block_in_place(|| editor.readline("> "));
        match line {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                editor.add_history_entry(input)?;

                match input {
                    "/quit" | "/exit" => break,
                    "/clear" => {
                        conversation.clear();
                        println!("Conversation cleared.");
                    }
                    "/history" => render::print_history(&conversation.state()),
                    "/help" => print_help(),
                    _ => {
                        if matches!(conversation.submit(input), Submission::Busy) {
                            println!("Still working on the previous message, please wait.");
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    renderer.abort();
    Ok(())
}

async fn ask(pipeline: &RagPipeline, question: &str, show_context: bool) -> anyhow::Result<()> {
    let answer = pipeline.answer(question).await?;
    if show_context {
        render::print_context(&answer.context);
    }
    println!("{}", answer.text);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let identity = require_identity(&EnvIdentity).await?;
    let config = AppConfig::from_env().context("failed to load configuration")?;
    let pipeline = Arc::new(build_pipeline(config)?);

    match cli.command {
        Commands::Chat { show_context } => run_chat(pipeline, show_context, &identity).await,
        Commands::Ask { question, show_context } => ask(&pipeline, &question, show_context).await,
    }
}
