// src/main.rs
// ragbot - recall core command line

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use ragbot::config::Settings;
use ragbot::recall::RecallRequest;
use ragbot::state::RecallState;

#[derive(Parser)]
#[command(name = "ragbot")]
#[command(about = "Recall and fusion core for a retrieval-augmented chatbot")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or load the knowledge, FAQ and history collections
    Init,

    /// Report whether each collection exists
    Health,

    /// Print row counts for every collection
    Count,

    /// Run a fused recall and print the hits as JSON
    Recall {
        query: String,

        /// Candidates requested from each source
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Restrict FAQ recall to one language
        #[arg(short, long)]
        language: Option<String>,

        /// Restrict history recall to one session
        #[arg(short, long)]
        session: Option<String>,
    },
}

fn init_tracing(settings: &Settings) -> Result<()> {
    let level = settings.log_level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load()?;
    init_tracing(&settings)?;

    let state = RecallState::from_settings(&settings)?;

    match cli.command {
        Commands::Init => {
            state.initialize_collections().await?;
            info!("All collections ready");
        }
        Commands::Health => {
            let report: serde_json::Map<_, _> = state
                .health()
                .await
                .into_iter()
                .map(|(name, ok)| (name.to_string(), json!(ok)))
                .collect();
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Count => {
            let documents = state.knowledge.count_documents_detailed().await?;
            if documents.truncated {
                warn!("Document count stopped at the scan ceiling");
            }
            let report = json!({
                "knowledge_documents": documents.total,
                "knowledge_truncated": documents.truncated,
                "faq": state.faq.count_faqs().await,
                "history": state.history.count().await,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Recall {
            query,
            top_k,
            language,
            session,
        } => {
            let mut request = RecallRequest::new(query, top_k.unwrap_or(settings.vector_top_k))?;
            if let Some(language) = language {
                request = request.with_language(language);
            }
            if let Some(session) = session {
                request = request.with_session(session);
            }

            let hits = state.orchestrator.recall(&request).await;
            println!("{}", serde_json::to_string_pretty(&hits)?);
        }
    }

    Ok(())
}
