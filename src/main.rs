use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use rulegraph::adk::model::factory::LazyModel;
use rulegraph::adk::model::Message;
use rulegraph::assistant::{self, state};
use rulegraph::graph::{CompiledGraph, RunConfig, StateUpdate};
use rulegraph::settings::Settings;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML settings file
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the assistant graph once and print the final state
    Run {
        /// Assistant whose rules are read and learned
        #[arg(short, long, default_value = "default")]
        assistant_id: String,

        /// User message to start the conversation with
        #[arg(short, long)]
        message: Option<String>,

        /// Only return the stored rules, without calling the model
        #[arg(long)]
        only_get_rules: bool,

        /// Treat the conversation as accepted and learn rules from it
        #[arg(long)]
        has_accepted_text: bool,
    },
    /// Print the rules stored for an assistant
    Rules {
        #[arg(short, long, default_value = "default")]
        assistant_id: String,
    },
    /// Serve the assistant graph over HTTP
    Serve {
        /// Port to listen on, overrides the settings file
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn build(settings: &Settings) -> anyhow::Result<CompiledGraph> {
    // the client is created on first use so `--only-get-rules` needs no API key
    let model = LazyModel::new(settings.model.clone()).context("failed to create model")?;
    let mut builder = assistant::builder(Arc::new(model), settings.model.generation_config());
    builder.set_recursion_limit(settings.graph.recursion_limit);
    let graph = builder
        .compile_with_store(settings.store.open())
        .context("failed to compile assistant graph")?;
    Ok(graph)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let args = Args::parse();

    if matches!(args.command, Commands::Serve { .. }) {
        // also forwards `log` records emitted by the library
        tracing_subscriber::fmt::init();
    } else {
        env_logger::init();
    }

    let settings = Settings::load(args.settings.as_deref()).context("failed to load settings")?;

    match args.command {
        Commands::Run {
            assistant_id,
            message,
            only_get_rules,
            has_accepted_text,
        } => {
            let graph = build(&settings)?;

            let mut input = StateUpdate::new();
            if let Some(message) = message {
                input = input.set(state::MESSAGES, json!([Message::user(message)]));
            }
            let config = RunConfig::new()
                .with(state::ASSISTANT_ID, assistant_id)
                .with(state::ONLY_GET_RULES, only_get_rules)
                .with(state::HAS_ACCEPTED_TEXT, has_accepted_text);

            let result = graph.invoke(input, &config).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Rules { assistant_id } => {
            let store = settings.store.open();
            let rules = assistant::load_rules(store.as_ref(), &assistant_id).await?;
            println!("{}", serde_json::to_string_pretty(&rules)?);
        }
        Commands::Serve { port } => {
            let graph = Arc::new(build(&settings)?);
            let port = port.unwrap_or(settings.server.port);
            tracing::info!(port, graph = graph.name(), "starting server");
            rulegraph::server::serve(port, graph)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
        }
    }

    Ok(())
}
