use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use iris_client::{ApiClient, run_chat};
use iris_core::Config;
use iris_core::bootstrap::{build_embedder, build_generation_client, load_query_engine, run_ingest};
use iris_core::config::resolve_config_path;
use iris_gateway::{AppState, GatewayServer, RateLimits};
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "iris")]
#[command(about = "Retrieval-augmented multimodal question answering")]
#[command(version)]
struct Cli {
    #[arg(long, global = true, help = "Config file (default: $IRIS_CONFIG or config/default.toml)")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Service URL for client commands (default: $API_BASE)")]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the HTTP query service (default)")]
    Serve,

    #[command(about = "Build the vector index from the data directory")]
    Ingest {
        #[arg(long, help = "Directory of documents to index")]
        data_dir: Option<PathBuf>,

        #[arg(long, help = "Directory to write the index to")]
        index_dir: Option<PathBuf>,
    },

    #[command(about = "Ask the running service a text question")]
    Ask {
        #[arg(help = "Question text")]
        question: String,
    },

    #[command(about = "Ask the running service about an image")]
    AskImage {
        #[arg(help = "Path to an image file")]
        path: PathBuf,

        #[arg(long, help = "Question about the image")]
        question: Option<String>,
    },

    #[command(about = "Interactive terminal client")]
    Chat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let mut config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    if let Some(api_base) = cli.api_base {
        config.client.api_base = api_base;
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Ingest {
            data_dir,
            index_dir,
        } => {
            if let Some(dir) = data_dir {
                config.index.data_dir = dir;
            }
            if let Some(dir) = index_dir {
                config.index.dir = dir;
            }
            let report = run_ingest(&config).await?;
            println!(
                "Indexed {report} into {}",
                config.index.dir.display()
            );
            Ok(())
        }
        Commands::Ask { question } => {
            let client = ApiClient::new(&config.client.api_base)?;
            let reply = client.ask_text(&question).await?;
            println!("{}", reply.answer);
            if !reply.context.is_empty() {
                println!("\n[context]\n{}", reply.context);
            }
            Ok(())
        }
        Commands::AskImage { path, question } => {
            let client = ApiClient::new(&config.client.api_base)?;
            let answer = client.ask_image_file(&path, question.as_deref()).await?;
            println!("{answer}");
            Ok(())
        }
        Commands::Chat => {
            let client = ApiClient::new(&config.client.api_base)?;
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            run_chat(&client, stdin, tokio::io::stdout()).await?;
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let embedder = build_embedder(&config).await?;
    let engine = load_query_engine(&config, embedder).await?;
    tracing::info!(
        "retrieval {}, {} fragments, top_k {}",
        if engine.is_loaded() { "enabled" } else { "disabled" },
        engine.fragment_count(),
        engine.top_k()
    );
    let generation = build_generation_client(&config)?;
    let state = AppState::new(engine, generation);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let limits = config.server.rate_limit;
    GatewayServer::new(&config.server.bind, config.server.port, state, shutdown_rx)
        .with_rate_limits(RateLimits {
            text: limits.text,
            image: limits.image,
            default: limits.default,
        })
        .with_max_body_size(config.server.max_body_size)
        .serve()
        .await?;
    Ok(())
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // stdout carries command output; logs go to stderr
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
