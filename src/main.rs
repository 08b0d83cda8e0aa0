use std::path::PathBuf;

use axum::Router;
use clap::{Parser, Subcommand};
use order_book_engine::state::AppState;
use order_book_engine::utils::shutdown_token;
use tokio::net::TcpListener;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "engine-cli")]
#[command(
    author = "Andrew Odiit",
    version = "0.1",
    about = "A limit-order matching engine with an embedded durable store"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API, backed by a ParityDB store at `--store`.
    Server {
        #[arg(long, default_value_t = 8080)]
        port: u16,
        #[arg(long, default_value = "trade_store")]
        store: PathBuf,
    },
}

async fn get_app_listener(port: u16, state: AppState) -> anyhow::Result<(TcpListener, Router)> {
    let app = order_book_engine::api::router(state);
    let ep = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(ep).await?;
    Ok((listener, app))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let token = shutdown_token();
    let cli = Cli::parse();

    match cli.command {
        Commands::Server { port, store } => {
            let state = AppState::new(&store).await?;
            let (listener, app) = get_app_listener(port, state).await?;
            tracing::info!("HTTP server listening on 0.0.0.0:{}", port);
            axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await?;
        }
    }

    Ok(())
}
