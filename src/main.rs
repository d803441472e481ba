use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use eyre::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use unichat::backend_client::BackendClient;
use unichat::cli::chat::context::StudentContext;
use unichat::cli::chat::ChatContext;
use unichat::inference_client::{InferenceApi, InferenceClient};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Single question to send, then exit (non-interactive mode)
    #[arg(short, long)]
    input: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("Starting UniChat");

    let inference: Arc<dyn InferenceApi> = Arc::new(InferenceClient::new()?);
    let backend = Arc::new(BackendClient::new()?);
    let student = StudentContext::from_env();

    let interactive = cli.input.is_none();
    let mut chat_context = ChatContext::new(
        Box::new(io::stdout()),
        cli.input,
        interactive,
        student,
        inference,
        backend,
    );

    chat_context.run().await
}
