use clap::Parser;
use roomchat::app::{App, AppError};
use roomchat::chat::Chat;
use roomchat::config::{Args, ClientConfig};
use roomchat::net::WsTransport;
use roomchat::state::ui::UiState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Logs go to stderr so they never interleave with the chat panel.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = dotenvy::dotenv() {
        tracing::debug!(%error, "no .env loaded");
    }

    let args = Args::parse();
    let config = ClientConfig::from_args(&args)?;
    tracing::info!(url = %config.endpoint.url, on_error = ?config.on_error, "roomchat starting");

    let chat = Chat::new(WsTransport, config.endpoint, config.on_error);
    App::new(chat, UiState::new(args.username, args.room)).run(args.connect).await
}
