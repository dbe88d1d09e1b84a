mod app;
mod audio;
mod config;
mod error;
mod messages;
mod session;
mod storage;
mod ui;

use app::App;
use config::Config;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the buttons
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    tracing::info!("Starting taprec");

    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    // All session state lives on this single-threaded set; it also hosts the
    // recorder's !Send cpal streams
    let local = tokio::task::LocalSet::new();

    local
        .run_until(async move { App::new(config).await?.run().await })
        .await
}
