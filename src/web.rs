#![cfg(not(tarpaulin_include))]

use env_logger::Env;
use vocab_cards::{Config, app};

/// Main entry point for the web application
///
/// Reads the `VOCAB_*` environment variables and serves the API and the
/// static front-end until the process is stopped.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::load();
    app::run(config).await
}
