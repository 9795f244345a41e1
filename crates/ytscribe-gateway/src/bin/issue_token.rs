//! Mint an API token into the configured store and print it.
//! Stop the gateway first: sled holds an exclusive lock on the database directory.

use ytscribe_core::{generate_token, GatewayConfig, TranscriptStore};

fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    match issue() {
        Ok(token) => println!("{}", token),
        Err(e) => {
            eprintln!("[ISSUE TOKEN] failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn issue() -> Result<String, Box<dyn std::error::Error>> {
    let config = GatewayConfig::load()?;
    let store = TranscriptStore::open(Some(config.db_path.as_str()))?;
    let token = generate_token();
    store.add_token(&token)?;
    tracing::info!(target: "ytscribe::auth", tokens = store.token_count(), "issued API token");
    Ok(token)
}
