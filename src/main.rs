//! Sourcing-RS: a multi-provider procurement search aggregator
//!
//! This is the main entry point: it runs one search from the command
//! line and prints the ranked results as JSON.

use anyhow::Result;
use sourcing_rs::{
    config,
    providers::build_registry,
    search::{SearchRequest, SearchService},
    store::Store,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args[0] == "-h" || args[0] == "--help" {
        print_usage();
        return Ok(());
    }
    if args[0] == "-V" || args[0] == "--version" {
        println!("sourcing-rs v{}", sourcing_rs::VERSION);
        return Ok(());
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Starting sourcing-rs v{}", sourcing_rs::VERSION);

    // Load configuration
    let settings = config::load_settings()?;
    info!("Loaded configuration for instance: {}", settings.general.instance_name);

    // Open the bid store
    let store = Store::open(&settings.store.path).await?;
    info!("Bid store ready at: {}", settings.store.path);

    // Load providers
    let registry = Arc::new(build_registry(&settings.providers));
    info!("Loaded {} search providers", registry.len());

    let service = SearchService::new(&settings, registry, store)?;

    // First argument may pin the request id; the rest is the buyer's text
    let (request_id, text) = match args.split_first() {
        Some((first, rest)) if first == "--request" && !rest.is_empty() => {
            (rest[0].clone(), rest[1..].join(" "))
        }
        _ => (uuid::Uuid::new_v4().to_string(), args.join(" ")),
    };

    let request = SearchRequest::new(request_id.clone(), text);
    let response = service.search(&request).await?;

    info!(
        "Search finished: {} results from {} providers ({} failed)",
        response.results.len(),
        response.providers_succeeded + response.providers_failed,
        response.providers_failed
    );
    if let Some(advisory) = &response.advisory {
        info!("Advisory: {advisory}");
    }

    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}

/// Print usage information
fn print_usage() {
    println!(
        r#"
Sourcing-RS v{}
A multi-provider procurement search aggregator written in Rust

USAGE:
    sourcing-rs [--request <ID>] <QUERY>...

OPTIONS:
    --request <ID>         Attach results to this request id
    -h, --help             Print help information
    -V, --version          Print version information

ENVIRONMENT VARIABLES:
    SOURCING_SETTINGS_PATH            Path to settings.yml
    SOURCING_DEBUG                    Enable debug mode (true/false)
    SOURCING_STORE_PATH               SQLite database path
    SOURCING_INTENT_API_KEY           Intent extraction model key
    SOURCING_CATALOG_API_KEY          Shopping catalog API key
    SOURCING_WEBSEARCH_API_KEY        Web search API key
    SOURCING_WEBSEARCH_CX             Web search engine id
    SOURCING_MARKETPLACE_CLIENT_ID    Marketplace OAuth client id
    SOURCING_MARKETPLACE_CLIENT_SECRET Marketplace OAuth client secret

For more information, visit: https://github.com/sourcing-rs/sourcing-rs
"#,
        sourcing_rs::VERSION
    );
}
