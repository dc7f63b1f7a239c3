//! Command line front end over the query registry.

use anyhow::Context;
use clap::{Parser, Subcommand};
use common::location::LocationHash;
use service::{config::ServiceConfig, registry::QueryRegistry};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "search-query", about = "Inspect and run location-hash search queries")]
struct Cli {
    /// Core url of the search backend.
    #[arg(long, global = true, env = "SEARCH_CORE_URL")]
    core_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the select url for a hash.
    Url { hash: String },
    /// Print the canonical form of a hash.
    Hash { hash: String },
    /// Run the query and print its results.
    Fetch {
        hash: String,
        #[arg(long, default_value = "results")]
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ServiceConfig::from_env();
    if let Some(core_url) = cli.core_url {
        config.core_url = core_url.trim_end_matches('/').to_string();
    }
    let registry = QueryRegistry::from_config(&config).context("Failed to set up query registry")?;

    match cli.command {
        Command::Url { hash } => {
            let query = registry.get_query_from_hash(&hash, &config.core_url);
            println!("{}", query.solr_query_url());
        }
        Command::Hash { hash } => {
            let query = registry.get_query_from_hash(&hash, &config.core_url);
            println!("{}", LocationHash::from(&query));
        }
        Command::Fetch { hash, name } => {
            registry.apply_location_hash(&name, &hash, &config.core_url).await;
            let query = registry
                .get_query(&name)
                .with_context(|| format!("query {name:?} vanished after update"))?;
            let query = query.lock();
            if let Some(message) = query.error_message() {
                anyhow::bail!("search failed: {message}");
            }
            println!("numFound: {}", query.response().num_found);
            for doc in query.response().docs.iter() {
                println!("{}", serde_json::to_string(doc)?);
            }
        }
    }
    Ok(())
}
