//! Query executor service reporting executions, failures and its lifecycle
//!
//! Lives in `demos/` and is registered as a Cargo example, so run it with:
//!
//! ```text
//! EVENTS_API_URL=http://localhost:8080/collect cargo run --example query_executor
//! ```

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::time::{Duration, Instant};

use searchpipeline_events::schema::ServiceLifecycleData;
use searchpipeline_events::track::{QueryFromFirstArg, ResultsCountFromList, Tracker};
use searchpipeline_events::{
    ClientConfig, GenericClient, QueryErrorKind, QueryExecutorClient, ServiceName, init_global_client,
};

#[path = "support/mod.rs"]
mod support;

use support::LogLevel;

#[derive(Parser)]
#[command(name = "query_executor", about = "Run simulated searches and report query events")]
struct Cli {
    /// Collector endpoint; falls back to EVENTS_API_URL
    #[arg(long)]
    api_url: Option<String>,

    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Collector request timeout in milliseconds
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    #[arg(long, default_value = "zilliz")]
    data_source: String,
}

#[derive(Debug)]
enum SearchError {
    Timeout(String),
}

impl std::fmt::Display for SearchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchError::Timeout(query) => write!(f, "search for '{}' timed out", query),
        }
    }
}

async fn search_data(query: String) -> std::result::Result<Vec<String>, SearchError> {
    tokio::time::sleep(Duration::from_millis(25)).await;
    if query.contains("slow") {
        return Err(SearchError::Timeout(query));
    }
    Ok(query.split_whitespace().map(|w| format!("doc:{}", w.to_lowercase())).collect())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    support::setup_logging(cli.log_level);

    let config = ClientConfig::resolve(cli.api_url.as_deref(), Some(ServiceName::QueryExecutor))
        .context("Failed to resolve event client config")?
        .with_timeout(Duration::from_millis(cli.timeout_ms));

    // Trackers without an explicit client use this one
    let client = init_global_client(config).context("Failed to install global event client")?;
    let executor = QueryExecutorClient::from_client(client);
    let lifecycle = GenericClient::from_client(client);

    let booted = Instant::now();
    let data = ServiceLifecycleData {
        service_version: Some(env!("CARGO_PKG_VERSION").to_string()),
        environment: Some("demo".to_string()),
        startup_time_ms: Some(booted.elapsed().as_millis() as u64),
    };
    if let Err(e) = lifecycle.service_started(data.clone()).await {
        eprintln!("{} service_start not delivered: {}", "✗".red(), e);
    }

    info!("Reporting query events to {}", client.endpoint());

    let tracker: Tracker<String, Vec<String>, SearchError> = Tracker::query_execution(cli.data_source.clone())
        .function_name("search_data")
        .query(QueryFromFirstArg)
        .results_count(ResultsCountFromList);

    for query in ["Apple stock price", "weather in Paris", "slow aggregate report"] {
        match tracker.track(query.to_string(), search_data).await {
            Ok(results) => println!("{} {} -> {} results", "✓".green(), query.bold(), results.len()),
            Err(e) => println!("{} {}", "✗".yellow(), e),
        }
    }

    // Explicit reporting for a failure the tracker never saw
    let started = Instant::now();
    let sent = executor
        .query_failed(
            "SELECT * FROM events",
            QueryErrorKind::Connection,
            "connection refused by vector store",
            started.elapsed().as_millis() as u64,
        )
        .await;
    match sent {
        Ok(result) => println!("{} query_error delivered (HTTP {})", "✓".green(), result.status),
        Err(e) => eprintln!("{} query_error not delivered: {}", "✗".red(), e),
    }

    if let Err(e) = lifecycle.service_stopped(data).await {
        eprintln!("{} service_stop not delivered: {}", "✗".red(), e);
    }
    Ok(())
}
