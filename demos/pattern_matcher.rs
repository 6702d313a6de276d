//! Pattern matcher service emitting events for each query it classifies
//!
//! Lives in `demos/` and is registered as a Cargo example, so run it with:
//!
//! ```text
//! cargo run --example pattern_matcher -- --api-url http://localhost:8080/collect "Apple stock price"
//! ```

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use serde_json::{Value, json};
use std::time::Instant;

use searchpipeline_events::track::{PatternInfoFromResult, QueryFromFirstArg, Tracker};
use searchpipeline_events::{ClientConfig, EventClient, MatchType, PatternMatcherClient, ServiceName};

#[path = "support/mod.rs"]
mod support;

use support::LogLevel;

const PATTERNS: &[(&str, &[&str])] = &[
    ("financial_data", &["stock", "price", "market", "earnings"]),
    ("weather", &["weather", "forecast", "rain", "temperature"]),
    ("news", &["news", "headline", "latest"]),
];

#[derive(Parser)]
#[command(name = "pattern_matcher", about = "Classify queries and report pattern events")]
struct Cli {
    /// Collector endpoint; falls back to EVENTS_API_URL
    #[arg(long)]
    api_url: Option<String>,

    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Queries to classify
    #[arg(default_values = ["Apple stock price", "weather tomorrow", "best pizza"])]
    queries: Vec<String>,
}

#[derive(Debug)]
struct NoPattern(String);

impl std::fmt::Display for NoPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no pattern matched '{}'", self.0)
    }
}

fn classify(query: &str) -> Option<(&'static str, f64)> {
    let lowered = query.to_lowercase();
    PATTERNS
        .iter()
        .map(|(name, keywords)| {
            let hits = keywords.iter().filter(|k| lowered.contains(*k)).count();
            (*name, hits as f64 / keywords.len() as f64)
        })
        .filter(|(_, score)| *score > 0.0)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(name, score)| (name, (0.5 + score).min(1.0)))
}

async fn match_query(query: String) -> std::result::Result<Value, NoPattern> {
    match classify(&query) {
        Some((pattern, confidence)) => Ok(json!({
            "pattern": pattern,
            "confidence": confidence,
            "match_type": if confidence >= 1.0 { "exact" } else { "fuzzy" },
        })),
        None => Err(NoPattern(query)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    support::setup_logging(cli.log_level);

    let config = ClientConfig::resolve(cli.api_url.as_deref(), Some(ServiceName::PatternMatcher))
        .context("Failed to resolve event client config")?;
    let client = EventClient::new(config).context("Failed to create event client")?;
    let matcher = PatternMatcherClient::from_client(&client);

    info!("Reporting pattern events to {}", client.endpoint());

    // Explicit reporting
    for query in &cli.queries {
        let started = Instant::now();
        let elapsed = || started.elapsed().as_millis() as u64;
        let sent = match classify(query) {
            Some((pattern, confidence)) => {
                matcher
                    .pattern_found(query, pattern, confidence, MatchType::Fuzzy, elapsed())
                    .await
            }
            None => {
                let attempted = PATTERNS.iter().map(|(name, _)| name.to_string()).collect();
                matcher.pattern_not_found(query, attempted, elapsed()).await
            }
        };
        match sent {
            Ok(result) => println!("{} {} (HTTP {})", "✓".green(), query.bold(), result.status),
            Err(e) => eprintln!("{} {}: {}", "✗".red(), query.bold(), e),
        }
    }

    // Tracked calls report on their own
    let tracker: Tracker<String, Value, NoPattern> = Tracker::pattern_matching()
        .client(client.clone())
        .function_name("match_query")
        .query(QueryFromFirstArg)
        .pattern_info(PatternInfoFromResult);

    for query in &cli.queries {
        match tracker.track(query.clone(), match_query).await {
            Ok(result) => println!("{} tracked {} -> {}", "✓".green(), query.bold(), result["pattern"]),
            Err(e) => println!("{} tracked {}", "✗".yellow(), e),
        }
    }

    matcher.close();
    client.close();
    Ok(())
}
