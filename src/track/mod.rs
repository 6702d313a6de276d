//! Automatic event tracking around function calls
//!
//! A [`Tracker`] times a call, then reports a success event built by its
//! extractors or, if the call failed, an `error` event describing the failure.
//! The call's own result is always handed back unchanged: telemetry failures
//! are logged and dropped.
//!
//! ```no_run
//! # use searchpipeline_events::{ClientConfig, EventClient, ServiceName};
//! # use searchpipeline_events::track::{QueryFromFirstArg, ResultsCountFromList, Tracker};
//! # #[derive(Debug)] struct SearchError;
//! # impl std::fmt::Display for SearchError {
//! #     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "search failed") }
//! # }
//! # async fn search_data(query: String) -> Result<Vec<String>, SearchError> { Ok(vec![query]) }
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = EventClient::new(ClientConfig::new("https://collector.example.com/collect", ServiceName::QueryExecutor))?;
//! let tracker: Tracker<String, Vec<String>, SearchError> = Tracker::query_execution("zilliz")
//!     .client(client)
//!     .query(QueryFromFirstArg)
//!     .results_count(ResultsCountFromList);
//!
//! let results = tracker.track("Apple stock price".to_string(), search_data).await;
//! # Ok(())
//! # }
//! ```

use serde_json::{Map, Value};
use std::fmt::{Debug, Display};
use std::future::Future;
use std::time::Instant;

use crate::client::{EventClient, SendResult, global_client};

pub mod extract;

pub use extract::{
    Constant, Extractor, FirstArg, FnExtractor, PatternInfo, PatternInfoFromResult, QueryFromFirstArg, ResultCount,
    ResultsCountFromList,
};

/// Longest `Debug` rendering of the call arguments kept in a failure event
const ARGS_PREVIEW_CHARS: usize = 200;

const UNKNOWN_QUERY: &str = "unknown";

type BoxedExtractor<A, T, E, V> = Box<dyn Extractor<A, T, E, Value = V>>;

/// Which success event a tracker reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackKind {
    QueryExecution { data_source: String },
    PatternMatch,
}

/// Instrumentation settings for calls taking `A` and returning `Result<T, E>`
pub struct Tracker<A, T, E> {
    kind: TrackKind,
    client: Option<EventClient>,
    function: Option<String>,
    track_errors: bool,
    query: Option<BoxedExtractor<A, T, E, String>>,
    results_count: Option<BoxedExtractor<A, T, E, u64>>,
    pattern_info: Option<BoxedExtractor<A, T, E, PatternInfo>>,
}

impl<A, T, E> Tracker<A, T, E> {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            kind,
            client: None,
            function: None,
            track_errors: true,
            query: None,
            results_count: None,
            pattern_info: None,
        }
    }

    /// Report successful calls as `query_execution` events
    pub fn query_execution(data_source: impl Into<String>) -> Self {
        Self::new(TrackKind::QueryExecution {
            data_source: data_source.into(),
        })
    }

    /// Report successful calls as `pattern_match` events
    pub fn pattern_matching() -> Self {
        Self::new(TrackKind::PatternMatch)
    }

    /// Send through `client` instead of the global client
    pub fn client(mut self, client: EventClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Name reported in failure events; defaults to the wrapped function's type name
    pub fn function_name(mut self, name: impl Into<String>) -> Self {
        self.function = Some(name.into());
        self
    }

    pub fn track_errors(mut self, enabled: bool) -> Self {
        self.track_errors = enabled;
        self
    }

    pub fn query<X>(mut self, extractor: X) -> Self
    where
        X: Extractor<A, T, E, Value = String> + 'static,
    {
        self.query = Some(Box::new(extractor));
        self
    }

    pub fn query_with<F>(self, f: F) -> Self
    where
        F: Fn(&A, Result<&T, &E>) -> Option<String> + Send + Sync + 'static,
    {
        self.query(FnExtractor(f))
    }

    pub fn results_count<X>(mut self, extractor: X) -> Self
    where
        X: Extractor<A, T, E, Value = u64> + 'static,
    {
        self.results_count = Some(Box::new(extractor));
        self
    }

    pub fn results_count_with<F>(self, f: F) -> Self
    where
        F: Fn(&A, Result<&T, &E>) -> Option<u64> + Send + Sync + 'static,
    {
        self.results_count(FnExtractor(f))
    }

    pub fn pattern_info<X>(mut self, extractor: X) -> Self
    where
        X: Extractor<A, T, E, Value = PatternInfo> + 'static,
    {
        self.pattern_info = Some(Box::new(extractor));
        self
    }

    pub fn pattern_info_with<F>(self, f: F) -> Self
    where
        F: Fn(&A, Result<&T, &E>) -> Option<PatternInfo> + Send + Sync + 'static,
    {
        self.pattern_info(FnExtractor(f))
    }

    pub fn kind(&self) -> &TrackKind {
        &self.kind
    }

    fn resolve_client(&self) -> Option<&EventClient> {
        self.client.as_ref().or_else(|| global_client())
    }
}

impl<A, T, E> Tracker<A, T, E>
where
    A: Clone + Debug,
    E: Display + Debug,
{
    /// Run an async call and report its outcome before returning it
    pub async fn track<F, Fut>(&self, args: A, f: F) -> Result<T, E>
    where
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(client) = self.resolve_client() else {
            return f(args).await;
        };

        let started = Instant::now();
        let outcome = f(args.clone()).await;
        let elapsed_ms = elapsed_ms(started);

        if let Some(telemetry) = self.telemetry::<F>(&args, outcome.as_ref(), elapsed_ms) {
            telemetry.deliver(client).await;
        }

        outcome
    }

    /// Run a blocking call and report its outcome without waiting on the collector
    ///
    /// Inside a Tokio runtime the event is spawned onto it; otherwise it is
    /// delivered on a private current-thread runtime before returning.
    pub fn track_blocking<F>(&self, args: A, f: F) -> Result<T, E>
    where
        F: FnOnce(A) -> Result<T, E>,
    {
        let Some(client) = self.resolve_client() else {
            return f(args);
        };

        let started = Instant::now();
        let outcome = f(args.clone());
        let elapsed_ms = elapsed_ms(started);

        if let Some(telemetry) = self.telemetry::<F>(&args, outcome.as_ref(), elapsed_ms) {
            telemetry.deliver_detached(client.clone());
        }

        outcome
    }

    fn telemetry<F>(&self, args: &A, outcome: Result<&T, &E>, elapsed_ms: u64) -> Option<Telemetry> {
        let query = self
            .query
            .as_ref()
            .and_then(|x| x.extract(args, outcome))
            .filter(|q| !q.trim().is_empty());

        match outcome {
            Ok(_) => Some(match &self.kind {
                TrackKind::QueryExecution { data_source } => Telemetry::QueryExecution {
                    query: query.unwrap_or_else(|| UNKNOWN_QUERY.to_string()),
                    results_count: self
                        .results_count
                        .as_ref()
                        .and_then(|x| x.extract(args, outcome))
                        .unwrap_or(0),
                    execution_time_ms: elapsed_ms,
                    data_source: data_source.clone(),
                },
                TrackKind::PatternMatch => Telemetry::PatternMatch {
                    query: query.unwrap_or_else(|| UNKNOWN_QUERY.to_string()),
                    info: self
                        .pattern_info
                        .as_ref()
                        .and_then(|x| x.extract(args, outcome))
                        .unwrap_or_default(),
                    processing_time_ms: elapsed_ms,
                },
            }),
            Err(_) if !self.track_errors => None,
            Err(e) => {
                let error_type = short_type_name(std::any::type_name::<E>()).to_string();
                let message = e.to_string();

                let mut context = Map::new();
                context.insert(
                    "function".to_string(),
                    Value::String(
                        self.function
                            .clone()
                            .unwrap_or_else(|| std::any::type_name::<F>().to_string()),
                    ),
                );
                context.insert(
                    "args".to_string(),
                    Value::String(format!("{:?}", args).chars().take(ARGS_PREVIEW_CHARS).collect()),
                );
                context.insert("execution_time_ms".to_string(), Value::from(elapsed_ms));
                if let Some(query) = query {
                    context.insert("query".to_string(), Value::String(query));
                }

                Some(Telemetry::Failure {
                    error_message: if message.trim().is_empty() { error_type.clone() } else { message },
                    error_type,
                    stack_trace: format!("{:?}", e),
                    context,
                })
            }
        }
    }
}

/// An owned event ready to send, detached from the tracked call
#[derive(Debug)]
enum Telemetry {
    QueryExecution {
        query: String,
        results_count: u64,
        execution_time_ms: u64,
        data_source: String,
    },
    PatternMatch {
        query: String,
        info: PatternInfo,
        processing_time_ms: u64,
    },
    Failure {
        error_type: String,
        error_message: String,
        stack_trace: String,
        context: Map<String, Value>,
    },
}

impl Telemetry {
    async fn send(self, client: &EventClient) -> crate::Result<SendResult> {
        match self {
            Telemetry::QueryExecution {
                query,
                results_count,
                execution_time_ms,
                data_source,
            } => {
                client
                    .send_query_execution(&query, results_count, execution_time_ms, &data_source, Vec::new())
                    .await
            }
            Telemetry::PatternMatch {
                query,
                info,
                processing_time_ms,
            } => {
                client
                    .send_pattern_match(
                        &query,
                        &info.pattern,
                        info.confidence,
                        info.match_type,
                        Some(processing_time_ms),
                    )
                    .await
            }
            Telemetry::Failure {
                error_type,
                error_message,
                stack_trace,
                context,
            } => {
                client
                    .send_error(&error_type, &error_message, Some(stack_trace), context)
                    .await
            }
        }
    }

    async fn deliver(self, client: &EventClient) {
        if let Err(e) = self.send(client).await {
            log::warn!("Failed to send tracking event: {}", e);
        }
    }

    fn deliver_detached(self, client: EventClient) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { self.deliver(&client).await });
            }
            Err(_) => match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime.block_on(self.deliver(&client)),
                Err(e) => log::warn!("Failed to start runtime for tracking event: {}", e),
            },
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().try_into().unwrap_or(u64::MAX)
}

/// `my_crate::errors::SearchError` -> `SearchError`, `Box<dyn Error>` -> `Box`
fn short_type_name(full: &str) -> &str {
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::").next().unwrap_or(path)
}
