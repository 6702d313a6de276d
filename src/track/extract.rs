//! Extraction strategies for trackers
//!
//! An [`Extractor`] derives one event field from the tracked call's
//! arguments and its outcome. Closures work through [`FnExtractor`]; the
//! other types cover the common shapes of search functions.

use serde_json::Value;

use crate::schema::MatchType;

/// Derives an event field from a call's arguments and outcome
pub trait Extractor<A, T, E>: Send + Sync {
    type Value;

    fn extract(&self, args: &A, outcome: Result<&T, &E>) -> Option<Self::Value>;
}

/// Adapts a closure into an [`Extractor`]
pub struct FnExtractor<F>(pub F);

impl<A, T, E, V, F> Extractor<A, T, E> for FnExtractor<F>
where
    F: Fn(&A, Result<&T, &E>) -> Option<V> + Send + Sync,
{
    type Value = V;

    fn extract(&self, args: &A, outcome: Result<&T, &E>) -> Option<V> {
        (self.0)(args, outcome)
    }
}

/// Always yields the same value
pub struct Constant<V>(pub V);

impl<A, T, E, V> Extractor<A, T, E> for Constant<V>
where
    V: Clone + Send + Sync,
{
    type Value = V;

    fn extract(&self, _args: &A, _outcome: Result<&T, &E>) -> Option<V> {
        Some(self.0.clone())
    }
}

/// Argument values whose first element is the query text
pub trait FirstArg {
    fn first_arg(&self) -> Option<String>;
}

fn non_empty(s: &str) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s.to_string()) }
}

impl FirstArg for String {
    fn first_arg(&self) -> Option<String> {
        non_empty(self)
    }
}

impl FirstArg for &str {
    fn first_arg(&self) -> Option<String> {
        non_empty(self)
    }
}

impl<S: AsRef<str>> FirstArg for (S,) {
    fn first_arg(&self) -> Option<String> {
        non_empty(self.0.as_ref())
    }
}

impl<S: AsRef<str>, B> FirstArg for (S, B) {
    fn first_arg(&self) -> Option<String> {
        non_empty(self.0.as_ref())
    }
}

impl<S: AsRef<str>, B, C> FirstArg for (S, B, C) {
    fn first_arg(&self) -> Option<String> {
        non_empty(self.0.as_ref())
    }
}

impl<S: AsRef<str>> FirstArg for Vec<S> {
    fn first_arg(&self) -> Option<String> {
        self.first().and_then(|s| non_empty(s.as_ref()))
    }
}

/// The query is the call's first argument
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryFromFirstArg;

impl<A: FirstArg, T, E> Extractor<A, T, E> for QueryFromFirstArg {
    type Value = String;

    fn extract(&self, args: &A, _outcome: Result<&T, &E>) -> Option<String> {
        args.first_arg()
    }
}

/// Results whose size is the number of hits
pub trait ResultCount {
    fn result_count(&self) -> Option<u64>;
}

impl<U> ResultCount for Vec<U> {
    fn result_count(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

/// JSON arrays count their elements; objects count their `results` array
impl ResultCount for Value {
    fn result_count(&self) -> Option<u64> {
        match self {
            Value::Array(items) => Some(items.len() as u64),
            Value::Object(map) => map.get("results").and_then(Value::as_array).map(|r| r.len() as u64),
            _ => None,
        }
    }
}

/// Number of results returned by a successful call
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultsCountFromList;

impl<A, T: ResultCount, E> Extractor<A, T, E> for ResultsCountFromList {
    type Value = u64;

    fn extract(&self, _args: &A, outcome: Result<&T, &E>) -> Option<u64> {
        outcome.ok().and_then(ResultCount::result_count)
    }
}

/// Pattern details reported by a pattern-matching call
#[derive(Debug, Clone, PartialEq)]
pub struct PatternInfo {
    pub pattern: String,
    pub confidence: f64,
    pub match_type: MatchType,
}

impl Default for PatternInfo {
    fn default() -> Self {
        Self {
            pattern: "unknown".to_string(),
            confidence: 0.0,
            match_type: MatchType::Exact,
        }
    }
}

/// Reads `pattern`, `confidence` and `match_type` from a JSON object result.
///
/// Missing keys fall back to [`PatternInfo::default`]; a `match_type` that is
/// not a known match type yields nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternInfoFromResult;

impl<A, E> Extractor<A, Value, E> for PatternInfoFromResult {
    type Value = PatternInfo;

    fn extract(&self, _args: &A, outcome: Result<&Value, &E>) -> Option<PatternInfo> {
        let result = outcome.ok()?.as_object()?;
        let defaults = PatternInfo::default();

        let match_type = match result.get("match_type").and_then(Value::as_str) {
            Some(raw) => raw.parse().ok()?,
            None => defaults.match_type,
        };

        Some(PatternInfo {
            pattern: result
                .get("pattern")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or(defaults.pattern),
            confidence: result.get("confidence").and_then(Value::as_f64).unwrap_or(defaults.confidence),
            match_type,
        })
    }
}
