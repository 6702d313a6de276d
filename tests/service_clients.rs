//! Integration tests for the service-specific clients

mod common;

use serde_json::{Map, Value, json};

use common::Collector;
use searchpipeline_events::schema::ServiceLifecycleData;
use searchpipeline_events::{
    ClientConfig, EventClient, GenericClient, MatchType, PatternMatcherClient, QueryErrorKind, QueryExecutorClient,
    QueryInterpreterClient, ServiceName,
};

#[tokio::test]
async fn test_pattern_matcher_client() {
    let collector = Collector::start().await;
    let client = PatternMatcherClient::new(ClientConfig::new(collector.url(), ServiceName::Generic)).unwrap();

    client
        .pattern_found("weather tomorrow", "weather", 0.8, MatchType::Fuzzy, 4)
        .await
        .unwrap();
    client
        .pattern_not_found("best pizza", vec!["weather".to_string()], 2)
        .await
        .unwrap();

    let requests = collector.wait_for(2).await;
    let mut bodies: Vec<Value> = requests.into_iter().map(|r| r.body).collect();
    bodies.sort_by_key(|b| b["event_type"].as_str().map(str::to_string));

    assert_eq!(bodies[0]["event_type"], "pattern_match");
    assert_eq!(bodies[0]["service_name"], "pattern-matcher");
    assert_eq!(bodies[0]["match_type"], "fuzzy");
    assert_eq!(bodies[0]["processing_time_ms"], 4);
    assert_eq!(bodies[1]["event_type"], "pattern_no_match");
    assert_eq!(bodies[1]["attempted_patterns"], json!(["weather"]));
}

#[tokio::test]
async fn test_query_clients_share_pool() {
    let collector = Collector::start().await;
    let base = EventClient::new(ClientConfig::new(collector.url(), ServiceName::Generic)).unwrap();
    let executor = QueryExecutorClient::from_client(&base);
    let interpreter = QueryInterpreterClient::from_client(&base);

    executor
        .query_executed("Apple stock price", 2, 40, "zilliz", vec!["sector=tech".to_string()])
        .await
        .unwrap();
    executor
        .query_failed("Apple stock price", QueryErrorKind::Connection, "refused", 3)
        .await
        .unwrap();
    interpreter
        .query_interpreted("apple price", "AAPL stock price", 0.66, 9)
        .await
        .unwrap();

    let requests = collector.wait_for(3).await;
    let by_type = |event_type: &str| {
        requests
            .iter()
            .map(|r| r.body.clone())
            .find(|b| b["event_type"] == event_type)
            .unwrap()
    };

    let executed = by_type("query_execution");
    assert_eq!(executed["service_name"], "query-executor");
    assert_eq!(executed["filters_applied"], json!(["sector=tech"]));

    let failed = by_type("query_error");
    assert_eq!(failed["error_type"], "connection");
    assert_eq!(failed["error_message"], "refused");

    let interpreted = by_type("query_interpretation");
    assert_eq!(interpreted["service_name"], "query-interpreter");
    assert_eq!(interpreted["processing_time_ms"], 9);
}

#[tokio::test]
async fn test_generic_client_lifecycle_and_errors() {
    let collector = Collector::start().await;
    let client = GenericClient::new(ClientConfig::new(collector.url(), ServiceName::SearchGateway)).unwrap();

    let lifecycle = ServiceLifecycleData {
        service_version: Some("1.4.0".to_string()),
        environment: Some("staging".to_string()),
        startup_time_ms: Some(120),
    };
    client.service_started(lifecycle.clone()).await.unwrap();

    let mut context = Map::new();
    context.insert("request_id".to_string(), json!("r-9"));
    client
        .error_occurred("ConnectionError", "upstream reset", Some("trace".to_string()), context)
        .await
        .unwrap();

    client.service_stopped(ServiceLifecycleData::default()).await.unwrap();

    let requests = collector.wait_for(3).await;
    let types: Vec<&str> = requests.iter().filter_map(|r| r.body["event_type"].as_str()).collect();
    assert!(types.contains(&"service_start"));
    assert!(types.contains(&"service_stop"));
    assert!(types.contains(&"error"));

    for request in &requests {
        assert_eq!(request.body["service_name"], "search-gateway");
        match request.body["event_type"].as_str() {
            Some("service_start") => {
                assert_eq!(request.body["service_version"], "1.4.0");
                assert_eq!(request.body["startup_time_ms"], 120);
            }
            Some("service_stop") => assert!(request.body.get("service_version").is_none()),
            Some("error") => {
                assert_eq!(request.body["error_type"], "ConnectionError");
                assert_eq!(request.body["context"]["request_id"], "r-9");
            }
            other => panic!("unexpected event type {:?}", other),
        }
    }

    client.close();
}
