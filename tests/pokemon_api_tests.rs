//! # Pokemon API Integration Tests
//!
//! The public router against a mocked PokeAPI: response envelope, search,
//! validation errors, upstream failures and the health endpoint.

use axum::http::StatusCode;
use axum_test::TestServer;
use pokedex_gateway::caching::{CacheConfig, CacheManager, InMemoryCache};
use pokedex_gateway::core::config::{AggregatorConfig, ServerConfig, UpstreamConfig};
use pokedex_gateway::{create_app, PokeApiClient, PokemonService};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NAMES: [&str; 6] = [
    "bulbasaur",
    "ivysaur",
    "venusaur",
    "charmander",
    "charmeleon",
    "charizard",
];

fn api_server(upstream: &MockServer) -> TestServer {
    let cache_config = CacheConfig::default();
    let store = Arc::new(InMemoryCache::new(cache_config.memory.clone()));
    let cache = Arc::new(CacheManager::with_store(cache_config, store));

    let upstream_config = UpstreamConfig {
        base_url: upstream.uri(),
        request_timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let client = Arc::new(PokeApiClient::new(&upstream_config, cache).unwrap());
    let service = Arc::new(PokemonService::new(client, AggregatorConfig::default()));

    TestServer::new(create_app(service, &ServerConfig::default())).unwrap()
}

fn index_entry(upstream: &MockServer, id: usize) -> Value {
    json!({
        "name": NAMES[id - 1],
        "url": format!("{}/pokemon/{}/", upstream.uri(), id),
    })
}

fn detail(id: usize) -> Value {
    json!({
        "name": NAMES[id - 1],
        "height": 7,
        "weight": 69,
        "types": [{ "slot": 1, "type": { "name": if id <= 3 { "grass" } else { "fire" } } }],
        "sprites": {
            "front_default": format!("https://img/sprite/{}.png", id),
            "other": { "official-artwork": { "front_default": format!("https://img/artwork/{}.png", id) } }
        }
    })
}

/// Index pages of `limit` over the six names, plus every detail record
async fn mount_pokeapi(upstream: &MockServer, limit: usize) {
    for offset in (0..NAMES.len()).step_by(limit) {
        let results: Vec<Value> = (offset + 1..=(offset + limit).min(NAMES.len()))
            .map(|id| index_entry(upstream, id))
            .collect();
        Mock::given(method("GET"))
            .and(path("/pokemon"))
            .and(query_param("limit", limit.to_string()))
            .and(query_param("offset", offset.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": NAMES.len(),
                "results": results,
            })))
            .mount(upstream)
            .await;
    }

    for id in 1..=NAMES.len() {
        Mock::given(method("GET"))
            .and(path(format!("/pokemon/{}/", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(detail(id)))
            .mount(upstream)
            .await;
    }
}

/// The search pool request: every name at once
async fn mount_search_pool(upstream: &MockServer) {
    let results: Vec<Value> = (1..=NAMES.len()).map(|id| index_entry(upstream, id)).collect();
    Mock::given(method("GET"))
        .and(path("/pokemon"))
        .and(query_param("limit", "200"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1292,
            "results": results,
        })))
        .mount(upstream)
        .await;
}

#[tokio::test]
async fn test_list_returns_envelope() {
    let upstream = MockServer::start().await;
    mount_pokeapi(&upstream, 2).await;
    let server = api_server(&upstream);

    let response = server
        .get("/api/pokemons")
        .add_query_param("page", 2)
        .add_query_param("limit", 2)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Pokemon list retrieved successfully");
    assert_eq!(
        body["data"][0],
        json!({
            "name": "venusaur",
            "image": "https://img/artwork/3.png",
            "types": ["grass"],
            "height": 7,
            "weight": 69,
        })
    );
    assert_eq!(body["data"][1]["name"], "charmander");
    assert_eq!(
        body["pagination"],
        json!({ "current_page": 2, "total_pages": 3, "total_count": 6, "has_next": true })
    );
}

#[tokio::test]
async fn test_last_page_has_no_next() {
    let upstream = MockServer::start().await;
    mount_pokeapi(&upstream, 4).await;
    let server = api_server(&upstream);

    let body: Value = server
        .get("/api/pokemons")
        .add_query_param("page", 2)
        .add_query_param("limit", 4)
        .await
        .json();

    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["pagination"]["has_next"], false);
    assert_eq!(body["pagination"]["total_pages"], 2);
}

#[tokio::test]
async fn test_search_filters_by_name() {
    let upstream = MockServer::start().await;
    mount_pokeapi(&upstream, 20).await;
    mount_search_pool(&upstream).await;
    let server = api_server(&upstream);

    let body: Value = server
        .get("/api/pokemons")
        .add_query_param("search", "  CHAR ")
        .add_query_param("limit", 2)
        .await
        .json();

    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["charmander", "charmeleon"]);
    // Counts come from the matches, not the upstream total
    assert_eq!(
        body["pagination"],
        json!({ "current_page": 1, "total_pages": 2, "total_count": 3, "has_next": true })
    );
}

#[tokio::test]
async fn test_search_without_matches_is_empty() {
    let upstream = MockServer::start().await;
    mount_search_pool(&upstream).await;
    let server = api_server(&upstream);

    let response = server
        .get("/api/pokemons")
        .add_query_param("search", "mewtwo")
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["pagination"]["total_count"], 0);
    assert_eq!(body["pagination"]["has_next"], false);
}

#[tokio::test]
async fn test_broken_detail_is_skipped() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pokemon/2/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&upstream)
        .await;
    mount_pokeapi(&upstream, 3).await;
    let server = api_server(&upstream);

    let response = server
        .get("/api/pokemons")
        .add_query_param("limit", 3)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["bulbasaur", "venusaur"]);
    assert_eq!(body["pagination"]["total_count"], 6);
}

#[tokio::test]
async fn test_invalid_parameters_are_rejected() {
    let upstream = MockServer::start().await;
    let server = api_server(&upstream);

    let response = server
        .get("/api/pokemons")
        .add_query_param("page", "abc")
        .add_query_param("limit", 101)
        .add_query_param("search", "x".repeat(256))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid request parameters");
    assert_eq!(body["errors"]["page"], json!(["The page field must be an integer."]));
    assert_eq!(
        body["errors"]["limit"],
        json!(["The limit field must not be greater than 100."])
    );
    assert_eq!(
        body["errors"]["search"],
        json!(["The search field must not be greater than 255 characters."])
    );

    // Validation happens before any upstream call
    assert!(upstream.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_parameter_gets_validation_envelope() {
    let upstream = MockServer::start().await;
    let server = api_server(&upstream);

    let response = server
        .get("/api/pokemons")
        .add_raw_query_param("page=1&page=2")
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid request parameters");
    assert_eq!(body["errors"]["page"], json!(["The page field must be a single value."]));
    assert!(upstream.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_zero_page_is_rejected() {
    let upstream = MockServer::start().await;
    let server = api_server(&upstream);

    let body: Value = server
        .get("/api/pokemons")
        .add_query_param("page", 0)
        .await
        .json();

    assert_eq!(body["errors"]["page"], json!(["The page field must be at least 1."]));
}

#[tokio::test]
async fn test_upstream_outage_is_503() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pokemon"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&upstream)
        .await;
    let server = api_server(&upstream);

    let response = server.get("/api/pokemons").await;

    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        response.json::<Value>(),
        json!({
            "success": false,
            "message": "External service temporarily unavailable. Please try again later.",
        })
    );
}

#[tokio::test]
async fn test_malformed_index_is_500() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pokemon"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .mount(&upstream)
        .await;
    let server = api_server(&upstream);

    let response = server.get("/api/pokemons").await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(
        body["message"],
        "An internal error occurred. Please try again later."
    );
}

#[tokio::test]
async fn test_repeated_request_uses_cache() {
    let upstream = MockServer::start().await;
    mount_pokeapi(&upstream, 2).await;
    let server = api_server(&upstream);

    for _ in 0..3 {
        let response = server
            .get("/api/pokemons")
            .add_query_param("limit", 2)
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }

    // One index call and two detail calls
    assert_eq!(upstream.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_health_and_headers() {
    let upstream = MockServer::start().await;
    let server = api_server(&upstream);

    let response = server.get("/api/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.header("x-content-type-options"), "nosniff");
    assert_eq!(response.header("x-frame-options"), "DENY");
    assert!(response.header("x-response-time").to_str().unwrap().ends_with("ms"));

    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "Pokedex API");
    let timestamp = body["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}
