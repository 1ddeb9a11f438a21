//! Tests for the HTTP API
//!
//! Each test serves the router on an ephemeral port, backed by a client over the
//! scripted transport, and talks to it with a real HTTP client.

mod common;

use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

use common::http_client::{get, post_json};
use common::mock_http::{mock_client, MockHttp};
use common::test_data::{hourly_grid_bytes, STEPS};
use wiwb::transport::HttpResponse;
use wiwb::{AppState, Config};

async fn start_server(http: Arc<MockHttp>) -> SocketAddr {
    let state = AppState::new(Config::default(), mock_client(http)).shared();
    let app = wiwb::handlers::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn scenario_query() -> Value {
    json!({
        "data_source_code": "Meteobase.Precipitation",
        "variable_code": "P",
        "start": "2015-01-01",
        "end": "2015-01-02",
        "crs": 28992,
        "geometries": {
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"name": "gauge"},
                    "geometry": {"type": "Point", "coordinates": [119865.0, 449665.0]}
                },
                {
                    "type": "Feature",
                    "properties": {"name": "catchment"},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[
                            [119865.0, 449665.0],
                            [127325.0, 449665.0],
                            [127325.0, 453565.0],
                            [119865.0, 453565.0],
                            [119865.0, 449665.0]
                        ]]
                    }
                }
            ]
        }
    })
}

#[tokio::test]
async fn test_heartbeat() {
    let http = MockHttp::new().shared();
    let addr = start_server(http.clone()).await;

    let response = get(&addr, "/heartbeat").await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"]["client_id"], "test-client");
    assert_eq!(body["service"]["token_valid"], false);
    assert!(body["server_id"].is_string());
    // The heartbeat never fetches a token
    assert_eq!(http.token_requests(), 0);
}

#[tokio::test]
async fn test_grid_file_download() {
    let http = MockHttp::new()
        .reply(HttpResponse::new(200, "grid bytes"))
        .shared();
    let addr = start_server(http.clone()).await;

    let mut query = scenario_query();
    query["format"] = json!("netcdf4.cf1p6");
    let response = post_json(&addr, "/grids/file", &query).await.unwrap();
    assert_eq!(response.status(), 200);

    let disposition = response
        .headers()
        .get("content-disposition")
        .and_then(|value| value.to_str().ok())
        .map(String::from);
    assert_eq!(
        disposition.as_deref(),
        Some("attachment; filename=\"Meteobase.Precipitation_P_2015-01-01_2015-01-02.nc\"")
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"grid bytes");

    let body = http.last_body().unwrap();
    assert_eq!(body["Readers"][0]["Settings"]["Extent"]["Xll"], 119865.0);
    assert_eq!(body["Exporter"]["DataFormatCode"], "netcdf4.cf1p6");
}

#[tokio::test]
async fn test_grid_sample() {
    let http = MockHttp::new()
        .reply(HttpResponse::new(200, hourly_grid_bytes(&[])))
        .shared();
    let addr = start_server(http).await;

    let mut query = scenario_query();
    query["stats"] = json!(["mean", "max"]);
    let response = post_json(&addr, "/grids/sample", &query).await.unwrap();
    assert_eq!(response.status(), 200);

    let table: Value = response.json().await.unwrap();
    assert_eq!(
        table["columns"],
        json!(["gauge_mean", "gauge_max", "catchment_mean", "catchment_max"])
    );
    assert_eq!(table["index"].as_array().map(Vec::len), Some(STEPS));
    assert_eq!(table["data"][0], json!([1.0, 1.0, 1.0, 1.0]));
    assert_eq!(table["data"][23], json!([24.0, 24.0, 24.0, 24.0]));
}

#[tokio::test]
async fn test_invalid_query_is_bad_request() {
    let http = MockHttp::new().shared();
    let addr = start_server(http.clone()).await;

    // Neither bounds nor geometries
    let query = json!({
        "data_source_code": "Meteobase.Precipitation",
        "variable_code": "P",
        "start": "2015-01-01",
        "end": "2015-01-02",
        "crs": 28992
    });
    let response = post_json(&addr, "/grids/file", &query).await.unwrap();
    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
    assert!(body["request_id"].is_string());
    assert!(http.requests().is_empty());
}

#[tokio::test]
async fn test_remote_status_passes_through() {
    let http = MockHttp::new()
        .reply(HttpResponse::new(404, "Unknown variable"))
        .shared();
    let addr = start_server(http).await;

    let response = post_json(&addr, "/grids/file", &scenario_query())
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .is_some_and(|message| message.contains("Unknown variable")));
}

#[tokio::test]
async fn test_rejected_credentials_are_bad_gateway() {
    let http = MockHttp::new().with_token_status(401).shared();
    let addr = start_server(http).await;

    let response = post_json(&addr, "/grids/sample", &scenario_query())
        .await
        .unwrap();
    assert_eq!(response.status(), 502);
}
