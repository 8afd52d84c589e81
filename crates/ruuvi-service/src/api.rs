//! REST API endpoints for the ruuvi-service.
//!
//! Sensor gateways post batches of readings to `/api/ruuvi`; they land in the
//! ingestion buffer and reach the store on the next flush. Every read
//! endpoint queries the store only, so freshly posted readings become visible
//! after at most one flush interval.
//!
//! # Lock Acquisition
//!
//! Handlers take `state.store` for the duration of a query and release it
//! before building the response. The buffer is touched without awaiting.
//! When more than one lock is needed the order is `config`, `store`,
//! `flusher.stats`.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use ruuvi_service::api;
//!
//! let app = api::router().with_state(state);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info};

use ruuvi_store::StoredDevice;
use ruuvi_types::{SensorData, TimeRange};

use crate::flush::FlushError;
use crate::flusher::flush_now;
use crate::history::{ChartPoint, query_range};
use crate::state::{AppState, FlushStats};
use crate::trends::DeviceTrend;
use crate::util::now_millis;

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(get_status))
        // Ingestion
        .route("/api/ruuvi", post(ingest))
        .route("/api/flush", post(flush))
        // Queries
        .route("/api/devices", get(list_devices))
        .route("/api/history/{device_id}", get(get_history))
        .route("/api/trends", get(get_trends))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// Service status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    /// Readings waiting for the next flush.
    pub buffered: usize,
    /// Readings in the store.
    pub stored: u64,
    pub flusher: FlusherStatus,
}

/// Flusher part of [`StatusResponse`].
#[derive(Debug, Serialize)]
pub struct FlusherStatus {
    pub running: bool,
    pub interval_secs: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(flatten)]
    pub stats: FlushStats,
}

async fn get_status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, AppError> {
    let interval_secs = state.config.read().await.buffer.flush_interval_secs;
    let stored = state.store.lock().await.count_readings(None)?;
    let stats = state.flusher.stats.read().await.clone();

    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        buffered: state.buffer.len(),
        stored,
        flusher: FlusherStatus {
            running: state.flusher.is_running(),
            interval_secs,
            started_at: state.flusher.started_at(),
            stats,
        },
    }))
}

/// Response to an ingestion request.
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Number of readings buffered.
    pub accepted: usize,
}

/// Buffer every `deviceId -> sensorData` entry of the payload.
///
/// Each entry is stamped with the time it was buffered. Unknown fields in
/// the sensor data are ignored; missing ones are kept as null.
async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BTreeMap<String, SensorData>>,
) -> Json<IngestResponse> {
    for (device_id, data) in &payload {
        state.buffer.add_reading(device_id, data);
    }
    debug!(
        "Buffered {} reading(s), {} pending",
        payload.len(),
        state.buffer.len()
    );

    Json(IngestResponse {
        accepted: payload.len(),
    })
}

/// Response to a manual flush.
#[derive(Debug, Serialize, Deserialize)]
pub struct FlushResponse {
    /// Number of readings written to the store.
    pub flushed: usize,
}

async fn flush(State(state): State<Arc<AppState>>) -> Result<Json<FlushResponse>, AppError> {
    let flushed = flush_now(&state).await?;
    info!("Manual flush stored {} reading(s)", flushed);
    Ok(Json(FlushResponse { flushed }))
}

async fn list_devices(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<StoredDevice>>, AppError> {
    let store = state.store.lock().await;
    Ok(Json(store.list_devices()?))
}

/// Query parameters for `/api/history/{device_id}`.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// One of `1h`, `6h`, `24h`, `7d`, `30d`, `all`. Defaults to `24h`.
    pub range: Option<String>,
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ChartPoint>>, AppError> {
    let range = match query.range.as_deref() {
        Some(token) => token
            .parse::<TimeRange>()
            .map_err(|e| AppError::BadRequest(e.to_string()))?,
        None => TimeRange::default(),
    };

    let store = state.store.lock().await;
    let points = query_range(&store, &device_id, range, now_millis())?;
    debug!("History for {} ({}): {} point(s)", device_id, range, points.len());
    Ok(Json(points))
}

/// Query parameters for `/api/trends`.
#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    /// Comma-separated device ids.
    pub devices: Option<String>,
}

impl TrendsQuery {
    fn device_ids(&self) -> Vec<&str> {
        self.devices
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .collect()
    }
}

async fn get_trends(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrendsQuery>,
) -> Result<Json<Vec<DeviceTrend>>, AppError> {
    let ids = query.device_ids();
    if ids.is_empty() {
        return Err(AppError::BadRequest(
            "Query parameter 'devices' must list at least one device id".to_string(),
        ));
    }

    let store = state.store.lock().await;
    let trends = state.trends.compute_trends(&store, &ids, now_millis())?;
    Ok(Json(trends))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Store(ruuvi_store::Error),
    Flush(FlushError),
}

impl From<ruuvi_store::Error> for AppError {
    fn from(e: ruuvi_store::Error) -> Self {
        AppError::Store(e)
    }
}

impl From<FlushError> for AppError {
    fn from(e: FlushError) -> Self {
        AppError::Flush(e)
    }
}

fn store_status(error: &ruuvi_store::Error) -> StatusCode {
    match error {
        ruuvi_store::Error::Closed => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Store(e) => (store_status(&e), e.to_string()),
            AppError::Flush(e) => (store_status(&e.source), e.to_string()),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use ruuvi_types::Reading;

    use crate::config::Config;

    fn create_test_state() -> Arc<AppState> {
        let store = ruuvi_store::Store::open_in_memory().unwrap();
        AppState::new(store, Config::default())
    }

    async fn response_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn insert(state: &AppState, device: &str, timestamp: i64, temperature: f64) {
        let reading = Reading {
            timestamp,
            temperature: Some(temperature),
            humidity: Some(45.0),
            pressure: Some(101_325.0),
            battery: Some(3.0),
        };
        state
            .store
            .lock()
            .await
            .insert_reading(device, &reading)
            .unwrap();
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = router().with_state(create_test_state());

        let response = app.oneshot(get("/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_ingest_buffers_readings() {
        let state = create_test_state();
        let app = router().with_state(Arc::clone(&state));

        let body = r#"{
            "AA:BB:CC:DD:EE:01": {"temperature": 21.5, "humidity": 45.0, "pressure": 101325, "battery": 2.9, "rssi": -70},
            "AA:BB:CC:DD:EE:02": {"temperature": 19.0}
        }"#;
        let response = app.oneshot(post_json("/api/ruuvi", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["accepted"], 2);

        let contents = state.buffer.contents();
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0].device_id, "aa:bb:cc:dd:ee:01");
        assert_eq!(contents[0].reading.battery, Some(2.9));
        assert!(contents[1].reading.humidity.is_none());

        // Nothing stored until a flush
        assert_eq!(state.store.lock().await.count_readings(None).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ingest_empty_object() {
        let state = create_test_state();
        let app = router().with_state(Arc::clone(&state));

        let response = app.oneshot(post_json("/api/ruuvi", "{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["accepted"], 0);
        assert!(state.buffer.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_malformed_json() {
        let state = create_test_state();
        let app = router().with_state(Arc::clone(&state));

        let response = app
            .oneshot(post_json("/api/ruuvi", "not json"))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
        assert!(state.buffer.is_empty());
    }

    #[tokio::test]
    async fn test_flush_endpoint() {
        let state = create_test_state();
        state
            .buffer
            .add_reading("AA:BB", &SensorData::new(20.0, 40.0, 101_000.0, 3.0));
        let app = router().with_state(Arc::clone(&state));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/flush")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["flushed"], 1);

        assert!(state.buffer.is_empty());
        assert_eq!(state.store.lock().await.count_readings(None).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_flush_endpoint_closed_store() {
        let state = create_test_state();
        state.store.lock().await.close().unwrap();
        state.buffer.add_reading("AA:BB", &SensorData::default());
        let app = router().with_state(Arc::clone(&state));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/flush")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = response_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("Store is closed"));
        assert_eq!(state.buffer.len(), 1);
    }

    #[tokio::test]
    async fn test_history_default_range() {
        let state = create_test_state();
        let now = now_millis();
        insert(&state, "aa:bb", now - 2 * ruuvi_types::DAY_MS, 10.0).await;
        insert(&state, "aa:bb", now - 60_000, 21.0).await;
        insert(&state, "aa:bb", now - 30_000, 22.0).await;
        let app = router().with_state(state);

        let response = app.oneshot(get("/api/history/AA:BB")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        let points = json.as_array().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0]["temperature"], 21.0);
        assert_eq!(points[1]["temperature"], 22.0);
        assert!(points[0].get("battery").is_none());
    }

    #[tokio::test]
    async fn test_history_all_range() {
        let state = create_test_state();
        let now = now_millis();
        insert(&state, "aa:bb", now - 90 * ruuvi_types::DAY_MS, 10.0).await;
        insert(&state, "aa:bb", now - 60_000, 21.0).await;
        let app = router().with_state(state);

        let response = app.oneshot(get("/api/history/aa:bb?range=all")).await.unwrap();
        let json = response_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_history_invalid_range() {
        let app = router().with_state(create_test_state());

        let response = app
            .oneshot(get("/api/history/aa:bb?range=2w"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("2w"));
    }

    #[tokio::test]
    async fn test_history_unknown_device() {
        let app = router().with_state(create_test_state());

        let response = app.oneshot(get("/api/history/nobody?range=7d")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_history_closed_store() {
        let state = create_test_state();
        state.store.lock().await.close().unwrap();
        let app = router().with_state(state);

        let response = app.oneshot(get("/api/history/aa:bb")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_trends_endpoint() {
        let state = create_test_state();
        let now = now_millis();
        insert(&state, "d1", now - 30 * 60_000, 20.0).await;
        insert(&state, "d1", now - 1_000, 21.5).await;
        let app = router().with_state(state);

        let response = app.oneshot(get("/api/trends?devices=D1,%20ghost")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        let trends = json.as_array().unwrap();
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0]["deviceId"], "d1");
        assert_eq!(trends[0]["temperature"]["direction"], "rising");
        assert_eq!(trends[1]["deviceId"], "ghost");
        assert!(trends[1]["temperature"].is_null());
    }

    #[tokio::test]
    async fn test_trends_requires_devices() {
        let state = create_test_state();

        for uri in ["/api/trends", "/api/trends?devices=", "/api/trends?devices=,,"] {
            let app = router().with_state(Arc::clone(&state));
            let response = app.oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_list_devices() {
        let state = create_test_state();
        insert(&state, "older", 1_000, 20.0).await;
        insert(&state, "newer", 5_000, 20.0).await;
        insert(&state, "newer", 6_000, 20.0).await;
        let app = router().with_state(state);

        let response = app.oneshot(get("/api/devices")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        let devices = json.as_array().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0]["id"], "newer");
        assert_eq!(devices[0]["reading_count"], 2);
        assert_eq!(devices[1]["id"], "older");
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let state = create_test_state();
        state.buffer.add_reading("a", &SensorData::default());
        state.buffer.add_reading("b", &SensorData::default());
        insert(&state, "c", 1_000, 20.0).await;
        let app = router().with_state(state);

        let response = app.oneshot(get("/api/status")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["buffered"], 2);
        assert_eq!(json["stored"], 1);
        assert_eq!(json["flusher"]["running"], false);
        assert_eq!(json["flusher"]["interval_secs"], 60);
        assert_eq!(json["flusher"]["flush_count"], 0);
        assert!(json["flusher"]["started_at"].is_null());
    }

    #[test]
    fn test_trends_query_parsing() {
        let query = TrendsQuery {
            devices: Some(" a , b,,c ".to_string()),
        };
        assert_eq!(query.device_ids(), vec!["a", "b", "c"]);

        let query = TrendsQuery { devices: None };
        assert!(query.device_ids().is_empty());
    }
}
