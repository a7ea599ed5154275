// Facility Gateway Server - HTTP routes
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! HTTP surface of the gateway.
//!
//! Handlers are thin: they read the optional source filter, run the
//! gateway operation, count the outcome and render the response with the
//! no-cache header set.

use crate::metrics::{encode_metrics, record_response};
use axum::{
    extract::{Query, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use facility_gateway::envelope::internal_error;
use facility_gateway::{Category, GatewayResponse, TelemetryGateway};
use serde::Deserialize;
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::error;

/// Application state shared across handlers.
pub struct AppState {
    pub gateway: TelemetryGateway,
}

pub type SharedState = Arc<AppState>;

#[derive(Debug, Default, Deserialize)]
pub struct OccupancyQuery {
    pub camera: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PeopleCountQuery {
    pub zone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EnvironmentQuery {
    pub sensor: Option<String>,
}

/// Build the router over shared state.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/occupancy", get(occupancy_handler))
        .route("/api/people-counts", get(people_counts_handler))
        .route("/api/environment", get(environment_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

/// Blank filters mean "all sources"
fn source_filter(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|id| !id.is_empty())
}

/// Render a gateway response with its status and caching headers.
pub fn into_http(response: GatewayResponse) -> Response {
    let status = StatusCode::from_u16(response.status.as_u16())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let headers = response.headers();
    let mut http = (status, Json(response.body)).into_response();
    for &(name, value) in headers {
        http.headers_mut().insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    http
}

/// Parking occupancy handler.
pub async fn occupancy_handler(
    State(state): State<SharedState>,
    Query(query): Query<OccupancyQuery>,
) -> Response {
    let camera = source_filter(query.camera.as_deref());
    let response = state.gateway.occupancy(camera).await;
    record_response(Category::Occupancy, &response);
    into_http(response)
}

/// People count handler.
pub async fn people_counts_handler(
    State(state): State<SharedState>,
    Query(query): Query<PeopleCountQuery>,
) -> Response {
    let zone = source_filter(query.zone.as_deref());
    let response = state.gateway.people_counts(zone).await;
    record_response(Category::PeopleCount, &response);
    into_http(response)
}

/// Environmental readings handler.
pub async fn environment_handler(
    State(state): State<SharedState>,
    Query(query): Query<EnvironmentQuery>,
) -> Response {
    let sensor = source_filter(query.sensor.as_deref());
    let response = state.gateway.environment(sensor).await;
    record_response(Category::Environment, &response);
    into_http(response)
}

/// Health check handler.
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Metrics handler - returns Prometheus text format.
pub async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        encode_metrics(),
    )
}

/// 500 JSON body for a panicking handler
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else {
        "unknown panic payload"
    };
    error!("request handler panicked: {}", detail);
    into_http(internal_error("unexpected failure while handling the request"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use facility_gateway::{
        ConfigError, ErrorCode, FixedClock, MemoryStore, PeopleCountRow, StoreError,
    };
    use serde_json::Value;

    fn state(gateway: TelemetryGateway) -> SharedState {
        let now = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2025, 2, 3, 11, 0, 0)
            .unwrap();
        Arc::new(AppState {
            gateway: gateway.with_clock(Arc::new(FixedClock(now))).with_noise_seed(1),
        })
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_source_filter() {
        assert_eq!(source_filter(None), None);
        assert_eq!(source_filter(Some("  ")), None);
        assert_eq!(source_filter(Some(" A1 ")), Some("A1"));
    }

    #[tokio::test]
    async fn test_people_counts_live() {
        let store = MemoryStore::default().with_people_counts(vec![PeopleCountRow {
            zone_id: "lobby".into(),
            people_count: Some(9),
            captured_at: None,
        }]);
        let state = state(TelemetryGateway::new(Arc::new(store)));
        let response = people_counts_handler(
            State(state),
            Query(PeopleCountQuery {
                zone: Some("lobby".into()),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["cache-control"],
            "no-store, no-cache, must-revalidate, proxy-revalidate, max-age=0"
        );
        assert_eq!(response.headers()["pragma"], "no-cache");
        assert_eq!(response.headers()["expires"], "0");
        let body = json_body(response).await;
        assert_eq!(body["zones"][0]["count"], 9);
        assert_eq!(body["mock"], false);
    }

    #[tokio::test]
    async fn test_soft_failure_served_as_mock() {
        let err = StoreError::connect(ErrorCode::HostNotFound, "db.invalid", 5432, "lookup failed");
        let store = MemoryStore::default().failing(err);
        let state = state(TelemetryGateway::new(Arc::new(store)));
        let response = occupancy_handler(State(state), Query(OccupancyQuery::default())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["reason"], "fallback-mock-dns-enotfound");
        assert_eq!(body["areas"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_sensor_is_404() {
        let state = state(TelemetryGateway::new(Arc::new(MemoryStore::default())));
        let response = environment_handler(
            State(state),
            Query(EnvironmentQuery {
                sensor: Some("env-roof".into()),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key("surrogate-control"));
    }

    #[tokio::test]
    async fn test_unconfigured_is_500() {
        let gateway = TelemetryGateway::unconfigured(ConfigError::Missing(vec!["FACILITY_DB_USER"]));
        let response =
            environment_handler(State(state(gateway)), Query(EnvironmentQuery::default())).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["error"], "configuration missing");
    }

    #[tokio::test]
    async fn test_panic_response_is_json_500() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers()["cache-control"]
            .to_str()
            .unwrap()
            .contains("no-store"));
        let body = json_body(response).await;
        assert_eq!(body["error"], "internal error");
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let response = health_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let response = metrics_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let _router = router(state(TelemetryGateway::new(Arc::new(MemoryStore::default()))));
    }
}
