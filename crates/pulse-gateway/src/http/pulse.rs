//! Pulse lifecycle endpoints under `/api/pulse`.
//!
//! Credentials for the analysis backend are taken from `x-api-key` and
//! handed to the scheduler untouched.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use pulse_scheduler::{
    Credentials, DataSource, PerformanceMetrics, PulseStats, StartReceipt, StopReceipt,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;
use crate::error::{bad_body, message, pulse_error, ApiResult};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBody {
    #[serde(default)]
    pub pulse_id: Option<String>,
    #[serde(default)]
    pub brand_data_source: Option<DataSource>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopBody {
    #[serde(default)]
    pub pulse_id: Option<String>,
}

/// POST /api/pulse/start
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<StartBody>, JsonRejection>,
) -> ApiResult<StartReceipt> {
    let Json(body) = body.map_err(bad_body)?;
    let Some(pulse_id) = body.pulse_id.filter(|id| !id.is_empty()) else {
        return Err(message(StatusCode::BAD_REQUEST, "pulseId is required"));
    };
    let Some(source) = body
        .brand_data_source
        .filter(|s| !s.brand_name.is_empty())
    else {
        return Err(message(
            StatusCode::BAD_REQUEST,
            "brandDataSource with brandName is required",
        ));
    };

    let api_key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    state
        .scheduler
        .start(&pulse_id, source, Credentials::new(api_key))
        .map(Json)
        .map_err(pulse_error)
}

/// POST /api/pulse/stop
pub async fn stop_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<StopBody>, JsonRejection>,
) -> ApiResult<StopReceipt> {
    let Json(body) = body.map_err(bad_body)?;
    let Some(pulse_id) = body.pulse_id.filter(|id| !id.is_empty()) else {
        return Err(message(StatusCode::BAD_REQUEST, "pulseId is required"));
    };
    state.scheduler.stop(&pulse_id).map(Json).map_err(pulse_error)
}

/// GET /api/pulse/status/{pulse_id}
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
    Path(pulse_id): Path<String>,
) -> ApiResult<PulseStats> {
    state.scheduler.stats(&pulse_id).map(Json).map_err(pulse_error)
}

/// GET /api/pulse/metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> ApiResult<PerformanceMetrics> {
    state
        .scheduler
        .performance_metrics()
        .map(Json)
        .map_err(pulse_error)
}

/// GET /api/pulse/history/{pulse_id}. Full log, including stopped runs.
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Path(pulse_id): Path<String>,
) -> ApiResult<Value> {
    let history = state.scheduler.history(&pulse_id).map_err(pulse_error)?;
    Ok(Json(json!({
        "pulseId": pulse_id,
        "count": history.len(),
        "history": history,
    })))
}

#[cfg(test)]
mod tests {
    use crate::app::tests::{pulse_request, register_pulse_key, send, state};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn start_status_stop_round_trip() {
        let state = state();
        register_pulse_key(&state);

        let start = json!({"pulseId": "p1", "brandDataSource": {"brandName": "Acme"}});
        let (status, body) =
            send(&state, pulse_request("POST", "/api/pulse/start", Some(start.clone()))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["pulseId"], "p1");
        assert_eq!(body["interval"], "9s");

        let (status, _) = send(&state, pulse_request("POST", "/api/pulse/start", Some(start))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(&state, pulse_request("GET", "/api/pulse/status/p1", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cycleCount"], 0);
        assert_eq!(body["gorillaBurnStatus"], "building");

        let (status, body) = send(
            &state,
            pulse_request("POST", "/api/pulse/stop", Some(json!({"pulseId": "p1"}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stats"]["cycleCount"], 0);

        let (status, _) = send(&state, pulse_request("GET", "/api/pulse/status/p1", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&state, pulse_request("GET", "/api/pulse/history/p1", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn start_requires_id_and_brand() {
        let state = state();
        register_pulse_key(&state);

        let (status, body) = send(
            &state,
            pulse_request("POST", "/api/pulse/start", Some(json!({"brandDataSource": {"brandName": "Acme"}}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "pulseId is required");

        let (status, body) = send(
            &state,
            pulse_request("POST", "/api/pulse/start", Some(json!({"pulseId": "p1", "brandDataSource": {}}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "brandDataSource with brandName is required");
    }

    #[tokio::test]
    async fn mistyped_body_is_a_bad_request() {
        let state = state();
        register_pulse_key(&state);

        let start = json!({"pulseId": 5, "brandDataSource": {"brandName": "Acme"}});
        let (status, body) =
            send(&state, pulse_request("POST", "/api/pulse/start", Some(start))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid request body");
        assert!(body["error"].as_str().unwrap().contains("pulseId"));
        assert_eq!(state.scheduler.active_count(), 0);

        let mut req = pulse_request("POST", "/api/pulse/stop", Some(json!({"pulseId": "p1"})));
        req.headers_mut().remove("content-type");
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid request body");
    }

    #[tokio::test]
    async fn stopping_unknown_pulse_is_not_found() {
        let state = state();
        register_pulse_key(&state);
        let (status, _) = send(
            &state,
            pulse_request("POST", "/api/pulse/stop", Some(json!({"pulseId": "ghost"}))),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
