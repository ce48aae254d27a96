//! Fleet-wide burn monitoring under `/api/gorilla`.

use axum::{extract::State, Json};
use chrono::Utc;
use pulse_core::{BurnClass, BUILDING_CEILING, OPTIMAL_FLOOR};
use pulse_scheduler::PerformanceMetrics;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;
use crate::error::{pulse_error, ApiResult};

/// GET /api/gorilla/gorilla-burn
pub async fn burn_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    let metrics = state
        .scheduler
        .performance_metrics()
        .map_err(pulse_error)?;

    Ok(Json(json!({
        "burnRate": format!("{:.2}", metrics.avg_burn_rate),
        "status": metrics.class().status_line(),
        "target": {
            "minimum": BUILDING_CEILING,
            "optimal": OPTIMAL_FLOOR,
        },
        "metrics": {
            "activePulses": metrics.active_pulses,
            "totalPulses": metrics.total_pulses,
            "optimalCount": metrics.optimal_pulses,
            "activeCount": metrics.active_tier_pulses,
            "buildingCount": metrics.building_pulses,
        },
        "timestamp": Utc::now(),
    })))
}

/// GET /api/gorilla/gorilla-status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    let metrics = state
        .scheduler
        .performance_metrics()
        .map_err(pulse_error)?;
    let class = metrics.class();

    Ok(Json(json!({
        "status": class.status_line(),
        "emoji": class.emoji(),
        "description": class.description(),
        "burnRate": format!("{:.2}", metrics.avg_burn_rate),
        "activePulses": metrics.active_pulses,
        "breakdown": {
            "optimal": breakdown(&metrics, BurnClass::Optimal),
            "active": breakdown(&metrics, BurnClass::Active),
            "building": breakdown(&metrics, BurnClass::Building),
        },
        "timestamp": Utc::now(),
    })))
}

fn breakdown(metrics: &PerformanceMetrics, class: BurnClass) -> Value {
    json!({
        "count": metrics.count(class),
        "emoji": class.emoji(),
        "description": class.threshold(),
    })
}
