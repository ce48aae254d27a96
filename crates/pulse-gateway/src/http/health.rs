use axum::{extract::State, Json};
use pulse_core::config::ComplianceMode;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health. Liveness probe with server metadata.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "vaultLevel": state.config.vault.level,
        "complianceStrict": state.config.vault.compliance_mode == ComplianceMode::Strict,
        "activePulses": state.scheduler.active_count(),
    }))
}
