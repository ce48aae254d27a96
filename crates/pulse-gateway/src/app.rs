use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use pulse_core::PulseConfig;
use pulse_registry::KeyRegistry;
use pulse_scheduler::PulseScheduler;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{pulse_auth, vault_auth};
use crate::http::{gorilla, health, keys, pulse};

/// Central shared state, passed as `Arc<AppState>` to every handler.
pub struct AppState {
    pub config: PulseConfig,
    pub registry: KeyRegistry,
    pub scheduler: PulseScheduler,
}

impl AppState {
    pub fn new(config: PulseConfig, registry: KeyRegistry, scheduler: PulseScheduler) -> Self {
        Self {
            config,
            registry,
            scheduler,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let pulse_routes = Router::new()
        .route("/pulse/start", post(pulse::start_handler))
        .route("/pulse/stop", post(pulse::stop_handler))
        .route("/pulse/status/{pulse_id}", get(pulse::status_handler))
        .route("/pulse/metrics", get(pulse::metrics_handler))
        .route("/pulse/history/{pulse_id}", get(pulse::history_handler))
        .route("/gorilla/gorilla-burn", get(gorilla::burn_handler))
        .route("/gorilla/gorilla-status", get(gorilla::status_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), pulse_auth));

    let key_routes = Router::new()
        .route("/keys/register", post(keys::register_handler))
        .route("/keys/verify", get(keys::verify_handler))
        .route("/keys/list", get(keys::list_handler))
        .route("/keys/revoke/{key_name}", delete(keys::revoke_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), vault_auth));

    Router::new()
        .route("/health", get(health::health_handler))
        .nest("/api", pulse_routes.merge(key_routes))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use pulse_core::config::{ComplianceMode, TREATY_ID};
    use pulse_registry::NewKey;
    use pulse_scheduler::{
        AnalysisCollaborator, AnalysisError, Assessment, Credentials, MemoryHistory,
        SchedulerSettings, Snapshot, SyntheticFeed,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    pub(crate) const VAULT_AUTH: &str = "VAULT_AUTH_0123456789ABCDEF0123456789ABCDEF";
    pub(crate) const PULSE_KEY: &str = "FAA_KEY_OMEGA_openai_prod_pulse_1.0.0";

    struct FixedAnalyzer;

    #[async_trait::async_trait]
    impl AnalysisCollaborator for FixedAnalyzer {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn analyze(
            &self,
            _snapshot: &Snapshot,
            _credentials: &Credentials,
        ) -> Result<Assessment, AnalysisError> {
            Ok(Assessment::from_text("Yield score: 70", chrono::Utc::now()))
        }
    }

    pub(crate) fn state_with(mode: ComplianceMode) -> Arc<AppState> {
        let mut config = PulseConfig::default();
        config.vault.compliance_mode = mode;
        let scheduler = PulseScheduler::new(
            SchedulerSettings {
                interval: Duration::from_secs(9),
                recent_history: 10,
            },
            Arc::new(SyntheticFeed::default()),
            Arc::new(FixedAnalyzer),
            Arc::new(MemoryHistory::new()),
        );
        Arc::new(AppState::new(config, KeyRegistry::new(), scheduler))
    }

    pub(crate) fn state() -> Arc<AppState> {
        state_with(ComplianceMode::Strict)
    }

    pub(crate) fn register_pulse_key(state: &AppState) {
        state
            .registry
            .register(NewKey::new(PULSE_KEY, "openai", "prod", "pulse", "1.0.0"))
            .unwrap();
    }

    pub(crate) fn vault_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-vault-auth", VAULT_AUTH)
            .header("x-vault-level", "7")
            .header("x-faa-treaty", TREATY_ID)
            .header("content-type", "application/json");
        builder
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap()
    }

    pub(crate) fn pulse_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-pulse-key", PULSE_KEY)
            .header("x-vault-level", "7")
            .header("x-faa-treaty", TREATY_ID)
            .header("x-api-key", "sk-test")
            .header("content-type", "application/json");
        builder
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap()
    }

    pub(crate) async fn send(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, Value) {
        let resp = build_router(state.clone()).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn health_needs_no_auth() {
        let state = state();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["vaultLevel"], 7);
        assert_eq!(body["complianceStrict"], true);
        assert_eq!(body["activePulses"], 0);
    }

    #[tokio::test]
    async fn register_then_verify_end_to_end() {
        let state = state();
        let (status, body) = send(
            &state,
            vault_request(
                "POST",
                "/api/keys/register",
                Some(json!({
                    "key_name": PULSE_KEY,
                    "provider": "openai",
                    "environment": "prod",
                    "service": "pulse",
                    "version": "1.0.0",
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Key registered successfully in VaultMesh");
        assert_eq!(body["key"]["key_name"], PULSE_KEY);
        assert_eq!(body["key"]["status"], "active");
        assert!(body["key"]["claimroot_anchor"]
            .as_str()
            .unwrap()
            .starts_with("CLAIM_ROOT_"));

        let (status, body) = send(
            &state,
            vault_request("GET", &format!("/api/keys/verify?key_name={PULSE_KEY}"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], true);
        assert_eq!(body["key"]["key_name"], PULSE_KEY);
    }

    #[tokio::test]
    async fn pulse_routes_require_a_registered_key() {
        let state = state();
        let req = pulse_request("GET", "/api/pulse/metrics", None);
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid or inactive pulse key");

        register_pulse_key(&state);
        let (status, body) = send(&state, pulse_request("GET", "/api/pulse/metrics", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["activePulses"], 0);
    }
}
