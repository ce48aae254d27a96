//! Key registry endpoints under `/api/keys`, behind vault auth.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use pulse_registry::{KeyFilter, KeyRegistryEntry, NewKey, Verification};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::app::AppState;
use crate::error::{bad_body, message, missing_fields, registry_error, ApiError, ApiResult};

const REQUIRED_FIELDS: [&str; 5] = ["key_name", "provider", "environment", "service", "version"];

#[derive(Deserialize)]
pub struct RegisterBody {
    pub key_name: Option<String>,
    pub provider: Option<String>,
    pub environment: Option<String>,
    pub service: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub claimroot_anchor: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl RegisterBody {
    /// `None` if any required field is missing or empty.
    fn into_new_key(self) -> Option<NewKey> {
        let present = |v: Option<String>| v.filter(|s| !s.is_empty());
        Some(NewKey {
            key_name: present(self.key_name)?,
            provider: present(self.provider)?,
            environment: present(self.environment)?,
            service: present(self.service)?,
            version: present(self.version)?,
            issued_at: None,
            expires_at: self.expires_at,
            claimroot_anchor: self.claimroot_anchor,
            metadata: self.metadata,
        })
    }
}

#[derive(Deserialize)]
pub struct VerifyQuery {
    pub key_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub provider: Option<String>,
    pub environment: Option<String>,
    pub service: Option<String>,
    pub status: Option<String>,
}

impl ListQuery {
    /// Typed filter, or `None` when some value names no known variant and so
    /// cannot match any entry.
    fn to_filter(&self) -> Option<KeyFilter> {
        fn parse<T: std::str::FromStr>(raw: &Option<String>) -> Option<Option<T>> {
            match raw.as_deref().filter(|s| !s.is_empty()) {
                None => Some(None),
                Some(s) => s.parse().ok().map(Some),
            }
        }
        Some(KeyFilter {
            provider: parse(&self.provider)?,
            environment: parse(&self.environment)?,
            service: parse(&self.service)?,
            status: parse(&self.status)?,
        })
    }

    /// The filters that were supplied, echoed back to the caller.
    fn echo(&self) -> Value {
        let mut out = Map::new();
        for (name, value) in [
            ("provider", &self.provider),
            ("environment", &self.environment),
            ("service", &self.service),
            ("status", &self.status),
        ] {
            if let Some(v) = value.as_deref().filter(|s| !s.is_empty()) {
                out.insert(name.to_string(), Value::String(v.to_string()));
            }
        }
        Value::Object(out)
    }
}

fn key_receipt(entry: &KeyRegistryEntry, message: &str) -> Value {
    json!({
        "success": true,
        "key": entry,
        "message": message,
    })
}

/// POST /api/keys/register. Answers 201 with the stored entry.
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RegisterBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(body) = body.map_err(bad_body)?;
    let new_key = body
        .into_new_key()
        .ok_or_else(|| missing_fields(&REQUIRED_FIELDS))?;
    let entry = state.registry.register(new_key).map_err(registry_error)?;
    Ok((
        StatusCode::CREATED,
        Json(key_receipt(&entry, "Key registered successfully in VaultMesh")),
    ))
}

/// GET /api/keys/verify?key_name=
pub async fn verify_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyQuery>,
) -> ApiResult<Verification> {
    let Some(key_name) = query.key_name.filter(|k| !k.is_empty()) else {
        return Err(message(
            StatusCode::BAD_REQUEST,
            "key_name query parameter is required",
        ));
    };
    Ok(Json(state.registry.verify(&key_name)))
}

/// GET /api/keys/list?provider=&environment=&service=&status=
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult {
    let keys = match query.to_filter() {
        Some(filter) => state.registry.list(&filter),
        None => Vec::new(),
    };
    Ok(Json(json!({
        "count": keys.len(),
        "keys": keys,
        "filters": query.echo(),
    })))
}

/// DELETE /api/keys/revoke/{key_name}
pub async fn revoke_handler(
    State(state): State<Arc<AppState>>,
    Path(key_name): Path<String>,
) -> ApiResult {
    let entry = state.registry.revoke(&key_name).map_err(registry_error)?;
    Ok(Json(key_receipt(&entry, "Key revoked successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{send, state, vault_request};

    fn register_body(key_name: &str, service: &str) -> Value {
        json!({
            "key_name": key_name,
            "provider": "openai",
            "environment": "prod",
            "service": service,
            "version": "1.0.0",
        })
    }

    #[test]
    fn unknown_filter_value_matches_nothing() {
        let query = ListQuery {
            provider: Some("mistral".into()),
            ..ListQuery::default()
        };
        assert!(query.to_filter().is_none());

        let query = ListQuery {
            service: Some("pulse".into()),
            status: Some(String::new()),
            ..ListQuery::default()
        };
        let filter = query.to_filter().unwrap();
        assert!(filter.service.is_some());
        assert!(filter.status.is_none());
        assert_eq!(query.echo(), json!({"service": "pulse"}));
    }

    #[tokio::test]
    async fn register_reports_missing_fields() {
        let state = state();
        let (status, body) = send(
            &state,
            vault_request("POST", "/api/keys/register", Some(json!({"key_name": "x"}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Missing required fields");
        assert_eq!(body["required"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn register_maps_validation_and_conflict() {
        let state = state();
        let (status, _) = send(
            &state,
            vault_request(
                "POST",
                "/api/keys/register",
                Some(register_body("FAA_KEY_OMEGA_openai_prod_pulse_1.0", "pulse")),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(state.registry.is_empty());

        let body = register_body("FAA_KEY_OMEGA_openai_prod_pulse_1.0.0", "pulse");
        let (status, _) = send(&state, vault_request("POST", "/api/keys/register", Some(body.clone()))).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = send(&state, vault_request("POST", "/api/keys/register", Some(body))).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn list_filters_and_revoke() {
        let state = state();
        for (name, service) in [
            ("FAA_KEY_OMEGA_openai_prod_pulse_1.0.0", "pulse"),
            ("FAA_KEY_OMEGA_openai_prod_vault_1.0.0", "vault"),
        ] {
            let (status, _) = send(
                &state,
                vault_request("POST", "/api/keys/register", Some(register_body(name, service))),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, body) = send(&state, vault_request("GET", "/api/keys/list", None)).await;
        assert_eq!(body["count"], 2);

        let (_, body) = send(&state, vault_request("GET", "/api/keys/list?service=vault", None)).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["filters"]["service"], "vault");

        let (status, body) = send(
            &state,
            vault_request("DELETE", "/api/keys/revoke/FAA_KEY_OMEGA_openai_prod_vault_1.0.0", None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Key revoked successfully");
        assert_eq!(body["key"]["key_name"], "FAA_KEY_OMEGA_openai_prod_vault_1.0.0");
        assert_eq!(body["key"]["status"], "revoked");

        let (_, body) = send(&state, vault_request("GET", "/api/keys/list?status=revoked", None)).await;
        assert_eq!(body["count"], 1);

        let (status, _) = send(&state, vault_request("DELETE", "/api/keys/revoke/nope", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn register_rejects_mistyped_body() {
        let state = state();
        let mut body = register_body("FAA_KEY_OMEGA_openai_prod_pulse_1.0.0", "pulse");
        body["version"] = json!(1);
        let (status, body) =
            send(&state, vault_request("POST", "/api/keys/register", Some(body))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid request body");
        assert!(state.registry.is_empty());
    }

    #[tokio::test]
    async fn verify_requires_key_name() {
        let state = state();
        let (status, _) = send(&state, vault_request("GET", "/api/keys/verify", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            send(&state, vault_request("GET", "/api/keys/verify?key_name=ghost", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], false);
        assert_eq!(body["message"], "Key not found in registry");
    }
}
