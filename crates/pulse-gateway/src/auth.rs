//! Header-based auth layers.
//!
//! `vault_auth` guards the key registry routes, `pulse_auth` the pulse and
//! gorilla routes. Both enforce the configured vault level and the treaty
//! header when compliance mode is strict.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use pulse_core::config::{ComplianceMode, TREATY_ID};
use pulse_registry::Service;
use tracing::info;

use crate::app::AppState;
use crate::error::{detailed, ApiError};

const VAULT_AUTH_PREFIX: &str = "VAULT_AUTH_";
const VAULT_AUTH_BODY_LEN: usize = 32;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// `VAULT_AUTH_` followed by exactly 32 upper-case letters or digits.
pub fn is_vault_auth(value: &str) -> bool {
    value.strip_prefix(VAULT_AUTH_PREFIX).is_some_and(|body| {
        body.len() == VAULT_AUTH_BODY_LEN
            && body
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    })
}

/// Leading decimal digits of the header value, so "7.0" and "7abc" read as 7.
/// Values past `u8::MAX` saturate.
fn parse_level(raw: &str) -> Option<u8> {
    let raw = raw.trim_start();
    let raw = raw.strip_prefix('+').unwrap_or(raw);
    let digits = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    if digits == 0 {
        return None;
    }
    Some(raw[..digits].parse::<u8>().unwrap_or(u8::MAX))
}

fn check_level(state: &AppState, headers: &HeaderMap) -> Result<u8, ApiError> {
    let required = state.config.vault.level;
    let level = header(headers, "x-vault-level")
        .and_then(parse_level)
        .unwrap_or(0);
    if level < required {
        return Err(detailed(
            StatusCode::FORBIDDEN,
            "Insufficient vault level",
            format!("VaultLevel {required} or higher required"),
        ));
    }
    Ok(level)
}

fn check_treaty(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    if state.config.vault.compliance_mode == ComplianceMode::Strict
        && header(headers, "x-faa-treaty") != Some(TREATY_ID)
    {
        return Err(detailed(
            StatusCode::FORBIDDEN,
            "FAA-X13 treaty compliance required",
            "Missing or invalid x-faa-treaty header",
        ));
    }
    Ok(())
}

fn audit(state: &AppState, layer: &str, req: &Request, level: u8) {
    if state.config.vault.audit_log {
        info!(
            target: "audit",
            layer,
            method = %req.method(),
            path = %req.uri().path(),
            vault_level = level,
            "vault access"
        );
    }
}

pub async fn vault_auth(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let headers = req.headers();
    let Some(vault_auth) = header(headers, "x-vault-auth") else {
        return Err(detailed(
            StatusCode::UNAUTHORIZED,
            "VaultLevel 7 authentication required",
            "Missing x-vault-auth header",
        ));
    };

    let level = check_level(&state, headers)?;

    if !is_vault_auth(vault_auth) {
        return Err(detailed(
            StatusCode::UNAUTHORIZED,
            "Invalid vault authentication format",
            "Vault auth must match pattern: VAULT_AUTH_{32 chars of A-Z0-9}",
        ));
    }
    check_treaty(&state, headers)?;

    audit(&state, "vault", &req, level);
    Ok(next.run(req).await)
}

pub async fn pulse_auth(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let headers = req.headers();
    let Some(pulse_key) = header(headers, "x-pulse-key") else {
        return Err(detailed(
            StatusCode::UNAUTHORIZED,
            "Pulse authentication required",
            "Missing x-pulse-key header",
        ));
    };

    let level = check_level(&state, headers)?;

    let verification = state.registry.verify(pulse_key);
    let key = match verification.key {
        Some(key) if verification.valid => key,
        _ => {
            return Err(detailed(
                StatusCode::UNAUTHORIZED,
                "Invalid or inactive pulse key",
                verification.message,
            ))
        }
    };
    if key.service != Service::Pulse {
        return Err(detailed(
            StatusCode::FORBIDDEN,
            "Invalid key service type",
            "Key must be registered for pulse service",
        ));
    }

    check_treaty(&state, headers)?;

    audit(&state, "pulse", &req, level);
    Ok(next.run(req).await)
}
