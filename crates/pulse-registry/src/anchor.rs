use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use pulse_core::config::TREATY_ID;

use crate::error::Result;
use crate::grammar::{Environment, Provider, Service};

const ANCHOR_PREFIX: &str = "CLAIM_ROOT_";
const ANCHOR_HEX_CHARS: usize = 16;

/// Field order here is the canonical encoding; changing it changes every
/// anchor derived afterwards.
#[derive(Serialize)]
struct AnchorInput<'a> {
    provider: Provider,
    environment: Environment,
    service: Service,
    version: &'a str,
    timestamp: String,
    treaty: &'a str,
}

/// Derive a claimroot anchor: `CLAIM_ROOT_` followed by the first 16 hex
/// digits (upper-case) of SHA-256 over the JSON-encoded identifying fields,
/// the issue timestamp and the treaty id.
pub fn claimroot_anchor(
    provider: Provider,
    environment: Environment,
    service: Service,
    version: &str,
    at: DateTime<Utc>,
) -> Result<String> {
    let input = AnchorInput {
        provider,
        environment,
        service,
        version,
        timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        treaty: TREATY_ID,
    };
    let encoded = serde_json::to_vec(&input)?;
    let digest = hex::encode(Sha256::digest(&encoded));
    Ok(format!(
        "{ANCHOR_PREFIX}{}",
        digest[..ANCHOR_HEX_CHARS].to_ascii_uppercase()
    ))
}
