use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::grammar::{Environment, Provider, Service};

/// Lifecycle state of a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Active,
    Revoked,
    Expired,
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyStatus::Active => "active",
            KeyStatus::Revoked => "revoked",
            KeyStatus::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

impl FromStr for KeyStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(KeyStatus::Active),
            "revoked" => Ok(KeyStatus::Revoked),
            "expired" => Ok(KeyStatus::Expired),
            other => Err(format!("unknown key status: {other}")),
        }
    }
}

/// Registration input as received from callers.
///
/// Enum-valued fields stay strings until validation so a bad value produces a
/// validation error naming the field rather than a deserialisation failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewKey {
    pub key_name: String,
    pub provider: String,
    pub environment: String,
    pub service: String,
    pub version: String,
    #[serde(default)]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Supplied anchors are stored verbatim; otherwise one is derived.
    #[serde(default)]
    pub claimroot_anchor: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl NewKey {
    pub fn new(
        key_name: impl Into<String>,
        provider: impl Into<String>,
        environment: impl Into<String>,
        service: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            key_name: key_name.into(),
            provider: provider.into(),
            environment: environment.into(),
            service: service.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }
}

/// A stored registry entry. Field names are part of the wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRegistryEntry {
    pub key_name: String,
    pub provider: Provider,
    pub environment: Environment,
    pub service: Service,
    pub version: String,
    pub issued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub claimroot_anchor: String,
    pub status: KeyStatus,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KeyRegistryEntry {
    /// True once `expires_at` is at or before `now`. Entries without an
    /// expiry never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Outcome of a verification. Absent keys are a normal `valid: false`
/// answer rather than an error, so auth layers can treat every failure alike.
#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    pub valid: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<KeyRegistryEntry>,
}

impl Verification {
    pub(crate) fn valid(entry: KeyRegistryEntry) -> Self {
        Self {
            valid: true,
            message: "Key is valid and active".to_string(),
            key: Some(entry),
        }
    }

    pub(crate) fn invalid(message: &str, entry: Option<KeyRegistryEntry>) -> Self {
        Self {
            valid: false,
            message: message.to_string(),
            key: entry,
        }
    }
}

/// Equality filters for listing. Unset fields match everything; set fields
/// are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<Service>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<KeyStatus>,
}

impl KeyFilter {
    pub fn matches(&self, entry: &KeyRegistryEntry) -> bool {
        self.provider.map_or(true, |p| p == entry.provider)
            && self.environment.map_or(true, |e| e == entry.environment)
            && self.service.map_or(true, |s| s == entry.service)
            && self.status.map_or(true, |s| s == entry.status)
    }
}
