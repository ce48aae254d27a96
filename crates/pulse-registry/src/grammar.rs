//! Structural validation for registry input.
//!
//! Everything here is pure: no clock reads except through the `now` argument
//! and no access to registry state.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};
use crate::types::NewKey;

/// Canonical key-name prefix.
pub const KEY_PREFIX: &str = "FAA_KEY_Ω_";

/// ASCII spelling of [`KEY_PREFIX`], accepted wherever the canonical one is.
pub const KEY_PREFIX_ASCII: &str = "FAA_KEY_OMEGA_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Claude,
    Gemini,
    Grok,
    Copilot,
}

impl Provider {
    pub const ALL: [Provider; 6] = [
        Provider::OpenAi,
        Provider::Anthropic,
        Provider::Claude,
        Provider::Gemini,
        Provider::Grok,
        Provider::Copilot,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Claude => "claude",
            Provider::Gemini => "gemini",
            Provider::Grok => "grok",
            Provider::Copilot => "copilot",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub const ALL: [Environment; 3] = [Environment::Dev, Environment::Staging, Environment::Prod];

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Staging => "staging",
            Environment::Prod => "prod",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Pulse,
    Vault,
    Claim,
    Mesh,
}

impl Service {
    pub const ALL: [Service; 4] = [Service::Pulse, Service::Vault, Service::Claim, Service::Mesh];

    pub fn as_str(self) -> &'static str {
        match self {
            Service::Pulse => "pulse",
            Service::Vault => "vault",
            Service::Claim => "claim",
            Service::Mesh => "mesh",
        }
    }
}

macro_rules! str_enum {
    ($ty:ident, $what:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                $ty::ALL
                    .into_iter()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| format!(concat!("unknown ", $what, ": {}"), s))
            }
        }
    };
}

str_enum!(Provider, "provider");
str_enum!(Environment, "environment");
str_enum!(Service, "service");

/// Components of a well-formed key name.
///
/// The provider segment is only checked for shape (`[a-z]+`) here; membership
/// in [`Provider`] is checked against the entry's `provider` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNameParts<'a> {
    pub provider: &'a str,
    pub environment: Environment,
    pub service: Service,
    pub version: &'a str,
}

/// Parse `PREFIX{provider}_{environment}_{service}_{X.Y.Z}`.
pub fn parse_key_name(name: &str) -> Option<KeyNameParts<'_>> {
    let rest = name
        .strip_prefix(KEY_PREFIX)
        .or_else(|| name.strip_prefix(KEY_PREFIX_ASCII))?;

    let mut segments = rest.split('_');
    let provider = segments.next()?;
    let environment = segments.next()?.parse().ok()?;
    let service = segments.next()?.parse().ok()?;
    let version = segments.next()?;
    if segments.next().is_some() {
        return None;
    }

    let provider_ok = !provider.is_empty() && provider.bytes().all(|b| b.is_ascii_lowercase());
    if !provider_ok || !is_semver(version) {
        return None;
    }

    Some(KeyNameParts {
        provider,
        environment,
        service,
        version,
    })
}

/// `X.Y.Z` where each part is one or more ASCII digits. No pre-release or
/// build suffixes.
pub fn is_semver(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}

/// Typed fields of an input that passed every structural check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedFields {
    pub provider: Provider,
    pub environment: Environment,
    pub service: Service,
}

/// Run every registration check in order: key_name, provider, environment,
/// service, version, expires_at. The first failure wins.
pub fn validate(input: &NewKey, now: DateTime<Utc>) -> Result<ValidatedFields> {
    if parse_key_name(&input.key_name).is_none() {
        return Err(RegistryError::Validation(format!(
            "Invalid key_name format. Must be: {KEY_PREFIX}{{PROVIDER}}_{{ENV}}_{{SERVICE}}_{{VERSION}}"
        )));
    }

    let provider: Provider = input
        .provider
        .parse()
        .map_err(|_| invalid_member("provider", &Provider::ALL.map(Provider::as_str)))?;
    let environment: Environment = input
        .environment
        .parse()
        .map_err(|_| invalid_member("environment", &Environment::ALL.map(Environment::as_str)))?;
    let service: Service = input
        .service
        .parse()
        .map_err(|_| invalid_member("service", &Service::ALL.map(Service::as_str)))?;

    if !is_semver(&input.version) {
        return Err(RegistryError::Validation(
            "Invalid version format. Must be semver: X.Y.Z".to_string(),
        ));
    }

    if input.expires_at.is_some_and(|at| at <= now) {
        return Err(RegistryError::Validation(
            "expires_at must be in the future".to_string(),
        ));
    }

    Ok(ValidatedFields {
        provider,
        environment,
        service,
    })
}

fn invalid_member(field: &str, allowed: &[&str]) -> RegistryError {
    RegistryError::Validation(format!(
        "Invalid {field}. Must be one of: {}",
        allowed.join(", ")
    ))
}
