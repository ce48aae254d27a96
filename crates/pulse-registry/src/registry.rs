use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use tracing::{debug, info, instrument};

use crate::anchor::claimroot_anchor;
use crate::error::{RegistryError, Result};
use crate::grammar;
use crate::types::{KeyFilter, KeyRegistryEntry, KeyStatus, NewKey, Verification};

/// Concurrent in-memory key registry.
///
/// Each operation touches a single key, so per-shard locking from `DashMap`
/// is enough to keep register-or-fail and lazy expiry atomic per key name.
#[derive(Default)]
pub struct KeyRegistry {
    entries: DashMap<String, KeyRegistryEntry>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a new entry.
    ///
    /// Fails with `Validation` before anything is stored, or `Conflict` if the
    /// key name is taken. A missing `claimroot_anchor` is derived from the
    /// entry's fields and the registration time.
    #[instrument(skip(self, input), fields(key_name = %input.key_name))]
    pub fn register(&self, input: NewKey) -> Result<KeyRegistryEntry> {
        let now = Utc::now();
        let fields = grammar::validate(&input, now)?;

        let claimroot_anchor = match input.claimroot_anchor.filter(|a| !a.is_empty()) {
            Some(anchor) => anchor,
            None => claimroot_anchor(
                fields.provider,
                fields.environment,
                fields.service,
                &input.version,
                now,
            )?,
        };

        let entry = KeyRegistryEntry {
            key_name: input.key_name,
            provider: fields.provider,
            environment: fields.environment,
            service: fields.service,
            version: input.version,
            issued_at: input.issued_at.unwrap_or(now),
            expires_at: input.expires_at,
            claimroot_anchor,
            status: KeyStatus::Active,
            metadata: input.metadata.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };

        match self.entries.entry(entry.key_name.clone()) {
            Entry::Occupied(_) => Err(RegistryError::Conflict {
                key_name: entry.key_name,
            }),
            Entry::Vacant(slot) => {
                slot.insert(entry.clone());
                info!(anchor = %entry.claimroot_anchor, "key registered");
                Ok(entry)
            }
        }
    }

    /// Check whether a key may be used right now.
    ///
    /// An entry whose `expires_at` has passed is marked `expired` as a side
    /// effect, so the transition is visible to later `list` calls. There is no
    /// background sweep; expiry is only materialised here.
    #[instrument(skip(self))]
    pub fn verify(&self, key_name: &str) -> Verification {
        let Some(mut entry) = self.entries.get_mut(key_name) else {
            debug!("verify: key not found");
            return Verification::invalid("Key not found in registry", None);
        };

        if entry.status == KeyStatus::Revoked {
            return Verification::invalid("Key has been revoked", Some(entry.clone()));
        }

        let now = Utc::now();
        if entry.status == KeyStatus::Expired || entry.is_expired_at(now) {
            if entry.status != KeyStatus::Expired {
                entry.status = KeyStatus::Expired;
                entry.updated_at = now;
                info!("key expired on verification");
            }
            return Verification::invalid("Key has expired", Some(entry.clone()));
        }

        Verification::valid(entry.clone())
    }

    /// Mark a key revoked. Revoking an already revoked key succeeds again.
    #[instrument(skip(self))]
    pub fn revoke(&self, key_name: &str) -> Result<KeyRegistryEntry> {
        let mut entry = self
            .entries
            .get_mut(key_name)
            .ok_or_else(|| RegistryError::NotFound {
                key_name: key_name.to_string(),
            })?;
        entry.status = KeyStatus::Revoked;
        entry.updated_at = Utc::now();
        info!("key revoked");
        Ok(entry.clone())
    }

    /// Pure expiry check against the clock. Unlike [`verify`](Self::verify)
    /// this never changes the stored status.
    pub fn is_expired(&self, key_name: &str) -> Result<bool> {
        self.entries
            .get(key_name)
            .map(|e| e.is_expired_at(Utc::now()))
            .ok_or_else(|| RegistryError::NotFound {
                key_name: key_name.to_string(),
            })
    }

    /// Entries matching every set filter, oldest first.
    pub fn list(&self, filter: &KeyFilter) -> Vec<KeyRegistryEntry> {
        let mut keys: Vec<KeyRegistryEntry> = self
            .entries
            .iter()
            .filter(|e| filter.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        keys.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.key_name.cmp(&b.key_name))
        });
        keys
    }

    pub fn get(&self, key_name: &str) -> Option<KeyRegistryEntry> {
        self.entries.get(key_name).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
