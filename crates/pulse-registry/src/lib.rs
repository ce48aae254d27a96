//! `pulse-registry`: lifecycle-managed key registry.
//!
//! Entries are keyed by a structured name
//! (`FAA_KEY_Ω_{provider}_{environment}_{service}_{version}`) and move through
//! a one-way lifecycle:
//!
//! | From              | To        | Trigger                                 |
//! |-------------------|-----------|-----------------------------------------|
//! | `active`          | `expired` | `verify` observes a passed `expires_at` |
//! | `active`/`expired`| `revoked` | `revoke`                                |
//!
//! Nothing ever returns to `active`, and entries are never deleted.

pub mod anchor;
pub mod error;
pub mod grammar;
pub mod registry;
pub mod types;

pub use error::{RegistryError, Result};
pub use grammar::{Environment, Provider, Service};
pub use registry::KeyRegistry;
pub use types::{KeyFilter, KeyRegistryEntry, KeyStatus, NewKey, Verification};
