//! `pulse-scheduler`: recurring analysis cycles ("pulses") with per-cycle
//! burn-rate accounting.
//!
//! # Overview
//!
//! [`scheduler::PulseScheduler`] owns every active pulse. Each pulse gets one
//! Tokio task that ticks at a fixed interval; a tick fetches a snapshot from
//! a [`feed::DataFeed`], hands it to an [`analysis::AnalysisCollaborator`] and
//! folds the assessment into the pulse's running stats and the
//! [`history::HistoryStore`].
//!
//! # Burn rate
//!
//! | Quantity      | Definition                                  |
//! |---------------|---------------------------------------------|
//! | cycle time    | wall time of fetch + analyze                |
//! | burn rate     | `cycle_time / interval * 100`               |
//! | pulse burn    | `total_burn / cycle_count` (0 when no cycles) |
//!
//! Tick failures are logged and skipped; they never stop a pulse.

pub mod analysis;
pub mod db;
pub mod error;
pub mod feed;
pub mod history;
pub mod metrics;
pub mod scheduler;
pub mod types;

pub use analysis::{AnalysisCollaborator, AnalysisError, Assessment, ChatAnalyzer, Credentials};
pub use db::SqliteHistory;
pub use error::{HistoryError, PulseError, Result};
pub use feed::{DataFeed, FeedError, Snapshot, SyntheticFeed};
pub use history::{HistoryStore, MemoryHistory};
pub use metrics::PerformanceMetrics;
pub use scheduler::{PulseScheduler, SchedulerSettings};
pub use types::{
    CycleEvent, CycleRecord, DataSource, Pulse, PulseStats, PulseStatus, PulseSummary, RiskLevel,
    StartReceipt, StopReceipt, TradeAction,
};
