use dashmap::DashMap;

use crate::error::HistoryError;
use crate::types::CycleRecord;

/// Append-only per-pulse cycle log. Outlives the pulses it records: stopping
/// a pulse never removes its history.
pub trait HistoryStore: Send + Sync {
    /// Note that a pulse id has been started at least once. Idempotent; an
    /// existing log is left as is.
    fn register(&self, pulse_id: &str) -> Result<(), HistoryError>;

    fn append(&self, pulse_id: &str, record: &CycleRecord) -> Result<(), HistoryError>;

    /// Every record ever appended for `pulse_id`, oldest first. Unknown ids
    /// yield an empty list.
    fn history(&self, pulse_id: &str) -> Result<Vec<CycleRecord>, HistoryError>;

    /// Number of distinct pulse ids ever registered.
    fn pulse_count(&self) -> Result<usize, HistoryError>;
}

/// Process-local history. Lost on restart.
#[derive(Default)]
pub struct MemoryHistory {
    logs: DashMap<String, Vec<CycleRecord>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistory {
    fn register(&self, pulse_id: &str) -> Result<(), HistoryError> {
        self.logs.entry(pulse_id.to_string()).or_default();
        Ok(())
    }

    fn append(&self, pulse_id: &str, record: &CycleRecord) -> Result<(), HistoryError> {
        self.logs
            .entry(pulse_id.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    fn history(&self, pulse_id: &str) -> Result<Vec<CycleRecord>, HistoryError> {
        Ok(self
            .logs
            .get(pulse_id)
            .map(|log| log.value().clone())
            .unwrap_or_default())
    }

    fn pulse_count(&self) -> Result<usize, HistoryError> {
        Ok(self.logs.len())
    }
}
