use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use pulse_core::{classify, config::SchedulerConfig};
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::analysis::{AnalysisCollaborator, Assessment, Credentials};
use crate::error::{PulseError, Result};
use crate::feed::DataFeed;
use crate::history::HistoryStore;
use crate::metrics::{self, PerformanceMetrics};
use crate::types::{
    format_interval, CycleEvent, CycleRecord, DataSource, Pulse, PulseStats, PulseStatus,
    PulseSummary, StartReceipt, StopReceipt,
};

/// Buffered cycle events per subscriber before slow receivers start lagging.
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Target tick period. Burn rate is measured against it.
    pub interval: Duration,
    /// Records returned in [`PulseStats::recent_history`].
    pub recent_history: usize,
}

impl From<&SchedulerConfig> for SchedulerSettings {
    fn from(cfg: &SchedulerConfig) -> Self {
        Self {
            interval: Duration::from_millis(cfg.interval_ms),
            recent_history: cfg.recent_history,
        }
    }
}

/// `cycle_time / interval * 100`.
pub fn burn_rate(cycle_time: Duration, interval: Duration) -> f64 {
    cycle_time.as_secs_f64() / interval.as_secs_f64() * 100.0
}

struct ActivePulse {
    pulse: Pulse,
    started: Instant,
    /// Identifies the run that owns this slot. A tick only commits if the
    /// slot still carries the generation it was spawned with.
    generation: u64,
    cancel: CancellationToken,
}

/// Everything a tick task needs besides the shared state.
struct TickContext {
    pulse_id: String,
    generation: u64,
    data_source: DataSource,
    credentials: Credentials,
}

struct Shared {
    settings: SchedulerSettings,
    feed: Arc<dyn DataFeed>,
    analyzer: Arc<dyn AnalysisCollaborator>,
    history: Arc<dyn HistoryStore>,
    pulses: DashMap<String, ActivePulse>,
    events: broadcast::Sender<CycleEvent>,
    next_generation: AtomicU64,
}

/// Runs and tracks pulses. Cheap to clone; clones share state.
///
/// Must be used from within a Tokio runtime: `start` spawns the tick task.
#[derive(Clone)]
pub struct PulseScheduler {
    shared: Arc<Shared>,
}

impl PulseScheduler {
    pub fn new(
        settings: SchedulerSettings,
        feed: Arc<dyn DataFeed>,
        analyzer: Arc<dyn AnalysisCollaborator>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                settings,
                feed,
                analyzer,
                history,
                pulses: DashMap::new(),
                events,
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Begin ticking `pulse_id`. The first tick fires one interval from now.
    ///
    /// Fails with `Conflict` if the id is already active; the running pulse
    /// is left untouched.
    #[instrument(skip(self, data_source, credentials), fields(brand = %data_source.brand_name))]
    pub fn start(
        &self,
        pulse_id: &str,
        data_source: DataSource,
        credentials: Credentials,
    ) -> Result<StartReceipt> {
        if pulse_id.trim().is_empty() {
            return Err(PulseError::Validation("pulseId is required".to_string()));
        }
        if data_source.brand_name.trim().is_empty() {
            return Err(PulseError::Validation(
                "brandDataSource with brandName is required".to_string(),
            ));
        }
        if self.shared.settings.interval.is_zero() {
            return Err(PulseError::Validation(
                "pulse interval must be greater than zero".to_string(),
            ));
        }

        let slot = match self.shared.pulses.entry(pulse_id.to_string()) {
            Entry::Occupied(_) => {
                return Err(PulseError::Conflict {
                    id: pulse_id.to_string(),
                })
            }
            Entry::Vacant(slot) => slot,
        };

        self.shared.history.register(pulse_id)?;

        let generation = self.shared.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        slot.insert(ActivePulse {
            pulse: Pulse::new(pulse_id, Utc::now()),
            started: Instant::now(),
            generation,
            cancel: cancel.clone(),
        });

        let ctx = TickContext {
            pulse_id: pulse_id.to_string(),
            generation,
            data_source,
            credentials,
        };
        tokio::spawn(run_pulse(Arc::clone(&self.shared), ctx, cancel));

        let interval = self.shared.settings.interval;
        info!(
            interval_ms = interval.as_millis() as u64,
            analyzer = self.shared.analyzer.name(),
            "pulse started"
        );

        Ok(StartReceipt {
            success: true,
            pulse_id: pulse_id.to_string(),
            message: "Pulse started successfully".to_string(),
            interval: format_interval(interval),
        })
    }

    /// Stop a pulse and return its final summary. A tick still in flight is
    /// abandoned and never recorded.
    #[instrument(skip(self))]
    pub fn stop(&self, pulse_id: &str) -> Result<StopReceipt> {
        let (_, mut active) = self
            .shared
            .pulses
            .remove(pulse_id)
            .ok_or_else(|| PulseError::NotFound {
                id: pulse_id.to_string(),
            })?;
        active.cancel.cancel();

        active.pulse.status = PulseStatus::Stopped;
        active.pulse.end_time = Some(Utc::now());
        let pulse = &active.pulse;

        info!(
            cycles = pulse.cycle_count,
            started_at = %pulse.start_time,
            "pulse stopped"
        );

        Ok(StopReceipt {
            success: true,
            pulse_id: pulse_id.to_string(),
            message: "Pulse stopped successfully".to_string(),
            stats: PulseSummary {
                cycle_count: pulse.cycle_count,
                total_burn: pulse.total_burn,
                avg_yield: pulse.avg_yield,
                duration: active.started.elapsed().as_millis() as u64,
            },
        })
    }

    pub fn stats(&self, pulse_id: &str) -> Result<PulseStats> {
        let active = self
            .shared
            .pulses
            .get(pulse_id)
            .ok_or_else(|| PulseError::NotFound {
                id: pulse_id.to_string(),
            })?;
        let pulse = &active.pulse;
        let burn = pulse.burn_rate();

        Ok(PulseStats {
            id: pulse.id.clone(),
            status: pulse.status,
            cycle_count: pulse.cycle_count,
            avg_yield: pulse.avg_yield,
            gorilla_burn_rate: burn,
            gorilla_burn_status: classify(burn),
            uptime: active.started.elapsed().as_millis() as u64,
            recent_history: pulse.recent(self.shared.settings.recent_history).to_vec(),
        })
    }

    pub fn performance_metrics(&self) -> Result<PerformanceMetrics> {
        let rates: Vec<f64> = self
            .shared
            .pulses
            .iter()
            .map(|entry| entry.pulse.burn_rate())
            .collect();
        let total = self.shared.history.pulse_count()?;
        Ok(metrics::aggregate(rates, total))
    }

    /// Full cycle log for `pulse_id`, including runs that have been stopped.
    pub fn history(&self, pulse_id: &str) -> Result<Vec<CycleRecord>> {
        Ok(self.shared.history.history(pulse_id)?)
    }

    /// Receive every committed cycle from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CycleEvent> {
        self.shared.events.subscribe()
    }

    pub fn active_count(&self) -> usize {
        self.shared.pulses.len()
    }

    pub fn is_active(&self, pulse_id: &str) -> bool {
        self.shared.pulses.contains_key(pulse_id)
    }

    /// Cancel every pulse. Returns how many were running.
    pub fn shutdown(&self) -> usize {
        let ids: Vec<String> = self
            .shared
            .pulses
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        let mut stopped = 0;
        for id in ids {
            if let Some((_, active)) = self.shared.pulses.remove(&id) {
                active.cancel.cancel();
                stopped += 1;
            }
        }
        info!(stopped, "scheduler shut down");
        stopped
    }
}

impl Shared {
    /// Fold a finished tick into its pulse. Returns `None` if the run that
    /// produced it is gone.
    fn commit(
        &self,
        ctx: &TickContext,
        assessment: &Assessment,
        cycle_time: Duration,
    ) -> Option<CycleRecord> {
        let record = {
            let mut active = self.pulses.get_mut(&ctx.pulse_id)?;
            if active.generation != ctx.generation {
                return None;
            }
            let burn = burn_rate(cycle_time, self.settings.interval);
            active
                .pulse
                .record_cycle(assessment, burn, cycle_time, Utc::now())
        };

        if let Err(e) = self.history.append(&ctx.pulse_id, &record) {
            warn!(pulse_id = %ctx.pulse_id, error = %e, "failed to persist cycle");
        }
        // No subscribers is fine.
        let _ = self.events.send(CycleEvent {
            pulse_id: ctx.pulse_id.clone(),
            record: record.clone(),
        });
        Some(record)
    }
}

async fn run_pulse(shared: Arc<Shared>, ctx: TickContext, cancel: CancellationToken) {
    let period = shared.settings.interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let began = Instant::now();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(pulse_id = %ctx.pulse_id, "in-flight cycle abandoned");
                break;
            }
            outcome = run_cycle(&shared, &ctx) => outcome,
        };

        match outcome {
            Ok(assessment) => {
                match shared.commit(&ctx, &assessment, began.elapsed()) {
                    Some(record) => debug!(
                        pulse_id = %ctx.pulse_id,
                        cycle = record.cycle,
                        burn_rate = record.burn_rate,
                        "cycle committed"
                    ),
                    None => break,
                }
            }
            Err(e) => warn!(pulse_id = %ctx.pulse_id, error = %e, "pulse cycle failed, skipping"),
        }
    }
    debug!(pulse_id = %ctx.pulse_id, "pulse task exited");
}

async fn run_cycle(shared: &Shared, ctx: &TickContext) -> Result<Assessment> {
    let snapshot = shared.feed.fetch(&ctx.data_source).await?;
    let assessment = shared.analyzer.analyze(&snapshot, &ctx.credentials).await?;
    if !(0.0..=100.0).contains(&assessment.yield_score) {
        return Err(PulseError::TransientAnalysis(format!(
            "yield score out of range: {}",
            assessment.yield_score
        )));
    }
    Ok(assessment)
}
