use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pulse_core::BurnClass;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::analysis::Assessment;

/// Lifecycle state of a pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PulseStatus {
    Active,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Hold,
    Sell,
}

impl TradeAction {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeAction::Buy => "buy",
            TradeAction::Hold => "hold",
            TradeAction::Sell => "sell",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level: {other}")),
        }
    }
}

impl FromStr for TradeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(TradeAction::Buy),
            "hold" => Ok(TradeAction::Hold),
            "sell" => Ok(TradeAction::Sell),
            other => Err(format!("unknown trade action: {other}")),
        }
    }
}

/// Where a pulse pulls its data from. Only `brandName` is interpreted; any
/// other fields ride along untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    #[serde(default)]
    pub brand_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_provider: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DataSource {
    pub fn brand(name: impl Into<String>) -> Self {
        Self {
            brand_name: name.into(),
            ..Self::default()
        }
    }
}

/// One completed tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleRecord {
    /// 1-based index within the pulse run that produced it.
    pub cycle: u64,
    pub timestamp: DateTime<Utc>,
    pub burn_rate: f64,
    pub yield_score: f64,
    pub risk_level: RiskLevel,
    pub action: TradeAction,
    /// Milliseconds spent in fetch + analyze.
    pub cycle_time: u64,
}

/// Live state of a running pulse. The tick task owns the data source and
/// credentials; this holds only what stats and stop read back.
#[derive(Debug, Clone)]
pub struct Pulse {
    pub id: String,
    pub status: PulseStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub cycle_count: u64,
    pub total_burn: f64,
    pub avg_yield: f64,
    pub history: Vec<CycleRecord>,
}

impl Pulse {
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            status: PulseStatus::Active,
            start_time: now,
            end_time: None,
            cycle_count: 0,
            total_burn: 0.0,
            avg_yield: 0.0,
            history: Vec::new(),
        }
    }

    /// Fold one successful tick into the running stats and return the record
    /// that was appended.
    pub fn record_cycle(
        &mut self,
        assessment: &Assessment,
        burn_rate: f64,
        cycle_time: Duration,
        now: DateTime<Utc>,
    ) -> CycleRecord {
        self.cycle_count += 1;
        self.total_burn += burn_rate;
        let n = self.cycle_count as f64;
        self.avg_yield = (self.avg_yield * (n - 1.0) + assessment.yield_score) / n;

        let record = CycleRecord {
            cycle: self.cycle_count,
            timestamp: now,
            burn_rate,
            yield_score: assessment.yield_score,
            risk_level: assessment.risk_level,
            action: assessment.action,
            cycle_time: cycle_time.as_millis() as u64,
        };
        self.history.push(record.clone());
        record
    }

    /// Mean burn over completed cycles; 0 before the first one.
    pub fn burn_rate(&self) -> f64 {
        if self.cycle_count == 0 {
            0.0
        } else {
            self.total_burn / self.cycle_count as f64
        }
    }

    pub fn recent(&self, limit: usize) -> &[CycleRecord] {
        let skip = self.history.len().saturating_sub(limit);
        &self.history[skip..]
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartReceipt {
    pub success: bool,
    pub pulse_id: String,
    pub message: String,
    /// Human form of the tick interval, e.g. `"9s"`.
    pub interval: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PulseSummary {
    pub cycle_count: u64,
    pub total_burn: f64,
    pub avg_yield: f64,
    /// Milliseconds between start and stop.
    pub duration: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopReceipt {
    pub success: bool,
    pub pulse_id: String,
    pub message: String,
    pub stats: PulseSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PulseStats {
    pub id: String,
    pub status: PulseStatus,
    pub cycle_count: u64,
    pub avg_yield: f64,
    pub gorilla_burn_rate: f64,
    pub gorilla_burn_status: BurnClass,
    /// Milliseconds since start.
    pub uptime: u64,
    pub recent_history: Vec<CycleRecord>,
}

/// Broadcast after every committed cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleEvent {
    pub pulse_id: String,
    pub record: CycleRecord,
}

pub(crate) fn format_interval(interval: Duration) -> String {
    if interval.subsec_millis() == 0 {
        format!("{}s", interval.as_secs())
    } else {
        format!("{}ms", interval.as_millis())
    }
}
