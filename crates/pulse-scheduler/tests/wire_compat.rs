// Verify the JSON shapes dashboard clients poll for.
// Field names here are a public contract; renaming one is a breaking change.

use chrono::Utc;
use pulse_core::BurnClass;
use pulse_scheduler::metrics::aggregate;
use pulse_scheduler::{
    CycleEvent, CycleRecord, DataSource, PulseStats, PulseStatus, PulseSummary, RiskLevel,
    StartReceipt, StopReceipt, TradeAction,
};

fn record() -> CycleRecord {
    CycleRecord {
        cycle: 1,
        timestamp: Utc::now(),
        burn_rate: 10.0,
        yield_score: 72.0,
        risk_level: RiskLevel::Medium,
        action: TradeAction::Buy,
        cycle_time: 900,
    }
}

#[test]
fn start_receipt_shape() {
    let receipt = StartReceipt {
        success: true,
        pulse_id: "p1".into(),
        message: "Pulse started successfully".into(),
        interval: "9s".into(),
    };
    let json = serde_json::to_string(&receipt).unwrap();

    assert!(json.contains(r#""pulseId":"p1""#));
    assert!(json.contains(r#""interval":"9s""#));
    assert!(json.contains(r#""success":true"#));
}

#[test]
fn stop_receipt_nests_summary() {
    let receipt = StopReceipt {
        success: true,
        pulse_id: "p1".into(),
        message: "Pulse stopped successfully".into(),
        stats: PulseSummary {
            cycle_count: 3,
            total_burn: 30.0,
            avg_yield: 80.0,
            duration: 27_950,
        },
    };
    let v = serde_json::to_value(&receipt).unwrap();

    assert_eq!(v["stats"]["cycleCount"], 3);
    assert_eq!(v["stats"]["totalBurn"], 30.0);
    assert_eq!(v["stats"]["avgYield"], 80.0);
    assert_eq!(v["stats"]["duration"], 27_950);
}

#[test]
fn pulse_stats_shape() {
    let stats = PulseStats {
        id: "p1".into(),
        status: PulseStatus::Active,
        cycle_count: 1,
        avg_yield: 72.0,
        gorilla_burn_rate: 10.0,
        gorilla_burn_status: BurnClass::Active,
        uptime: 9_900,
        recent_history: vec![record()],
    };
    let v = serde_json::to_value(&stats).unwrap();

    assert_eq!(v["status"], "active");
    assert_eq!(v["gorillaBurnRate"], 10.0);
    assert_eq!(v["gorillaBurnStatus"], "active");
    assert_eq!(v["recentHistory"][0]["riskLevel"], "medium");
    assert_eq!(v["recentHistory"][0]["action"], "buy");
    // cycle time travels as integer milliseconds
    assert_eq!(v["recentHistory"][0]["cycleTime"], 900);
}

#[test]
fn cycle_event_shape() {
    let event = CycleEvent {
        pulse_id: "p1".into(),
        record: record(),
    };
    let v = serde_json::to_value(&event).unwrap();
    assert_eq!(v["pulseId"], "p1");
    assert_eq!(v["record"]["cycle"], 1);
}

#[test]
fn metrics_keep_running_count_and_class_count_apart() {
    let v = serde_json::to_value(aggregate([10.0, 20.0, 50.0], 5)).unwrap();
    assert_eq!(v["activePulses"], 3);
    assert_eq!(v["activeTierPulses"], 2);
    assert_eq!(v["optimalPulses"], 1);
    assert_eq!(v["totalPulses"], 5);
}

#[test]
fn data_source_accepts_dashboard_payload() {
    let json = r#"{"brandName":"Acme","aiProvider":"gemini","ticker":"ACM"}"#;
    let source: DataSource = serde_json::from_str(json).unwrap();
    assert_eq!(source.brand_name, "Acme");
    assert_eq!(source.ai_provider.as_deref(), Some("gemini"));
    assert_eq!(source.extra["ticker"], "ACM");
}
