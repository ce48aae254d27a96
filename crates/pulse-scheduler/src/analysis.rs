use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::feed::Snapshot;
use crate::types::{RiskLevel, TradeAction};

/// Yield score used when the analysis text carries none.
pub const DEFAULT_YIELD_SCORE: f64 = 50.0;
const MAX_YIELD_SCORE: u64 = 100;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("analysis unavailable: {0}")]
    Unavailable(String),
}

/// Opaque credentials forwarded to the analysis backend. Never printed.
#[derive(Clone)]
pub struct Credentials(String);

impl Credentials {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub yield_score: f64,
    pub risk_level: RiskLevel,
    pub action: TradeAction,
    pub raw_text: String,
    pub timestamp: DateTime<Utc>,
}

impl Assessment {
    /// Build an assessment from free-form analysis text.
    pub fn from_text(text: impl Into<String>, now: DateTime<Utc>) -> Self {
        let text = text.into();
        Self {
            yield_score: extract_yield_score(&text),
            risk_level: extract_risk_level(&text),
            action: extract_action(&text),
            raw_text: text,
            timestamp: now,
        }
    }
}

/// Turns a market snapshot into a trading assessment.
#[async_trait]
pub trait AnalysisCollaborator: Send + Sync {
    fn name(&self) -> &str;

    async fn analyze(
        &self,
        snapshot: &Snapshot,
        credentials: &Credentials,
    ) -> Result<Assessment, AnalysisError>;
}

/// Analyzer backed by a chat completion endpoint that accepts
/// `{prompt, provider}` and answers `{content}`.
pub struct ChatAnalyzer {
    client: reqwest::Client,
    endpoint: String,
}

impl ChatAnalyzer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatBody<'a> {
    prompt: String,
    provider: &'a str,
}

#[derive(Deserialize)]
struct ChatReply {
    content: String,
}

fn build_prompt(snapshot: &Snapshot) -> Result<String, AnalysisError> {
    let data = serde_json::to_string(snapshot).map_err(|e| AnalysisError::Parse(e.to_string()))?;
    Ok(format!(
        "Analyze this brand data for trading yield potential: {data}. \
         Provide: 1) Yield score (0-100), 2) Risk level (low/medium/high), \
         3) Recommended action (buy/hold/sell)."
    ))
}

#[async_trait]
impl AnalysisCollaborator for ChatAnalyzer {
    fn name(&self) -> &str {
        "chat"
    }

    async fn analyze(
        &self,
        snapshot: &Snapshot,
        credentials: &Credentials,
    ) -> Result<Assessment, AnalysisError> {
        let body = ChatBody {
            prompt: build_prompt(snapshot)?,
            provider: &snapshot.ai_provider,
        };

        debug!(brand = %snapshot.brand_name, provider = %snapshot.ai_provider, "requesting analysis");

        let resp = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", credentials.expose())
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "analysis endpoint error");
            return Err(AnalysisError::Api {
                status,
                message: text,
            });
        }

        let reply: ChatReply = resp
            .json()
            .await
            .map_err(|e| AnalysisError::Parse(e.to_string()))?;

        Ok(Assessment::from_text(reply.content, Utc::now()))
    }
}

/// First integer following "yield score" (any case), separated by at least
/// one `:` or whitespace character. Missing scores fall back to
/// [`DEFAULT_YIELD_SCORE`]; larger values clamp to 100.
pub fn extract_yield_score(text: &str) -> f64 {
    const NEEDLE: &str = "yield score";

    // ASCII lowering keeps byte offsets aligned with `text`.
    let lower = text.to_ascii_lowercase();
    for (idx, _) in lower.match_indices(NEEDLE) {
        let rest = &lower[idx + NEEDLE.len()..];
        let digits_at = rest
            .find(|c: char| !(c == ':' || c.is_whitespace()))
            .unwrap_or(rest.len());
        if digits_at == 0 {
            continue;
        }
        let tail = &rest[digits_at..];
        let digits_len = tail
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(tail.len());
        if digits_len == 0 {
            continue;
        }
        let score = tail[..digits_len].parse::<u64>().unwrap_or(MAX_YIELD_SCORE);
        return score.min(MAX_YIELD_SCORE) as f64;
    }
    DEFAULT_YIELD_SCORE
}

pub fn extract_risk_level(text: &str) -> RiskLevel {
    let lower = text.to_lowercase();
    if lower.contains("high risk") {
        RiskLevel::High
    } else if lower.contains("medium risk") {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// "sell" anywhere beats "buy"; neither means hold.
pub fn extract_action(text: &str) -> TradeAction {
    let lower = text.to_lowercase();
    if lower.contains("sell") {
        TradeAction::Sell
    } else if lower.contains("buy") {
        TradeAction::Buy
    } else {
        TradeAction::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yield_score_parsing() {
        assert_eq!(extract_yield_score("Yield Score: 87"), 87.0);
        assert_eq!(extract_yield_score("yield score 12, low risk"), 12.0);
        assert_eq!(extract_yield_score("YIELD SCORE:\n 40/100"), 40.0);
        assert_eq!(extract_yield_score("no number here"), DEFAULT_YIELD_SCORE);
        assert_eq!(extract_yield_score("yield score: n/a"), DEFAULT_YIELD_SCORE);
        assert_eq!(extract_yield_score("yield score: 250"), 100.0);
        assert_eq!(extract_yield_score("yield score: 99999999999999999999999"), 100.0);
    }

    #[test]
    fn yield_score_requires_a_separator() {
        assert_eq!(extract_yield_score("yield score42"), DEFAULT_YIELD_SCORE);
        assert_eq!(
            extract_yield_score("yield score? unclear. Yield score: 70"),
            70.0
        );
    }

    #[test]
    fn yield_score_tolerates_non_ascii_text() {
        assert_eq!(extract_yield_score("Ω análisis · Yield score: 66"), 66.0);
    }

    #[test]
    fn risk_level_parsing() {
        assert_eq!(extract_risk_level("This is HIGH RISK"), RiskLevel::High);
        assert_eq!(extract_risk_level("medium risk overall"), RiskLevel::Medium);
        assert_eq!(extract_risk_level("risk: medium"), RiskLevel::Low);
        assert_eq!(extract_risk_level(""), RiskLevel::Low);
    }

    #[test]
    fn action_parsing_prefers_sell() {
        assert_eq!(extract_action("Buy now, sell later"), TradeAction::Sell);
        assert_eq!(extract_action("Strong BUY"), TradeAction::Buy);
        assert_eq!(extract_action("wait and see"), TradeAction::Hold);
    }

    #[test]
    fn assessment_from_text_combines_extractors() {
        let now = Utc::now();
        let a = Assessment::from_text("Yield score: 72. Medium risk. Recommend buy.", now);
        assert_eq!(a.yield_score, 72.0);
        assert_eq!(a.risk_level, RiskLevel::Medium);
        assert_eq!(a.action, TradeAction::Buy);
        assert_eq!(a.timestamp, now);
    }

    #[test]
    fn credentials_are_redacted() {
        let creds = Credentials::new("sk-secret");
        assert_eq!(format!("{creds:?}"), "Credentials(***)");
        assert_eq!(creds.expose(), "sk-secret");
    }

    #[test]
    fn prompt_embeds_snapshot_json() {
        let snap = Snapshot {
            brand_name: "Acme".into(),
            market_cap: 1.0,
            sentiment: 0.5,
            volatility: 0.1,
            ai_provider: "openai".into(),
        };
        let prompt = build_prompt(&snap).unwrap();
        assert!(prompt.contains(r#""brandName":"Acme""#));
        assert!(prompt.contains("Yield score (0-100)"));
    }
}
