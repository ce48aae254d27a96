use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::DataSource;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("data feed unavailable: {0}")]
    Unavailable(String),
}

/// Market snapshot handed to the analysis collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub brand_name: String,
    pub market_cap: f64,
    /// 0 (bearish) to 100 (bullish).
    pub sentiment: f64,
    /// 0 to 50.
    pub volatility: f64,
    pub ai_provider: String,
}

/// Source of per-tick market data.
#[async_trait]
pub trait DataFeed: Send + Sync {
    async fn fetch(&self, source: &DataSource) -> Result<Snapshot, FeedError>;
}

/// Feed that fabricates plausible numbers. Used until a real market data
/// source is wired in.
pub struct SyntheticFeed {
    default_provider: String,
}

impl SyntheticFeed {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            default_provider: default_provider.into(),
        }
    }
}

impl Default for SyntheticFeed {
    fn default() -> Self {
        Self::new("openai")
    }
}

#[async_trait]
impl DataFeed for SyntheticFeed {
    async fn fetch(&self, source: &DataSource) -> Result<Snapshot, FeedError> {
        if source.brand_name.is_empty() {
            return Err(FeedError::Unavailable("no brand name".to_string()));
        }

        let (market_cap, sentiment, volatility) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen_range(0.0..1_000_000.0),
                rng.gen_range(0.0..100.0),
                rng.gen_range(0.0..50.0),
            )
        };

        Ok(Snapshot {
            brand_name: source.brand_name.clone(),
            market_cap,
            sentiment,
            volatility,
            ai_provider: source
                .ai_provider
                .clone()
                .unwrap_or_else(|| self.default_provider.clone()),
        })
    }
}
