use std::env;
use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use common::config::ScannerConfig;
use reqwest::Client;
use serde_json::{Value, json};
use storage::TradeStats;
use tracing::debug;

/// External collaborator that proposes parameter overrides from the
/// performance of logged trades.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ParameterAdvisor: Send + Sync {
    /// Returns a JSON object shaped like the override document.
    async fn suggest(&self, stats: &TradeStats, config: &ScannerConfig) -> anyhow::Result<Value>;
}

pub struct HttpAdvisor {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpAdvisor {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent("altcoin_scanner/0.1.0")
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
        })
    }

    /// `None` when `ADVISOR_URL` is not set.
    pub fn from_env() -> Option<anyhow::Result<Self>> {
        let url = env::var("ADVISOR_URL").ok()?;
        Some(Self::new(url, env::var("ADVISOR_API_KEY").ok()))
    }
}

pub fn advisor_request(stats: &TradeStats, config: &ScannerConfig) -> Value {
    json!({
        "stats": stats,
        "current": {
            "min_score": config.min_score,
            "planner": { "atr_multiplier": config.planner.atr_multiplier },
            "top_coins_limit": config.top_coins_limit,
        },
    })
}

#[async_trait]
impl ParameterAdvisor for HttpAdvisor {
    async fn suggest(&self, stats: &TradeStats, config: &ScannerConfig) -> anyhow::Result<Value> {
        let mut request = self.client.post(&self.url).json(&advisor_request(stats, config));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("advisor at {} unreachable", self.url))?
            .error_for_status()?;
        let body: Value = response.json().await.context("advisor reply is not JSON")?;
        debug!("Advisor replied: {}", body);

        if !body.is_object() {
            bail!("advisor reply must be a JSON object, got {}", body);
        }
        Ok(body)
    }
}

/// Used when no advisor is configured.
pub struct NoAdvisor;

#[async_trait]
impl ParameterAdvisor for NoAdvisor {
    async fn suggest(&self, _: &TradeStats, _: &ScannerConfig) -> anyhow::Result<Value> {
        bail!("no parameter advisor configured (set ADVISOR_URL)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_stats_and_tunables() {
        let body = advisor_request(&TradeStats::default(), &ScannerConfig::default());
        assert_eq!(body["current"]["min_score"], 1.0);
        assert_eq!(body["current"]["planner"]["atr_multiplier"], 2.0);
        assert_eq!(body["current"]["top_coins_limit"], 150);
        assert_eq!(body["stats"]["overall"]["count"], 0);
    }

    #[tokio::test]
    async fn missing_advisor_refuses() {
        let result = NoAdvisor
            .suggest(&TradeStats::default(), &ScannerConfig::default())
            .await;
        assert!(result.is_err());
    }
}
