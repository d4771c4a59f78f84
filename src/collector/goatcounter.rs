use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::GoatCounterConfig;
use crate::types::{FetchOutcome, MetricWindow, PageStats, SiteTotals, WebMetrics};
use super::SourceAdapter;

/// Collects page views, unique visitors, and referrer counts from the
/// GoatCounter API.
pub struct GoatCounterAdapter {
    config: GoatCounterConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct HitsResponse {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(default)]
    path: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    count: u64,
    #[serde(default)]
    count_unique: u64,
}

#[derive(Debug, Deserialize)]
struct TotalResponse {
    #[serde(default)]
    total: TotalCounts,
}

#[derive(Debug, Default, Deserialize)]
struct TotalCounts {
    count: Option<u64>,
    count_unique: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RefsResponse {
    #[serde(default)]
    stats: Vec<RefStat>,
}

#[derive(Debug, Deserialize)]
struct RefStat {
    #[serde(default)]
    name: String,
    #[serde(default)]
    count: u64,
}

impl GoatCounterAdapter {
    pub fn new(config: &GoatCounterConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { config: config.clone(), client })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.config.api_url(), endpoint);
        let resp = self
            .client
            .get(&url)
            .query(params)
            .bearer_auth(&self.config.token)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json::<T>().await?)
    }

    async fn collect(&self, window: MetricWindow) -> Result<WebMetrics> {
        let range = || {
            vec![
                ("start", window.start.to_string()),
                ("end", window.end.to_string()),
            ]
        };

        let mut hit_params = range();
        hit_params.push(("limit", "100".to_string()));
        let hits: HitsResponse = self.get("/stats/hits", &hit_params).await?;
        let totals: TotalResponse = self.get("/stats/total", &range()).await?;
        let refs: RefsResponse = self.get("/stats/toprefs", &range()).await?;

        let pages: Vec<PageStats> = hits
            .hits
            .into_iter()
            .map(|h| PageStats {
                path: h.path,
                title: h.title,
                views: h.count,
                unique_visitors: h.count_unique,
                referrers: BTreeMap::new(),
            })
            .collect();

        // The totals endpoint is authoritative; summed page counts are the
        // fallback when it omits a figure.
        let summed_views: u64 = pages.iter().map(|p| p.views).sum();
        let summed_unique: u64 = pages.iter().map(|p| p.unique_visitors).sum();

        let referrers: BTreeMap<String, u64> = refs
            .stats
            .into_iter()
            .filter(|r| !r.name.is_empty())
            .map(|r| (r.name, r.count))
            .collect();

        Ok(WebMetrics {
            site_totals: SiteTotals {
                page_views: totals.total.count.unwrap_or(summed_views),
                unique_visitors: totals.total.count_unique.unwrap_or(summed_unique),
            },
            pages,
            referrers,
        })
    }
}

#[async_trait]
impl SourceAdapter for GoatCounterAdapter {
    type Output = WebMetrics;

    fn name(&self) -> &str { "goatcounter" }

    async fn fetch(&self, window: MetricWindow) -> FetchOutcome<WebMetrics> {
        if !self.config.configured() {
            return FetchOutcome::unavailable("goatcounter site and/or token not set");
        }

        match self.collect(window).await {
            Ok(metrics) => FetchOutcome::Available(metrics),
            Err(e) => {
                tracing::warn!(error = %e, "GoatCounter fetch failed");
                FetchOutcome::unavailable(format!("goatcounter API error: {}", e))
            }
        }
    }
}
