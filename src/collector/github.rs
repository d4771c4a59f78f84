use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::config::GitHubConfig;
use crate::types::{ActivityMetrics, FetchOutcome, MetricWindow, OrganActivity};
use super::SourceAdapter;

/// Collects commit, PR, and release counts per organ from the GitHub
/// org-events API.
///
/// Each org is fetched independently: one failing org degrades only its own
/// organ entry, never the whole activity section.
pub struct GitHubAdapter {
    config: GitHubConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct OrgEvent {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    payload: EventPayload,
}

#[derive(Debug, Default, Deserialize)]
struct EventPayload {
    #[serde(default)]
    size: u64,
    #[serde(default)]
    action: String,
}

impl GitHubAdapter {
    pub fn new(config: &GitHubConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("engagement-pipeline/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config: config.clone(), client })
    }

    async fn org_events(&self, org: &str) -> Result<Vec<OrgEvent>> {
        let url = format!("{}/orgs/{}/events", self.config.base_url, org);
        let resp = self
            .client
            .get(&url)
            .query(&[("per_page", "100")])
            .bearer_auth(&self.config.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    /// Count commits, PRs, and releases from an event list, keeping only
    /// events whose creation day falls inside the window.
    fn count_events(events: &[OrgEvent], window: MetricWindow) -> OrganActivity {
        let mut activity = OrganActivity::default();
        for event in events {
            let Some(day) = event
                .created_at
                .get(..10)
                .and_then(|d| d.parse::<NaiveDate>().ok())
            else {
                continue;
            };
            if !window.contains(day) {
                continue;
            }

            match event.kind.as_str() {
                "PushEvent" => activity.commits += event.payload.size,
                "PullRequestEvent" => {
                    if event.payload.action == "opened" || event.payload.action == "closed" {
                        activity.prs += 1;
                    }
                }
                "ReleaseEvent" => activity.releases += 1,
                _ => {}
            }
        }
        activity
    }
}

#[async_trait]
impl SourceAdapter for GitHubAdapter {
    type Output = ActivityMetrics;

    fn name(&self) -> &str { "github" }

    async fn fetch(&self, window: MetricWindow) -> FetchOutcome<ActivityMetrics> {
        if !self.config.configured() {
            return FetchOutcome::unavailable("github token not set");
        }

        let mut organs = BTreeMap::new();
        for mapping in &self.config.orgs {
            let outcome = match self.org_events(&mapping.org).await {
                Ok(events) => FetchOutcome::Available(Self::count_events(&events, window)),
                Err(e) => {
                    tracing::warn!(org = %mapping.org, organ = %mapping.organ, error = %e, "GitHub org fetch failed");
                    FetchOutcome::unavailable(format!("API error: {}", e))
                }
            };
            organs.insert(mapping.organ.clone(), outcome);
        }

        FetchOutcome::Available(ActivityMetrics { organs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> MetricWindow {
        MetricWindow {
            start: NaiveDate::from_ymd_opt(2026, 7, 27).unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 8, 3).unwrap(),
        }
    }

    fn event(kind: &str, created_at: &str, size: u64, action: &str) -> OrgEvent {
        OrgEvent {
            kind: kind.to_string(),
            created_at: created_at.to_string(),
            payload: EventPayload { size, action: action.to_string() },
        }
    }

    #[test]
    fn counts_push_pr_and_release_events() {
        let events = vec![
            event("PushEvent", "2026-07-28T10:00:00Z", 3, ""),
            event("PushEvent", "2026-08-01T09:00:00Z", 2, ""),
            event("PullRequestEvent", "2026-07-30T12:00:00Z", 0, "opened"),
            event("PullRequestEvent", "2026-07-30T15:00:00Z", 0, "synchronize"),
            event("ReleaseEvent", "2026-07-29T08:00:00Z", 0, ""),
        ];

        let counts = GitHubAdapter::count_events(&events, window());
        assert_eq!(counts, OrganActivity { commits: 5, prs: 1, releases: 1 });
    }

    #[test]
    fn window_bounds_are_half_open() {
        let events = vec![
            // Start day is included, end day is not.
            event("PushEvent", "2026-07-27T00:00:00Z", 1, ""),
            event("PushEvent", "2026-08-03T00:00:00Z", 10, ""),
            event("PushEvent", "2026-07-26T23:59:59Z", 100, ""),
        ];

        let counts = GitHubAdapter::count_events(&events, window());
        assert_eq!(counts.commits, 1);
    }

    #[test]
    fn malformed_timestamps_are_skipped() {
        let events = vec![
            event("PushEvent", "not-a-date", 7, ""),
            event("PushEvent", "", 7, ""),
        ];
        let counts = GitHubAdapter::count_events(&events, window());
        assert_eq!(counts.commits, 0);
    }

    #[tokio::test]
    async fn missing_token_resolves_to_unavailable() {
        let adapter =
            GitHubAdapter::new(&GitHubConfig::default(), Duration::from_secs(5)).unwrap();
        match adapter.fetch(window()).await {
            FetchOutcome::Unavailable { reason } => assert!(reason.contains("token")),
            FetchOutcome::Available(_) => panic!("expected unavailable"),
        }
    }
}
