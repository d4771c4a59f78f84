use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyzer::{threshold, trend};
use crate::config::AlertRule;
use crate::types::{
    ActivityMetrics, Alert, FetchOutcome, HistorySnapshot, MetricWindow, OrganActivity,
    PageStats, SiteTotals, WebMetrics,
};

/// Rolling-average window in snapshots, the current run included.
pub const TREND_WINDOW: usize = 4;

/// Page-detail projection (`engagement-metrics.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    pub generated_at: DateTime<Utc>,
    pub period: MetricWindow,
    pub available: bool,
    pub site_totals: SiteTotalsDoc,
    pub pages: Vec<PageStats>,
    pub trends: Trends,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteTotalsDoc {
    pub page_views: u64,
    pub unique_visitors: u64,
    pub referrer_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trends {
    pub views_delta_pct: Option<f64>,
    pub visitors_delta_pct: Option<f64>,
}

/// Organ-summary projection (`system-engagement-report.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemReport {
    pub generated_at: DateTime<Utc>,
    pub period: MetricWindow,
    pub web_engagement: WebEngagement,
    pub github_activity: GithubActivity,
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebEngagement {
    pub available: bool,
    pub total_views: u64,
    pub total_visitors: u64,
    pub top_essay: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubActivity {
    pub available: bool,
    pub total_commits: u64,
    pub total_prs: u64,
    pub total_releases: u64,
    pub organ_breakdown: BTreeMap<String, OrganReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganReport {
    pub available: bool,
    pub commits: u64,
    pub prs: u64,
    pub releases: u64,
}

/// Everything one run produces: both projections plus the snapshot the
/// caller persists after the output documents are safely written.
#[derive(Debug, Clone)]
pub struct AggregatedReport {
    pub engagement: EngagementMetrics,
    pub report: SystemReport,
    pub snapshot: HistorySnapshot,
}

/// Merge both source outcomes with the rolling history into the two output
/// projections and the new history snapshot.
///
/// Pure with respect to its inputs: identical adapter outputs, history, and
/// `generated_at` produce identical documents, so a re-run overwrites its
/// own artifacts byte for byte. Degraded sources zero their sections and
/// set availability markers; they never abort the merge.
pub fn aggregate(
    window: MetricWindow,
    generated_at: DateTime<Utc>,
    web: &FetchOutcome<WebMetrics>,
    activity: &FetchOutcome<ActivityMetrics>,
    history: &[HistorySnapshot],
    rules: &[AlertRule],
) -> AggregatedReport {
    let web_data = web.as_available();
    let (site_totals, pages, site_referrers) = match web_data {
        Some(m) => (m.site_totals, m.pages.clone(), m.referrers.clone()),
        None => (SiteTotals::default(), Vec::new(), BTreeMap::new()),
    };

    let referrer_totals = referrer_totals(&site_referrers, &pages);

    let previous = history.last();
    let trends = Trends {
        views_delta_pct: trend::delta_pct(
            site_totals.page_views as f64,
            previous.map(|s| s.site_totals.page_views as f64),
        ),
        visitors_delta_pct: trend::delta_pct(
            site_totals.unique_visitors as f64,
            previous.map(|s| s.site_totals.unique_visitors as f64),
        ),
    };

    let rolling_avg_views = web_data.map(|_| {
        let prior: Vec<f64> = history
            .iter()
            .map(|s| s.site_totals.page_views as f64)
            .collect();
        trend::rolling_average(&prior, site_totals.page_views as f64, TREND_WINDOW)
    });

    let (organ_breakdown, organ_totals) = match activity.as_available() {
        Some(metrics) => {
            let breakdown = metrics
                .organs
                .iter()
                .map(|(organ, outcome)| {
                    let entry = match outcome {
                        FetchOutcome::Available(counts) => OrganReport {
                            available: true,
                            commits: counts.commits,
                            prs: counts.prs,
                            releases: counts.releases,
                        },
                        FetchOutcome::Unavailable { .. } => OrganReport {
                            available: false,
                            commits: 0,
                            prs: 0,
                            releases: 0,
                        },
                    };
                    (organ.clone(), entry)
                })
                .collect();
            (breakdown, metrics.totals())
        }
        None => (BTreeMap::new(), OrganActivity::default()),
    };

    let ctx = threshold::RuleContext {
        web_available: web_data.is_some(),
        current_views: site_totals.page_views,
        rolling_avg_views,
        pages: &pages,
        referrers: &referrer_totals,
        total_commits: organ_totals.commits,
    };
    let alerts = threshold::evaluate(rules, &ctx);

    let engagement = EngagementMetrics {
        generated_at,
        period: window,
        available: web_data.is_some(),
        site_totals: SiteTotalsDoc {
            page_views: site_totals.page_views,
            unique_visitors: site_totals.unique_visitors,
            referrer_count: referrer_totals.len() as u64,
        },
        pages: pages.clone(),
        trends,
    };

    let report = SystemReport {
        generated_at,
        period: window,
        web_engagement: WebEngagement {
            available: web_data.is_some(),
            total_views: site_totals.page_views,
            total_visitors: site_totals.unique_visitors,
            top_essay: top_essay(&pages),
        },
        github_activity: GithubActivity {
            available: activity.is_available(),
            total_commits: organ_totals.commits,
            total_prs: organ_totals.prs,
            total_releases: organ_totals.releases,
            organ_breakdown,
        },
        alerts,
    };

    let snapshot = HistorySnapshot {
        generated_at,
        period: window,
        site_totals,
        organ_totals,
    };

    AggregatedReport { engagement, report, snapshot }
}

/// Serialize an output document as pretty JSON with a trailing newline.
pub fn to_json<T: Serialize>(doc: &T) -> Result<String> {
    let mut out =
        serde_json::to_string_pretty(doc).context("Failed to serialize output document")?;
    out.push('\n');
    Ok(out)
}

/// Site-wide referrer counts: the dedicated site-level map when the source
/// provides one, otherwise per-page referrers summed.
fn referrer_totals(
    site_referrers: &BTreeMap<String, u64>,
    pages: &[PageStats],
) -> BTreeMap<String, u64> {
    if !site_referrers.is_empty() {
        return site_referrers.clone();
    }
    let mut totals = BTreeMap::new();
    for page in pages {
        for (name, count) in &page.referrers {
            *totals.entry(name.clone()).or_insert(0) += count;
        }
    }
    totals
}

/// Page with the most views; ties resolve to the lexicographically smallest
/// path so reruns are reproducible. The pointer is the last path segment.
fn top_essay(pages: &[PageStats]) -> Option<String> {
    let top = pages
        .iter()
        .max_by(|a, b| a.views.cmp(&b.views).then_with(|| b.path.cmp(&a.path)))?;
    let slug = top
        .path
        .split('/')
        .rev()
        .find(|segment| !segment.is_empty())
        .unwrap_or(&top.path);
    Some(slug.to_string())
}
