pub mod aggregator;
pub mod analyzer;
pub mod collector;
pub mod config;
pub mod history;
pub mod report;

/// Common types used across modules
pub mod types {
    use std::collections::BTreeMap;

    use chrono::{DateTime, NaiveDate, Utc};
    use serde::{Deserialize, Serialize};

    /// Half-open reporting period `[start, end)`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct MetricWindow {
        pub start: NaiveDate,
        pub end: NaiveDate,
    }

    impl MetricWindow {
        /// Window covering the `days` days ending at `end` (exclusive).
        pub fn ending(end: NaiveDate, days: u64) -> Self {
            Self {
                start: end - chrono::Duration::days(days as i64),
                end,
            }
        }

        pub fn contains(&self, day: NaiveDate) -> bool {
            self.start <= day && day < self.end
        }
    }

    /// Outcome of a single source fetch.
    ///
    /// Absence of a source is data, not an error: adapters fold credential,
    /// network, and decode failures into `Unavailable` with a reason string,
    /// and the aggregator pattern-matches on the tag.
    #[derive(Debug, Clone)]
    pub enum FetchOutcome<T> {
        Available(T),
        Unavailable { reason: String },
    }

    impl<T> FetchOutcome<T> {
        pub fn unavailable(reason: impl Into<String>) -> Self {
            Self::Unavailable { reason: reason.into() }
        }

        pub fn as_available(&self) -> Option<&T> {
            match self {
                Self::Available(v) => Some(v),
                Self::Unavailable { .. } => None,
            }
        }

        pub fn is_available(&self) -> bool {
            matches!(self, Self::Available(_))
        }
    }

    /// Site-wide web traffic totals.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SiteTotals {
        pub page_views: u64,
        pub unique_visitors: u64,
    }

    /// Per-page statistics from the web-analytics source.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PageStats {
        pub path: String,
        pub title: String,
        pub views: u64,
        pub unique_visitors: u64,
        /// Referrer name -> hit count for this page. May be empty when the
        /// upstream only reports referrers site-wide.
        #[serde(default)]
        pub referrers: BTreeMap<String, u64>,
    }

    /// Normalized web-analytics output for one window.
    #[derive(Debug, Clone, Default)]
    pub struct WebMetrics {
        pub site_totals: SiteTotals,
        pub pages: Vec<PageStats>,
        /// Site-wide referrer counts (referrer name -> hits).
        pub referrers: BTreeMap<String, u64>,
    }

    /// Activity counters for one organ.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct OrganActivity {
        pub commits: u64,
        pub prs: u64,
        pub releases: u64,
    }

    /// Normalized source-control activity, one entry per configured organ.
    ///
    /// Each organ is fetched independently and may independently degrade, so
    /// every entry carries its own availability tag.
    #[derive(Debug, Clone, Default)]
    pub struct ActivityMetrics {
        pub organs: BTreeMap<String, FetchOutcome<OrganActivity>>,
    }

    impl ActivityMetrics {
        /// Sum of counters across organs that produced data.
        pub fn totals(&self) -> OrganActivity {
            let mut totals = OrganActivity::default();
            for counts in self.organs.values().filter_map(|o| o.as_available()) {
                totals.commits += counts.commits;
                totals.prs += counts.prs;
                totals.releases += counts.releases;
            }
            totals
        }
    }

    /// Alert severity levels
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Severity {
        Info,
        Warning,
        Critical,
    }

    impl std::fmt::Display for Severity {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Severity::Info => write!(f, "info"),
                Severity::Warning => write!(f, "warning"),
                Severity::Critical => write!(f, "critical"),
            }
        }
    }

    /// An alert emitted into the organ-summary report.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Alert {
        pub rule_id: String,
        pub severity: Severity,
        pub message: String,
        pub observed_value: Option<f64>,
    }

    /// One persisted aggregation result, keyed by `period.end`.
    ///
    /// Snapshots are never edited after a run; re-running the same window
    /// overwrites the entry with identical content.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct HistorySnapshot {
        pub generated_at: DateTime<Utc>,
        pub period: MetricWindow,
        pub site_totals: SiteTotals,
        pub organ_totals: OrganActivity,
    }
}
