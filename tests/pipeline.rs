//! End-to-end aggregation runs against a real on-disk history store.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use engagement_pipeline::aggregator::{self, TREND_WINDOW};
use engagement_pipeline::config::default_rules;
use engagement_pipeline::history::HistoryStore;
use engagement_pipeline::types::{
    ActivityMetrics, FetchOutcome, MetricWindow, OrganActivity, PageStats, SiteTotals,
    WebMetrics,
};

fn week_end(week: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, 1).unwrap() + chrono::Duration::weeks(week as i64)
}

fn generated_at(week: u64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 6, 0, 0).unwrap() + chrono::Duration::weeks(week as i64)
}

fn web(views: u64) -> FetchOutcome<WebMetrics> {
    let mut referrers = BTreeMap::new();
    referrers.insert("news.ycombinator.com".to_string(), views / 4);
    FetchOutcome::Available(WebMetrics {
        site_totals: SiteTotals { page_views: views, unique_visitors: views / 2 },
        pages: vec![PageStats {
            path: "/essays/meta-system/01-orchestrate/".to_string(),
            title: "Orchestrate".to_string(),
            views,
            unique_visitors: views / 2,
            referrers: BTreeMap::new(),
        }],
        referrers,
    })
}

fn activity(commits: u64) -> FetchOutcome<ActivityMetrics> {
    let mut organs = BTreeMap::new();
    organs.insert(
        "IV".to_string(),
        FetchOutcome::Available(OrganActivity { commits, prs: 2, releases: 0 }),
    );
    organs.insert(
        "V".to_string(),
        FetchOutcome::Available(OrganActivity { commits: 1, prs: 0, releases: 1 }),
    );
    FetchOutcome::Available(ActivityMetrics { organs })
}

/// One scheduled run: load recent history, aggregate, persist the snapshot.
fn run_week(store: &HistoryStore, week: u64, views: u64) -> aggregator::AggregatedReport {
    let window = MetricWindow::ending(week_end(week), 7);
    let recent = store.load_recent(TREND_WINDOW);
    let result = aggregator::aggregate(
        window,
        generated_at(week),
        &web(views),
        &activity(20),
        &recent,
        &default_rules(),
    );
    store.append(&result.snapshot).unwrap();
    result
}

#[test]
fn weekly_runs_accumulate_history_capped_at_window() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::new(dir.path());

    for week in 0..6u64 {
        run_week(&store, week, 100 + 10 * week);
        let loaded = store.load_recent(TREND_WINDOW);
        assert_eq!(loaded.len() as u64, (week + 1).min(TREND_WINDOW as u64));
    }
}

#[test]
fn second_week_gets_a_delta_against_the_first() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::new(dir.path());

    let first = run_week(&store, 0, 100);
    assert_eq!(first.engagement.trends.views_delta_pct, None);

    let second = run_week(&store, 1, 110);
    assert_eq!(second.engagement.trends.views_delta_pct, Some(10.0));
    assert_eq!(second.engagement.trends.visitors_delta_pct, Some(10.0));
}

#[test]
fn traffic_drop_fires_after_a_collapse_against_rolling_history() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::new(dir.path());

    for week in 0..4u64 {
        let result = run_week(&store, week, 400);
        assert!(result.report.alerts.iter().all(|a| a.rule_id != "traffic_drop"));
    }

    // Views collapse: rolling avg (400+400+400+50)/4 = 312.5, floor 156.25.
    let crashed = run_week(&store, 4, 50);
    assert!(crashed.report.alerts.iter().any(|a| a.rule_id == "traffic_drop"));
}

#[test]
fn rerunning_a_week_replaces_its_snapshot_and_reproduces_documents() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::new(dir.path());

    run_week(&store, 0, 100);
    run_week(&store, 1, 120);
    let first = run_week(&store, 2, 90);
    let rerun = run_week(&store, 2, 90);

    // Same period key: replaced, not duplicated, and byte-identical output.
    assert_eq!(store.load_recent(TREND_WINDOW).len(), 3);
    assert_eq!(
        aggregator::to_json(&first.engagement).unwrap(),
        aggregator::to_json(&rerun.engagement).unwrap()
    );
    assert_eq!(
        aggregator::to_json(&first.report).unwrap(),
        aggregator::to_json(&rerun.report).unwrap()
    );
}

#[test]
fn degraded_sources_still_produce_schema_complete_documents() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::new(dir.path());
    run_week(&store, 0, 100);

    let window = MetricWindow::ending(week_end(1), 7);
    let recent = store.load_recent(TREND_WINDOW);

    let combos: Vec<(FetchOutcome<WebMetrics>, FetchOutcome<ActivityMetrics>)> = vec![
        (FetchOutcome::unavailable("down"), activity(20)),
        (web(100), FetchOutcome::unavailable("down")),
        (FetchOutcome::unavailable("down"), FetchOutcome::unavailable("down")),
    ];

    for (web_outcome, activity_outcome) in combos {
        let result = aggregator::aggregate(
            window,
            generated_at(1),
            &web_outcome,
            &activity_outcome,
            &recent,
            &default_rules(),
        );

        let engagement: serde_json::Value =
            serde_json::from_str(&aggregator::to_json(&result.engagement).unwrap()).unwrap();
        assert!(engagement.get("site_totals").is_some());
        assert!(engagement.get("pages").is_some());
        assert!(engagement.get("trends").is_some());

        let report: serde_json::Value =
            serde_json::from_str(&aggregator::to_json(&result.report).unwrap()).unwrap();
        assert!(report.get("web_engagement").is_some());
        assert!(report["github_activity"].get("organ_breakdown").is_some());
        assert!(report.get("alerts").is_some());
    }
}
