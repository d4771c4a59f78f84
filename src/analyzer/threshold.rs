use std::collections::BTreeMap;

use crate::config::AlertRule;
use crate::types::{Alert, PageStats};

/// Metric view handed to the rule engine: everything a rule predicate can
/// observe, already merged and trended.
pub struct RuleContext<'a> {
    /// Whether web analytics produced data this window. Web-dependent rules
    /// skip evaluation when the source is degraded rather than alerting on
    /// zeroed placeholders.
    pub web_available: bool,
    pub current_views: u64,
    /// Rolling mean of site views over up to four windows, current included.
    /// `None` when web analytics is unavailable.
    pub rolling_avg_views: Option<f64>,
    pub pages: &'a [PageStats],
    /// Site-wide referrer counts.
    pub referrers: &'a BTreeMap<String, u64>,
    /// Commits summed across all organs that produced data.
    pub total_commits: u64,
}

/// Evaluate configured rules in order.
///
/// Rules are independent: each firing appends its own alert and no rule
/// suppresses another.
pub fn evaluate(rules: &[AlertRule], ctx: &RuleContext) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for rule in rules {
        match rule {
            AlertRule::TrafficDrop { id, severity, drop_fraction } => {
                let Some(avg) = ctx.rolling_avg_views else { continue };
                if (ctx.current_views as f64) < drop_fraction * avg {
                    alerts.push(Alert {
                        rule_id: id.clone(),
                        severity: *severity,
                        message: format!(
                            "site views {} fell below {:.0}% of the 4-week rolling average {:.1}",
                            ctx.current_views,
                            drop_fraction * 100.0,
                            avg
                        ),
                        observed_value: Some(ctx.current_views as f64),
                    });
                }
            }
            AlertRule::ZeroTraffic { id, severity } => {
                if !ctx.web_available {
                    continue;
                }
                // One alert per affected page.
                for page in ctx.pages.iter().filter(|p| p.views == 0) {
                    alerts.push(Alert {
                        rule_id: id.clone(),
                        severity: *severity,
                        message: format!("page {} recorded zero views this window", page.path),
                        observed_value: Some(0.0),
                    });
                }
            }
            AlertRule::ReferrerAnomaly { id, severity, dominance_fraction } => {
                if !ctx.web_available {
                    continue;
                }
                let limit = dominance_fraction * ctx.current_views as f64;
                for (name, count) in ctx.referrers {
                    // Strictly greater: a referrer exactly at the limit is fine.
                    if (*count as f64) > limit {
                        alerts.push(Alert {
                            rule_id: id.clone(),
                            severity: *severity,
                            message: format!(
                                "referrer {} accounts for {} of {} site views",
                                name, count, ctx.current_views
                            ),
                            observed_value: Some(*count as f64),
                        });
                    }
                }
            }
            AlertRule::GithubStall { id, severity, min_commits } => {
                if ctx.total_commits < *min_commits {
                    alerts.push(Alert {
                        rule_id: id.clone(),
                        severity: *severity,
                        message: format!(
                            "{} commits across all organs this window (floor: {})",
                            ctx.total_commits, min_commits
                        ),
                        observed_value: Some(ctx.total_commits as f64),
                    });
                }
            }
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_rules;
    use crate::types::Severity;

    fn ctx<'a>(
        pages: &'a [PageStats],
        referrers: &'a BTreeMap<String, u64>,
    ) -> RuleContext<'a> {
        RuleContext {
            web_available: true,
            current_views: 100,
            rolling_avg_views: Some(100.0),
            pages,
            referrers,
            total_commits: 50,
        }
    }

    fn traffic_drop() -> Vec<AlertRule> {
        vec![AlertRule::TrafficDrop {
            id: "traffic_drop".to_string(),
            severity: Severity::Warning,
            drop_fraction: 0.5,
        }]
    }

    #[test]
    fn traffic_drop_fires_below_half_of_rolling_average() {
        let referrers = BTreeMap::new();
        let mut context = ctx(&[], &referrers);
        context.rolling_avg_views = Some(200.0);

        context.current_views = 90;
        let alerts = evaluate(&traffic_drop(), &context);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].rule_id, "traffic_drop");
        assert_eq!(alerts[0].observed_value, Some(90.0));

        context.current_views = 110;
        assert!(evaluate(&traffic_drop(), &context).is_empty());
    }

    #[test]
    fn traffic_drop_skipped_without_rolling_average() {
        let referrers = BTreeMap::new();
        let mut context = ctx(&[], &referrers);
        context.rolling_avg_views = None;
        context.current_views = 0;
        assert!(evaluate(&traffic_drop(), &context).is_empty());
    }

    #[test]
    fn zero_traffic_fires_once_per_page() {
        let pages = vec![
            PageStats {
                path: "/essays/one/".to_string(),
                title: "One".to_string(),
                views: 0,
                unique_visitors: 0,
                referrers: BTreeMap::new(),
            },
            PageStats {
                path: "/essays/two/".to_string(),
                title: "Two".to_string(),
                views: 12,
                unique_visitors: 9,
                referrers: BTreeMap::new(),
            },
            PageStats {
                path: "/essays/three/".to_string(),
                title: "Three".to_string(),
                views: 0,
                unique_visitors: 0,
                referrers: BTreeMap::new(),
            },
        ];
        let referrers = BTreeMap::new();
        let rules = vec![AlertRule::ZeroTraffic {
            id: "zero_traffic".to_string(),
            severity: Severity::Warning,
        }];

        let alerts = evaluate(&rules, &ctx(&pages, &referrers));
        assert_eq!(alerts.len(), 2);
        assert!(alerts[0].message.contains("/essays/one/"));
        assert!(alerts[1].message.contains("/essays/three/"));
    }

    #[test]
    fn zero_traffic_skipped_when_web_unavailable() {
        let pages = vec![PageStats {
            path: "/essays/one/".to_string(),
            title: "One".to_string(),
            views: 0,
            unique_visitors: 0,
            referrers: BTreeMap::new(),
        }];
        let referrers = BTreeMap::new();
        let mut context = ctx(&pages, &referrers);
        context.web_available = false;

        let rules = vec![AlertRule::ZeroTraffic {
            id: "zero_traffic".to_string(),
            severity: Severity::Warning,
        }];
        assert!(evaluate(&rules, &context).is_empty());
    }

    #[test]
    fn referrer_anomaly_is_strictly_greater() {
        let rules = vec![AlertRule::ReferrerAnomaly {
            id: "referrer_anomaly".to_string(),
            severity: Severity::Info,
            dominance_fraction: 0.8,
        }];

        let mut referrers = BTreeMap::new();
        referrers.insert("news.ycombinator.com".to_string(), 85u64);
        let alerts = evaluate(&rules, &ctx(&[], &referrers));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].observed_value, Some(85.0));

        referrers.insert("news.ycombinator.com".to_string(), 80u64);
        assert!(evaluate(&rules, &ctx(&[], &referrers)).is_empty());
    }

    #[test]
    fn github_stall_fires_below_commit_floor() {
        let referrers = BTreeMap::new();
        let mut context = ctx(&[], &referrers);
        let rules = vec![AlertRule::GithubStall {
            id: "github_stall".to_string(),
            severity: Severity::Warning,
            min_commits: 5,
        }];

        context.total_commits = 4;
        assert_eq!(evaluate(&rules, &context).len(), 1);

        context.total_commits = 5;
        assert!(evaluate(&rules, &context).is_empty());
    }

    #[test]
    fn rules_fire_independently_in_config_order() {
        let referrers = BTreeMap::new();
        let mut context = ctx(&[], &referrers);
        context.rolling_avg_views = Some(300.0);
        context.current_views = 10;
        context.total_commits = 0;

        let alerts = evaluate(&default_rules(), &context);
        let ids: Vec<&str> = alerts.iter().map(|a| a.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["traffic_drop", "github_stall"]);
    }
}
