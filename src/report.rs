//! Static HTML dashboard renderer.
//!
//! Produces a single self-contained page with inline CSS and inline SVG
//! charts from the two aggregated documents; no JavaScript, no external
//! assets.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::aggregator::{EngagementMetrics, SystemReport};
use crate::types::Alert;

const STYLE: &str = r#"
  :root { --primary: #0d47a1; --bg: #fafafa; --card: #fff; --border: #e0e0e0;
          --text: #333; --muted: #999; --up: #2e7d32; --down: #c62828; }
  * { margin: 0; padding: 0; box-sizing: border-box; }
  body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
         background: var(--bg); color: var(--text); line-height: 1.6;
         padding: 2rem; max-width: 960px; margin: 0 auto; }
  h1 { color: var(--primary); margin-bottom: 0.25rem; }
  .subtitle { color: var(--muted); margin-bottom: 2rem; font-size: 0.9rem; }
  .cards { display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr));
           gap: 1rem; margin-bottom: 2rem; }
  .card { background: var(--card); border: 1px solid var(--border); border-radius: 8px; padding: 1.25rem; }
  .card h3 { font-size: 0.8rem; text-transform: uppercase; color: var(--muted); margin-bottom: 0.5rem; }
  .card .value { font-size: 2rem; font-weight: 700; color: var(--primary); }
  .trend { font-size: 0.85rem; margin-left: 0.5rem; }
  .trend.up { color: var(--up); }
  .trend.down { color: var(--down); }
  .trend.neutral { color: var(--muted); }
  section { margin-bottom: 2rem; }
  section h2 { color: var(--primary); margin-bottom: 1rem; font-size: 1.2rem; }
  table { width: 100%; border-collapse: collapse; background: var(--card);
          border: 1px solid var(--border); border-radius: 8px; overflow: hidden; }
  th, td { padding: 0.6rem 1rem; text-align: left; border-bottom: 1px solid var(--border); }
  th { background: #f5f5f5; font-size: 0.8rem; text-transform: uppercase; color: var(--muted); }
  .num { text-align: right; font-variant-numeric: tabular-nums; }
  .empty-notice { color: var(--muted); font-style: italic; padding: 1rem; background: var(--card);
                  border: 1px solid var(--border); border-radius: 8px; text-align: center; }
  .alerts li { list-style: none; padding: 0.5rem 1rem; margin-bottom: 0.5rem; border-radius: 4px; }
  .alert-warning { background: #fff3e0; border-left: 4px solid #ff9800; }
  .alert-critical { background: #ffebee; border-left: 4px solid #c62828; }
  .alert-info { background: #e3f2fd; border-left: 4px solid #2196f3; }
  footer { margin-top: 3rem; padding-top: 1rem; border-top: 1px solid var(--border);
           color: var(--muted); font-size: 0.8rem; }
"#;

/// Inline SVG sparkline over a value series.
pub fn sparkline_svg(values: &[f64], width: u32, height: u32) -> String {
    if values.is_empty() || values.iter().all(|v| *v == 0.0) {
        return format!(
            r##"<svg width="{w}" height="{h}" xmlns="http://www.w3.org/2000/svg"><text x="{tx}" y="{ty}" text-anchor="middle" fill="#999" font-size="11">No data</text></svg>"##,
            w = width,
            h = height,
            tx = width / 2,
            ty = height / 2 + 4,
        );
    }

    let max_val = values.iter().cloned().fold(f64::MIN, f64::max).max(1.0);
    let step = width as f64 / (values.len().saturating_sub(1).max(1)) as f64;
    let points: Vec<String> = values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let x = i as f64 * step;
            let y = height as f64 - (v / max_val) * (height as f64 - 4.0) - 2.0;
            format!("{:.1},{:.1}", x, y)
        })
        .collect();

    format!(
        r##"<svg width="{w}" height="{h}" xmlns="http://www.w3.org/2000/svg"><polyline points="{points}" fill="none" stroke="#0d47a1" stroke-width="2" /></svg>"##,
        w = width,
        h = height,
        points = points.join(" "),
    )
}

/// Inline SVG horizontal bar chart, one bar per labeled value.
pub fn bar_chart_svg(entries: &[(String, u64)], width: u32, bar_height: u32) -> String {
    if entries.is_empty() {
        return format!(
            r##"<svg width="{w}" height="40" xmlns="http://www.w3.org/2000/svg"><text x="{tx}" y="20" text-anchor="middle" fill="#999" font-size="11">No data</text></svg>"##,
            w = width,
            tx = width / 2,
        );
    }

    let max_val = entries.iter().map(|(_, v)| *v).max().unwrap_or(0).max(1);
    let padding = 8;
    let label_width = 80;
    let chart_width = width.saturating_sub(label_width + 60);
    let total_height = entries.len() as u32 * (bar_height + padding) + padding;

    let mut bars = String::new();
    for (i, (label, value)) in entries.iter().enumerate() {
        let y = padding + i as u32 * (bar_height + padding);
        let bar_w = ((*value as f64 / max_val as f64) * chart_width as f64).max(1.0);
        bars.push_str(&format!(
            r##"<text x="{lx}" y="{ly}" text-anchor="end" fill="#333" font-size="12">{label}</text><rect x="{rx}" y="{ry}" width="{rw:.1}" height="{rh}" fill="#0d47a1" rx="3" /><text x="{vx:.1}" y="{ly}" fill="#666" font-size="11">{value}</text>"##,
            lx = label_width - 4,
            ly = y + bar_height / 2 + 4,
            label = label,
            rx = label_width,
            ry = y,
            rw = bar_w,
            rh = bar_height,
            vx = label_width as f64 + bar_w + 6.0,
            value = value,
        ));
    }

    format!(
        r#"<svg width="{w}" height="{h}" xmlns="http://www.w3.org/2000/svg">{bars}</svg>"#,
        w = width,
        h = total_height,
        bars = bars,
    )
}

/// Trend arrow with signed magnitude, or a neutral placeholder.
fn trend_indicator(delta_pct: Option<f64>) -> String {
    match delta_pct {
        None => r#"<span class="trend neutral">--</span>"#.to_string(),
        Some(delta) => {
            let (arrow, class) = if delta > 0.0 {
                ("&#9650;", "up")
            } else if delta < 0.0 {
                ("&#9660;", "down")
            } else {
                ("&#9654;", "neutral")
            };
            format!(r#"<span class="trend {}">{} {:+.1}%</span>"#, class, arrow, delta)
        }
    }
}

fn pages_table(engagement: &EngagementMetrics) -> String {
    if engagement.pages.is_empty() {
        return r#"<p class="empty-notice">No page data available.</p>"#.to_string();
    }

    let mut pages: Vec<_> = engagement.pages.iter().collect();
    pages.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.path.cmp(&b.path)));

    let rows: String = pages
        .iter()
        .map(|p| {
            let title = if p.title.is_empty() { &p.path } else { &p.title };
            format!(
                "<tr><td>{}</td><td>{}</td><td class='num'>{}</td><td class='num'>{}</td></tr>",
                title, p.path, p.views, p.unique_visitors
            )
        })
        .collect();

    format!(
        "<table><thead><tr><th>Title</th><th>Path</th><th>Views</th><th>Unique</th></tr></thead><tbody>{}</tbody></table>",
        rows
    )
}

fn alerts_list(alerts: &[Alert]) -> String {
    if alerts.is_empty() {
        return r#"<p class="empty-notice">No alerts triggered.</p>"#.to_string();
    }
    let items: String = alerts
        .iter()
        .map(|a| format!(r#"<li class="alert-{}">{}</li>"#, a.severity, a.message))
        .collect();
    format!(r#"<ul class="alerts">{}</ul>"#, items)
}

/// Render the full dashboard page. `views_series` is the site-views history
/// (oldest first, current window last) behind the sparkline.
pub fn render(
    engagement: &EngagementMetrics,
    report: &SystemReport,
    views_series: &[f64],
) -> String {
    let gh = &report.github_activity;
    let organ_commits: Vec<(String, u64)> = gh
        .organ_breakdown
        .iter()
        .map(|(organ, counts)| (organ.clone(), counts.commits))
        .collect();

    let has_data = engagement.site_totals.page_views > 0 || gh.total_commits > 0;
    let empty_banner = if has_data {
        String::new()
    } else {
        r#"<div class="empty-notice" style="margin-bottom:2rem">No analytics data collected yet. Configure GoatCounter and GitHub tokens to start tracking.</div>"#
            .to_string()
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Engagement Dashboard</title>
<style>{style}</style>
</head>
<body>
<h1>Engagement Dashboard</h1>
<p class="subtitle">Period: {start} to {end} | Generated: {generated}</p>

{empty_banner}

<div class="cards">
  <div class="card">
    <h3>Page Views</h3>
    <div class="value">{views}</div>
    {views_trend}
  </div>
  <div class="card">
    <h3>Unique Visitors</h3>
    <div class="value">{visitors}</div>
    {visitors_trend}
  </div>
  <div class="card">
    <h3>Total Commits</h3>
    <div class="value">{commits}</div>
  </div>
  <div class="card">
    <h3>Pull Requests</h3>
    <div class="value">{prs}</div>
  </div>
</div>

<section>
  <h2>Views Over Time</h2>
  {sparkline}
</section>

<section>
  <h2>Pages</h2>
  {pages}
</section>

<section>
  <h2>Commits by Organ</h2>
  {bar_chart}
</section>

<section>
  <h2>Alerts</h2>
  {alerts}
</section>

<footer>
  engagement-pipeline v{version} &mdash; privacy-first analytics via GoatCounter
</footer>
</body>
</html>
"#,
        style = STYLE,
        start = engagement.period.start,
        end = engagement.period.end,
        generated = engagement.generated_at.format("%Y-%m-%d"),
        empty_banner = empty_banner,
        views = engagement.site_totals.page_views,
        views_trend = trend_indicator(engagement.trends.views_delta_pct),
        visitors = engagement.site_totals.unique_visitors,
        visitors_trend = trend_indicator(engagement.trends.visitors_delta_pct),
        commits = gh.total_commits,
        prs = gh.total_prs,
        sparkline = sparkline_svg(views_series, 200, 40),
        pages = pages_table(engagement),
        bar_chart = bar_chart_svg(&organ_commits, 400, 24),
        alerts = alerts_list(&report.alerts),
        version = env!("CARGO_PKG_VERSION"),
    )
}

/// Render and write `index.html` under `dir`, returning the written path.
pub fn write_dashboard(
    dir: &Path,
    engagement: &EngagementMetrics,
    report: &SystemReport,
    views_series: &[f64],
) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create dashboard dir: {}", dir.display()))?;
    let path = dir.join("index.html");
    fs::write(&path, render(engagement, report, views_series))
        .with_context(|| format!("Failed to write dashboard: {}", path.display()))?;
    Ok(path)
}
