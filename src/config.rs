use anyhow::{Context, Result};
use serde::Deserialize;

use crate::types::Severity;

/// Top-level configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub goatcounter: GoatCounterConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_window_days")]
    pub window_days: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_history_dir")]
    pub history_dir: String,
    #[serde(default = "default_dashboard_dir")]
    pub dashboard_dir: String,
    /// Per-request timeout applied to upstream API calls.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            log_level: default_log_level(),
            output_dir: default_output_dir(),
            history_dir: default_history_dir(),
            dashboard_dir: default_dashboard_dir(),
            fetch_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GoatCounterConfig {
    #[serde(default)]
    pub site: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_goatcounter_base")]
    pub base_url: String,
}

impl Default for GoatCounterConfig {
    fn default() -> Self {
        Self {
            site: String::new(),
            token: String::new(),
            base_url: default_goatcounter_base(),
        }
    }
}

impl GoatCounterConfig {
    pub fn configured(&self) -> bool {
        !self.site.is_empty() && !self.token.is_empty()
    }

    pub fn api_url(&self) -> String {
        self.base_url.replace("{site}", &self.site)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitHubConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_github_base")]
    pub base_url: String,
    /// GitHub organizations to track, each mapped to an organ code.
    #[serde(default = "default_orgs")]
    pub orgs: Vec<OrgMapping>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_url: default_github_base(),
            orgs: default_orgs(),
        }
    }
}

impl GitHubConfig {
    pub fn configured(&self) -> bool {
        !self.token.is_empty()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OrgMapping {
    pub org: String,
    pub organ: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThresholdsConfig {
    #[serde(default = "default_rules")]
    pub rules: Vec<AlertRule>,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self { rules: default_rules() }
    }
}

/// Closed set of alert rule types, each carrying its own typed parameters.
///
/// An unknown `type` value fails configuration loading instead of being
/// silently dropped, so a misconfigured rule set is caught at startup.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertRule {
    /// Site views fell below a fraction of the 4-week rolling average.
    TrafficDrop {
        #[serde(default = "default_traffic_drop_id")]
        id: String,
        #[serde(default = "default_warning")]
        severity: Severity,
        #[serde(default = "default_drop_fraction")]
        drop_fraction: f64,
    },
    /// A known published page recorded zero views in the window.
    ZeroTraffic {
        #[serde(default = "default_zero_traffic_id")]
        id: String,
        #[serde(default = "default_warning")]
        severity: Severity,
    },
    /// A single referrer dominates site traffic.
    ReferrerAnomaly {
        #[serde(default = "default_referrer_anomaly_id")]
        id: String,
        #[serde(default = "default_info")]
        severity: Severity,
        #[serde(default = "default_dominance_fraction")]
        dominance_fraction: f64,
    },
    /// Commit activity summed across all organs fell below a floor.
    GithubStall {
        #[serde(default = "default_github_stall_id")]
        id: String,
        #[serde(default = "default_warning")]
        severity: Severity,
        #[serde(default = "default_min_commits")]
        min_commits: u64,
    },
}

impl AlertRule {
    pub fn id(&self) -> &str {
        match self {
            AlertRule::TrafficDrop { id, .. }
            | AlertRule::ZeroTraffic { id, .. }
            | AlertRule::ReferrerAnomaly { id, .. }
            | AlertRule::GithubStall { id, .. } => id,
        }
    }
}

/// Rule set used when the config file does not define `[thresholds]`.
pub fn default_rules() -> Vec<AlertRule> {
    vec![
        AlertRule::TrafficDrop {
            id: default_traffic_drop_id(),
            severity: Severity::Warning,
            drop_fraction: default_drop_fraction(),
        },
        AlertRule::ZeroTraffic {
            id: default_zero_traffic_id(),
            severity: Severity::Warning,
        },
        AlertRule::ReferrerAnomaly {
            id: default_referrer_anomaly_id(),
            severity: Severity::Info,
            dominance_fraction: default_dominance_fraction(),
        },
        AlertRule::GithubStall {
            id: default_github_stall_id(),
            severity: Severity::Warning,
            min_commits: default_min_commits(),
        },
    ]
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        // Expand environment variables
        let expanded = expand_env_vars(&content);

        let config: Config = toml::from_str(&expanded)
            .with_context(|| "Failed to parse configuration")?;

        Ok(config)
    }
}

/// Expand ${ENV_VAR} references in config string
fn expand_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .to_string()
}

// Default value functions
fn default_window_days() -> u64 { 7 }
fn default_log_level() -> String { "info".to_string() }
fn default_output_dir() -> String { "data".to_string() }
fn default_history_dir() -> String { "data/history".to_string() }
fn default_dashboard_dir() -> String { "docs/dashboard".to_string() }
fn default_fetch_timeout() -> u64 { 30 }
fn default_goatcounter_base() -> String { "https://{site}.goatcounter.com/api/v0".to_string() }
fn default_github_base() -> String { "https://api.github.com".to_string() }
fn default_warning() -> Severity { Severity::Warning }
fn default_info() -> Severity { Severity::Info }
fn default_drop_fraction() -> f64 { 0.5 }
fn default_dominance_fraction() -> f64 { 0.8 }
fn default_min_commits() -> u64 { 5 }
fn default_traffic_drop_id() -> String { "traffic_drop".to_string() }
fn default_zero_traffic_id() -> String { "zero_traffic".to_string() }
fn default_referrer_anomaly_id() -> String { "referrer_anomaly".to_string() }
fn default_github_stall_id() -> String { "github_stall".to_string() }

fn default_orgs() -> Vec<OrgMapping> {
    [
        ("ivviiviivvi", "I"),
        ("omni-dromenon-machina", "II"),
        ("labores-profani-crux", "III"),
        ("organvm-iv-taxis", "IV"),
        ("organvm-v-logos", "V"),
        ("organvm-vi-koinonia", "VI"),
        ("organvm-vii-kerygma", "VII"),
        ("meta-organvm", "META"),
    ]
    .into_iter()
    .map(|(org, organ)| OrgMapping { org: org.to_string(), organ: organ.to_string() })
    .collect()
}
