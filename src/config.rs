//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.dealboard.toml` files.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::cli::OutputFormat;
use crate::models::{FieldMap, MonthSpan, OwnerFilter, StatusFilter, StatusVocabulary};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".dealboard.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Backend connection settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Column names of the deals table.
    #[serde(default)]
    pub fields: FieldMap,

    /// Status labels used by the deployment.
    #[serde(default)]
    pub status: StatusVocabulary,

    /// Dashboard settings.
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path; `-` writes to stdout.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Report format.
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            format: OutputFormat::default(),
        }
    }
}

fn default_output() -> String {
    "dealboard_report.md".to_string()
}

/// REST backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`. Empty when unset.
    #[serde(default)]
    pub url: String,

    /// API key sent as `apikey` and bearer token.
    #[serde(default)]
    pub api_key: String,

    /// Table holding the deals.
    #[serde(default = "default_table")]
    pub table: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Rows requested per page when fetching all deals.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            table: default_table(),
            timeout_seconds: default_timeout(),
            page_size: default_page_size(),
        }
    }
}

fn default_table() -> String {
    "deals".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_page_size() -> usize {
    1000
}

/// Dashboard view settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Trailing months shown: 3, 6, 12 or 24.
    #[serde(default = "default_months")]
    pub months: usize,

    /// Status filter of the owner-month table.
    #[serde(default)]
    pub status_filter: StatusFilter,

    /// Owner filter of the owner-month table: `all` or an owner name.
    #[serde(default = "default_owner_filter")]
    pub owner_filter: String,

    /// Owner names used for sample data when none are found in the deals.
    #[serde(default)]
    pub known_owners: Vec<String>,

    /// Sample-data roster used when `known_owners` is empty.
    #[serde(default = "default_fallback_owners")]
    pub fallback_owners: Vec<String>,

    /// Deals per page of the recent-deals table.
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,

    /// Maximum owners listed in the owner statistics.
    #[serde(default = "default_max_owner_stats")]
    pub max_owner_stats: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            months: default_months(),
            status_filter: StatusFilter::default(),
            owner_filter: default_owner_filter(),
            known_owners: Vec::new(),
            fallback_owners: default_fallback_owners(),
            recent_limit: default_recent_limit(),
            max_owner_stats: default_max_owner_stats(),
        }
    }
}

fn default_months() -> usize {
    MonthSpan::DEFAULT
}

fn default_owner_filter() -> String {
    "all".to_string()
}

fn default_fallback_owners() -> Vec<String> {
    vec!["김대표", "이사원", "박부장", "최과장"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_recent_limit() -> usize {
    20
}

fn default_max_owner_stats() -> usize {
    30
}

impl DashboardConfig {
    pub fn month_span(&self) -> MonthSpan {
        MonthSpan::from(self.months)
    }

    pub fn owner(&self) -> OwnerFilter {
        OwnerFilter::from(self.owner_filter.as_str())
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values given on the command line (or via environment) override.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.url {
            self.backend.url = url.clone();
        }
        if let Some(ref api_key) = args.api_key {
            self.backend.api_key = api_key.clone();
        }
        if let Some(ref table) = args.table {
            self.backend.table = table.clone();
        }

        if let Some(ref raw) = args.months {
            let span = MonthSpan::from_input(Some(raw));
            if raw.trim().parse::<usize>().is_err() {
                warn!("Ignoring non-numeric --months '{}', using {}", raw, span.get());
            }
            self.dashboard.months = span.get();
        }
        if let Some(status) = args.status {
            self.dashboard.status_filter = status;
        }
        if let Some(ref owner) = args.owner {
            self.dashboard.owner_filter = owner.clone();
        }
        if let Some(ref known) = args.known_owners {
            self.dashboard.known_owners = known
                .iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(page_size) = args.page_size {
            self.dashboard.recent_limit = page_size;
        }

        if let Some(format) = args.format {
            self.general.format = format;
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check values that may come from the config file.
    pub fn validate(&self) -> Result<()> {
        if !self.dashboard.month_span().is_supported() {
            bail!(
                "Unsupported month span {}: expected one of {:?}",
                self.dashboard.months,
                MonthSpan::SUPPORTED
            );
        }
        if self.backend.page_size == 0 {
            bail!("backend.page_size must be at least 1");
        }
        if self.backend.timeout_seconds == 0 {
            bail!("backend.timeout_seconds must be at least 1");
        }
        if self.dashboard.recent_limit == 0 {
            bail!("dashboard.recent_limit must be at least 1");
        }
        if self.status.won.is_empty() {
            bail!("status.won must not be empty");
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend.table, "deals");
        assert_eq!(config.fields.owner, "manager");
        assert_eq!(config.status.won, "성사됨");
        assert_eq!(config.dashboard.months, 12);
        assert_eq!(config.dashboard.fallback_owners.len(), 4);
        assert_eq!(config.dashboard.max_owner_stats, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "dashboard.json"
format = "json"
verbose = true

[backend]
url = "https://xyz.supabase.co"
table = "crm_deals"

[fields]
owner = "owner_name"

[status]
won = "won"
failed = "lost"

[dashboard]
months = 6
status_filter = "success"
owner_filter = "김대표"
known_owners = ["김대표", "이사원"]
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "dashboard.json");
        assert_eq!(config.general.format, OutputFormat::Json);
        assert!(config.general.verbose);
        assert_eq!(config.backend.url, "https://xyz.supabase.co");
        assert_eq!(config.backend.table, "crm_deals");
        assert_eq!(config.backend.page_size, 1000);
        assert_eq!(config.fields.owner, "owner_name");
        assert_eq!(config.fields.status, "status");
        assert_eq!(config.status.won, "won");
        assert_eq!(config.status.in_progress, "진행중");
        assert_eq!(config.dashboard.month_span().get(), 6);
        assert_eq!(config.dashboard.status_filter, StatusFilter::Success);
        assert_eq!(config.dashboard.owner(), OwnerFilter::Owner("김대표".to_string()));
        assert_eq!(config.dashboard.known_owners, vec!["김대표", "이사원"]);
    }

    #[test]
    fn test_validate_rejects_unsupported_months() {
        let mut config = Config::default();
        config.dashboard.months = 5;
        assert!(config.validate().is_err());

        config.dashboard.months = 24;
        config.backend.page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_with_args() {
        let args = Args::parse_from([
            "dealboard",
            "--input",
            "deals.json",
            "--months",
            "abc",
            "--status",
            "fail",
            "--owner",
            "박부장",
            "--known-owners",
            "a, b,,c",
            "--format",
            "json",
            "--output",
            "-",
        ]);

        let mut config = Config::default();
        config.dashboard.months = 3;
        config.merge_with_args(&args);

        assert_eq!(config.dashboard.months, 12);
        assert_eq!(config.dashboard.status_filter, StatusFilter::Fail);
        assert_eq!(config.dashboard.owner(), OwnerFilter::Owner("박부장".to_string()));
        assert_eq!(config.dashboard.known_owners, vec!["a", "b", "c"]);
        assert_eq!(config.general.format, OutputFormat::Json);
        assert_eq!(config.general.output, "-");
    }

    #[test]
    fn test_merge_keeps_file_values_without_flags() {
        let args = Args::parse_from(["dealboard", "--input", "deals.json"]);
        let mut config = Config::default();
        config.dashboard.months = 6;
        config.backend.table = "crm_deals".to_string();
        config.merge_with_args(&args);

        assert_eq!(config.dashboard.months, 6);
        assert_eq!(config.backend.table, "crm_deals");

        // A verbose file setting survives a run without --verbose.
        config.general.verbose = true;
        config.merge_with_args(&args);
        assert!(config.general.verbose);
        assert_eq!(args.log_level(config.general.verbose), tracing::Level::DEBUG);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[backend]"));
        assert!(toml_str.contains("[dashboard]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.dashboard.fallback_owners, Config::default().dashboard.fallback_owners);
    }
}
