//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use chrono::NaiveDate;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::{MonthSpan, StatusFilter};

/// Dealboard - CRM deal dashboard generator
///
/// Fetches deals from a PostgREST/Supabase backend or a local JSON export,
/// aggregates monthly conversion and owner-by-month statistics, and writes
/// a Markdown or JSON dashboard report.
///
/// Examples:
///   dealboard --url https://xyz.supabase.co --api-key KEY
///   dealboard --input deals.json --months 6 --status success
///   dealboard --input deals.json --owner 김대표 --format json --output -
///   dealboard --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Backend project URL
    ///
    /// Deals are read from {url}/rest/v1/{table}.
    #[arg(long, value_name = "URL", env = "DEALBOARD_URL")]
    pub url: Option<String>,

    /// Backend API key
    #[arg(long, value_name = "KEY", env = "DEALBOARD_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Table holding the deals
    #[arg(long, value_name = "NAME")]
    pub table: Option<String>,

    /// Read deals from a local JSON export instead of the backend
    ///
    /// Either an array of deal rows or an object with a "deals" array.
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Number of trailing months to show (3, 6, 12 or 24)
    ///
    /// Non-numeric values fall back to 12.
    #[arg(short, long, value_name = "N")]
    pub months: Option<String>,

    /// Status filter for the owner-month table
    #[arg(short, long, value_name = "STATUS")]
    pub status: Option<StatusFilter>,

    /// Owner filter for the owner-month table ("all" or an owner name)
    #[arg(long, value_name = "NAME")]
    pub owner: Option<String>,

    /// Reference date of the month window (defaults to today)
    ///
    /// Deals created after this date are not fetched.
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub as_of: Option<NaiveDate>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Output file path for the report, "-" for stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .dealboard.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Owner names to use for sample data (comma-separated)
    ///
    /// Example: --known-owners 김대표,이사원
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub known_owners: Option<Vec<String>>,

    /// Page of the recent-deals table (1-based)
    #[arg(long, default_value = "1", value_name = "N")]
    pub page: usize,

    /// Deals per page of the recent-deals table
    #[arg(long, value_name = "N")]
    pub page_size: Option<usize>,

    /// Exit with code 2 when any section shows sample data
    #[arg(long)]
    pub strict: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .dealboard.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate backend URL format
        if let Some(ref url) = self.url {
            if self.input.is_none() && !url.starts_with("http://") && !url.starts_with("https://")
            {
                return Err("Backend URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Validate input file if provided
        if let Some(ref input) = self.input {
            if !input.is_file() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        // Numeric month spans must be one of the selector options
        if let Some(ref raw) = self.months {
            if let Ok(months) = raw.trim().parse::<usize>() {
                if months != 0 && !MonthSpan::from(months).is_supported() {
                    return Err(format!(
                        "Months must be one of {:?}, got {}",
                        MonthSpan::SUPPORTED,
                        months
                    ));
                }
            }
        }

        if self.page_size == Some(0) {
            return Err("Page size must be at least 1".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is `general.verbose` from the config file; `--quiet`
    /// wins over it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
