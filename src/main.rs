//! Dealboard - CRM deal dashboard generator
//!
//! A CLI tool that fetches deals from a PostgREST/Supabase backend or a
//! local JSON export and renders monthly conversion and owner-by-month
//! statistics as a Markdown or JSON dashboard.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (connection, config, invalid arguments, etc.)
//!   2 - Sample data was shown and --strict is set

mod analysis;
mod cli;
mod config;
mod models;
mod report;
mod source;

use analysis::{MatrixOptions, MonthWindow};
use anyhow::{bail, Context, Result};
use chrono::{Local, Utc};
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use models::{Dashboard, DashboardMetadata, MonthKey};
use source::{DealQuery, DealSource, FileDealSource, RestConfig, RestDealSource};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration first so the file can turn on verbose logging
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&args, config.general.verbose);

    info!("Dealboard v{}", env!("CARGO_PKG_VERSION"));

    match run_dashboard(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Dashboard generation failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .dealboard.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the backend URL, column names, status labels and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config_verbose: bool) {
    let level = args.log_level(config_verbose);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete dashboard workflow. Returns exit code (0 or 2).
async fn run_dashboard(args: Args, mut config: Config) -> Result<i32> {
    let start_time = Instant::now();

    if let Some(ref path) = args.config {
        info!("Using config file: {}", path.display());
    }
    config.merge_with_args(&args);
    config.validate().context("Invalid configuration")?;

    // Progress lines go to stdout unless the report itself does
    let progress = !args.quiet && config.general.output != "-";
    let say = |line: String| {
        if progress {
            println!("{}", line);
        }
    };

    let vocabulary = &config.status;
    let span = config.dashboard.month_span();
    let status_filter = config.dashboard.status_filter;
    let owner_filter = config.dashboard.owner();
    let reference = args.as_of.unwrap_or_else(|| Local::now().date_naive());
    let window = MonthWindow::build(reference, span.get());

    // Step 1: Fetch deals
    let source = build_source(&args, &config)?;
    say(format!("📥 Fetching deals from {}", source.describe()));

    let base = DealQuery::new().created_between(None, args.as_of);
    let recent_query = DealQuery::for_filters(status_filter, &owner_filter, vocabulary)
        .created_between(None, args.as_of);
    let spinner = progress.then(fetch_spinner);

    let fetched = fetch_deals(source.as_ref(), &base, &recent_query, &config, args.page).await;
    if let Some(ref pb) = spinner {
        pb.finish_and_clear();
    }
    let (records, counts, recent) = fetched?;
    info!("Fetched {} deals", records.len());

    // Step 2: Aggregate
    say(format!(
        "📊 Aggregating {} deals over {} months ({} to {})",
        records.len(),
        window.len(),
        window.months().first().map(ToString::to_string).unwrap_or_default(),
        window.last().map(|m| m.to_string()).unwrap_or_default()
    ));
    debug!("Status filter: {}, owner filter: {}", status_filter, owner_filter);

    let mut rng = rand::thread_rng();
    let monthly = analysis::aggregate_monthly(&records, &window, vocabulary, &mut rng);

    let options = MatrixOptions {
        status: status_filter,
        owner: &owner_filter,
        known_owners: &config.dashboard.known_owners,
        fallback_owners: &config.dashboard.fallback_owners,
    };
    let owner_matrix =
        analysis::aggregate_owner_months(&records, &window, vocabulary, &options, &mut rng);

    let summary = analysis::summarize(
        &records,
        vocabulary,
        counts,
        config.dashboard.max_owner_stats,
    );

    // Step 3: Build and render the report
    let metadata = DashboardMetadata {
        source: source.describe(),
        generated_at: Utc::now(),
        reference_month: window
            .last()
            .unwrap_or_else(|| MonthKey::from_date(reference)),
        months: window.len(),
        status_filter,
        owner_filter: owner_filter.clone(),
        records_fetched: records.len(),
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };

    let dashboard = Dashboard {
        metadata,
        summary,
        monthly,
        owner_matrix,
        recent,
    };

    say("📝 Generating report...".to_string());

    let output = match config.general.format {
        OutputFormat::Json => report::generate_json_report(&dashboard)?,
        OutputFormat::Markdown => report::generate_markdown_report(&dashboard),
    };
    report::write_report(&output, &config.general.output)?;

    // Print summary
    let summary = &dashboard.summary;
    say("\n📈 Dashboard Summary:".to_string());
    say(format!("   Total deals: {}", summary.total_deals));
    say(format!("   Conversion: {:.1}%", summary.conversion_rate));
    say(format!(
        "   - ✅ Won: {} | ⏳ Open: {} | ❌ Lost: {}",
        summary.outcomes.won, summary.outcomes.open, summary.outcomes.lost
    ));
    say(format!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64()));
    say(format!(
        "\n✅ Dashboard complete! Report saved to: {}",
        config.general.output
    ));

    if dashboard.uses_synthetic_data() {
        warn!("The report contains sample data for sections without matching deals");

        if args.strict {
            eprintln!("\n⛔ Sample data was used and --strict is set. Failing (exit code 2).");
            return Ok(2);
        }
    }

    Ok(0)
}

/// Fetch everything the dashboard needs: all deals, the status counts and
/// the requested page of recent deals matching the dashboard filters.
async fn fetch_deals(
    source: &dyn DealSource,
    base: &DealQuery,
    recent_query: &DealQuery,
    config: &Config,
    page: usize,
) -> Result<(Vec<models::DealRecord>, analysis::StatusCounts, models::DealPage)> {
    let records = source::fetch_all(source, base, config.backend.page_size)
        .await
        .context("Failed to fetch deals")?;

    let counts = source::status_counts(source, base, &config.status)
        .await
        .context("Failed to count deals by status")?;

    let recent = source::fetch_page(source, recent_query, page, config.dashboard.recent_limit)
        .await
        .context("Failed to fetch recent deals")?;

    Ok((records, counts, recent))
}

/// Spinner shown while talking to the data source.
fn fetch_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("Loading deals...");
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Pick the data source: a local export if --input is given, else the backend.
fn build_source(args: &Args, config: &Config) -> Result<Box<dyn DealSource>> {
    if let Some(ref input) = args.input {
        info!("Using local export: {}", input.display());
        let source = FileDealSource::load(input, &config.fields)
            .with_context(|| format!("Failed to load deals from {}", input.display()))?;
        return Ok(Box::new(source));
    }

    if config.backend.url.is_empty() {
        bail!(
            "No data source: pass --input FILE or --url URL, or set backend.url in {}",
            CONFIG_FILE
        );
    }
    if config.backend.api_key.is_empty() {
        warn!("No API key configured; the backend may reject requests");
    }

    let source = RestDealSource::new(RestConfig {
        url: config.backend.url.clone(),
        api_key: config.backend.api_key.clone(),
        table: config.backend.table.clone(),
        timeout_seconds: config.backend.timeout_seconds,
        fields: config.fields.clone(),
    })
    .context("Failed to set up the backend client")?;

    Ok(Box::new(source))
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems are reported on stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Failed to load {}: {:#}. Using defaults.", CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}
