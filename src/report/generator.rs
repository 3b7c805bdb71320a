//! Markdown dashboard generation.
//!
//! This module renders the aggregated dashboard as Markdown or JSON.
//! Sections built from sample data carry a visible notice.

use crate::analysis::{DealSummary, MonthlySeries, OwnerMonthMatrix, Tally};
use crate::models::{Aggregated, Dashboard, DashboardMetadata, DealPage};
use anyhow::{Context, Result};
use std::io::Write;

const SAMPLE_NOTICE: &str =
    "> ⚠️ **Sample data:** no matching deals were found, so this section shows generated placeholder values.\n\n";

/// Generate a complete Markdown dashboard.
pub fn generate_markdown_report(dashboard: &Dashboard) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Deal Dashboard\n\n");

    if dashboard.uses_synthetic_data() {
        output.push_str(
            "> ⚠️ Parts of this dashboard show **sample data** and do not reflect real deals.\n\n",
        );
    }

    output.push_str(&generate_metadata_section(&dashboard.metadata));
    output.push_str(&generate_summary_section(&dashboard.summary));
    output.push_str(&generate_monthly_section(&dashboard.monthly));
    output.push_str(&generate_matrix_section(&dashboard.owner_matrix, &dashboard.metadata));
    output.push_str(&generate_recent_section(&dashboard.recent));
    output.push_str(&generate_footer());

    output
}

/// Escape characters that would break a table cell.
fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &DashboardMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** `{}`\n", metadata.source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Period:** {} months ending {}\n",
        metadata.months, metadata.reference_month
    ));
    section.push_str(&format!("- **Status Filter:** {}\n", metadata.status_filter));
    section.push_str(&format!("- **Owner Filter:** {}\n", metadata.owner_filter));
    section.push_str(&format!(
        "- **Deals Fetched:** {}\n",
        metadata.records_fetched
    ));
    section.push_str(&format!("- **Duration:** {:.1}s\n", metadata.duration_seconds));
    section.push('\n');

    section
}

/// Generate the summary cards.
fn generate_summary_section(summary: &DealSummary) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Total Deals | Conversion | Won | Open | Lost |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| **{}** | {:.1}% | {} | {} | {} |\n\n",
        summary.total_deals,
        summary.conversion_rate,
        summary.outcomes.won,
        summary.outcomes.open,
        summary.outcomes.lost
    ));

    if !summary.status_counts.by_status.is_empty() {
        section.push_str("### Deals by Status\n\n");
        section.push_str("| Status | Count |\n");
        section.push_str("|:---|:---:|\n");

        let mut statuses: Vec<_> = summary.status_counts.by_status.iter().collect();
        statuses.sort_by_key(|(_, count)| std::cmp::Reverse(**count));

        for (status, count) in statuses {
            section.push_str(&format!("| {} | {} |\n", escape_cell(status), count));
        }
        section.push('\n');
    }

    if !summary.owner_stats.is_empty() {
        section.push_str("### Deals by Owner\n\n");
        section.push_str("| Owner | Deals | Won | Rate |\n");
        section.push_str("|:---|:---:|:---:|:---:|\n");

        for stat in &summary.owner_stats {
            section.push_str(&format!(
                "| {} | {} | {} | {:.1}% |\n",
                escape_cell(&stat.owner),
                stat.total,
                stat.won,
                stat.rate
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the monthly conversion table.
fn generate_monthly_section(monthly: &Aggregated<MonthlySeries>) -> String {
    let mut section = String::new();
    let series = monthly.get();

    section.push_str("## Monthly Conversion\n\n");
    if monthly.is_synthetic() {
        section.push_str(SAMPLE_NOTICE);
    }

    section.push_str("| Month | Deals | Won | Conversion |\n");
    section.push_str("|:---|:---:|:---:|:---:|\n");

    for month in series.months() {
        section.push_str(&format!(
            "| {} | {} | {} | {:.1}% |\n",
            month,
            series.total(month),
            series.success(month),
            series.conversion_rate(month)
        ));
    }

    let overall = Tally::from_counts(series.grand_total(), series.grand_success());
    section.push_str(&format!(
        "| **Total** | **{}** | **{}** | **{}%** |\n\n",
        overall.total, overall.success, overall.percent
    ));

    section
}

/// Generate the owner-by-month matrix.
///
/// Each owner gets a deal count row and a success percentage row, followed
/// by grand rows over all owners.
fn generate_matrix_section(
    matrix: &Aggregated<OwnerMonthMatrix>,
    metadata: &DashboardMetadata,
) -> String {
    let mut section = String::new();
    let data = matrix.get();
    let months: Vec<_> = data.months().collect();

    section.push_str("## Deals by Owner and Month\n\n");
    if matrix.is_synthetic() {
        section.push_str(SAMPLE_NOTICE);
    }
    section.push_str(&format!(
        "*Status: {} | Owner: {}*\n\n",
        metadata.status_filter, metadata.owner_filter
    ));

    // Header
    section.push_str("| Owner | |");
    for month in &months {
        section.push_str(&format!(" {} |", month));
    }
    section.push_str(" Total |\n");
    section.push_str("|:---|:---|");
    section.push_str(&":---:|".repeat(months.len() + 1));
    section.push('\n');

    for owner in data.owners() {
        let name = escape_cell(owner);
        let tally = data.owner_tally(owner);

        section.push_str(&format!("| {} | Deals |", name));
        for month in &months {
            section.push_str(&format!(" {} |", data.cell(month, owner).total));
        }
        section.push_str(&format!(" **{}** |\n", tally.total));

        section.push_str(&format!("| {} | Success |", name));
        for month in &months {
            let cell = data.cell(month, owner);
            let percent = Tally::from_counts(cell.total, cell.success).percent;
            section.push_str(&format!(" {}% |", percent));
        }
        section.push_str(&format!(" **{}%** |\n", tally.percent));
    }

    let grand = data.grand_tally();

    section.push_str("| **All owners** | Deals |");
    for month in &months {
        section.push_str(&format!(" {} |", data.month_tally(month).total));
    }
    section.push_str(&format!(" **{}** |\n", grand.total));

    section.push_str("| **All owners** | Success |");
    for month in &months {
        section.push_str(&format!(" {}% |", data.month_tally(month).percent));
    }
    section.push_str(&format!(" **{}%** |\n\n", grand.percent));

    section
}

/// Generate the recent deals table.
fn generate_recent_section(page: &DealPage) -> String {
    let mut section = String::new();

    section.push_str("## Recent Deals\n\n");

    let Some((first, last)) = page.shown_range() else {
        section.push_str("No deals to show.\n\n");
        return section;
    };

    section.push_str(&format!(
        "*Showing {}-{} of {} deals (page {} of {})*\n\n",
        first,
        last,
        page.total,
        page.page,
        page.total_pages()
    ));

    section.push_str("| Created | Deal | Owner | Status |\n");
    section.push_str("|:---|:---|:---|:---|\n");

    for deal in &page.deals {
        let created = deal
            .created_at
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string());
        let name = deal
            .name
            .as_deref()
            .or(deal.id.as_deref())
            .unwrap_or("-");

        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            escape_cell(&created),
            escape_cell(name),
            escape_cell(deal.owner.as_deref().unwrap_or("-")),
            escape_cell(deal.status.as_deref().unwrap_or("-"))
        ));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by dealboard v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(dashboard: &Dashboard) -> Result<String> {
    serde_json::to_string_pretty(dashboard).map_err(Into::into)
}

/// Write rendered report content to `output`, or to stdout for `-`.
pub fn write_report(content: &str, output: &str) -> Result<()> {
    if output == "-" {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(content.as_bytes())
            .context("Failed to write report to stdout")?;
        return stdout.flush().context("Failed to flush stdout");
    }

    let mut file = std::fs::File::create(output)
        .with_context(|| format!("Failed to create report file {}", output))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write report to {}", output))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{
        count_monthly, count_owner_months, summarize, synthetic, MonthWindow, StatusCounts,
    };
    use crate::models::{DealRecord, MonthKey, OwnerFilter, StatusFilter, StatusVocabulary};
    use chrono::{NaiveDate, Utc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn records() -> Vec<DealRecord> {
        vec![
            DealRecord::new("2024-03-05", "성사됨", "김대표"),
            DealRecord::new("2024-03-20", "진행중", "이사원"),
            DealRecord::new("2024-04-01", "성사됨", "김대표"),
        ]
    }

    fn window() -> MonthWindow {
        MonthWindow::build(NaiveDate::from_ymd_opt(2024, 4, 15).unwrap(), 3)
    }

    fn metadata() -> DashboardMetadata {
        DashboardMetadata {
            source: "deals.json".to_string(),
            generated_at: Utc::now(),
            reference_month: MonthKey::new(2024, 4).unwrap(),
            months: 3,
            status_filter: StatusFilter::All,
            owner_filter: OwnerFilter::All,
            records_fetched: 3,
            duration_seconds: 0.4,
        }
    }

    fn create_test_dashboard() -> Dashboard {
        let vocab = StatusVocabulary::default();
        let records = records();
        let window = window();

        Dashboard {
            metadata: metadata(),
            summary: summarize(&records, &vocab, StatusCounts::tally(&records, &vocab), 30),
            monthly: Aggregated::Computed(count_monthly(&records, &window, &vocab)),
            owner_matrix: Aggregated::Computed(count_owner_months(
                &records,
                &window,
                &vocab,
                StatusFilter::All,
                &OwnerFilter::All,
            )),
            recent: DealPage {
                page: 1,
                page_size: 20,
                total: 3,
                deals: records,
            },
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let dashboard = create_test_dashboard();
        let markdown = generate_markdown_report(&dashboard);

        assert!(markdown.contains("# Deal Dashboard"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Summary"));
        assert!(markdown.contains("## Monthly Conversion"));
        assert!(markdown.contains("## Deals by Owner and Month"));
        assert!(markdown.contains("## Recent Deals"));
        assert!(markdown.contains("| 2024-03 | 2 | 1 | 50.0% |"));
        assert!(markdown.contains("Showing 1-3 of 3 deals (page 1 of 1)"));
        assert!(!markdown.contains("Sample data"));
    }

    #[test]
    fn test_matrix_rows() {
        let dashboard = create_test_dashboard();
        let section = generate_matrix_section(&dashboard.owner_matrix, &dashboard.metadata);

        assert!(section.contains("| Owner | | 2024-02 | 2024-03 | 2024-04 | Total |"));
        assert!(section.contains("| 김대표 | Deals | 0 | 1 | 1 | **2** |"));
        assert!(section.contains("| 김대표 | Success | 0% | 100% | 100% | **100%** |"));
        assert!(section.contains("| 이사원 | Success | 0% | 0% | 0% | **0%** |"));
        assert!(section.contains("| **All owners** | Deals | 0 | 2 | 1 | **3** |"));
        assert!(section.contains("| **All owners** | Success | 0% | 50% | 100% | **67%** |"));
    }

    #[test]
    fn test_sample_data_notice() {
        let mut dashboard = create_test_dashboard();
        let fallback = vec!["김대표".to_string()];
        dashboard.owner_matrix = Aggregated::Fallback(synthetic::owner_matrix(
            &window(),
            &fallback,
            &mut StdRng::seed_from_u64(1),
        ));

        let markdown = generate_markdown_report(&dashboard);
        assert!(markdown.contains("**sample data**"));
        assert_eq!(markdown.matches("**Sample data:**").count(), 1);

        let monthly = generate_monthly_section(&dashboard.monthly);
        assert!(!monthly.contains("Sample data"));
    }

    #[test]
    fn test_recent_section_empty() {
        let section = generate_recent_section(&DealPage::default());
        assert!(section.contains("No deals to show."));
    }

    #[test]
    fn test_escape_cell() {
        assert_eq!(escape_cell("a|b"), "a\\|b");
        assert_eq!(escape_cell("line\nbreak"), "line break");
    }

    #[test]
    fn test_generate_json_report() {
        let dashboard = create_test_dashboard();
        let json = generate_json_report(&dashboard).unwrap();

        assert!(json.contains("\"metadata\""));
        assert!(json.contains("\"kind\": \"computed\""));
        assert!(json.contains("\"2024-03\""));
        assert!(json.contains("\"owner_stats\""));
    }

    #[test]
    fn test_write_report_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        write_report("# Deal Dashboard\n", path.to_str().unwrap()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Deal Dashboard\n");
    }
}
