//! Sequential report-by-report run against one portal session.

use crate::catalog::{ReportDescriptor, ReportKind, CATALOG};
use crate::config::AppConfig;
use crate::convert::{load_table, Converter};
use crate::error::AutomationError;
use crate::extract::{extract_report, extract_spawned_tab, window_handles};
use crate::filters::{
    set_analysis_filter, set_date_range_filter, set_monthly_supply_filter, set_summary_filter,
    AnalysisAxis,
};
use crate::nav::{open_report, return_home_with_retry};
use crate::period::FilterPeriod;
use crate::session::Session;
use crate::table::ExtractedTable;
use crate::workbook::{append_sheet, workbook_path, SheetOptions};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thirtyfour::prelude::*;
use tracing::{info, warn};

/// Runs the full fixed-order report batch and returns the workbook path.
///
/// The session is torn down on every exit path; a failed run leaves the
/// partially populated workbook and any diagnostic screenshots on disk.
pub async fn run(cfg: &AppConfig) -> Result<PathBuf, AutomationError> {
    std::fs::create_dir_all(&cfg.downloads_dir)?;
    std::fs::create_dir_all(&cfg.exports_dir)?;

    let mut session = Session::connect(cfg).await?;
    let outcome = run_reports(&session, cfg).await;
    match outcome {
        Ok(path) => {
            session.logout().await?;
            Ok(path)
        }
        Err(err) => {
            // Best-effort teardown; the original failure wins.
            session.teardown().await;
            Err(err)
        }
    }
}

async fn run_reports(session: &Session, cfg: &AppConfig) -> Result<PathBuf, AutomationError> {
    info!("attempting login for user {}", cfg.masked_username());
    session.login(&cfg.username, &cfg.password).await?;

    let path = workbook_path(&cfg.exports_dir);
    let converter = Converter::new(cfg.soffice_path.clone(), cfg.downloads_dir.clone());
    let period = FilterPeriod::resolve(None, None)?;
    info!(
        "processing reports for period {} into {}",
        period.token(),
        path.display()
    );

    // Fixed order: several forms retain state between unrelated reports,
    // and the workbook gains one sheet per report as we go.
    for descriptor in CATALOG {
        return_home_with_retry(session).await?;
        process_report(session, &converter, &path, descriptor, period).await?;
    }

    info!("all reports exported to {}", path.display());
    Ok(path)
}

async fn process_report(
    session: &Session,
    converter: &Converter,
    path: &Path,
    descriptor: &ReportDescriptor,
    period: FilterPeriod,
) -> Result<(), AutomationError> {
    open_report(session, descriptor).await?;

    match descriptor.kind {
        ReportKind::Inventory => {
            let table = extract_report(session, descriptor).await?;
            append_if_data(path, descriptor, table, SheetOptions::plain())?;
        }
        ReportKind::MonthlySupply => {
            set_monthly_supply_filter(session, period).await?;
            let table = extract_report(session, descriptor).await?;
            let options = table
                .as_ref()
                .and_then(|t| t.title.clone())
                .map_or_else(SheetOptions::plain, |title| SheetOptions::titled(title, true));
            append_if_data(path, descriptor, table, options)?;
        }
        ReportKind::CustomerAnalysis | ReportKind::ProductAnalysis => {
            let axis = if descriptor.kind == ReportKind::CustomerAnalysis {
                AnalysisAxis::Customer
            } else {
                AnalysisAxis::Product
            };
            set_analysis_filter(session, period, axis).await?;
            let table = extract_report(session, descriptor).await?;
            append_if_data(path, descriptor, table, SheetOptions::plain())?;
        }
        ReportKind::WeeklySummary | ReportKind::MonthlySummary => {
            process_download_report(session, converter, path, descriptor, period).await?;
        }
        ReportKind::PurchaseOrders | ReportKind::ReturnOrders => {
            set_date_range_filter(session, descriptor.kind, period).await?;
            let table = extract_report(session, descriptor).await?;
            append_if_data(path, descriptor, table, SheetOptions::plain())?;
        }
        ReportKind::DiscountDetail => {
            set_date_range_filter(session, descriptor.kind, period).await?;
            let table = extract_report(session, descriptor).await?;
            append_if_data(path, descriptor, table, SheetOptions::plain())?;
            process_discount_drilldowns(session, converter, path).await?;
        }
        ReportKind::PaymentDetail => {
            // Optional sub-artifact: a failure here is logged and skipped
            // so the batch finishes.
            if let Err(err) = process_payment_detail(session, path, descriptor, period).await {
                warn!("payment detail failed, skipping: {err}");
                session.save_screenshot("payment_detail_error").await;
            }
        }
    }
    Ok(())
}

fn append_if_data(
    path: &Path,
    descriptor: &ReportDescriptor,
    table: Option<ExtractedTable>,
    options: SheetOptions,
) -> Result<(), AutomationError> {
    match table {
        Some(table) => append_sheet(path, descriptor.sheet_name, &table, &options),
        None => {
            info!("skipping sheet '{}': no data", descriptor.sheet_name);
            Ok(())
        }
    }
}

/// Handles the settlement summaries, which the portal delivers as a
/// legacy spreadsheet download instead of an in-page table.
async fn process_download_report(
    session: &Session,
    converter: &Converter,
    path: &Path,
    descriptor: &ReportDescriptor,
    period: FilterPeriod,
) -> Result<(), AutomationError> {
    let before = converter.snapshot_downloads()?;
    set_summary_filter(session, descriptor.kind, period).await?;

    let downloaded = match converter.wait_for_download(&before, session.timeout()).await {
        Ok(file) => file,
        Err(AutomationError::Timeout { .. }) => {
            info!("no download produced for {}", descriptor.sheet_name);
            return Ok(());
        }
        Err(err) => return Err(err),
    };
    if let Some(expected) = descriptor.download_filename {
        let actual = downloaded.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if actual != expected {
            warn!(
                "{}: expected download '{expected}', got '{actual}'",
                descriptor.sheet_name
            );
        }
    }

    let result = convert_and_append(converter, path, descriptor.sheet_name, &downloaded).await;
    // The downloaded artifact never outlives its report, success or not.
    std::fs::remove_file(&downloaded).ok();
    result
}

async fn convert_and_append(
    converter: &Converter,
    path: &Path,
    sheet_name: &str,
    downloaded: &Path,
) -> Result<(), AutomationError> {
    let converted = converter.convert_to_xlsx(downloaded).await?;
    let outcome = match load_table(&converted)? {
        Some(table) => append_sheet(path, sheet_name, &table, &SheetOptions::plain()),
        None => {
            info!("converted file for '{sheet_name}' holds no rows");
            Ok(())
        }
    };
    std::fs::remove_file(&converted).ok();
    outcome
}

/// Walks the discount report's drilldown links. Each link downloads an
/// independent sub-report that becomes its own sheet; one link's failure
/// never aborts its siblings or the main extraction.
async fn process_discount_drilldowns(
    session: &Session,
    converter: &Converter,
    path: &Path,
) -> Result<(), AutomationError> {
    let driver = session.driver()?;
    let mut labels = Vec::new();
    for link in driver.find_all(By::Css("table.dataGrid a")).await? {
        if let Ok(text) = link.text().await {
            let label = text.trim().to_string();
            if !label.is_empty() {
                labels.push(label);
            }
        }
    }
    info!("found {} discount drilldown links", labels.len());

    let mut used_sheets = HashSet::new();
    for label in labels {
        let sheet = unique_sheet_name(&format!("discount_{label}"), &mut used_sheets);
        if let Err(err) = process_one_drilldown(session, converter, path, &label, &sheet).await {
            warn!("discount drilldown '{label}' failed, skipping: {err}");
            session.save_screenshot("discount_drilldown_error").await;
        }
    }
    Ok(())
}

async fn process_one_drilldown(
    session: &Session,
    converter: &Converter,
    path: &Path,
    label: &str,
    sheet: &str,
) -> Result<(), AutomationError> {
    let driver = session.driver()?;
    let before = converter.snapshot_downloads()?;

    // Re-find by text each time; earlier clicks can go stale.
    let link = driver.find(By::LinkText(label)).await?;
    link.click().await?;

    let downloaded = converter.wait_for_download(&before, session.timeout()).await?;
    let result = convert_and_append(converter, path, sheet, &downloaded).await;
    std::fs::remove_file(&downloaded).ok();
    result
}

async fn process_payment_detail(
    session: &Session,
    path: &Path,
    descriptor: &ReportDescriptor,
    period: FilterPeriod,
) -> Result<(), AutomationError> {
    let before = window_handles(session).await?;
    set_date_range_filter(session, descriptor.kind, period).await?;
    let table = extract_spawned_tab(session, &before, descriptor).await?;
    match &table {
        Some(table) => info!("processed {} payment detail rows", table.row_count()),
        None => info!("no payment details found for the period"),
    }
    append_if_data(path, descriptor, table, SheetOptions::plain())
}

/// Clamps a label-derived sheet name to Excel's constraints: at most 31
/// characters and none of the reserved punctuation.
fn sanitize_sheet_name(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\') {
                '_'
            } else {
                c
            }
        })
        .take(31)
        .collect()
}

/// Sanitized sheet name that is unique among `used`. Labels that collide
/// after truncation get a `~N` suffix inside the length budget, so one
/// drilldown sheet can never silently replace another.
fn unique_sheet_name(raw: &str, used: &mut HashSet<String>) -> String {
    let base = sanitize_sheet_name(raw);
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let suffix = format!("~{n}");
        let keep = 31usize.saturating_sub(suffix.chars().count());
        let mut candidate: String = base.chars().take(keep).collect();
        candidate.push_str(&suffix);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_names_are_clamped_and_cleaned() {
        assert_eq!(sanitize_sheet_name("discount_早鳥/特價"), "discount_早鳥_特價");
        let long = "x".repeat(40);
        assert_eq!(sanitize_sheet_name(&long).chars().count(), 31);
    }

    #[test]
    fn colliding_truncated_labels_stay_distinct() {
        let mut used = HashSet::new();
        let a = unique_sheet_name(&format!("discount_{}", "x".repeat(40)), &mut used);
        let b = unique_sheet_name(&format!("discount_{}", "x".repeat(45)), &mut used);
        let c = unique_sheet_name(&format!("discount_{}", "x".repeat(50)), &mut used);
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert!(b.chars().count() <= 31);
        assert!(b.ends_with("~2"));
        assert!(c.ends_with("~3"));
    }

    #[test]
    fn distinct_short_labels_keep_their_names() {
        let mut used = HashSet::new();
        assert_eq!(unique_sheet_name("discount_特價", &mut used), "discount_特價");
        assert_eq!(unique_sheet_name("discount_早鳥", &mut used), "discount_早鳥");
    }
}
