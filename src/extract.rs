//! HTML table extraction into normalized record sets.
//!
//! Pages are snapshotted once through the driver and parsed offline, so
//! all per-report irregularities (footer rows, merged cells, percent
//! columns) live in pure functions that the integration tests exercise
//! against fixtures.

use crate::catalog::{
    ColumnSchema, ReportDescriptor, ReportKind, SUMMARY_LABEL, SUPPLY_SUMMARY_LABEL_COLUMN,
    SUPPLY_SUMMARY_MAP,
};
use crate::error::AutomationError;
use crate::session::Session;
use crate::table::{CellValue, ExtractedTable};
use crate::wait::{wait_for_element, wait_until};
use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use std::str::FromStr;
use std::sync::LazyLock;
use thirtyfour::prelude::*;
use tracing::{debug, info, warn};

static TABLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid table selector"));
static TR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("valid tr selector"));
static CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td, th").expect("valid cell selector"));
static TD_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("valid td selector"));
static THEAD_TR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("thead tr").expect("valid thead selector"));
static TBODY_TR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tbody tr").expect("valid tbody selector"));
static TFOOT_TR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tfoot tr").expect("valid tfoot selector"));
static P_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("valid p selector"));

/// Characters stripped before numeric coercion: thousands separators,
/// regular and narrow no-break spaces, and an explicit plus sign.
static NUMBER_NOISE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,\s\u{a0}\u{202f}+]").expect("valid number noise regex"));

/// Collects an element's text and collapses whitespace runs.
pub fn collect_text(element: ElementRef) -> String {
    let mut output = String::new();
    let mut prev_space = false;
    for ch in element.text().flat_map(str::chars) {
        if ch.is_whitespace() {
            if !prev_space {
                output.push(' ');
            }
            prev_space = true;
        } else {
            output.push(ch);
            prev_space = false;
        }
    }
    output.trim().to_string()
}

/// Coerces a cell text to a number; `None` for blank or unparseable input.
pub fn parse_number(value: &str) -> Option<Decimal> {
    let cleaned = NUMBER_NOISE_RE.replace_all(value, "");
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Coerces a percent cell (`"12.5%"`) to its numeric magnitude.
pub fn parse_percent(value: &str) -> Option<Decimal> {
    parse_number(value.trim().trim_end_matches('%'))
}

/// Parses a date cell, trying the portal's primary `YYYY/MM/DD` format
/// and falling back to `YYYY-MM-DD`.
pub fn parse_date_cell(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%Y/%m/%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .ok()
}

/// Applies a report's fixed column typing in place. Unparseable values
/// become [`CellValue::Null`]; this never fails.
pub fn apply_schema(table: &mut ExtractedTable, schema: &ColumnSchema) {
    let coercions: Vec<(usize, Coercion)> = table
        .columns
        .iter()
        .enumerate()
        .filter_map(|(idx, name)| {
            if schema.numeric.contains(&name.as_str()) {
                Some((idx, Coercion::Number))
            } else if schema.percent.contains(&name.as_str()) {
                Some((idx, Coercion::Percent))
            } else if schema.date.contains(&name.as_str()) {
                Some((idx, Coercion::Date))
            } else {
                None
            }
        })
        .collect();

    for row in &mut table.rows {
        for &(idx, coercion) in &coercions {
            let Some(cell) = row.get_mut(idx) else { continue };
            let CellValue::Text(text) = cell else { continue };
            *cell = match coercion {
                Coercion::Number => parse_number(text).map_or(CellValue::Null, CellValue::Number),
                Coercion::Percent => parse_percent(text).map_or(CellValue::Null, CellValue::Number),
                Coercion::Date => parse_date_cell(text).map_or(CellValue::Null, CellValue::Date),
            };
        }
    }
}

#[derive(Clone, Copy)]
enum Coercion {
    Number,
    Percent,
    Date,
}

fn find_table_by_class<'a>(doc: &'a Html, class: &str) -> Option<ElementRef<'a>> {
    doc.select(&TABLE_SELECTOR)
        .find(|t| t.value().classes().any(|c| c == class))
}

fn row_texts(row: ElementRef, selector: &Selector) -> Vec<String> {
    row.select(selector).map(collect_text).collect()
}

fn contains_label(cells: &[String], label: &str) -> bool {
    let stripped = label.replace(' ', "");
    cells
        .iter()
        .any(|c| c.replace(' ', "").contains(&stripped))
}

/// Parses the inventory detail grid (`table.dataGrid` with an explicit
/// `thead`/`tbody`/`tfoot` split).
///
/// The footer's 總計 row has fewer cells than the body and is mapped by
/// its cell classes; trailing columns without a footer counterpart are
/// defaulted to empty rather than dropped.
pub fn parse_inventory(html: &str) -> Option<ExtractedTable> {
    let doc = Html::parse_document(html);
    let table = find_table_by_class(&doc, "dataGrid")?;

    let headers = row_texts(table.select(&THEAD_TR).next()?, &CELL_SELECTOR);
    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    for tr in table.select(&TBODY_TR) {
        let cells = row_texts(tr, &TD_SELECTOR);
        if cells.iter().all(String::is_empty) {
            continue;
        }
        rows.push(cells.into_iter().map(CellValue::Text).collect());
    }
    if rows.is_empty() {
        return None;
    }

    if let Some(footer_row) = table.select(&TFOOT_TR).next() {
        let by_class = |class: &str| {
            footer_row
                .select(&TD_SELECTOR)
                .find(|td| td.value().classes().any(|c| c == class))
                .map(collect_text)
                .unwrap_or_default()
        };
        let mut footer = vec![
            CellValue::Text(by_class("pdtCode")),
            CellValue::Text(by_class("pdtName")),
            CellValue::Text(by_class("stockQuantity")),
            CellValue::Text(by_class("stockAmount")),
        ];
        footer.resize(headers.len(), CellValue::Text(String::new()));
        rows.push(footer);
    }

    Some(ExtractedTable::from_raw(headers, rows))
}

/// Parses the monthly-supply report (`table.sortable`) plus its 合計
/// summary row, which renders with a cell layout that does not align
/// with the body columns and is therefore mapped positionally via
/// [`SUPPLY_SUMMARY_MAP`].
pub fn parse_supply(html: &str) -> Option<ExtractedTable> {
    let doc = Html::parse_document(html);
    let table = find_table_by_class(&doc, "sortable")?;

    let mut tr_iter = table.select(&TR_SELECTOR);
    let headers = row_texts(tr_iter.next()?, &CELL_SELECTOR);

    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    for tr in tr_iter {
        let cells = row_texts(tr, &TD_SELECTOR);
        if cells.iter().all(String::is_empty) || contains_label(&cells, SUMMARY_LABEL) {
            continue;
        }
        rows.push(cells.into_iter().map(CellValue::Text).collect());
    }
    if rows.is_empty() {
        return None;
    }

    let mut result = ExtractedTable::from_raw(headers, rows);

    // The summary row is searched across the whole document; the portal
    // has rendered it both inside and below the sortable table.
    let summary_cells: Option<Vec<String>> = doc
        .select(&TR_SELECTOR)
        .map(|tr| row_texts(tr, &TD_SELECTOR))
        .filter(|cells| contains_label(cells, SUMMARY_LABEL))
        .last();
    if let Some(cells) = summary_cells {
        result.rows.push(build_supply_summary(&result, &cells));
    } else {
        warn!("no summary row found in supply report");
    }

    result.title = doc
        .select(&P_SELECTOR)
        .map(collect_text)
        .find(|text| text.contains("庫存銷售月報表"));

    Some(result)
}

/// Builds the synthesized supply summary row: the sentinel label in its
/// designated column, positionally mapped numeric cells, and zero for
/// every unmapped numeric column.
fn build_supply_summary(table: &ExtractedTable, cells: &[String]) -> Vec<CellValue> {
    let mut row: Vec<CellValue> = table
        .columns
        .iter()
        .map(|col| {
            if col == SUPPLY_SUMMARY_LABEL_COLUMN {
                CellValue::Text(SUMMARY_LABEL.to_string())
            } else if SUPPLY_SUMMARY_MAP.iter().any(|(_, name)| name == col) {
                CellValue::Number(Decimal::ZERO)
            } else {
                CellValue::Text(String::new())
            }
        })
        .collect();

    // The first rendered cell carries the label; values follow it.
    let values = &cells[1..];
    for &(cell_idx, column) in SUPPLY_SUMMARY_MAP {
        let Some(target) = table.column_index(column) else {
            continue;
        };
        let value = values
            .get(cell_idx)
            .and_then(|v| parse_number(v))
            .unwrap_or_else(|| {
                debug!("summary cell {cell_idx} ({column}) not numeric, using zero");
                Decimal::ZERO
            });
        row[target] = CellValue::Number(value);
    }
    row
}

/// Parses an analysis results table (`table[bgcolor='#008080']`).
///
/// The total row is marked by a `#CCFF66` background on its first cell
/// and merges its leading columns with `colspan`; the merged cell expands
/// to the sentinel label plus empty padding, and blank numeric cells in
/// that row read as zero.
pub fn parse_analysis(html: &str) -> Option<ExtractedTable> {
    let doc = Html::parse_document(html);
    let table = doc
        .select(&TABLE_SELECTOR)
        .find(|t| t.value().attr("bgcolor") == Some("#008080"))?;

    let mut tr_iter = table.select(&TR_SELECTOR);
    let headers = row_texts(tr_iter.next()?, &CELL_SELECTOR);

    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    for tr in tr_iter {
        let cells: Vec<ElementRef> = tr.select(&TD_SELECTOR).collect();
        if cells.is_empty() {
            continue;
        }
        let is_total = cells[0].value().attr("bgcolor") == Some("#CCFF66");

        let mut row_data: Vec<String> = Vec::with_capacity(headers.len());
        for cell in &cells {
            let colspan: usize = cell
                .value()
                .attr("colspan")
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);
            if is_total && colspan > 1 {
                row_data.push(SUMMARY_LABEL.to_string());
                row_data.extend(std::iter::repeat_with(String::new).take(colspan - 1));
            } else {
                row_data.push(collect_text(*cell));
            }
        }
        if row_data.iter().all(String::is_empty) {
            continue;
        }
        if is_total {
            // Blank cells in the total row are genuine zeroes.
            for value in &mut row_data[1..] {
                if value.is_empty() {
                    *value = "0".to_string();
                }
            }
        }
        rows.push(row_data.into_iter().map(CellValue::Text).collect());
    }
    if rows.is_empty() {
        return None;
    }

    Some(ExtractedTable::from_raw(headers, rows))
}

/// Parses a plain `table.dataGrid` report: first row is the header,
/// entirely empty rows are discarded.
pub fn parse_grid(html: &str) -> Option<ExtractedTable> {
    let doc = Html::parse_document(html);
    let table = find_table_by_class(&doc, "dataGrid")?;

    let mut tr_iter = table.select(&TR_SELECTOR);
    let headers = row_texts(tr_iter.next()?, &CELL_SELECTOR);

    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    for tr in tr_iter {
        let cells = row_texts(tr, &TD_SELECTOR);
        if cells.is_empty() || cells.iter().all(String::is_empty) {
            continue;
        }
        rows.push(cells.into_iter().map(CellValue::Text).collect());
    }
    if rows.is_empty() {
        return None;
    }
    Some(ExtractedTable::from_raw(headers, rows))
}

/// Parses a report page's HTML with the parser and column schema that
/// belong to the descriptor's kind. `None` is the empty-result sentinel.
pub fn parse_report_html(descriptor: &ReportDescriptor, html: &str) -> Option<ExtractedTable> {
    let mut table = match descriptor.kind {
        ReportKind::Inventory => parse_inventory(html),
        ReportKind::MonthlySupply => parse_supply(html),
        ReportKind::CustomerAnalysis | ReportKind::ProductAnalysis => parse_analysis(html),
        _ => parse_grid(html),
    };
    if let Some(table) = &mut table {
        apply_schema(table, &descriptor.schema);
    }
    table
}

/// Snapshots the current page through the driver and dispatches it to the
/// report's parser. `Ok(None)` is the empty-result sentinel.
pub async fn extract_report(
    session: &Session,
    descriptor: &ReportDescriptor,
) -> Result<Option<ExtractedTable>, AutomationError> {
    let driver = session.driver()?;
    let html = driver.source().await?;
    let table = parse_report_html(descriptor, &html);
    match &table {
        Some(table) => info!(
            "extracted {} rows for {}",
            table.row_count(),
            descriptor.sheet_name
        ),
        None => info!("no data found for {}", descriptor.sheet_name),
    }
    Ok(table)
}

/// Snapshot of the open window handles, taken before a filter submission
/// that may spawn a results tab.
pub async fn window_handles(session: &Session) -> Result<Vec<WindowHandle>, AutomationError> {
    Ok(session.driver()?.windows().await?)
}

/// Picks the one handle present in `after` but not in `before`.
fn new_window_handle<T: PartialEq>(before: &[T], after: Vec<T>) -> Option<T> {
    after.into_iter().find(|h| !before.contains(h))
}

/// Classifies a bounded wait's outcome: a timeout is the empty-result
/// sentinel, every other error stays an error.
fn timeout_as_empty<T>(
    outcome: Result<T, AutomationError>,
) -> Result<Option<T>, AutomationError> {
    match outcome {
        Ok(value) => Ok(Some(value)),
        Err(AutomationError::Timeout { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Extracts a report whose results render in a spawned browser tab.
///
/// No new window handle within the bound is the empty-result sentinel,
/// not an error. When a tab does appear it is always closed and focus
/// restored to the primary tab, on every exit path.
pub async fn extract_spawned_tab(
    session: &Session,
    before: &[WindowHandle],
    descriptor: &ReportDescriptor,
) -> Result<Option<ExtractedTable>, AutomationError> {
    let driver = session.driver()?;
    let original = driver.window().await?;

    let spawned = wait_until(session.timeout(), "spawned results tab", || async move {
        let handles = driver.windows().await.ok()?;
        new_window_handle(before, handles)
    })
    .await;
    let Some(new_handle) = timeout_as_empty(spawned)? else {
        info!("no results tab appeared for {}", descriptor.sheet_name);
        return Ok(None);
    };

    driver.switch_to_window(new_handle).await?;
    let outcome = extract_in_current_tab(driver, session, descriptor).await;

    // Release the tab and restore focus regardless of the outcome.
    if let Err(err) = driver.close_window().await {
        warn!("failed to close results tab: {err}");
    }
    driver.switch_to_window(original).await?;

    outcome
}

async fn extract_in_current_tab(
    driver: &WebDriver,
    session: &Session,
    descriptor: &ReportDescriptor,
) -> Result<Option<ExtractedTable>, AutomationError> {
    let what = format!("{} results table", descriptor.sheet_name);
    if wait_for_element(driver, descriptor.result.to_by(), session.timeout(), &what)
        .await
        .is_err()
    {
        return Ok(None);
    }
    let html = driver.source().await?;
    let mut table = parse_grid(&html);
    if let Some(table) = &mut table {
        apply_schema(table, &descriptor.schema);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_lose_thousands_separators() {
        assert_eq!(parse_number("1,234"), Some(Decimal::from(1234)));
        assert_eq!(parse_number(" 2,345,678 "), Some(Decimal::from(2_345_678)));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("n/a"), None);
    }

    #[test]
    fn percent_strips_suffix() {
        assert_eq!(parse_percent("12.5%"), Decimal::from_str("12.5").ok());
        assert_eq!(parse_percent("0"), Some(Decimal::ZERO));
        assert_eq!(parse_percent("%"), None);
    }

    #[test]
    fn dates_fall_back_to_dashed_format() {
        let expected = NaiveDate::from_ymd_opt(2024, 10, 5);
        assert_eq!(parse_date_cell("2024/10/05"), expected);
        assert_eq!(parse_date_cell("2024-10-05"), expected);
        assert_eq!(parse_date_cell("05.10.2024"), None);
    }

    #[test]
    fn only_an_unseen_handle_counts_as_new() {
        let before = vec!["a".to_string(), "b".to_string()];
        assert_eq!(new_window_handle(&before, vec!["a".into(), "b".into()]), None);
        assert_eq!(
            new_window_handle(&before, vec!["b".into(), "c".into()]),
            Some("c".to_string())
        );
        assert_eq!(new_window_handle(&before, Vec::new()), None);
    }

    #[test]
    fn tab_wait_timeout_is_the_empty_sentinel() {
        let absent = timeout_as_empty::<u32>(Err(AutomationError::Timeout {
            what: "spawned results tab".into(),
        }));
        assert!(matches!(absent, Ok(None)));

        let present = timeout_as_empty(Ok(7u32));
        assert!(matches!(present, Ok(Some(7))));

        let failed = timeout_as_empty::<u32>(Err(AutomationError::Automation("boom".into())));
        assert!(failed.is_err());
    }
}
