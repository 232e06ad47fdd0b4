//! Incremental sheet-by-sheet aggregation into one output workbook.

use crate::error::AutomationError;
use crate::table::{CellValue, ExtractedTable};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::Local;
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Format, FormatAlign, Workbook, Worksheet};
use std::path::{Path, PathBuf};
use tracing::info;

/// Per-sheet presentation options.
#[derive(Debug, Clone, Default)]
pub struct SheetOptions {
    /// Optional title written above the header row.
    pub title: Option<String>,
    /// Merge the title across all columns, centered.
    pub merge_header: bool,
}

impl SheetOptions {
    /// No title row, body starts at the top.
    pub fn plain() -> Self {
        Self::default()
    }

    /// Title in the first row, optionally merged across the full width.
    pub fn titled(title: impl Into<String>, merge_header: bool) -> Self {
        Self {
            title: Some(title.into()),
            merge_header,
        }
    }
}

/// Timestamped path of the run's output workbook.
pub fn workbook_path(exports_dir: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    exports_dir.join(format!("sales_data_{timestamp}.xlsx"))
}

/// Appends `table` as sheet `sheet_name`, replacing any existing sheet of
/// that name and preserving every other sheet.
///
/// The underlying writer cannot update a workbook in place, so an append
/// re-reads the existing sheets and rewrites the whole file; every call
/// fully closes its handles before returning. This runs once per report,
/// so the rewrite cost stays proportional to the workbook.
pub fn append_sheet(
    path: &Path,
    sheet_name: &str,
    table: &ExtractedTable,
    options: &SheetOptions,
) -> Result<(), AutomationError> {
    let preserved = if path.exists() {
        read_preserved_sheets(path, sheet_name)?
    } else {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        Vec::new()
    };

    let mut workbook = Workbook::new();
    for (name, cells) in &preserved {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name)?;
        write_preserved(worksheet, cells)?;
    }

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;
    write_table(worksheet, table, options)?;

    workbook.save(path)?;
    info!(
        "wrote sheet '{sheet_name}' ({} rows) to {}",
        table.row_count(),
        path.display()
    );
    Ok(())
}

/// Reads all sheets except `skip` so they survive the rewrite.
fn read_preserved_sheets(
    path: &Path,
    skip: &str,
) -> Result<Vec<(String, Vec<Vec<Data>>)>, AutomationError> {
    let mut source = open_workbook_auto(path)?;
    let names: Vec<String> = source.sheet_names().to_vec();

    let mut sheets = Vec::new();
    for name in names {
        if name == skip {
            continue;
        }
        let range = source
            .worksheet_range(&name)
            .map_err(|err| AutomationError::Workbook(err.to_string()))?;
        let rows: Vec<Vec<Data>> = range.rows().map(<[Data]>::to_vec).collect();
        sheets.push((name, rows));
    }
    Ok(sheets)
}

fn write_preserved(
    worksheet: &mut Worksheet,
    cells: &[Vec<Data>],
) -> Result<(), AutomationError> {
    for (row_idx, row) in cells.iter().enumerate() {
        let row_idx = u32::try_from(row_idx).map_err(row_overflow)?;
        for (col_idx, cell) in row.iter().enumerate() {
            let col_idx = u16::try_from(col_idx).map_err(col_overflow)?;
            match cell {
                Data::Empty => {}
                Data::String(s) => {
                    worksheet.write_string(row_idx, col_idx, s)?;
                }
                Data::Float(f) => {
                    worksheet.write_number(row_idx, col_idx, *f)?;
                }
                Data::Int(i) => {
                    #[allow(clippy::cast_precision_loss)]
                    worksheet.write_number(row_idx, col_idx, *i as f64)?;
                }
                Data::Bool(b) => {
                    worksheet.write_boolean(row_idx, col_idx, *b)?;
                }
                Data::DateTime(dt) => {
                    worksheet.write_number(row_idx, col_idx, dt.as_f64())?;
                }
                other => {
                    worksheet.write_string(row_idx, col_idx, other.to_string())?;
                }
            }
        }
    }
    Ok(())
}

fn write_table(
    worksheet: &mut Worksheet,
    table: &ExtractedTable,
    options: &SheetOptions,
) -> Result<(), AutomationError> {
    let mut row_offset: u32 = 0;
    if let Some(title) = &options.title {
        let format = Format::new().set_bold().set_align(FormatAlign::Center);
        let last_col = u16::try_from(table.columns.len().saturating_sub(1)).map_err(col_overflow)?;
        if options.merge_header && last_col > 0 {
            worksheet.merge_range(0, 0, 0, last_col, title, &format)?;
        } else {
            worksheet.write_string_with_format(0, 0, title, &format)?;
        }
        row_offset = 1;
    }

    for (col_idx, column) in table.columns.iter().enumerate() {
        let col_idx = u16::try_from(col_idx).map_err(col_overflow)?;
        worksheet.write_string(row_offset, col_idx, column)?;
    }

    for (row_idx, row) in table.rows.iter().enumerate() {
        let row_idx = u32::try_from(row_idx).map_err(row_overflow)? + row_offset + 1;
        for (col_idx, cell) in row.iter().enumerate() {
            let col_idx = u16::try_from(col_idx).map_err(col_overflow)?;
            match cell {
                CellValue::Null => {}
                CellValue::Text(s) => {
                    worksheet.write_string(row_idx, col_idx, s)?;
                }
                CellValue::Number(n) => {
                    worksheet.write_number(row_idx, col_idx, n.to_f64().unwrap_or(0.0))?;
                }
                CellValue::Date(d) => {
                    worksheet.write_string(row_idx, col_idx, d.format("%Y-%m-%d").to_string())?;
                }
            }
        }
    }
    Ok(())
}

fn row_overflow<E>(_: E) -> AutomationError {
    AutomationError::Workbook("sheet exceeds the row limit".into())
}

fn col_overflow<E>(_: E) -> AutomationError {
    AutomationError::Workbook("sheet exceeds the column limit".into())
}
