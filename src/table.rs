//! Normalized tabular record set produced by the extractor.

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// A single normalized cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Verbatim text.
    Text(String),
    /// Numeric value with thousands separators stripped.
    Number(Decimal),
    /// Parsed calendar date.
    Date(NaiveDate),
    /// Absent or unparseable value.
    Null,
}

impl CellValue {
    /// Returns the text content, if this cell carries text.
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the numeric content, if this cell carries a number.
    #[inline]
    pub const fn as_number(&self) -> Option<Decimal> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// True when the cell holds no value, treating empty text as absent.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// One extracted report table: ordered columns plus fixed-width rows.
///
/// Lifecycle is per extraction call; the aggregation writer consumes it
/// immediately and nothing retains it afterwards.
#[derive(Debug, Clone, Default)]
pub struct ExtractedTable {
    /// Column names, unique after normalization.
    pub columns: Vec<String>,
    /// Data rows; every row has exactly `columns.len()` cells.
    pub rows: Vec<Vec<CellValue>>,
    /// Optional report title taken from the page, written above the header.
    pub title: Option<String>,
}

impl ExtractedTable {
    /// Builds a table from raw header texts and rows, disambiguating
    /// duplicate column names with `.1`, `.2` suffixes and padding or
    /// truncating every row to the header width.
    pub fn from_raw(headers: Vec<String>, raw_rows: Vec<Vec<CellValue>>) -> Self {
        let columns = dedup_columns(headers);
        let width = columns.len();
        let rows = raw_rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Null);
                row
            })
            .collect();
        Self {
            columns,
            rows,
            title: None,
        }
    }

    /// Number of data rows.
    #[inline]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Index of a column by its normalized name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// True when the table holds no data rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Suffixes repeated header names so every column is unique.
fn dedup_columns(headers: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(headers.len());
    for header in headers {
        let base = header.trim().to_string();
        if !seen.iter().any(|c| *c == base) {
            seen.push(base);
            continue;
        }
        let mut suffix = 1;
        loop {
            let candidate = format!("{base}.{suffix}");
            if !seen.iter().any(|c| *c == candidate) {
                seen.push(candidate);
                break;
            }
            suffix += 1;
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_suffixes_repeats() {
        let cols = dedup_columns(vec![
            "出量".to_string(),
            "退量".to_string(),
            "出量".to_string(),
            "退量".to_string(),
            "退量".to_string(),
        ]);
        assert_eq!(cols, vec!["出量", "退量", "出量.1", "退量.1", "退量.2"]);
    }

    #[test]
    fn from_raw_pads_short_rows() {
        let table = ExtractedTable::from_raw(
            vec!["a".into(), "b".into(), "c".into()],
            vec![vec![CellValue::Text("x".into())]],
        );
        assert_eq!(table.rows[0].len(), 3);
        assert_eq!(table.rows[0][2], CellValue::Null);
    }
}
