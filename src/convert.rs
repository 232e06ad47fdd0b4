//! External document conversion of downloaded legacy spreadsheets.

use crate::error::AutomationError;
use crate::table::{CellValue, ExtractedTable};
use calamine::{open_workbook_auto, Data, Reader};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Interval between download-directory polls.
const DOWNLOAD_POLL: Duration = Duration::from_secs(1);

/// Wraps the external converter executable and its allowed directory.
pub struct Converter {
    soffice_path: PathBuf,
    downloads_dir: PathBuf,
}

impl Converter {
    /// Creates a converter bound to the configured executable and the
    /// downloads directory it is allowed to read from.
    pub fn new(soffice_path: PathBuf, downloads_dir: PathBuf) -> Self {
        Self {
            soffice_path,
            downloads_dir,
        }
    }

    /// Converts a downloaded legacy spreadsheet to xlsx in place.
    ///
    /// The input must exist inside the downloads directory; anything that
    /// resolves elsewhere is rejected before the process is spawned. The
    /// original file is deleted on success. Non-zero exit or a missing or
    /// empty output file is a fatal [`AutomationError::Conversion`]; there
    /// is no partial success.
    pub async fn convert_to_xlsx(&self, input: &Path) -> Result<PathBuf, AutomationError> {
        let input = self.checked_input(input)?;
        let out_dir = input
            .parent()
            .ok_or_else(|| AutomationError::Security { path: input.clone() })?
            .to_path_buf();

        let output = tokio::process::Command::new(&self.soffice_path)
            .arg("--headless")
            .arg("--norestore")
            .arg("--convert-to")
            .arg("xlsx")
            .arg("--outdir")
            .arg(&out_dir)
            .arg(&input)
            .output()
            .await
            .map_err(|err| {
                AutomationError::Conversion(format!(
                    "cannot run {}: {err}",
                    self.soffice_path.display()
                ))
            })?;
        if !output.status.success() {
            return Err(AutomationError::Conversion(format!(
                "converter exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let converted = input.with_extension("xlsx");
        let size = std::fs::metadata(&converted).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(AutomationError::Conversion(format!(
                "converter produced no output at {}",
                converted.display()
            )));
        }

        if let Err(err) = std::fs::remove_file(&input) {
            warn!("cannot remove converted input {}: {err}", input.display());
        }
        info!("converted {} to xlsx", input.display());
        Ok(converted)
    }

    /// Validates that the input exists and canonicalizes inside the
    /// downloads directory.
    fn checked_input(&self, input: &Path) -> Result<PathBuf, AutomationError> {
        if !input.exists() {
            return Err(AutomationError::Conversion(format!(
                "input file does not exist: {}",
                input.display()
            )));
        }
        let canonical = input.canonicalize()?;
        let allowed = self.downloads_dir.canonicalize()?;
        if !canonical.starts_with(&allowed) {
            return Err(AutomationError::Security { path: canonical });
        }
        Ok(canonical)
    }

    /// Snapshot of the files currently present in the downloads directory.
    pub fn snapshot_downloads(&self) -> Result<BTreeSet<PathBuf>, AutomationError> {
        let mut files = BTreeSet::new();
        if !self.downloads_dir.exists() {
            return Ok(files);
        }
        for entry in std::fs::read_dir(&self.downloads_dir)? {
            let path = entry?.path();
            if path.is_file() {
                files.insert(path);
            }
        }
        Ok(files)
    }

    /// Polls the downloads directory until a new, fully written file
    /// appears (browsers write partial downloads under a temp suffix).
    pub async fn wait_for_download(
        &self,
        before: &BTreeSet<PathBuf>,
        timeout: Duration,
    ) -> Result<PathBuf, AutomationError> {
        let found = crate::wait::wait_until(timeout, "report download", || async move {
            let now = self.snapshot_downloads().ok()?;
            now.into_iter().find(|path| {
                if before.contains(path) {
                    return false;
                }
                let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
                !matches!(ext, "crdownload" | "part" | "tmp")
            })
        })
        .await?;
        // One extra poll interval so the browser can finish flushing. Other
        // downloads may start in the meantime, so only the file the poll
        // validated is returned.
        tokio::time::sleep(DOWNLOAD_POLL).await;
        if !found.exists() {
            return Err(AutomationError::Conversion("download disappeared".into()));
        }
        Ok(found)
    }
}

/// Loads the first sheet of a converted workbook as an extracted table,
/// treating the first row as the header.
pub fn load_table(path: &Path) -> Result<Option<ExtractedTable>, AutomationError> {
    let mut workbook = open_workbook_auto(path)?;
    let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
        return Ok(None);
    };
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|err| AutomationError::Workbook(err.to_string()))?;

    let mut rows_iter = range.rows();
    let Some(header_row) = rows_iter.next() else {
        return Ok(None);
    };
    let headers: Vec<String> = header_row.iter().map(data_to_string).collect();

    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    for row in rows_iter {
        let cells: Vec<CellValue> = row.iter().map(data_to_cell).collect();
        if cells.iter().all(CellValue::is_blank) {
            continue;
        }
        rows.push(cells);
    }
    if rows.is_empty() {
        return Ok(None);
    }
    Ok(Some(ExtractedTable::from_raw(headers, rows)))
}

fn data_to_string(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn data_to_cell(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Null,
        Data::String(s) => CellValue::Text(s.trim().to_string()),
        Data::Float(f) => Decimal::try_from(*f).map_or(CellValue::Null, CellValue::Number),
        Data::Int(i) => CellValue::Number(Decimal::from(*i)),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map_or(CellValue::Null, |d| CellValue::Date(d.date())),
        other => CellValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_input_fails_before_spawning() {
        let converter = Converter::new(
            PathBuf::from("/nonexistent/soffice"),
            std::env::temp_dir(),
        );
        let err = converter
            .checked_input(Path::new("/nonexistent/input.xls"))
            .unwrap_err();
        assert!(matches!(err, AutomationError::Conversion(_)));
    }

    #[tokio::test]
    async fn wait_for_download_ignores_partial_files() {
        let dir = std::env::temp_dir().join("ucd_download_wait_test");
        std::fs::create_dir_all(&dir).unwrap();
        let converter = Converter::new(PathBuf::from("/usr/bin/soffice"), dir.clone());
        let before = converter.snapshot_downloads().unwrap();

        // A partial file that sorts ahead of the completed download.
        std::fs::write(dir.join("aaa.crdownload"), b"partial").unwrap();
        let completed = dir.join("week_summary.xls");
        std::fs::write(&completed, b"legacy sheet").unwrap();

        let found = converter
            .wait_for_download(&before, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(found, completed);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn input_outside_downloads_dir_is_rejected() {
        let dir = std::env::temp_dir().join("ucd_convert_security_test");
        std::fs::create_dir_all(&dir).unwrap();
        // A real file, but outside the allowed directory.
        let outside = std::env::temp_dir().join("ucd_outside_input.xls");
        std::fs::write(&outside, b"legacy").unwrap();

        let converter = Converter::new(PathBuf::from("/usr/bin/soffice"), dir.clone());
        let err = converter.checked_input(&outside).unwrap_err();
        assert!(matches!(err, AutomationError::Security { .. }));

        std::fs::remove_file(&outside).ok();
        std::fs::remove_dir_all(&dir).ok();
    }
}
