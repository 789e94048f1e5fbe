//! The dataset: a named-column table of submissions, CSV on disk.
//!
//! ## Why a plain in-memory table?
//!
//! A grading run reads the whole sheet, touches a handful of cells per row,
//! and writes the whole sheet back once. At that access pattern an owned
//! `Vec<Vec<String>>` beats any clever columnar structure, and the
//! `Sheet` API (`photo_column`, `ensure_columns`, `set_cell`) is the
//! contract the orchestrator codes against — a hosted-spreadsheet backend
//! can slot in behind the same type later.
//!
//! Writeback is atomic (temp file + rename) so an interrupted run never
//! leaves a half-written sheet where the input used to be.

use crate::error::GradeError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::{debug, warn};

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// A named-column table. Every row is squared to the header width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Sheet {
    /// Build a sheet from headers and rows, squaring ragged rows.
    pub fn new(headers: Vec<String>, mut rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        for row in &mut rows {
            if row.len() > width {
                warn!("row has {} cells for {} columns, dropping the tail", row.len(), width);
            }
            row.resize(width, String::new());
        }
        Sheet { headers, rows }
    }

    /// Read a sheet from a CSV file. The first record is the header row.
    pub fn read_csv(path: &Path) -> Result<Self, GradeError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| GradeError::DatasetIo {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        let mut records = reader.records();
        let headers: Vec<String> = match records.next() {
            Some(record) => record
                .map_err(|e| GradeError::DatasetIo {
                    path: path.to_path_buf(),
                    detail: e.to_string(),
                })?
                .iter()
                .map(str::to_string)
                .collect(),
            None => {
                return Err(GradeError::DatasetIo {
                    path: path.to_path_buf(),
                    detail: "empty dataset: no header row".to_string(),
                });
            }
        };

        let mut rows = Vec::new();
        for record in records {
            let record = record.map_err(|e| GradeError::DatasetIo {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        debug!("read {} rows × {} columns from {}", rows.len(), headers.len(), path.display());
        Ok(Sheet::new(headers, rows))
    }

    /// Write the sheet back atomically: temp file in place, then rename.
    pub fn write_csv(&self, path: &Path) -> Result<(), GradeError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| GradeError::OutputWrite {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let tmp_path = path.with_extension("csv.tmp");
        let mut writer =
            csv::Writer::from_path(&tmp_path).map_err(|e| GradeError::DatasetIo {
                path: tmp_path.clone(),
                detail: e.to_string(),
            })?;

        writer
            .write_record(&self.headers)
            .map_err(|e| GradeError::DatasetIo {
                path: tmp_path.clone(),
                detail: e.to_string(),
            })?;
        for row in &self.rows {
            writer.write_record(row).map_err(|e| GradeError::DatasetIo {
                path: tmp_path.clone(),
                detail: e.to_string(),
            })?;
        }
        writer.flush().map_err(|e| GradeError::OutputWrite {
            path: tmp_path.clone(),
            source: e,
        })?;
        drop(writer);

        std::fs::rename(&tmp_path, path).map_err(|e| GradeError::OutputWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!("wrote {} rows to {}", self.rows.len(), path.display());
        Ok(())
    }

    /// Trim headers and collapse internal whitespace runs to single spaces.
    ///
    /// Sheets edited by hand accumulate `"Nail  Photo "`-style headers;
    /// column detection should not care.
    pub fn tidy_headers(&mut self) {
        for header in &mut self.headers {
            let tidied = WHITESPACE_RUN.replace_all(header.trim(), " ").into_owned();
            *header = tidied;
        }
    }

    /// Index of the photo-reference column: the first header containing
    /// "photo", case-insensitively.
    ///
    /// Its absence means the sheet cannot be graded at all, which is the
    /// one schema error that aborts a run before any row work.
    pub fn photo_column(&self) -> Result<usize, GradeError> {
        self.headers
            .iter()
            .position(|h| h.to_lowercase().contains("photo"))
            .ok_or_else(|| GradeError::DatasetSchema {
                headers: self.headers.clone(),
            })
    }

    /// Ensure the named columns exist, appending any that are missing, and
    /// return their indices in argument order.
    pub fn ensure_columns(&mut self, columns: &[&str]) -> Vec<usize> {
        let mut indices = Vec::with_capacity(columns.len());
        for name in columns {
            let index = match self.column_index(name) {
                Some(i) => i,
                None => {
                    self.headers.push((*name).to_string());
                    self.headers.len() - 1
                }
            };
            indices.push(index);
        }
        let width = self.headers.len();
        for row in &mut self.rows {
            row.resize(width, String::new());
        }
        indices
    }

    /// Exact-match column lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        &self.rows[row][column]
    }

    pub fn set_cell(&mut self, row: usize, column: usize, value: impl Into<String>) {
        self.rows[row][column] = value.into();
    }

    /// Number of data rows (the header row not counted).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(headers: &[&str], rows: &[&[&str]]) -> Sheet {
        Sheet::new(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn tidy_headers_trims_and_collapses() {
        let mut s = sheet(&["  Nail   Photo ", "Name\t\tHere"], &[]);
        s.tidy_headers();
        assert_eq!(s.headers(), ["Nail Photo", "Name Here"]);
    }

    #[test]
    fn photo_column_is_case_insensitive_substring() {
        let s = sheet(&["Name", "Submission PHOTO link"], &[]);
        assert_eq!(s.photo_column().unwrap(), 1);
    }

    #[test]
    fn missing_photo_column_reports_headers() {
        let s = sheet(&["Name", "Email"], &[]);
        let err = s.photo_column().unwrap_err();
        match err {
            GradeError::DatasetSchema { headers } => {
                assert_eq!(headers, vec!["Name".to_string(), "Email".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn ensure_columns_appends_and_pads() {
        let mut s = sheet(&["Name", "Photo"], &[&["amy", "x"], &["bo", "y"]]);
        let indices = s.ensure_columns(&["Photo", "Overall Score"]);
        assert_eq!(indices, vec![1, 2]);
        assert_eq!(s.headers(), ["Name", "Photo", "Overall Score"]);
        assert_eq!(s.cell(0, 2), "");
        assert_eq!(s.cell(1, 2), "");
        // A second call finds everything in place.
        assert_eq!(s.ensure_columns(&["Overall Score"]), vec![2]);
    }

    #[test]
    fn ragged_rows_are_squared() {
        let s = sheet(&["A", "B", "C"], &[&["1"], &["1", "2", "3", "4"]]);
        assert_eq!(s.cell(0, 2), "");
        assert_eq!(s.cell(1, 2), "3");
    }

    #[test]
    fn csv_roundtrip_preserves_cells_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.csv");
        std::fs::write(&path, "Name,Photo\namy,\"x, y\"\nbo,z\n").unwrap();

        let mut s = Sheet::read_csv(&path).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.cell(0, 1), "x, y");

        s.set_cell(1, 1, "updated");
        s.write_csv(&path).unwrap();

        let reread = Sheet::read_csv(&path).unwrap();
        assert_eq!(reread.cell(1, 1), "updated");
        assert!(!path.with_extension("csv.tmp").exists());
    }

    #[test]
    fn empty_file_is_a_dataset_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(
            Sheet::read_csv(&path),
            Err(GradeError::DatasetIo { .. })
        ));
    }
}
