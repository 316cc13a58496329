//! Append-only CSV audit trail of per-item outcomes.
//!
//! The dialect is loose: fields are never quote-wrapped. Commas
//! become `;`, double quotes are doubled and line breaks become spaces, so
//! every row keeps exactly three columns.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use csv::{QuoteStyle, WriterBuilder};
use export_core::{LedgerEntry, LedgerStatus};
use thiserror::Error;

pub const LEDGER_FILE_NAME: &str = "export_results.csv";
pub const LEDGER_HEADER: &str = "Text,File Name,Status";
const HEADER_FIELDS: [&str; 3] = ["Text", "File Name", "Status"];
const MAX_REASON_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to write ledger {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode ledger row for {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ledger at `{report_dir}/export_results.csv`.
    pub fn in_dir(report_dir: &Path) -> Self {
        Self::new(report_dir.join(LEDGER_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row, writing the header first if the file is new or empty.
    ///
    /// The header is created with create-new semantics and each row is a
    /// single append, so the header appears at most once at offset 0 even if
    /// two runs race on the same path. Row order between such runs is not
    /// guaranteed.
    pub fn append(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        self.ensure_header()?;
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        self.write_record(file, &row_fields(entry))
    }

    fn ensure_header(&self) -> Result<(), LedgerError> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => self.write_record(file, &HEADER_FIELDS),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                let len = fs::metadata(&self.path)
                    .map_err(|source| self.io_error(source))?
                    .len();
                if len == 0 {
                    let file = OpenOptions::new()
                        .append(true)
                        .open(&self.path)
                        .map_err(|source| self.io_error(source))?;
                    self.write_record(file, &HEADER_FIELDS)?;
                }
                Ok(())
            }
            Err(err) => Err(self.io_error(err)),
        }
    }

    fn write_record<I, T>(&self, file: File, record: I) -> Result<(), LedgerError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Never)
            .has_headers(false)
            .from_writer(file);
        writer.write_record(record).map_err(|source| LedgerError::Csv {
            path: self.path.clone(),
            source,
        })?;
        writer.flush().map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// The three cleaned columns of one ledger row.
pub fn row_fields(entry: &LedgerEntry) -> [String; 3] {
    let status = match &entry.status {
        LedgerStatus::Success => "success".to_string(),
        LedgerStatus::Failure {
            reason: Some(reason),
        } => {
            let truncated: String = reason.chars().take(MAX_REASON_CHARS).collect();
            format!("failure. {truncated}")
        }
        LedgerStatus::Failure { reason: None } => "failure".to_string(),
    };
    [
        clean_field(&entry.text),
        clean_field(&entry.file_name),
        clean_field(&status),
    ]
}

fn clean_field(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '"' => out.push_str("\"\""),
            ',' => out.push(';'),
            '\r' | '\n' => out.push(' '),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::clean_field;

    #[test]
    fn clean_field_substitutes_separators() {
        assert_eq!(clean_field("a,b"), "a;b");
        assert_eq!(clean_field("say \"hi\""), "say \"\"hi\"\"");
        assert_eq!(clean_field("two\r\nlines"), "two  lines");
    }
}
