use polars::prelude::*;
use std::collections::VecDeque;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::record::{Record, Value};

/// Number of rows pulled from the file per read-ahead chunk.
const READ_AHEAD_ROWS: usize = 64;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("file not found")]
    NotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("not a file")]
    NotAFile,
    #[error("no more rows to read")]
    EndOfData,
    #[error("data source is closed")]
    Closed,
    #[error("data source lock is poisoned")]
    Poisoned,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Polars(#[from] PolarsError),
}

/// Forward-only supplier of records. Rows are handed out once, in file order.
pub trait DataSource: Send {
    /// Total number of rows, known once the source is opened.
    fn row_count(&self) -> usize;

    /// The next unread record, without consuming it.
    fn peek(&mut self) -> Result<Option<&Record>, SourceError>;

    /// Consumes the next record, `SourceError::EndOfData` once exhausted.
    fn read_next(&mut self) -> Result<Record, SourceError>;

    /// Releases the underlying file. Calling it again is a no-op.
    fn close(&mut self) -> Result<(), SourceError>;
}

pub type SharedSource = Arc<Mutex<Box<dyn DataSource>>>;

pub type Opener = fn(&Path) -> Result<Box<dyn DataSource>, SourceError>;

pub fn open_parquet(path: &Path) -> Result<Box<dyn DataSource>, SourceError> {
    Ok(Box::new(ParquetSource::open(path)?))
}

pub struct ParquetSource {
    path: PathBuf,
    frame: Option<LazyFrame>,
    total_rows: usize,
    next_row: usize, // Next row in the file that was not yet pulled into `buffered`
    buffered: VecDeque<Record>,
}

impl ParquetSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SourceError::NotFound,
            ErrorKind::PermissionDenied => SourceError::PermissionDenied,
            _ => SourceError::Io(e),
        })?;
        if !metadata.is_file() {
            return Err(SourceError::NotAFile);
        }

        let frame = LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())?;
        let total_rows = Self::count_rows(&frame)?;
        info!(
            "Opened {} ({} bytes, {} rows)",
            path.display(),
            metadata.len(),
            total_rows
        );

        Ok(Self {
            path: path.to_path_buf(),
            frame: Some(frame),
            total_rows,
            next_row: 0,
            buffered: VecDeque::with_capacity(READ_AHEAD_ROWS),
        })
    }

    fn count_rows(frame: &LazyFrame) -> Result<usize, SourceError> {
        let counted = frame.clone().select([len().alias("rows")]).collect()?;
        let rows = counted.column("rows")?.cast(&DataType::UInt64)?;
        Ok(rows.u64()?.get(0).unwrap_or(0) as usize)
    }

    fn fill(&mut self) -> Result<(), SourceError> {
        let frame = self.frame.as_ref().ok_or(SourceError::Closed)?;
        if self.next_row >= self.total_rows {
            return Ok(());
        }

        let chunk = std::cmp::min(READ_AHEAD_ROWS, self.total_rows - self.next_row);
        let df = frame
            .clone()
            .slice(self.next_row as i64, chunk as IdxSize)
            .collect()?;

        let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        let cells = df
            .get_columns()
            .iter()
            .map(Self::column_values)
            .collect::<PolarsResult<Vec<Vec<Value>>>>()?;

        for ridx in 0..df.height() {
            let entries = names
                .iter()
                .zip(cells.iter())
                .map(|(name, values)| (name.clone(), values[ridx].clone()))
                .collect();
            self.buffered.push_back(Record::Map(entries));
        }
        trace!(
            "Read rows {}..{} of {}",
            self.next_row,
            self.next_row + df.height(),
            self.path.display()
        );
        self.next_row += df.height();
        Ok(())
    }

    // Cast to text where polars can, otherwise fall back to the value formatting (lists, structs).
    fn column_values(column: &polars::prelude::Column) -> PolarsResult<Vec<Value>> {
        match column.cast(&DataType::String) {
            Ok(text) => Ok(text
                .str()?
                .into_iter()
                .map(|value| match value {
                    Some(s) => Value::Text(s.to_string()),
                    None => Value::Null,
                })
                .collect()),
            Err(_) => (0..column.len())
                .map(|idx| {
                    column.get(idx).map(|value| match value {
                        AnyValue::Null => Value::Null,
                        other => Value::Text(other.to_string()),
                    })
                })
                .collect(),
        }
    }
}

impl DataSource for ParquetSource {
    fn row_count(&self) -> usize {
        self.total_rows
    }

    fn peek(&mut self) -> Result<Option<&Record>, SourceError> {
        if self.frame.is_none() {
            return Err(SourceError::Closed);
        }
        if self.buffered.is_empty() {
            self.fill()?;
        }
        Ok(self.buffered.front())
    }

    fn read_next(&mut self) -> Result<Record, SourceError> {
        if self.frame.is_none() {
            return Err(SourceError::Closed);
        }
        if self.buffered.is_empty() {
            self.fill()?;
        }
        self.buffered.pop_front().ok_or(SourceError::EndOfData)
    }

    fn close(&mut self) -> Result<(), SourceError> {
        if self.frame.take().is_some() {
            debug!("Closed {}", self.path.display());
        }
        self.buffered.clear();
        Ok(())
    }
}

/// Lists the files in `dir` named `*.{extension}`, sorted by name.
/// Enumeration problems are logged and produce an empty list.
pub fn discover_files(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Could not list {}: {e}", dir.display());
            return Vec::new();
        }
    };

    let suffix = format!(".{extension}");
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(&suffix))
        })
        .map(|entry| entry.path())
        .collect();
    files.sort();
    debug!("Found {} {suffix} files in {}", files.len(), dir.display());
    files
}

#[cfg(test)]
pub mod testing {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::{DataSource, SourceError};
    use crate::record::{Record, Value};

    /// In memory source with a `fail_at` hook to simulate corrupt rows.
    pub struct MemorySource {
        records: VecDeque<Record>,
        total_rows: usize,
        read: usize,
        fail_at: Option<usize>,
        closed: Arc<AtomicBool>,
    }

    impl MemorySource {
        pub fn new(records: Vec<Record>) -> Self {
            Self {
                total_rows: records.len(),
                records: records.into(),
                read: 0,
                fail_at: None,
                closed: Arc::new(AtomicBool::new(false)),
            }
        }

        /// `n` map records with an `id` and a `name` field.
        pub fn numbered(n: usize) -> Self {
            Self::new(
                (0..n)
                    .map(|i| {
                        Record::Map(vec![
                            ("id".into(), Value::Int(i as i64)),
                            ("name".into(), Value::Text(format!("row {i}"))),
                        ])
                    })
                    .collect(),
            )
        }

        pub fn fail_at(mut self, row: usize) -> Self {
            self.fail_at = Some(row);
            self
        }

        /// Claims more rows than there are records.
        pub fn total_rows(mut self, total_rows: usize) -> Self {
            self.total_rows = total_rows;
            self
        }

        pub fn closed_flag(&self) -> Arc<AtomicBool> {
            Arc::clone(&self.closed)
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    impl DataSource for MemorySource {
        fn row_count(&self) -> usize {
            self.total_rows
        }

        fn peek(&mut self) -> Result<Option<&Record>, SourceError> {
            if self.is_closed() {
                return Err(SourceError::Closed);
            }
            Ok(self.records.front())
        }

        fn read_next(&mut self) -> Result<Record, SourceError> {
            if self.is_closed() {
                return Err(SourceError::Closed);
            }
            if self.fail_at == Some(self.read) {
                return Err(SourceError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "corrupt row",
                )));
            }
            let record = self.records.pop_front().ok_or(SourceError::EndOfData)?;
            self.read += 1;
            Ok(record)
        }

        fn close(&mut self) -> Result<(), SourceError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }
}
