//! The bounded row window behind the table view.
//!
//! A [`RowWindow`] materializes at most `capacity` rows of a much larger file. Rows are
//! contiguous: `rows[i]` is always source row `global_offset + i`. Scrolling past the
//! bottom evicts the first row and appends exactly one freshly read row, the source is
//! never rewound.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace, warn};

use crate::domain::TVError;
use crate::record::{Column, Row, decode_row};
use crate::source::{DataSource, SharedSource, SourceError};

pub struct RowWindow {
    rows: VecDeque<Row>,
    columns: Arc<Vec<Column>>,
    global_offset: usize, // Rows evicted from the front since the file was opened
    total_rows: usize,
    capacity: usize,
    source: Option<SharedSource>,
}

/// Everything a background task needs to read the next row.
pub struct PendingFetch {
    pub source: SharedSource,
    pub columns: Arc<Vec<Column>>,
}

impl PendingFetch {
    pub fn run(self) -> Result<Row, TVError> {
        read_row(&self.source, &self.columns)
    }
}

/// Reads and decodes the next record of a shared source.
pub fn read_row(source: &SharedSource, columns: &[Column]) -> Result<Row, TVError> {
    let mut source = source
        .lock()
        .map_err(|_| TVError::AdvanceFailed(SourceError::Poisoned))?;
    let record = source.read_next().map_err(TVError::AdvanceFailed)?;
    Ok(decode_row(&record, columns))
}

impl RowWindow {
    /// Fills the window with the first `min(capacity, row_count)` rows of `source`.
    ///
    /// On failure the source is closed before the error is returned.
    pub fn initialize(
        mut source: Box<dyn DataSource>,
        columns: Vec<Column>,
        capacity: usize,
    ) -> Result<Self, TVError> {
        let capacity = capacity.max(1);
        let total_rows = source.row_count();
        let count = std::cmp::min(capacity, total_rows);

        let mut rows = VecDeque::with_capacity(count);
        for idx in 0..count {
            match source.read_next() {
                Ok(record) => rows.push_back(decode_row(&record, &columns)),
                Err(e) => {
                    if let Err(close_err) = source.close() {
                        warn!("Closing source after failed read: {close_err}");
                    }
                    return Err(TVError::InitialReadFailed {
                        row: idx,
                        source: e,
                    });
                }
            }
        }
        debug!("Initialized window with {count} of {total_rows} rows");

        Ok(Self {
            rows,
            columns: Arc::new(columns),
            global_offset: 0,
            total_rows,
            capacity,
            source: Some(Arc::new(Mutex::new(source))),
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    pub fn row(&self, idx: usize) -> Option<&Row> {
        self.rows.get(idx)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn global_offset(&self) -> usize {
        self.global_offset
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    /// True while the file holds rows that were never materialized.
    pub fn has_more(&self) -> bool {
        self.source.is_some() && self.global_offset + self.rows.len() < self.total_rows
    }

    /// Slides the window by one row, reading it synchronously.
    ///
    /// Returns `Ok(false)` without touching the source once every row was read.
    /// A failed read leaves the window unchanged.
    pub fn advance(&mut self) -> Result<bool, TVError> {
        match self.pending_fetch() {
            Some(fetch) => {
                let row = fetch.run()?;
                Ok(self.slide(row))
            }
            None => Ok(false),
        }
    }

    /// Hands out the source for a background read of the next row.
    pub fn pending_fetch(&self) -> Option<PendingFetch> {
        if !self.has_more() {
            return None;
        }
        self.source.as_ref().map(|source| PendingFetch {
            source: Arc::clone(source),
            columns: Arc::clone(&self.columns),
        })
    }

    /// Appends a row read from the source and evicts the first one.
    pub fn slide(&mut self, row: Row) -> bool {
        if !self.has_more() {
            warn!("Dropping row beyond the end of the file");
            return false;
        }
        self.rows.push_back(row);
        if self.rows.len() > self.capacity {
            self.rows.pop_front();
            self.global_offset += 1;
        }
        trace!(
            "Window now covers rows {}..{} of {}",
            self.global_offset,
            self.global_offset + self.rows.len(),
            self.total_rows
        );
        true
    }

    /// Closes the source. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(source) = self.source.take() {
            match source.lock() {
                Ok(mut source) => {
                    if let Err(e) = source.close() {
                        warn!("Failed to close data source: {e}");
                    }
                }
                Err(_) => warn!("Data source lock poisoned, dropping it unclosed"),
            }
            debug!("Released data source");
        }
    }

    pub fn is_released(&self) -> bool {
        self.source.is_none()
    }
}

impl Drop for RowWindow {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for RowWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowWindow")
            .field("rows", &self.rows.len())
            .field("global_offset", &self.global_offset)
            .field("total_rows", &self.total_rows)
            .field("capacity", &self.capacity)
            .field("released", &self.is_released())
            .finish()
    }
}
