use std::path::PathBuf;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

use crate::record::Row;
use crate::source::SourceError;
use crate::window::RowWindow;

pub const DEFAULT_WINDOW_SIZE: usize = 32;
pub const DEFAULT_COLUMN_WIDTH: usize = 20;
pub const DEFAULT_EXTENSION: &str = "parquet";

pub const INSTRUCTIONS_TABLE: &str = "Press q or ESC to go back, Ctrl+D to quit";
pub const INSTRUCTIONS_INPUT: &str = "(Press Enter to load file, Ctrl+D to quit)";
pub const INSTRUCTIONS_SELECT: &str = "(Press Enter to select, Ctrl+D to quit)";

#[derive(Debug, Clone, Setters)]
pub struct TVConfig {
    pub event_poll_time: u64,
    /// Upper bound of materialized rows kept in the table window.
    pub window_size: usize,
    pub column_width: usize,
    #[setters(into)]
    pub extension: String,
    #[setters(into)]
    pub search_dir: PathBuf,
}

impl Default for TVConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            window_size: DEFAULT_WINDOW_SIZE,
            column_width: DEFAULT_COLUMN_WIDTH,
            extension: DEFAULT_EXTENSION.to_string(),
            search_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug)]
pub enum Message {
    Quit,
    Exit,
    Enter,
    MoveUp,
    MoveDown,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Resize(usize, usize),
    RawKey(KeyEvent),
    // Results of background tasks
    FilesFound(Vec<PathBuf>),
    TableLoaded {
        session: u64,
        result: Result<RowWindow, TVError>,
    },
    RowFetched {
        session: u64,
        result: Result<Row, TVError>,
    },
}

#[derive(Debug, Error)]
pub enum TVError {
    #[error("failed to open {}: {source}", path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: SourceError,
    },
    #[error("could not determine columns from parquet file")]
    SchemaUndetermined,
    #[error("failed to read row {row}: {source}")]
    InitialReadFailed {
        row: usize,
        #[source]
        source: SourceError,
    },
    #[error("failed to read row: {0}")]
    AdvanceFailed(#[source] SourceError),
    #[error("no .{0} files found in the search directory")]
    NoFilesFound(String),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
}
