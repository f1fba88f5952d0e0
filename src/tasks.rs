//! Background work of the viewer. Each task runs on the rayon pool and reports
//! exactly one [`Message`] back to the event loop.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::domain::{Message, TVError};
use crate::record::extract_columns;
use crate::source::{DataSource, Opener, discover_files};
use crate::window::{PendingFetch, RowWindow};

#[derive(Clone)]
pub struct Tasks {
    sender: Sender<Message>,
    opener: Opener,
}

impl Tasks {
    pub fn channel(opener: Opener) -> (Self, Receiver<Message>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender, opener }, receiver)
    }

    fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: FnOnce() -> Message + Send + 'static,
    {
        let sender = self.sender.clone();
        debug!("Spawning {name} task");
        rayon::spawn(move || {
            if sender.send(task()).is_err() {
                debug!("Dropped result of {name} task, event loop is gone");
            }
        });
    }

    pub fn discover(&self, dir: PathBuf, extension: String) {
        self.spawn("discover", move || {
            Message::FilesFound(discover_files(&dir, &extension))
        });
    }

    pub fn open(&self, session: u64, path: PathBuf, window_size: usize, column_width: usize) {
        let opener = self.opener;
        self.spawn("open", move || Message::TableLoaded {
            session,
            result: load_table(opener, &path, window_size, column_width),
        });
    }

    pub fn fetch(&self, session: u64, fetch: PendingFetch) {
        self.spawn("fetch", move || Message::RowFetched {
            session,
            result: fetch.run(),
        });
    }
}

/// Opens `path`, derives the columns from its first record and fills the initial window.
pub fn load_table(
    opener: Opener,
    path: &Path,
    window_size: usize,
    column_width: usize,
) -> Result<RowWindow, TVError> {
    let mut source = opener(path).map_err(|source| TVError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;

    let columns = match source.peek() {
        Ok(Some(sample)) => extract_columns(sample, column_width),
        Ok(None) => Err(TVError::SchemaUndetermined),
        Err(e) => Err(TVError::OpenFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    };
    let columns = match columns {
        Ok(columns) => columns,
        Err(e) => {
            close(source.as_mut());
            return Err(e);
        }
    };

    let window = RowWindow::initialize(source, columns, window_size)?;
    info!(
        "Loaded {} with {} columns, {} of {} rows",
        path.display(),
        window.columns().len(),
        window.len(),
        window.total_rows()
    );
    Ok(window)
}

fn close(source: &mut dyn DataSource) {
    if let Err(e) = source.close() {
        warn!("Failed to close data source: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::sample::write_sample;
    use crate::source::testing::MemorySource;
    use crate::source::{SourceError, open_parquet};
    use std::time::Duration;

    fn empty_source(_path: &Path) -> Result<Box<dyn DataSource>, SourceError> {
        Ok(Box::new(MemorySource::new(Vec::new())))
    }

    fn opaque_source(_path: &Path) -> Result<Box<dyn DataSource>, SourceError> {
        Ok(Box::new(MemorySource::new(vec![Record::Other("u8".into())])))
    }

    #[test]
    fn load_table_from_parquet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.parquet");
        write_sample(&path, 10).unwrap();

        let window = load_table(open_parquet, &path, 32, 20).unwrap();
        assert_eq!(window.len(), 10);
        assert_eq!(window.total_rows(), 10);
        assert_eq!(window.columns().len(), 7);
        assert_eq!(window.row(0).unwrap()[0], "Student 1");
        assert_eq!(window.row(9).unwrap()[2], "1009");
        assert!(!window.has_more());
    }

    #[test]
    fn missing_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_table(open_parquet, &dir.path().join("nope.parquet"), 32, 20).unwrap_err();
        assert!(matches!(
            err,
            TVError::OpenFailed {
                source: SourceError::NotFound,
                ..
            }
        ));
    }

    #[test]
    fn files_without_usable_records_have_no_schema() {
        for opener in [empty_source as Opener, opaque_source as Opener] {
            let err = load_table(opener, Path::new("x.parquet"), 32, 20).unwrap_err();
            assert!(matches!(err, TVError::SchemaUndetermined));
        }
    }

    #[test]
    fn tasks_report_back_over_the_channel() {
        let dir = tempfile::tempdir().unwrap();
        write_sample(&dir.path().join("one.parquet"), 2).unwrap();

        let (tasks, receiver) = Tasks::channel(open_parquet);
        tasks.discover(dir.path().to_path_buf(), "parquet".into());
        match receiver.recv_timeout(Duration::from_secs(10)).unwrap() {
            Message::FilesFound(files) => assert_eq!(files, vec![dir.path().join("one.parquet")]),
            other => panic!("unexpected message {other:?}"),
        }

        tasks.open(7, dir.path().join("one.parquet"), 1, 20);
        let window = match receiver.recv_timeout(Duration::from_secs(10)).unwrap() {
            Message::TableLoaded { session: 7, result } => result.unwrap(),
            other => panic!("unexpected message {other:?}"),
        };
        assert_eq!(window.len(), 1);

        tasks.fetch(7, window.pending_fetch().unwrap());
        match receiver.recv_timeout(Duration::from_secs(10)).unwrap() {
            Message::RowFetched { session: 7, result } => {
                assert_eq!(result.unwrap()[0], "Student 2")
            }
            other => panic!("unexpected message {other:?}"),
        }
    }
}
