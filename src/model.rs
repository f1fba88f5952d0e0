use std::path::{Path, PathBuf};
use tracing::{debug, error, info, trace, warn};

use crate::domain::{Message, TVConfig, TVError};
use crate::inputter::{InputResult, Inputter};
use crate::record::Row;
use crate::tasks::Tasks;
use crate::ui::TABLE_CHROME_HEIGHT;
use crate::window::RowWindow;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewState {
    Input,
    FileSelect,
    Table,
}

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

/// One opened file. Owns the row window, and with it the data source, until the
/// user leaves the table view.
pub struct TableView {
    path: PathBuf,
    name: String,
    session: u64,
    window: Option<RowWindow>,
    curser_row: usize,
    loading: bool,
    fetching: bool, // A one row fetch is in flight
}

impl TableView {
    fn loading(path: PathBuf, session: u64) -> Self {
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();
        TableView {
            path,
            name,
            session,
            window: None,
            curser_row: 0,
            loading: true,
            fetching: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn window(&self) -> Option<&RowWindow> {
        self.window.as_ref()
    }

    pub fn curser_row(&self) -> usize {
        self.curser_row
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching
    }

    fn release(&mut self) {
        if let Some(window) = self.window.as_mut() {
            window.release();
        }
    }
}

pub struct Model {
    config: TVConfig,
    tasks: Tasks,
    pub status: Status,
    view: ViewState,
    input: Inputter,
    last_input: InputResult,
    files: Vec<PathBuf>,
    selected_file: usize,
    table: Option<TableView>,
    last_session: u64,
    page_size: usize,
    error: Option<TVError>,
    status_message: String,
}

impl Model {
    /// Starts in the table view when a path is given, otherwise at the path prompt
    /// while the search directory is scanned.
    pub fn init(
        config: &TVConfig,
        tasks: Tasks,
        path: Option<PathBuf>,
        ui_width: usize,
        ui_height: usize,
    ) -> Self {
        let mut model = Self {
            config: config.clone(),
            tasks,
            status: Status::READY,
            view: ViewState::Input,
            input: Inputter::default(),
            last_input: InputResult::default(),
            files: Vec::new(),
            selected_file: 0,
            table: None,
            last_session: 0,
            page_size: 1,
            error: None,
            status_message: String::new(),
        };
        model.ui_resize(ui_width, ui_height);

        match path {
            Some(path) => model.open_file(path),
            None => model.discover_files(),
        }
        model
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), TVError> {
        let Some(msg) = message else {
            return Ok(());
        };

        match msg {
            Message::Quit => self.quit(),
            Message::Resize(width, height) => self.ui_resize(width, height),
            Message::FilesFound(files) => self.files_found(files),
            Message::TableLoaded { session, result } => self.table_loaded(session, result),
            Message::RowFetched { session, result } => self.row_fetched(session, result),
            msg => match self.view {
                ViewState::Input => self.update_input(msg),
                ViewState::FileSelect if self.files.is_empty() => self.update_input(msg),
                ViewState::FileSelect => self.update_file_select(msg),
                ViewState::Table => self.update_table(msg),
            },
        }
        Ok(())
    }

    /// Key events go to the path editor instead of being mapped to commands.
    pub fn raw_keyevents(&self) -> bool {
        match self.view {
            ViewState::Input => true,
            ViewState::FileSelect => self.files.is_empty(),
            ViewState::Table => false,
        }
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn input(&self) -> &InputResult {
        &self.last_input
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn selected_file(&self) -> usize {
        self.selected_file
    }

    pub fn table(&self) -> Option<&TableView> {
        self.table.as_ref()
    }

    pub fn error(&self) -> Option<&TVError> {
        self.error.as_ref()
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn config(&self) -> &TVConfig {
        &self.config
    }

    pub fn quit(&mut self) {
        if let Some(mut table) = self.table.take() {
            table.release();
        }
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!("UI was resized! w:{}, h:{}", width, height);
        self.page_size = height.saturating_sub(TABLE_CHROME_HEIGHT).max(1);
    }

    // -------------------- State transitions ---------------------- //

    fn discover_files(&self) {
        self.tasks
            .discover(self.config.search_dir.clone(), self.config.extension.clone());
    }

    fn files_found(&mut self, files: Vec<PathBuf>) {
        self.files = files;
        self.selected_file = 0;
        if self.files.is_empty() {
            let err = TVError::NoFilesFound(self.config.extension.clone());
            debug!("{err}");
            self.set_status_message(err.to_string());
        } else if self.view == ViewState::Input {
            self.view = ViewState::FileSelect;
        }
    }

    fn open_file(&mut self, path: PathBuf) {
        if let Some(mut table) = self.table.take() {
            table.release();
        }
        self.last_session += 1;
        let session = self.last_session;
        info!("Opening {} (session {session})", path.display());

        self.table = Some(TableView::loading(path.clone(), session));
        self.error = None;
        self.view = ViewState::Table;
        self.set_status_message("Loading parquet data...");
        self.tasks.open(
            session,
            path,
            self.config.window_size,
            self.config.column_width,
        );
    }

    fn leave_table(&mut self) {
        if let Some(mut table) = self.table.take() {
            debug!("Leaving {} (session {})", table.name, table.session);
            table.release();
        }
        self.error = None;
        self.view = ViewState::FileSelect;
        self.set_status_message("");
        self.discover_files();
    }

    fn table_loaded(&mut self, session: u64, result: Result<RowWindow, TVError>) {
        let table = match self.table.as_mut() {
            Some(table) if table.session == session && table.loading => table,
            _ => {
                debug!("Discarding stale table of session {session}");
                if let Ok(mut window) = result {
                    window.release();
                }
                return;
            }
        };

        table.loading = false;
        match result {
            Ok(window) => {
                let message = format!(
                    "Loaded {} of {} rows",
                    window.len(),
                    window.total_rows()
                );
                table.curser_row = 0;
                table.window = Some(window);
                self.set_status_message(message);
            }
            Err(e) => {
                error!("Loading {} failed: {e}", table.path.display());
                self.error = Some(e);
                self.set_status_message("");
            }
        }
    }

    fn row_fetched(&mut self, session: u64, result: Result<Row, TVError>) {
        let table = match self.table.as_mut() {
            Some(table) if table.session == session => table,
            _ => {
                debug!("Discarding stale row of session {session}");
                return;
            }
        };

        table.fetching = false;
        match result {
            Ok(row) => {
                if let Some(window) = table.window.as_mut()
                    && window.slide(row)
                {
                    // Keep the cursor pinned to the bottom row
                    table.curser_row = window.len() - 1;
                }
                self.error = None;
            }
            Err(e) => {
                warn!("Advancing {} failed: {e}", table.name);
                self.error = Some(e);
            }
        }
    }

    // -------------------- Control handling functions ---------------------- //

    fn update_input(&mut self, msg: Message) {
        if let Message::RawKey(key) = msg {
            self.last_input = self.input.read(key);
            if self.last_input.finished && !self.last_input.canceled {
                let raw = self.last_input.input.trim().to_string();
                if !raw.is_empty() {
                    let path = match shellexpand::full(&raw) {
                        Ok(expanded) => expanded.into_owned(),
                        Err(e) => {
                            warn!("Could not expand {raw}: {e}");
                            raw.clone()
                        }
                    };
                    self.open_file(PathBuf::from(path));
                }
            }
        }
    }

    fn update_file_select(&mut self, msg: Message) {
        let nfiles = self.files.len();
        match msg {
            Message::MoveUp => {
                self.selected_file = if self.selected_file == 0 {
                    nfiles - 1
                } else {
                    self.selected_file - 1
                };
            }
            Message::MoveDown => {
                self.selected_file = (self.selected_file + 1) % nfiles;
            }
            Message::Enter => {
                if let Some(path) = self.files.get(self.selected_file).cloned() {
                    self.open_file(path);
                }
            }
            _ => (),
        }
    }

    fn update_table(&mut self, msg: Message) {
        if let Message::Exit = msg {
            self.leave_table();
            return;
        }

        let ready = self
            .table
            .as_ref()
            .is_some_and(|t| !t.loading && t.window.is_some());
        if !ready {
            trace!("Ignoring {msg:?} while loading");
            return;
        }

        match msg {
            Message::MoveDown => self.move_table_selection_down(1),
            Message::MoveUp => self.move_table_selection_up(1),
            Message::MovePageDown => self.move_table_selection_down(self.page_size),
            Message::MovePageUp => self.move_table_selection_up(self.page_size),
            Message::MoveBeginning => self.move_table_selection_up(usize::MAX),
            Message::MoveEnd => self.move_table_selection_end(),
            _ => (),
        }
    }

    fn move_table_selection_up(&mut self, size: usize) {
        if let Some(table) = self.table.as_mut() {
            table.curser_row = table.curser_row.saturating_sub(size);
        }
    }

    fn move_table_selection_end(&mut self) {
        let Some(table) = self.table.as_ref() else {
            return;
        };
        let last = table.window.as_ref().map_or(0, |w| w.len().saturating_sub(1));
        let size = last.saturating_sub(table.curser_row);
        self.move_table_selection_down(size);
    }

    /// Moves the cursor down. A move that ends on the last row slides the window when
    /// unread rows remain, this includes pushing against the bottom row.
    fn move_table_selection_down(&mut self, size: usize) {
        let Some(table) = self.table.as_mut() else {
            return;
        };
        let Some(window) = table.window.as_ref() else {
            return;
        };
        if window.is_empty() || size == 0 {
            return;
        }

        let last = window.len() - 1;
        let previous = table.curser_row;
        let requested = previous.saturating_add(size);
        table.curser_row = std::cmp::min(requested, last);

        if requested > previous && table.curser_row == last {
            if table.fetching {
                trace!("Fetch already in flight");
            } else if let Some(fetch) = window.pending_fetch() {
                trace!(
                    "Cursor reached row {} of window at offset {}, fetching next row",
                    last,
                    window.global_offset()
                );
                table.fetching = true;
                self.tasks.fetch(table.session, fetch);
            }
        }
    }
}
