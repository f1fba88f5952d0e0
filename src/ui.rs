use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    style::{Color, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Cell, Paragraph, Row, Table, TableState, Wrap},
};

use crate::domain::{INSTRUCTIONS_INPUT, INSTRUCTIONS_SELECT, INSTRUCTIONS_TABLE};
use crate::model::{Model, TableView, ViewState};
use crate::window::RowWindow;

pub const STATUSLINE_HEIGHT: usize = 2;
pub const TABLE_HEADER_HEIGHT: usize = 2;
pub const TABLE_BORDER_HEIGHT: usize = 2;
/// Rows of the table view not available for data.
pub const TABLE_CHROME_HEIGHT: usize = STATUSLINE_HEIGHT + TABLE_HEADER_HEIGHT + TABLE_BORDER_HEIGHT;

const PROMPT_INDENT: u16 = 4;

#[derive(Debug, Default)]
pub struct TableUI {
    table_state: TableState,
}

impl TableUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let area = frame.area();
        match model.view() {
            ViewState::Input => Self::draw_input(model, frame, area, None),
            ViewState::FileSelect if model.files().is_empty() => Self::draw_input(
                model,
                frame,
                area,
                Some(format!(
                    "No .{} files found in current directory.",
                    model.config().extension
                )),
            ),
            ViewState::FileSelect => Self::draw_file_select(model, frame, area),
            ViewState::Table => self.draw_table(model, frame, area),
        }
    }

    fn draw_input(model: &Model, frame: &mut Frame, area: Rect, notice: Option<String>) {
        let input = model.input();
        let mut lines = vec![Line::default()];
        if let Some(notice) = notice {
            lines.push(Line::from(format!("  {notice}")));
            lines.push(Line::default());
        }
        lines.push(Line::from("  Enter path to parquet file:"));
        lines.push(Line::default());
        let prompt_row = lines.len() as u16;
        lines.push(Line::from(vec![
            "  > ".blue().bold(),
            Span::raw(input.input.clone()),
        ]));
        lines.push(Line::default());
        lines.push(Line::from(format!("  {INSTRUCTIONS_INPUT}")).dark_gray());
        if !model.status_message().is_empty() {
            lines.push(Line::from(format!("  {}", model.status_message())).dark_gray());
        }

        frame.render_widget(Paragraph::new(Text::from(lines)), area);
        frame.set_cursor_position(Position::new(
            area.x + PROMPT_INDENT + input.curser_pos as u16,
            area.y + prompt_row,
        ));
    }

    fn draw_file_select(model: &Model, frame: &mut Frame, area: Rect) {
        let mut lines = vec![
            Line::default(),
            Line::from("  Select a parquet file to view:"),
            Line::default(),
        ];
        for (idx, path) in model.files().iter().enumerate() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            if idx == model.selected_file() {
                lines.push(Line::from(vec!["  > ".blue().bold(), name.bold()]));
            } else {
                lines.push(Line::from(format!("    {name}")));
            }
        }
        lines.push(Line::default());
        lines.push(Line::from(format!("  {INSTRUCTIONS_SELECT}")).dark_gray());

        frame.render_widget(Paragraph::new(Text::from(lines)), area);
    }

    fn draw_table(&mut self, model: &Model, frame: &mut Frame, area: Rect) {
        let Some(table) = model.table() else {
            return;
        };

        let [table_area, status_area] = Layout::vertical([
            Constraint::Min(0),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
        ])
        .areas(area);

        let title = Line::from(format!(" {} ", table.name()).bold());
        let block = Block::bordered()
            .title(title.centered())
            .border_set(border::THICK);

        match (table.window(), model.error()) {
            _ if table.is_loading() => {
                frame.render_widget(Paragraph::new("Loading parquet data...").block(block), table_area);
            }
            (None, Some(err)) => {
                let text = Text::from(vec![
                    Line::from(format!("Error: {err}").red()),
                    Line::from(format!("File: {}", table.path().display())),
                    Line::default(),
                    Line::from(INSTRUCTIONS_TABLE),
                ]);
                frame.render_widget(
                    Paragraph::new(text).block(block).wrap(Wrap { trim: false }),
                    table_area,
                );
            }
            (Some(window), _) if !window.is_empty() => {
                let widget = Self::build_table(window).block(block);
                self.table_state.select(Some(table.curser_row()));
                frame.render_stateful_widget(widget, table_area, &mut self.table_state);
            }
            _ => {
                frame.render_widget(
                    Paragraph::new("No data found in parquet file.").block(block),
                    table_area,
                );
            }
        }

        frame.render_widget(Self::build_statusline(model, table), status_area);
    }

    fn build_table(window: &RowWindow) -> Table<'_> {
        let header = Row::new(
            window
                .columns()
                .iter()
                .map(|column| Cell::from(column.name.as_str())),
        )
        .style(Style::new().bold().fg(Color::Indexed(240)))
        .bottom_margin(1);

        let rows = window
            .rows()
            .map(|row| Row::new(row.iter().map(|cell| Cell::from(cell.as_str()))));
        let widths = window
            .columns()
            .iter()
            .map(|column| Constraint::Length(column.width as u16));

        Table::new(rows, widths)
            .header(header)
            .column_spacing(1)
            .row_highlight_style(
                Style::new()
                    .fg(Color::Indexed(229))
                    .bg(Color::Indexed(57))
                    .bold(),
            )
    }

    fn build_statusline<'a>(model: &'a Model, table: &'a TableView) -> Paragraph<'a> {
        let mut status = vec![Span::raw(" ")];
        if let Some(window) = table.window() {
            let first = window.global_offset() + usize::from(!window.is_empty());
            let last = window.global_offset() + window.len();
            status.push(
                format!(
                    "row {} | rows {}-{} of {}",
                    window.global_offset() + table.curser_row() + 1,
                    first,
                    last,
                    window.total_rows()
                )
                .yellow(),
            );
            if table.is_fetching() {
                status.push(" ⋯".into());
            }
            status.push(" ".into());
        }
        match (table.window(), model.error()) {
            (Some(_), Some(err)) => status.push(format!("Error: {err}").red()),
            _ => status.push(Span::raw(model.status_message())),
        }

        let instructions = Line::from(vec![
            " Move ".into(),
            "<↑/k ↓/j>".blue().bold(),
            " Page ".into(),
            "<PgUp/PgDn>".blue().bold(),
            " Back ".into(),
            "<Q/Esc>".blue().bold(),
            " Quit ".into(),
            "<Ctrl+D> ".blue().bold(),
        ]);

        Paragraph::new(Text::from(vec![Line::from(status), instructions]))
    }
}
