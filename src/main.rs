use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod controller;
mod domain;
mod inputter;
mod model;
mod record;
mod sample;
mod source;
mod tasks;
mod ui;
mod window;

use controller::Controller;
use domain::{DEFAULT_COLUMN_WIDTH, DEFAULT_EXTENSION, DEFAULT_WINDOW_SIZE, TVConfig, TVError};
use model::{Model, Status};
use source::open_parquet;
use tasks::Tasks;
use ui::TableUI;

/// Browse parquet files without loading them into memory.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Parquet file to open, skips the file selection
    path: Option<PathBuf>,

    /// Number of rows kept in memory
    #[arg(short, long, default_value_t = DEFAULT_WINDOW_SIZE, value_parser = parse_window)]
    window: usize,

    /// Display width of every column
    #[arg(long, default_value_t = DEFAULT_COLUMN_WIDTH)]
    column_width: usize,

    /// File extension offered in the file selection
    #[arg(long, default_value = DEFAULT_EXTENSION)]
    extension: String,

    /// Write logs to this file (filter with RUST_LOG)
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Write a sample parquet file and exit
    #[arg(long, value_name = "FILE")]
    generate_sample: Option<PathBuf>,

    /// Number of rows in the generated sample
    #[arg(long, default_value_t = 10, requires = "generate_sample")]
    sample_rows: usize,
}

fn parse_window(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("the window must hold at least one row".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(log) = &args.log
        && let Err(e) = init_logging(log)
    {
        eprintln!("Error: could not set up logging: {e}");
        return ExitCode::FAILURE;
    }

    if let Some(path) = &args.generate_sample {
        return match sample::write_sample(path, args.sample_rows) {
            Ok(_) => {
                println!("Sample parquet file '{}' generated", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    match run(args) {
        Err(e) => {
            error!("Terminated with error: {e}");
            eprintln!("Error running program: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_logging(path: &Path) -> Result<(), TVError> {
    let file = File::create(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(args: Args) -> Result<(), TVError> {
    info!("Starting pqv!");

    let cfg = TVConfig::default()
        .window_size(args.window)
        .column_width(args.column_width)
        .extension(args.extension);

    let (tasks, receiver) = Tasks::channel(open_parquet);
    let controller = Controller::new(&cfg, receiver);

    let mut terminal = ratatui::try_init()?;
    let result = event_loop(&mut terminal, &cfg, tasks, &controller, args.path);
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    cfg: &TVConfig,
    tasks: Tasks,
    controller: &Controller,
    path: Option<PathBuf>,
) -> Result<(), TVError> {
    let size = terminal.size()?;
    let mut model = Model::init(cfg, tasks, path, size.width as usize, size.height as usize);
    let mut ui = TableUI::new();

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and background results, mapped to a Message
        if let Some(message) = controller.handle_event(&model)? {
            model.update(Some(message))?;
        };
    }
    info!("Quitting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_must_hold_a_row() {
        assert!(parse_window("0").is_err());
        assert!(parse_window("abc").is_err());
        assert_eq!(parse_window("8"), Ok(8));
    }

    #[test]
    fn cli_defaults() {
        let args = Args::try_parse_from(["pqv"]).unwrap();
        assert_eq!(args.window, 32);
        assert_eq!(args.column_width, 20);
        assert_eq!(args.extension, "parquet");
        assert!(args.path.is_none());

        let args = Args::try_parse_from(["pqv", "data.parquet", "-w", "4"]).unwrap();
        assert_eq!(args.path, Some(PathBuf::from("data.parquet")));
        assert_eq!(args.window, 4);
    }

    #[test]
    fn sample_rows_need_a_sample_file() {
        assert!(Args::try_parse_from(["pqv", "--sample-rows", "5"]).is_err());
        let args = Args::try_parse_from(["pqv", "--generate-sample", "s.parquet", "--sample-rows", "5"])
            .unwrap();
        assert_eq!(args.sample_rows, 5);
    }
}
