use std::fs::File;
use std::io::stdout;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::EnableMouseCapture,
    execute,
    terminal::{EnterAlternateScreen, enable_raw_mode},
};
use log::{error, info};
use ratatui::{Terminal, backend::CrosstermBackend};
use ratatui_image::picker::Picker;
use simplelog::{Config, LevelFilter, WriteLogger};

use whiteout::event_source::TerminalEventSource;
use whiteout::panic_handler;
use whiteout::{run_app, App};

/// Whiteout regions of a PDF and annotate it with text, from the terminal
#[derive(Parser, Debug)]
#[command(name = "whiteout", version, about)]
struct Cli {
    /// PDF file to open on startup
    file: Option<PathBuf>,

    /// Write a debug log to this file
    #[arg(long)]
    log: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_path) = &cli.log {
        WriteLogger::init(
            LevelFilter::Debug,
            Config::default(),
            File::create(log_path)?,
        )?;
    }

    info!("starting whiteout");
    panic_handler::initialize_panic_handler();

    // The cell-size query needs raw mode; fall back to a typical cell
    // size when the terminal does not answer.
    enable_raw_mode()?;
    let picker = Picker::from_query_stdio().unwrap_or_else(|_| Picker::from_fontsize((8, 16)));
    execute!(stdout(), EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut app = App::new(picker);
    if let Some(file) = &cli.file {
        app.open_document(file);
    }

    let mut events = TerminalEventSource;
    let res = run_app(&mut terminal, &mut events, &mut app);

    panic_handler::restore_terminal();

    if let Err(err) = &res {
        error!("application error: {err:?}");
    }
    info!("shutting down");
    res
}
