use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::KeyEventKind;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;

mod app;
mod config;
mod db;
mod error;
mod feed;
mod models;
mod search;
mod services;
mod tui;

use app::{App, Services};
use config::Config;
use error::Result;
use feed::{RefreshMode, RefreshOutcome};
use services::{DesktopNotifier, LogNotifier, Notifier};
use tui::{draw, handle_key_event};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Tui,
    Refresh,
    Daemon,
    Clear,
    Unknown(String),
}

impl Mode {
    fn from_args(args: &[String]) -> Self {
        match args.get(1).map(String::as_str) {
            None => Self::Tui,
            Some("--refresh") => Self::Refresh,
            Some("--daemon") => Self::Daemon,
            Some("--clear") => Self::Clear,
            Some(other) => Self::Unknown(other.to_string()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mode = Mode::from_args(&args);
    let daemon = mode == Mode::Daemon;

    // Initialize logging (only show warnings and errors by default)
    let level = if daemon {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = Config::load()?;

    let notifier: Arc<dyn Notifier> = {
        let desktop = DesktopNotifier::detect();
        if desktop.is_available() {
            Arc::new(desktop)
        } else {
            Arc::new(LogNotifier)
        }
    };
    let services = Services::new(&config, notifier).await?;

    match mode {
        // Headless refresh, then exit
        Mode::Refresh => {
            let message = match services.refresher.refresh(RefreshMode::Interactive).await? {
                RefreshOutcome::NoActiveTopics => "No active topics".to_string(),
                RefreshOutcome::NoNewArticles => "No new articles found for your topics.".to_string(),
                RefreshOutcome::NewArticles(count) => format!("Found {count} new articles!"),
            };
            println!("{message}");
            return Ok(());
        }
        Mode::Clear => {
            services.repository.clear_all().await?;
            println!("All data cleared");
            return Ok(());
        }
        Mode::Daemon => return run_daemon(services).await,
        Mode::Unknown(other) => {
            eprintln!("Unknown argument: {other}");
            eprintln!("Usage: topic-feed [--refresh | --daemon | --clear]");
            return Ok(());
        }
        Mode::Tui => {}
    }

    // Initialize app
    let mut app = App::new(config, services).await?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    Ok(())
}

/// Keeps the background refresh running until interrupted.
async fn run_daemon(services: Services) -> Result<()> {
    let settings = services.repository.get_notification_settings().await;
    if !settings.enabled {
        eprintln!("Notifications are disabled; enable them in Settings to run in the background.");
        return Ok(());
    }
    if !services.apply_background_settings(&settings).await {
        eprintln!("Notification permission not granted; background refresh not started.");
        return Ok(());
    }

    tracing::info!(
        "Background refresh running ({}), press Ctrl-C to stop",
        settings.frequency.label()
    );
    tokio::signal::ctrl_c().await?;
    services.scheduler.unregister();
    Ok(())
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|frame| draw(frame, app))?;

        // Poll for completed refresh results
        app.poll_refresh_result().await?;

        // Poll for events with timeout to allow async operations
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(action) = handle_key_event(key, app.key_context()) {
                        let should_quit = app.handle_action(action).await?;
                        if should_quit {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
