//! TUI front-end entry (Ratatui + Crossterm)
//! - Creates the HTTP client that stands in for both the identity provider and the data store
//! - Restores the stored session, then runs the draw/input loop

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;

use crate::config::TuiArgs;

pub mod api;
pub mod input;
pub mod state;
pub mod theme;
pub mod ui;
pub mod util;

pub async fn run(args: &TuiArgs) -> Result<()> {
    let client = Arc::new(api::Client::new(
        &args.api_url,
        &args.session_file,
        args.http_timeout(),
    )?);
    info!(api_url = %args.api_url, session_file = %client.session_file().display(), "starting TUI");
    let mut app = state::App::new(Arc::clone(&client), client, args.session_config());

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &mut app).await;

    disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut state::App<api::Client, api::Client>,
) -> Result<()> {
    // runs alongside the loop so the failsafe can end the loading screen
    let recovery = app.spawn_recovery();

    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key).await?;
            }
        }

        if last_tick.elapsed() >= tick_rate {
            // picks up transitions published outside a key press, such as the end of recovery
            app.sync_session().await;
            last_tick = Instant::now();
        }

        if app.quit {
            info!("quit requested");
            recovery.abort();
            return Ok(());
        }
    }
}
