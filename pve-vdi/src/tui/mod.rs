use std::io;
use std::time::Duration;

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::prelude::*;
use tokio::sync::mpsc;

use pve_vdi::SnapshotStore;
use pve_vdi::operation::Coordinator;
use pve_vdi::sync::{SyncConfig, Synchronizer};
use pve_vdi::viewer::RemoteViewer;

mod app;
pub mod types;
pub mod views;
mod worker;

use app::App;
use types::ActionResult;

fn draw(frame: &mut Frame, app: &mut App) {
    let vms = app.sync_table_state();
    views::vms::draw(
        frame,
        &app.host,
        &vms,
        &mut app.table_state,
        &app.pending,
        app.refresh_error.as_deref(),
        app.status_message.as_deref(),
        app.last_refresh,
    );
}

pub async fn run(
    coordinator: Coordinator,
    viewer: RemoteViewer,
    sync_config: SyncConfig,
    host: &str,
    debug_session: bool,
) -> io::Result<()> {
    let (action_tx, action_rx) = mpsc::unbounded_channel();
    let (result_tx, result_rx) = mpsc::unbounded_channel();

    let store = SnapshotStore::new();
    let synchronizer = Synchronizer::new(coordinator.gateway().clone(), store.clone(), sync_config);
    let refreshed_tx = result_tx.clone();
    let failed_tx = result_tx.clone();
    let sync = synchronizer.start(
        move |_| {
            let _ = refreshed_tx.send(ActionResult::Refreshed);
        },
        move |e| {
            let _ = failed_tx.send(ActionResult::RefreshFailed(e.to_string()));
        },
    );

    tokio::spawn(worker::action_worker(
        coordinator,
        viewer,
        debug_session,
        action_rx,
        result_tx,
    ));

    enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let mut app = App::new(host.to_string(), store, sync.trigger(), action_tx, result_rx);
    let result = event_loop(&mut terminal, &mut app);

    disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;
    sync.shutdown().await;
    result
}

fn event_loop<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        // Results from the synchronizer and the worker
        while let Ok(result) = app.result_rx.try_recv() {
            app.handle_result(result);
        }

        terminal.draw(|frame| draw(frame, app))?;

        if event::poll(Duration::from_millis(50))?
            && let Event::Key(key) = event::read()?
        {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            handle_key(app, key);
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        KeyCode::Down | KeyCode::Char('j') => app.next(),
        KeyCode::Up | KeyCode::Char('k') => app.previous(),
        KeyCode::PageDown => app.page_down(),
        KeyCode::PageUp => app.page_up(),
        KeyCode::Home | KeyCode::Char('g') => app.first(),
        KeyCode::End | KeyCode::Char('G') => app.last(),
        KeyCode::Enter => app.open_console(),
        KeyCode::Char('s') => app.toggle_selected(),
        KeyCode::Char('r') => app.reset_selected(),
        KeyCode::Char('R') | KeyCode::F(5) => app.refresh(),
        _ => {}
    }
}
