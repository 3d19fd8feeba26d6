mod app;
mod ui;

use std::time::Duration;

use crossterm::event::{self, Event, KeyEventKind};
use tokio::sync::mpsc::{self, error::TryRecvError};

use pboss_session::{SessionHandle, Update};

use app::App;

/// Run the terminal UI until the user quits. Blocking; call from
/// `spawn_blocking`.
pub fn run(handle: SessionHandle, updates: mpsc::UnboundedReceiver<Update>) -> anyhow::Result<()> {
    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &handle, updates);
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut ratatui::DefaultTerminal,
    handle: &SessionHandle,
    mut updates: mpsc::UnboundedReceiver<Update>,
) -> anyhow::Result<()> {
    let mut app = App::new();
    let mut closed = false;

    loop {
        while !closed {
            match updates.try_recv() {
                Ok(update) => app.apply(update),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    closed = true;
                    app.session_closed();
                }
            }
        }

        terminal.draw(|f| ui::render(f, &app))?;

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(250))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if let Some(command) = app.handle_key(key) {
                        tracing::debug!(command = command.name(), "ui command");
                        if !handle.try_send(command) {
                            app.session_closed();
                        }
                    }
                }
                _ => {}
            }
        }
    }

    Ok(())
}
