use std::io::{self, Stderr};
use std::sync::atomic::{AtomicBool, Ordering};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEvent, KeyEventKind, MouseEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use crate::client::ChatReply;

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

/// Set while the terminal is in raw mode on the alternate screen.
static TERMINAL_ACTIVE: AtomicBool = AtomicBool::new(false);

#[derive(Debug)]
#[allow(dead_code)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    Tick,
    /// Outcome of a chat request, delivered by its background task
    Reply {
        request_id: u64,
        result: anyhow::Result<ChatReply>,
    },
}

/// The event subscriptions of a session: terminal input, the animation tick,
/// and a sender for background replies. Built once; torn down once.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    tx: mpsc::UnboundedSender<AppEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut tasks = Vec::new();

        // Spawn event reader task
        let tx_events = tx.clone();
        tasks.push(tokio::spawn(async move {
            let mut reader = event::EventStream::new();
            while let Some(evt) = reader.next().await {
                let app_event = match evt {
                    Ok(Event::Key(key)) => {
                        // Only handle key press events, not release
                        if key.kind == KeyEventKind::Press {
                            Some(AppEvent::Key(key))
                        } else {
                            None
                        }
                    }
                    Ok(Event::Mouse(mouse)) => Some(AppEvent::Mouse(mouse)),
                    Ok(Event::Resize(w, h)) => Some(AppEvent::Resize(w, h)),
                    Ok(_) => None,
                    Err(e) => {
                        log::error!("Terminal event stream failed: {}", e);
                        break;
                    }
                };

                if let Some(event) = app_event {
                    if tx_events.send(event).is_err() {
                        break;
                    }
                }
            }
        }));

        // Spawn tick timer for animations and playback polling (300ms interval)
        let tx_tick = tx.clone();
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(300));
            loop {
                interval.tick().await;
                if tx_tick.send(AppEvent::Tick).is_err() {
                    break;
                }
            }
        }));

        Self { rx, tx, tasks }
    }

    /// Sender for events produced outside the subscriptions (chat replies).
    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.tx.clone()
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }

    /// Cancel the input and tick subscriptions. Calling it again is a no-op.
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn init() -> Result<Tui> {
    enable_raw_mode()?;
    TERMINAL_ACTIVE.store(true, Ordering::SeqCst);
    execute!(io::stderr(), EnterAlternateScreen)?;

    // Enable mouse capture
    execute!(io::stderr(), crossterm::event::EnableMouseCapture)?;

    let backend = CrosstermBackend::new(io::stderr());
    let terminal = Terminal::new(backend)?;

    Ok(terminal)
}

/// Leave raw mode and the alternate screen. Only the first call does anything.
pub fn restore() -> Result<()> {
    if !TERMINAL_ACTIVE.swap(false, Ordering::SeqCst) {
        return Ok(());
    }
    execute!(io::stderr(), crossterm::event::DisableMouseCapture)?;
    execute!(io::stderr(), LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

/// Install panic hook to restore terminal on panic
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        original_hook(panic_info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_without_init_is_a_no_op() {
        assert!(restore().is_ok());
        assert!(restore().is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let mut events = EventHandler::new();
        assert_eq!(events.tasks.len(), 2);
        events.shutdown();
        assert!(events.tasks.is_empty());
        events.shutdown();
        assert!(events.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_sender_delivers_replies() {
        let mut events = EventHandler::new();
        events.shutdown();

        events
            .sender()
            .send(AppEvent::Reply {
                request_id: 3,
                result: Err(anyhow::anyhow!("boom")),
            })
            .unwrap();

        // A tick may have slipped in before the subscriptions were cancelled
        loop {
            match events.next().await {
                Some(AppEvent::Reply { request_id, result }) => {
                    assert_eq!(request_id, 3);
                    assert!(result.is_err());
                    break;
                }
                Some(_) => continue,
                None => panic!("channel closed before the reply arrived"),
            }
        }
    }
}
