use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use tokio::sync::mpsc;
use crate::app::{App, InputMode, Outgoing, Screen};
use crate::audio::Playback;
use crate::client::GiftHuntClient;
use crate::tui::AppEvent;

/// Everything the handlers reach outside the UI state
pub struct Services {
    pub client: GiftHuntClient,
    pub player: Box<dyn Playback + Send>,
    pub replies: mpsc::UnboundedSender<AppEvent>,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, services: &mut Services, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, services, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
            app.poll_playback(services.player.as_mut());
        }
        AppEvent::Reply { request_id, result } => {
            app.finish_send(request_id, result, services.player.as_mut());
        }
    }
    Ok(())
}

/// Post a message in the background; the reply comes back as `AppEvent::Reply`.
fn dispatch(services: &Services, outgoing: Outgoing) {
    let client = services.client.clone();
    let replies = services.replies.clone();

    log::debug!("Sending request {}", outgoing.request_id);
    tokio::spawn(async move {
        let result = client.chat(&outgoing.message).await;
        if replies
            .send(AppEvent::Reply {
                request_id: outgoing.request_id,
                result,
            })
            .is_err()
        {
            log::debug!("Dropped reply {}: UI already closed", outgoing.request_id);
        }
    });
}

fn handle_key(app: &mut App, services: &mut Services, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match (app.screen, app.input_mode) {
        (Screen::Welcome, _) => handle_welcome(app, services, key),
        (Screen::Chat, InputMode::Normal) => handle_chat_normal(app, services, key),
        (Screen::Chat, InputMode::Editing) => handle_chat_editing(app, services, key),
    }
}

fn handle_welcome(app: &mut App, services: &Services, key: KeyEvent) {
    match key.code {
        KeyCode::Enter | KeyCode::Char('s') => {
            if let Some(outgoing) = app.start_hunt() {
                dispatch(services, outgoing);
            }
        }
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        _ => {}
    }
}

fn handle_chat_normal(app: &mut App, services: &mut Services, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
        KeyCode::Char('p') => app.toggle_playback(services.player.as_mut()),

        // Scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_chat_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_chat_up(),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_chat_half_page_down();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_chat_half_page_up();
        }
        KeyCode::PageDown => app.scroll_chat_half_page_down(),
        KeyCode::PageUp => app.scroll_chat_half_page_up(),
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),
        KeyCode::Char('g') => app.chat_scroll = 0,

        _ => {}
    }
}

fn handle_chat_editing(app: &mut App, services: &mut Services, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            if let Some(outgoing) = app.begin_send(None, false) {
                dispatch(services, outgoing);
            }
        }
        KeyCode::Char('p') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.toggle_playback(services.player.as_mut());
        }
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.input_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.input_cursor = app.input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.input_cursor = (app.input_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.input_cursor = 0;
        }
        KeyCode::End => {
            app.input_cursor = app.input.chars().count();
        }
        KeyCode::PageDown => app.scroll_chat_half_page_down(),
        KeyCode::PageUp => app.scroll_chat_half_page_up(),
        KeyCode::Char(c) => {
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                return;
            }
            let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
            app.input.insert(byte_pos, c);
            app.input_cursor += 1;
        }
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.screen != Screen::Chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            app.chat_scroll = app.chat_scroll.saturating_add(3);
        }
        MouseEventKind::ScrollUp => {
            app.chat_scroll = app.chat_scroll.saturating_sub(3);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{FALLBACK_REPLY, PLAY_CAPTION, STOP_CAPTION};
    use crate::client::ChatReply;
    use crate::state::{Mood, Sender};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct CountingPlayer {
        starts: Arc<AtomicUsize>,
    }

    impl Playback for CountingPlayer {
        fn start(&mut self) -> Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn stop(&mut self) {}
        fn poll_end(&mut self) -> Option<Result<()>> {
            None
        }
    }

    /// Services pointing at a port nobody listens on.
    async fn offline_services() -> (Services, mpsc::UnboundedReceiver<AppEvent>, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (tx, rx) = mpsc::unbounded_channel();
        let starts = Arc::new(AtomicUsize::new(0));
        let services = Services {
            client: GiftHuntClient::new(&format!("http://{}", addr)),
            player: Box::new(CountingPlayer {
                starts: starts.clone(),
            }),
            replies: tx,
        };
        (services, rx, starts)
    }

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(c: char) -> AppEvent {
        AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
    }

    fn type_text(app: &mut App, services: &mut Services, text: &str) {
        for c in text.chars() {
            handle_event(app, services, key(KeyCode::Char(c))).unwrap();
        }
    }

    #[tokio::test]
    async fn test_start_then_unreachable_server_shows_fallback() {
        let (mut services, mut rx, _) = offline_services().await;
        let mut app = App::new();

        handle_event(&mut app, &mut services, key(KeyCode::Enter)).unwrap();
        assert_eq!(app.screen, Screen::Chat);
        assert!(app.has_pending_requests());

        let reply = rx.recv().await.unwrap();
        handle_event(&mut app, &mut services, reply).unwrap();

        assert!(!app.has_pending_requests());
        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.messages[0].text, FALLBACK_REPLY);
        assert_eq!(app.mood, Mood::Confused);
    }

    #[tokio::test]
    async fn test_typed_message_is_sent_and_input_cleared() {
        let (mut services, mut rx, _) = offline_services().await;
        let mut app = App::new();
        app.screen = Screen::Chat;
        app.input_mode = InputMode::Editing;

        type_text(&mut app, &mut services, "blue");
        assert_eq!(app.input, "blue");

        handle_event(&mut app, &mut services, key(KeyCode::Enter)).unwrap();
        assert!(app.input.is_empty());
        assert_eq!(app.messages[0].sender, Sender::User);
        assert_eq!(app.messages[0].text, "blue");

        let reply = rx.recv().await.unwrap();
        handle_event(&mut app, &mut services, reply).unwrap();
        assert_eq!(app.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_enter_sends_nothing() {
        let (mut services, mut rx, _) = offline_services().await;
        let mut app = App::new();
        app.screen = Screen::Chat;
        app.input_mode = InputMode::Editing;

        handle_event(&mut app, &mut services, key(KeyCode::Enter)).unwrap();
        assert!(app.messages.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reply_event_enables_and_toggles_playback() {
        let (mut services, _rx, starts) = offline_services().await;
        let mut app = App::new();
        app.screen = Screen::Chat;
        app.input_mode = InputMode::Editing;

        let outgoing = app.begin_send(Some("blue"), false).unwrap();
        let reply = AppEvent::Reply {
            request_id: outgoing.request_id,
            result: Ok(ChatReply {
                response_text: "**YES! You got it right!**".to_string(),
                agent_state: "excited".to_string(),
            }),
        };
        handle_event(&mut app, &mut services, reply).unwrap();
        assert!(app.play_enabled);

        handle_event(&mut app, &mut services, ctrl('p')).unwrap();
        assert_eq!(app.play_caption(), STOP_CAPTION);
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        // Ctrl+P is a shortcut, not text
        assert!(app.input.is_empty());

        handle_event(&mut app, &mut services, key(KeyCode::Esc)).unwrap();
        handle_event(&mut app, &mut services, key(KeyCode::Char('p'))).unwrap();
        assert_eq!(app.play_caption(), PLAY_CAPTION);
    }

    #[tokio::test]
    async fn test_utf8_editing() {
        let (mut services, _rx, _) = offline_services().await;
        let mut app = App::new();
        app.screen = Screen::Chat;
        app.input_mode = InputMode::Editing;

        type_text(&mut app, &mut services, "héllo");
        handle_event(&mut app, &mut services, key(KeyCode::Left)).unwrap();
        handle_event(&mut app, &mut services, key(KeyCode::Left)).unwrap();
        handle_event(&mut app, &mut services, key(KeyCode::Left)).unwrap();
        handle_event(&mut app, &mut services, key(KeyCode::Backspace)).unwrap();
        assert_eq!(app.input, "hllo");
        assert_eq!(app.input_cursor, 1);

        handle_event(&mut app, &mut services, key(KeyCode::End)).unwrap();
        type_text(&mut app, &mut services, "ü");
        assert_eq!(app.input, "hlloü");
    }

    #[tokio::test]
    async fn test_quit_keys() {
        let (mut services, _rx, _) = offline_services().await;

        let mut app = App::new();
        handle_event(&mut app, &mut services, key(KeyCode::Char('q'))).unwrap();
        assert!(app.should_quit);

        let mut app = App::new();
        app.screen = Screen::Chat;
        app.input_mode = InputMode::Editing;
        // 'q' is text while editing
        handle_event(&mut app, &mut services, key(KeyCode::Char('q'))).unwrap();
        assert!(!app.should_quit);
        handle_event(&mut app, &mut services, ctrl('c')).unwrap();
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_tick_advances_avatar() {
        let (mut services, _rx, _) = offline_services().await;
        let mut app = App::new();
        handle_event(&mut app, &mut services, AppEvent::Tick).unwrap();
        assert_eq!(app.avatar_frame, 1);
    }
}
