use anyhow::Result;
use crate::audio::Playback;
use crate::client::{ChatReply, START_GAME_MESSAGE};
use crate::state::{ChatMessage, Mood};

/// Reply phrase that unlocks the poem, enabling the play button.
pub const UNLOCK_PHRASE: &str = "YES! You got it right!";
/// Reply phrases that move past the poem, disabling the play button.
pub const MOVE_ON_PHRASES: [&str; 2] = ["HUH! You're a little too fast", "Your next challenge is:"];

pub const FALLBACK_REPLY: &str =
    "Agent Cupid is experiencing technical turbulence! Please try your message again.";

pub const PLAY_CAPTION: &str = "🎶 Hear Harsh's Voice!";
pub const STOP_CAPTION: &str = "⏸ Stop the Music";

/// Frames of the agent avatar, cycled on every tick.
pub const AVATAR_FRAMES: [&str; 4] = ["<(^_^)>", "(>^_^)>", "<(^_^)>", "<(^_^<)"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Welcome,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// A request ready to go out to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub request_id: u64,
    pub message: String,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,

    // Input box
    pub input: String,
    pub input_cursor: usize, // cursor position in chars

    // Chat history
    pub messages: Vec<ChatMessage>,
    pub mood: Mood,
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height of the chat pane, updated during render
    pub chat_width: u16,  // inner width of the chat pane, updated during render

    // Poem playback
    pub play_enabled: bool,
    pub is_playing: bool,
    completion_armed: bool,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
    pub avatar_frame: usize,

    /// One-line notice shown in the footer (e.g. playback errors)
    pub status: Option<String>,

    next_request_id: u64,
}

impl App {
    pub fn new() -> Self {
        Self {
            should_quit: false,
            screen: Screen::Welcome,
            input_mode: InputMode::Normal,

            input: String::new(),
            input_cursor: 0,

            messages: Vec::new(),
            mood: Mood::Neutral,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            play_enabled: false,
            is_playing: false,
            completion_armed: false,

            animation_frame: 0,
            avatar_frame: 0,

            status: None,

            next_request_id: 1,
        }
    }

    /// Leave the welcome screen and prime a game session on the server.
    pub fn start_hunt(&mut self) -> Option<Outgoing> {
        if self.screen != Screen::Welcome {
            return None;
        }
        self.screen = Screen::Chat;
        self.input_mode = InputMode::Editing;
        log::info!("Gift hunt started");
        self.begin_send(Some(START_GAME_MESSAGE), true)
    }

    /// Record a send in the transcript and hand back the request to post.
    ///
    /// Returns `None` (and changes nothing) for an empty user message.
    /// System sends skip the user entry and leave the input box alone.
    pub fn begin_send(&mut self, initial: Option<&str>, is_system: bool) -> Option<Outgoing> {
        let message = match initial {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => self.input.trim().to_string(),
        };

        if message.is_empty() && !is_system {
            return None;
        }

        if !is_system {
            self.messages.push(ChatMessage::user(message.clone()));
            self.input.clear();
            self.input_cursor = 0;
        }

        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.messages.push(ChatMessage::thinking(request_id));
        self.scroll_chat_to_bottom();

        Some(Outgoing { request_id, message })
    }

    /// Apply the outcome of a request started by `begin_send`.
    pub fn finish_send(&mut self, request_id: u64, result: Result<ChatReply>, player: &mut dyn Playback) {
        self.messages.retain(|msg| msg.pending != Some(request_id));

        match result {
            Ok(reply) => {
                let text = reply.response_text;

                if text.contains(UNLOCK_PHRASE) {
                    self.play_enabled = true;
                }

                if MOVE_ON_PHRASES.iter().any(|phrase| text.contains(phrase)) {
                    self.play_enabled = false;
                    player.stop();
                    self.is_playing = false;
                    self.completion_armed = false;
                }

                self.messages.push(ChatMessage::agent(text.replace('\n', "<br>")));
                self.mood = Mood::from_tag(&reply.agent_state);
            }
            Err(e) => {
                log::error!("Error communicating with the gift hunt server: {:#}", e);
                self.messages.push(ChatMessage::agent(FALLBACK_REPLY));
                self.mood = Mood::Confused;
            }
        }

        self.scroll_chat_to_bottom();
    }

    pub fn has_pending_requests(&self) -> bool {
        self.messages.iter().any(ChatMessage::is_placeholder)
    }

    // Poem playback

    pub fn play_caption(&self) -> &'static str {
        if self.is_playing {
            STOP_CAPTION
        } else {
            PLAY_CAPTION
        }
    }

    pub fn toggle_playback(&mut self, player: &mut dyn Playback) {
        if !self.play_enabled {
            return;
        }

        if self.is_playing {
            player.stop();
            self.is_playing = false;
            self.completion_armed = false;
            return;
        }

        match player.start() {
            Ok(()) => {
                self.is_playing = true;
                self.completion_armed = true;
                self.status = None;
            }
            Err(e) => {
                log::warn!("Could not play the poem: {:#}", e);
                self.status = Some(format!("Could not play the poem: {}", e));
            }
        }
    }

    /// Completion notification: the clip ran to its end.
    pub fn playback_ended(&mut self) {
        self.is_playing = false;
        self.completion_armed = false;
    }

    /// Fire the completion notification once the player is done with the clip.
    pub fn poll_playback(&mut self, player: &mut dyn Playback) {
        if !self.completion_armed {
            return;
        }

        match player.poll_end() {
            None => {}
            Some(Ok(())) => self.playback_ended(),
            Some(Err(e)) => {
                log::warn!("Poem playback failed: {:#}", e);
                self.status = Some(format!("Could not play the poem: {}", e));
                self.playback_ended();
            }
        }
    }

    /// Tick animation frames (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.has_pending_requests() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.avatar_frame = (self.avatar_frame + 1) % AVATAR_FRAMES.len();
    }

    pub fn avatar(&self) -> &'static str {
        AVATAR_FRAMES[self.avatar_frame % AVATAR_FRAMES.len()]
    }

    // Chat scrolling

    pub fn scroll_chat_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn scroll_chat_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_chat_half_page_down(&mut self) {
        let half = (self.chat_height / 2).max(1);
        self.chat_scroll = self.chat_scroll.saturating_add(half);
    }

    pub fn scroll_chat_half_page_up(&mut self) {
        let half = (self.chat_height / 2).max(1);
        self.chat_scroll = self.chat_scroll.saturating_sub(half);
    }

    /// Scroll the chat so the newest entry is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in &self.messages {
            total_lines = total_lines.saturating_add(1); // Sender line
            for line in msg.text.split("<br>").flat_map(str::lines) {
                let char_count = line.chars().count();
                let wrapped = if char_count == 0 {
                    1
                } else {
                    (char_count / wrap_width) + 1
                };
                total_lines = total_lines.saturating_add(wrapped as u16);
            }
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}
