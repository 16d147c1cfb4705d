//! Chat state types
//!
//! The transcript entries and the agent's mood indicator. Nothing here knows
//! about input handling or the network.

use ratatui::style::Color;

/// Who wrote a chat entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Agent,
}

/// A single entry in the chat history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    /// Set on the "thinking" placeholder of an in-flight request.
    pub pending: Option<u64>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            pending: None,
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Agent,
            text: text.into(),
            pending: None,
        }
    }

    pub fn thinking(request_id: u64) -> Self {
        Self {
            sender: Sender::Agent,
            text: "Agent is thinking".to_string(),
            pending: Some(request_id),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.pending.is_some()
    }
}

/// Coarse category of the last agent reply, shown as the chat border color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mood {
    Excited,
    Confused,
    #[default]
    Neutral,
}

impl Mood {
    /// Map the server's `agent_state` tag. Unknown tags are neutral.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "excited" => Mood::Excited,
            "confused" => Mood::Confused,
            _ => Mood::Neutral,
        }
    }

    pub fn border_color(&self) -> Color {
        match self {
            Mood::Excited => Color::Rgb(0xff, 0x40, 0x81),
            Mood::Confused => Color::Rgb(0xff, 0x98, 0x00),
            Mood::Neutral => Color::Rgb(0xcc, 0xcc, 0xcc),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mood::Excited => "excited",
            Mood::Confused => "confused",
            Mood::Neutral => "neutral",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mood_known_tags() {
        assert_eq!(Mood::from_tag("excited"), Mood::Excited);
        assert_eq!(Mood::from_tag("confused"), Mood::Confused);
    }

    #[test]
    fn test_mood_unknown_tags_are_neutral() {
        assert_eq!(Mood::from_tag("smiling"), Mood::Neutral);
        assert_eq!(Mood::from_tag(""), Mood::Neutral);
        assert_eq!(Mood::from_tag("Excited"), Mood::Neutral);
    }

    #[test]
    fn test_mood_colors_are_distinct() {
        let colors = [
            Mood::Excited.border_color(),
            Mood::Confused.border_color(),
            Mood::Neutral.border_color(),
        ];
        assert_ne!(colors[0], colors[1]);
        assert_ne!(colors[1], colors[2]);
        assert_ne!(colors[0], colors[2]);
    }

    #[test]
    fn test_thinking_placeholder() {
        let msg = ChatMessage::thinking(7);
        assert!(msg.is_placeholder());
        assert_eq!(msg.sender, Sender::Agent);
        assert!(!ChatMessage::agent("hi").is_placeholder());
    }
}
