//! Transcript view that follows the tail of the conversation.

use crate::onboarding::{Message, Role};

pub const EMPTY_HINT: &str = "Start chatting with Anton...";

/// Renders each message once, in transcript order, as it arrives.
///
/// The terminal has no scroll position to manage; printing only the newly
/// appended messages keeps the newest message at the bottom of the screen.
#[derive(Debug, Default)]
pub struct TranscriptView {
    rendered: usize,
}

impl TranscriptView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages already rendered.
    pub fn rendered(&self) -> usize {
        self.rendered
    }

    /// Render every message appended since the last call.
    pub fn render_new(&mut self, transcript: &[Message]) -> Vec<String> {
        let start = self.rendered.min(transcript.len());
        let lines = transcript[start..].iter().map(format_message).collect();
        self.rendered = transcript.len();
        lines
    }
}

pub fn format_message(message: &Message) -> String {
    match message.role {
        Role::User => format!("you   › {}", message.content),
        Role::Assistant => format!("anton › {}", message.content),
    }
}
