//! Input handling: the line buffer and slash commands.

/// What a submitted line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send a chat message (already trimmed, never empty).
    Say(String),
    MarkDayComplete,
    RefreshStatus,
    Export,
    Help,
    Quit,
}

pub const HELP_TEXT: &str = "Commands: /done (mark day complete), /status, /export, /help, /quit";

impl Command {
    /// Parse a line. Blank or whitespace-only input yields `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let command = match line {
            "/done" | "/complete" => Self::MarkDayComplete,
            "/status" => Self::RefreshStatus,
            "/export" => Self::Export,
            "/help" | "/?" => Self::Help,
            "/quit" | "/exit" => Self::Quit,
            text => Self::Say(text.to_string()),
        };
        Some(command)
    }
}

/// Line buffer for the message being composed.
///
/// Submitting does not clear the buffer; the caller clears it once the send
/// has been dispatched, without waiting for the reply.
#[derive(Debug, Default)]
pub struct InputBox {
    buffer: String,
}

impl InputBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, text: impl Into<String>) {
        self.buffer = text.into();
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// The command to dispatch, or `None` when the buffer is blank.
    pub fn submission(&self) -> Option<Command> {
        Command::parse(&self.buffer)
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
