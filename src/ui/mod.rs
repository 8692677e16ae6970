//! Terminal presentation: transcript, status panel, and input.
//!
//! Views only read from the [`ConversationStore`](crate::conversation::ConversationStore);
//! all mutation goes through its operations.

pub mod input;
pub mod progress;
pub mod terminal;
pub mod transcript;

pub use input::{Command, InputBox};
pub use progress::{progress_bar, render_status};
pub use transcript::TranscriptView;
