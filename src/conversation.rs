//! Conversation log
//!
//! Display-only record of the dialogue. Appends are fire-and-forget.

use std::io::Write;
use std::sync::{Arc, Mutex};

/// Who said a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    /// The person talking to the companion
    User,
    /// The companion
    Assistant,
}

/// One displayed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationLine {
    /// Who said it
    pub speaker: Speaker,
    /// What was said
    pub text: String,
}

/// Receives conversation lines for display
pub trait ConversationLog {
    /// Show a user line
    fn append_user(&mut self, text: &str);

    /// Show an assistant line
    fn append_assistant(&mut self, text: &str);
}

/// In-memory transcript, cheap to clone and share
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    lines: Arc<Mutex<Vec<ConversationLine>>>,
}

impl Transcript {
    /// Create an empty transcript
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all lines so far
    #[must_use]
    pub fn lines(&self) -> Vec<ConversationLine> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Texts of the assistant lines so far
    #[must_use]
    pub fn assistant_lines(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|l| l.speaker == Speaker::Assistant)
            .map(|l| l.text)
            .collect()
    }

    fn push(&self, speaker: Speaker, text: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(ConversationLine {
                speaker,
                text: text.to_string(),
            });
        }
    }
}

impl ConversationLog for Transcript {
    fn append_user(&mut self, text: &str) {
        self.push(Speaker::User, text);
    }

    fn append_assistant(&mut self, text: &str) {
        self.push(Speaker::Assistant, text);
    }
}

/// Prints the conversation to a terminal
pub struct TerminalLog<W: Write> {
    out: W,
}

impl TerminalLog<std::io::Stdout> {
    /// Log to stdout
    #[must_use]
    pub fn stdout() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl<W: Write> TerminalLog<W> {
    /// Log to any writer
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Consume the log, returning the writer
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, sender: &str, text: &str) {
        if let Err(e) = writeln!(self.out, "{sender}: {text}").and_then(|()| self.out.flush()) {
            tracing::warn!(error = %e, "failed to write conversation line");
        }
    }
}

impl<W: Write> ConversationLog for TerminalLog<W> {
    fn append_user(&mut self, text: &str) {
        self.write_line("You", text);
    }

    fn append_assistant(&mut self, text: &str) {
        self.write_line("AI", text);
    }
}
