//! Outgoing message sink.
//!
//! The bot never talks to a chat platform directly; it hands finished text to
//! an [`Outbox`]. Platform adapters implement the trait, tests and the REPL
//! use [`RecordingOutbox`].

use std::sync::Mutex;

/// Where a message went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Channel(String),
    User(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub to: Destination,
    pub text: String,
}

pub trait Outbox: Send + Sync {
    fn send_to_channel(&self, channel_id: &str, text: &str) -> anyhow::Result<()>;
    fn send_to_user(&self, user_id: &str, text: &str) -> anyhow::Result<()>;
}

/// Keeps every message in memory, in send order.
#[derive(Debug, Default)]
pub struct RecordingOutbox {
    sent: Mutex<Vec<OutgoingMessage>>,
}

impl RecordingOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Drain everything recorded so far.
    pub fn take(&self) -> Vec<OutgoingMessage> {
        self.sent
            .lock()
            .map(|mut v| std::mem::take(&mut *v))
            .unwrap_or_default()
    }

    fn push(&self, to: Destination, text: &str) -> anyhow::Result<()> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| anyhow::anyhow!("outbox lock poisoned"))?;
        sent.push(OutgoingMessage {
            to,
            text: text.to_string(),
        });
        Ok(())
    }
}

impl Outbox for RecordingOutbox {
    fn send_to_channel(&self, channel_id: &str, text: &str) -> anyhow::Result<()> {
        self.push(Destination::Channel(channel_id.to_string()), text)
    }

    fn send_to_user(&self, user_id: &str, text: &str) -> anyhow::Result<()> {
        self.push(Destination::User(user_id.to_string()), text)
    }
}
