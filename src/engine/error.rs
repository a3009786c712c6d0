use thiserror::Error;

use crate::card::StoreError;

/// Failures that indicate a programming or storage problem rather than bad
/// user input. User mistakes become `roll.error` text instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No channel, plugin or built-in text is registered for the key.
    #[error("unknown text key: {0}")]
    UnknownTextKey(String),

    /// A lifecycle phase was called out of order or twice.
    #[error("cannot {phase} a command in state {state}")]
    Lifecycle { phase: &'static str, state: &'static str },

    /// Wrapper around card store failures.
    #[error("card store error: {0}")]
    Store(#[from] StoreError),
}
