use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while emulating the PM5 rowing service
#[derive(Error, Debug)]
pub enum EmulatorError {
    /// Hex payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A replay log line did not match `<deltaMillis>:<hexPayload>`
    #[error("Invalid replay line {line}: {reason}")]
    InvalidReplayLine {
        /// 1-based line number in the log
        line: usize,
        /// What was wrong with the line
        reason: String,
    },

    /// The replay log could not be opened at startup
    #[error("Replay log {path} unavailable: {source}")]
    ReplayLogUnavailable {
        /// Path that was configured for the replay log
        path: PathBuf,
        /// Underlying open failure
        #[source]
        source: std::io::Error,
    },

    /// The subscriber behind a notification sink has gone away
    #[error("Notification sink closed")]
    SinkClosed,

    /// The transport rejected a notification
    #[error("Transport error: {0}")]
    Transport(String),

    /// A characteristic code outside the rowing service was used
    #[error("Unknown characteristic: 0x{code:04X}")]
    UnknownCharacteristic {
        /// 16-bit characteristic code
        code: u16,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced when decoding a hex-encoded payload
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The hex string has an odd number of digits
    #[error("odd number of hex digits")]
    OddLength,

    /// A character outside `[0-9a-fA-F]` was found
    #[error("invalid hex character {character:?} at index {index}")]
    InvalidHexCharacter {
        /// Offending character
        character: char,
        /// Position of the character in the input
        index: usize,
    },
}

impl From<hex::FromHexError> for DecodeError {
    fn from(err: hex::FromHexError) -> Self {
        match err {
            hex::FromHexError::InvalidHexCharacter { c, index } => Self::InvalidHexCharacter {
                character: c,
                index,
            },
            // `decode` never targets a fixed-size buffer, so a length error is always parity
            hex::FromHexError::OddLength | hex::FromHexError::InvalidStringLength => {
                Self::OddLength
            }
        }
    }
}

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, EmulatorError>;

impl EmulatorError {
    /// Check if this error means the subscriber or transport is gone
    #[must_use]
    pub const fn is_transport_error(&self) -> bool {
        matches!(self, Self::SinkClosed | Self::Transport(_))
    }

    /// Check if playback or scheduling can carry on after this error
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::InvalidReplayLine { .. })
    }
}
