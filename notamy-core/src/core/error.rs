//! Error types for the NotaMy core library.

use crate::core::codec::CodecError;
use crate::core::notebook::Candidate;
use thiserror::Error;

/// All errors that can occur within the NotaMy core library.
#[derive(Debug, Error)]
pub enum NotamyError {
    /// An I/O operation on the note file or its working copy failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The compressed container could not be decoded.
    #[error("Compression error: {0}")]
    Codec(#[from] CodecError),

    /// No node matched the requested tag, hash, or date key.
    #[error("Note not found: {0}")]
    NoteNotFound(String),

    /// More than one node matched a tag prefix; an exact hash is needed.
    #[error("Ambiguous key '{key}': {} notes match", candidates.len())]
    Ambiguous {
        /// The prefix that matched several notes.
        key: String,
        /// Every matching note, in display order.
        candidates: Vec<Candidate>,
    },

    /// A hash prefix that must be unique matched several notes.
    #[error("Duplicate hash: {0}")]
    DuplicateHash(String),

    /// A move would create a cycle, move the root, or has no sibling to swap with.
    #[error("Invalid move: {0}")]
    InvalidMove(String),

    /// The trailing shape block is missing or malformed.
    #[error("Corrupt shape block: {0}")]
    CorruptShape(String),

    /// A record could not be read back from its byte range.
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// A field value failed boundary validation.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// The note is protected and no password was supplied.
    #[error("Note is protected: {0}")]
    Protected(String),

    /// The supplied password does not match.
    #[error("Wrong password")]
    WrongPassword,

    /// A date or date range could not be parsed.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// The cipher failed for a reason other than a wrong password.
    #[error("Cipher error: {0}")]
    Cipher(String),
}

/// Convenience alias that pins the error type to [`NotamyError`].
pub type Result<T> = std::result::Result<T, NotamyError>;

impl NotamyError {
    /// Returns a short, human-readable message suitable for the error stream.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Io(e) => format!("file error: {e}"),
            Self::Codec(e) => format!("compressed file error: {e}"),
            Self::NoteNotFound(key) => format!("{key} not found"),
            Self::Ambiguous { key, .. } => format!("ambiguous tag '{key}'"),
            Self::DuplicateHash(key) => format!("duplicate hash '{key}'"),
            Self::InvalidMove(msg) => format!("unable to move the node: {msg}"),
            Self::CorruptShape(msg) => format!("tree not readable: {msg}"),
            Self::CorruptRecord(msg) => format!("note not readable: {msg}"),
            Self::ValidationFailed(msg) => msg.clone(),
            Self::Protected(hash) => format!("note {hash} is protected"),
            Self::WrongPassword => "invalid password".to_string(),
            Self::InvalidDate(msg) => msg.clone(),
            Self::Cipher(msg) => format!("protection error: {msg}"),
        }
    }
}
