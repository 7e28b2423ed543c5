// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

use std::fmt;

use thiserror::Error;

/// Coarse classification of a [`CError`], used to tell apart failures
/// without matching on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The byte-level framing is broken: bad magic, truncated reads,
    /// nonsensical header fields.
    Framing,
    /// The data is well formed but violates a model invariant: irregular
    /// unit cell, coordinate frame size mismatch, custom element exhaustion.
    Semantic,
    /// A text grammar rule was broken: conflicting or malformed directives,
    /// missing blocks, unparsable tokens.
    Grammar,
    /// The underlying stream failed.
    Io,
    /// The request is valid but not supported by this codec.
    Unsupported,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Framing => "framing",
            ErrorKind::Semantic => "semantic",
            ErrorKind::Grammar => "grammar",
            ErrorKind::Io => "io",
            ErrorKind::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum CError {
    #[error("{0}")]
    IoError(#[from] std::io::Error),
    #[error("{format} format: frame does not start with magic number {expected} (found {found})")]
    BadMagic {
        format: &'static str,
        expected: i32,
        found: i32,
    },
    #[error("{format} format: version string mismatch (found '{found}')")]
    VersionMismatch { format: &'static str, found: String },
    #[error("{format} format: unexpected end of data while reading {what}")]
    Truncated {
        format: &'static str,
        what: String,
    },
    #[error("{format} format: invalid header field {field} = {value}")]
    InvalidHeader {
        format: &'static str,
        field: &'static str,
        value: i64,
    },
    #[error("lattice vectors are not linearly independent")]
    IrregularUnitCell,
    #[error("coordinate frame {frame} has {got} positions, but the molecule has {expected} atoms")]
    FrameSizeMismatch {
        frame: usize,
        expected: usize,
        got: usize,
    },
    #[error("coordinate frame {frame} can not be set: only {count} frames exist")]
    FrameOutOfRange { frame: usize, count: usize },
    #[error("invalid atom index {index} (the molecule has {count} atom slots)")]
    InvalidAtom { index: usize, count: usize },
    #[error("invalid bond: {0}")]
    InvalidBond(String),
    #[error("custom element type limit exceeded ({limit} types available)")]
    CustomElementPoolExhausted { limit: usize },
    #[error("{format} format: line {line}: {message}")]
    Grammar {
        format: &'static str,
        line: usize,
        message: String,
    },
    #[error("{format} format: {message}")]
    Malformed {
        format: &'static str,
        message: String,
    },
    #[error("Failed to parse float: {0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),
    #[error("Failed to parse integer: {0}")]
    ParseIntError(#[from] std::num::ParseIntError),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("unknown format: {0}")]
    UnknownFormat(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("MessagePack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),
    #[error("MessagePack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),
    #[error("{0}")]
    GenericError(String),
}

impl CError {
    /// Builds a [`CError::Grammar`] for a text codec.
    pub fn grammar(format: &'static str, line: usize, message: impl Into<String>) -> Self {
        CError::Grammar {
            format,
            line,
            message: message.into(),
        }
    }

    /// Builds a [`CError::Truncated`] for a binary codec.
    pub fn truncated(format: &'static str, what: impl Into<String>) -> Self {
        CError::Truncated {
            format,
            what: what.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CError::IoError(_) => ErrorKind::Io,
            CError::BadMagic { .. }
            | CError::VersionMismatch { .. }
            | CError::Truncated { .. }
            | CError::InvalidHeader { .. }
            | CError::MsgPackDecode(_) => ErrorKind::Framing,
            CError::IrregularUnitCell
            | CError::FrameSizeMismatch { .. }
            | CError::FrameOutOfRange { .. }
            | CError::InvalidAtom { .. }
            | CError::InvalidBond(_)
            | CError::CustomElementPoolExhausted { .. }
            | CError::GenericError(_) => ErrorKind::Semantic,
            CError::Grammar { .. }
            | CError::Malformed { .. }
            | CError::ParseFloatError(_)
            | CError::ParseIntError(_)
            | CError::Json(_) => ErrorKind::Grammar,
            CError::Unsupported(_) | CError::UnknownFormat(_) | CError::MsgPackEncode(_) => {
                ErrorKind::Unsupported
            }
        }
    }
}

/// Append-only error accumulator attached to a [`crate::format::Format`].
///
/// It is cleared at the start of every read or write call and only grows
/// while that call runs.
#[derive(Debug, Default, Clone)]
pub struct ErrorLog {
    message: String,
    last_kind: Option<ErrorKind>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `message` on its own line.
    pub fn append(&mut self, message: &str) {
        if !self.message.is_empty() && !self.message.ends_with('\n') {
            self.message.push('\n');
        }
        self.message.push_str(message);
    }

    pub fn append_error(&mut self, error: &CError) {
        self.append(&error.to_string());
        self.last_kind = Some(error.kind());
    }

    pub fn clear(&mut self) {
        self.message.clear();
        self.last_kind = None;
    }

    pub fn as_str(&self) -> &str {
        &self.message
    }

    pub fn is_empty(&self) -> bool {
        self.message.is_empty()
    }

    /// Kind of the most recently appended [`CError`], if any.
    pub fn last_kind(&self) -> Option<ErrorKind> {
        self.last_kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_log_appends_on_new_lines() {
        let mut log = ErrorLog::new();
        assert!(log.is_empty());
        log.append("first");
        log.append("second");
        assert_eq!(log.as_str(), "first\nsecond");
        assert_eq!(log.last_kind(), None);

        log.append_error(&CError::IrregularUnitCell);
        assert_eq!(log.last_kind(), Some(ErrorKind::Semantic));
        assert!(log.as_str().ends_with("lattice vectors are not linearly independent"));

        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.last_kind(), None);
    }

    #[test]
    fn kinds() {
        let bad = CError::BadMagic {
            format: "TRR",
            expected: 1993,
            found: 7,
        };
        assert_eq!(bad.kind(), ErrorKind::Framing);
        assert_eq!(
            CError::grammar("Turbomole", 3, "oops").kind(),
            ErrorKind::Grammar
        );
        assert_eq!(
            CError::CustomElementPoolExhausted { limit: 127 }.kind(),
            ErrorKind::Semantic
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(CError::from(io).kind(), ErrorKind::Io);
    }
}
