//! Error types for the cellfed-sim crate.
//!
//! Simulation itself cannot fail: the transition function is total over the
//! closed state set. Errors only arise when traces are read from or written
//! to disk.

use cellfed_types::UnknownEventTag;

/// Errors that can occur while reading or writing trace files.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Underlying read or write failed.
    #[error("trace I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The first line was not the expected header.
    #[error("missing trace header: expected `{expected}`, found `{found}`")]
    MissingHeader {
        /// The header the reader requires.
        expected: &'static str,
        /// What the file actually started with.
        found: String,
    },

    /// A record had the wrong shape or an unparsable timestamp.
    #[error("malformed trace record at line {line}: {reason}")]
    MalformedRecord {
        /// 1-based line number in the file.
        line: usize,
        /// Description of what is wrong with the record.
        reason: String,
    },

    /// A record named a message outside the vocabulary.
    #[error("unknown message at line {line}: {source}")]
    UnknownMessage {
        /// 1-based line number in the file.
        line: usize,
        /// The unrecognised tag.
        source: UnknownEventTag,
    },
}
