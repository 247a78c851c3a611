//! Crate error types.
//!
//! Four kinds, matching the four error categories of the core engine:
//! bad configuration, out-of-range values, resource failures, and
//! malformed sequence/wavetable input. All are fatal-on-path in the
//! original engine; here they are returned up to the caller instead of
//! exiting the process, so the embedder decides how to present them.

use thiserror::Error;

/// Top-level error type for the SBaGenX core.
#[derive(Debug, Error)]
pub enum SbagenError {
    /// Bad CLI-equivalent configuration, unknown name, conflicting flags.
    #[error("configuration error: {0}")]
    Config(String),

    /// A value lies outside its legal range (time > 24h, amplitude overflow
    /// with normalization disabled, too few wavetable samples, ...).
    #[error("range error: {0}")]
    Range(String),

    /// Allocation, I/O, or producer-thread stall.
    #[error("resource error: {0}")]
    Resource(String),

    /// Malformed sequence text: unrecognized voice-spec token, bad
    /// wavetable sample line, unparsable time, etc.
    #[error("format error at line {line}: {message}")]
    Format { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, SbagenError>;

impl SbagenError {
    pub fn config(msg: impl Into<String>) -> Self {
        SbagenError::Config(msg.into())
    }
    pub fn range(msg: impl Into<String>) -> Self {
        SbagenError::Range(msg.into())
    }
    pub fn resource(msg: impl Into<String>) -> Self {
        SbagenError::Resource(msg.into())
    }
    pub fn format(line: usize, msg: impl Into<String>) -> Self {
        SbagenError::Format {
            line,
            message: msg.into(),
        }
    }
}
