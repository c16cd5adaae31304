//! Error types for the conversion pipeline.

use std::io;

use serde::Serialize;

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Everything that can go wrong while converting one message file.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// Missing or unsupported charset, or a payload that does not decode.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// A required header is absent.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// The Date header does not match the expected layout.
    #[error("unparseable Date header {value:?}: {source}")]
    TimestampFormat {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// The message container itself was rejected by the parser.
    #[error("parse error: {0}")]
    Parse(#[from] mailparse::MailParseError),

    /// The renderer rejected the document or could not write the output.
    #[error("render error: {0}")]
    Render(String),

    /// Input unreadable or output location unusable.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl ConvertError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Structured kind, carried into [`crate::ConversionResult::Failure`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decoding(_) => ErrorKind::Decoding,
            Self::MissingHeader(_) => ErrorKind::MissingHeader,
            Self::TimestampFormat { .. } => ErrorKind::TimestampFormat,
            Self::Parse(_) => ErrorKind::Parse,
            Self::Render(_) => ErrorKind::Render,
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}

/// Failure classification reported per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Decoding,
    MissingHeader,
    TimestampFormat,
    Parse,
    Render,
    Io,
}
