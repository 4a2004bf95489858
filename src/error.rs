//! Error type shared by every part of the note-copy library.
//!
//! Errors fall into four groups (see [`ErrorKind`]): configuration problems
//! that are fatal before any request is made, transport failures from a site,
//! parse failures of stored or fetched data, and failed user input.

use thiserror::Error;

/// Coarse classification of a [`NoteCopyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unsupported site, empty registry, bad mode, bad config file.
    Configuration,
    /// Network failure or non-success response from a site.
    Transport,
    /// Malformed credentials, metadata or notes.
    Parse,
    /// Interactive input could not be read.
    Input,
}

#[derive(Debug, Error)]
pub enum NoteCopyError {
    #[error("no supported sites available")]
    NoSites,

    #[error("unsupported site: {0}")]
    UnsupportedSite(String),

    #[error("invalid post identifier '{0}': expected a site code or domain followed by a post number")]
    InvalidPostToken(String),

    #[error("invalid backend mode '{0}': must be read or write")]
    InvalidMode(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP {method} {url} failed: {source}")]
    Transport {
        method: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {method} {url} returned {status}")]
    Status {
        method: &'static str,
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("missing field '{field}' in {context}")]
    MissingField { context: String, field: String },

    #[error("invalid image dimensions {width}x{height}: both sides must be positive")]
    InvalidDimensions { height: u64, width: u64 },

    #[error("failed to read input: {0}")]
    Prompt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl NoteCopyError {
    pub fn parse(what: impl Into<String>, message: impl ToString) -> Self {
        NoteCopyError::Parse {
            what: what.into(),
            message: message.to_string(),
        }
    }

    pub fn missing_field(context: impl Into<String>, field: impl Into<String>) -> Self {
        NoteCopyError::MissingField {
            context: context.into(),
            field: field.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            NoteCopyError::NoSites
            | NoteCopyError::UnsupportedSite(_)
            | NoteCopyError::InvalidPostToken(_)
            | NoteCopyError::InvalidMode(_)
            | NoteCopyError::InvalidConfig(_) => ErrorKind::Configuration,
            NoteCopyError::Transport { .. } | NoteCopyError::Status { .. } => ErrorKind::Transport,
            NoteCopyError::Parse { .. }
            | NoteCopyError::MissingField { .. }
            | NoteCopyError::InvalidDimensions { .. } => ErrorKind::Parse,
            NoteCopyError::Prompt(_) | NoteCopyError::Io(_) => ErrorKind::Input,
        }
    }
}

pub type Result<T> = std::result::Result<T, NoteCopyError>;
