//! Custom error types and result handling for Quire operations.
//!
//! This module defines the error handling system used throughout Quire.
//! All operations return a [`Result<T>`] which is a type alias for `std::result::Result<T, Error>`.
//!
//! Every variant is fatal to the operation that produced it. The only condition
//! that is deliberately *not* an error is an unknown directive name, which renders
//! to a visible HTML comment instead.
use std::path::PathBuf;

/// Type alias for Results with Quire errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type returned by directive handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Comprehensive error type for all Quire operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O errors from the standard library
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Async task join errors
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    BookConfigBuilder(#[from] crate::book::BookConfigBuilderError),
    /// A logical name, package path or manifest id was used twice.
    #[error("Filename already used: {name} ({scope})")]
    NamingCollision { scope: String, name: String },
    /// The bytes of an asset could not be read from their source.
    #[error("Error retrieving {origin:?} from source: {error}")]
    SourceRetrieval {
        origin: String,
        #[source]
        error: std::io::Error,
    },
    /// A registered directive handler failed.
    #[error("Directive '{name}' failed: {error}")]
    DirectiveExpansion {
        name: String,
        #[source]
        error: HandlerError,
    },
    #[error("Compile template ({template}): {error}")]
    TemplateCompilation {
        template: String,
        #[source]
        error: minijinja::Error,
    },
    #[error("Exec error ({template}): {error}")]
    TemplateExecution {
        template: String,
        #[source]
        error: minijinja::Error,
    },
    #[error("No template named '{0}'")]
    TemplateNotFound(String),
    /// The container could not be written or sealed.
    #[error("Failed writing container entry '{entry}': {error}")]
    ContainerWrite {
        entry: String,
        #[source]
        error: zip::result::ZipError,
    },
    /// Error for invalid file or directory paths
    #[error("The given path '{0:?}' is invalid: {1}")]
    InvalidPath(PathBuf, String),
    /// Error for unsupported operations or formats (e.g., unknown image extension)
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    pub(crate) fn collision(scope: impl ToString, name: impl Into<String>) -> Self {
        Error::NamingCollision {
            scope: scope.to_string(),
            name: name.into(),
        }
    }

    pub(crate) fn container(
        entry: impl Into<String>,
        error: impl Into<zip::result::ZipError>,
    ) -> Self {
        Error::ContainerWrite {
            entry: entry.into(),
            error: error.into(),
        }
    }
}
