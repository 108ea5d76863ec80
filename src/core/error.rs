//! Error handling for cliup
//!
//! This module provides the typed error taxonomy of the update engine and the
//! user-facing rendering of failures. The error system follows two principles:
//! 1. **Strongly-typed errors** so callers can branch on what went wrong
//! 2. **User-friendly messages** with details and suggestions for CLI users
//!
//! # Architecture
//!
//! - [`UpdateError`] - Enumerated failure modes of the update engine
//! - [`ErrorContext`] - Wrapper that adds details and a suggestion for display
//! - [`user_friendly_error`] - Converts any [`anyhow::Error`] into an [`ErrorContext`]
//!
//! # Error Categories
//!
//! - **Extraction**: [`UpdateError::UnsupportedEntry`], [`UpdateError::ExtractionFailed`]
//! - **Version resolution**: [`UpdateError::VersionNotFound`], [`UpdateError::InvalidVersion`]
//! - **Transport**: [`UpdateError::TransportFailure`]
//! - **File system**: [`UpdateError::FilesystemConflict`], [`UpdateError::FileSystemError`]
//! - **Configuration**: [`UpdateError::ConfigError`], [`UpdateError::TomlError`]
//!
//! Core-path failures (extraction, version resolution, download) propagate to
//! the top of the orchestrator. Best-effort cleanup failures never become an
//! [`UpdateError`]; they are reported through
//! [`Diagnostics`](crate::upgrade::diagnostics::Diagnostics) instead.
//!
//! # Examples
//!
//! ```rust,no_run
//! use cliup::core::{UpdateError, user_friendly_error};
//!
//! let error = UpdateError::VersionNotFound {
//!     version: "9.9.9".to_string(),
//!     available: vec!["3.1.0".to_string(), "3.2.0".to_string()],
//! };
//!
//! let context = user_friendly_error(anyhow::Error::from(error));
//! context.display(); // Shows colored error with suggestions
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for update operations
///
/// Each variant names the failing step and carries enough context (paths,
/// versions, reasons) to render a descriptive message without consulting the
/// error chain.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// The archive contains an entry type the extractor refuses to unpack
    ///
    /// Only directories and regular files are installed; symlinks are skipped.
    /// Anything else (hard links, devices, FIFOs) aborts extraction before the
    /// destination is touched.
    #[error("Unsupported archive entry '{path}' of type {entry_type}")]
    UnsupportedEntry {
        /// Path of the entry inside the archive
        path: String,
        /// Human-readable entry type (e.g. "Link", "Fifo")
        entry_type: String,
    },

    /// Extraction failed for a reason other than an unsupported entry
    #[error("Failed to extract archive into {destination}: {reason}")]
    ExtractionFailed {
        /// The destination directory that was being installed
        destination: String,
        /// What went wrong
        reason: String,
    },

    /// The requested version is absent from the version index
    ///
    /// The message lists every indexed version so the user can pick a valid one.
    #[error("{version} not found in index:\n{}", available.join(", "))]
    VersionNotFound {
        /// The version that was requested
        version: String,
        /// Every version present in the index
        available: Vec<String>,
    },

    /// The requested version cannot name a version directory
    ///
    /// Versions become a single path component under the client root and are
    /// written into the launcher shims, so reserved names, hidden names, path
    /// separators and shell-sensitive characters are refused.
    #[error("'{version}' is not a valid version: {reason}")]
    InvalidVersion {
        /// The rejected version string
        version: String,
        /// Why it was rejected
        reason: String,
    },

    /// A network call to a release endpoint failed
    #[error("Network error during {operation}: {reason}")]
    TransportFailure {
        /// The operation being performed (e.g. "fetch version index")
        operation: String,
        /// The transport or HTTP status failure
        reason: String,
    },

    /// A path that must be a directory exists as something else
    #[error("{path} exists but is not a directory")]
    FilesystemConflict {
        /// The conflicting path
        path: String,
    },

    /// File system operation failed
    #[error("File system error: {operation}")]
    FileSystemError {
        /// The operation that failed (e.g. "write shim")
        operation: String,
        /// The path involved
        path: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl UpdateError {
    /// Shorthand for a [`UpdateError::TransportFailure`].
    pub fn transport(operation: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::TransportFailure {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a [`UpdateError::ExtractionFailed`].
    pub fn extraction(destination: &std::path::Path, reason: impl fmt::Display) -> Self {
        Self::ExtractionFailed {
            destination: destination.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Error context wrapper that pairs an [`UpdateError`] with display hints
///
/// The CLI renders the error in red, details in yellow and the suggestion in
/// green.
///
/// ```rust,no_run
/// use cliup::core::{ErrorContext, UpdateError};
///
/// let context = ErrorContext::new(UpdateError::FilesystemConflict {
///     path: "/home/me/.local/share/cliup/client".to_string(),
/// })
/// .with_suggestion("Remove the file so the client directory can be created");
/// context.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: UpdateError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: UpdateError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error context to stderr with terminal colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into a user-friendly [`ErrorContext`]
///
/// Known [`UpdateError`] variants anywhere in the chain get tailored
/// suggestions. Other errors keep their full cause chain in the message so the
/// failing step stays visible.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(update_error) = error.chain().find_map(|e| e.downcast_ref::<UpdateError>()) {
        if let Some(context) = create_error_context(update_error) {
            return context;
        }
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>()
        && io_error.kind() == std::io::ErrorKind::PermissionDenied
    {
        return ErrorContext::new(UpdateError::FileSystemError {
            operation: "file access".to_string(),
            path: "unknown".to_string(),
        })
        .with_suggestion(
            "Check ownership of the client directory or rerun as the user who installed it",
        )
        .with_details("The updater could not read or write one of its directories");
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(UpdateError::Other { message })
}

/// Map typed errors to contexts with suggestions.
///
/// Returns `None` for variants without a tailored message so the caller falls
/// back to the generic rendering with the full chain.
fn create_error_context(error: &UpdateError) -> Option<ErrorContext> {
    let context = match error {
        UpdateError::VersionNotFound { version, available } => {
            ErrorContext::new(UpdateError::VersionNotFound {
                version: version.clone(),
                available: available.clone(),
            })
            .with_suggestion("Pick one of the listed versions, or run 'cliup update --available'")
        }
        UpdateError::UnsupportedEntry { path, entry_type } => {
            ErrorContext::new(UpdateError::UnsupportedEntry {
                path: path.clone(),
                entry_type: entry_type.clone(),
            })
            .with_details(
                "Only directories, regular files and symlinks may appear in a release archive",
            )
            .with_suggestion("The release archive is malformed; report it to the publisher")
        }
        UpdateError::ExtractionFailed { destination, reason } => {
            ErrorContext::new(UpdateError::ExtractionFailed {
                destination: destination.clone(),
                reason: reason.clone(),
            })
            .with_details("The previously active version is unchanged")
            .with_suggestion("Retry the update; use --force to reinstall from scratch")
        }
        UpdateError::InvalidVersion { version, reason } => {
            ErrorContext::new(UpdateError::InvalidVersion {
                version: version.clone(),
                reason: reason.clone(),
            })
            .with_suggestion(
                "Pass a release version such as 3.2.0, or run 'cliup update --available'",
            )
        }
        UpdateError::TransportFailure { operation, reason } => {
            ErrorContext::new(UpdateError::TransportFailure {
                operation: operation.clone(),
                reason: reason.clone(),
            })
            .with_suggestion("Check your network connection and the configured release URLs")
        }
        UpdateError::FilesystemConflict { path } => {
            ErrorContext::new(UpdateError::FilesystemConflict { path: path.clone() })
                .with_suggestion("Move the file out of the way so the directory can be created")
        }
        UpdateError::ConfigError { message } => {
            ErrorContext::new(UpdateError::ConfigError { message: message.clone() })
                .with_suggestion("Check ~/.cliup/config.toml or the file passed with --config")
        }
        _ => return None,
    };
    Some(context)
}
