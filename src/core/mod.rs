//! Core types for cliup
//!
//! This module holds the error taxonomy shared by every other module. The update
//! engine's domain types live next to the operations that use them in
//! [`crate::upgrade`].
//!
//! # Modules
//!
//! ## `error` - Error Handling
//!
//! - [`UpdateError`] - Enumerated failure modes of the update engine
//! - [`ErrorContext`] - User-friendly error wrapper with details and suggestions
//! - [`user_friendly_error`] - Convert any error to user-friendly format

pub mod error;

pub use error::{ErrorContext, UpdateError, user_friendly_error};
