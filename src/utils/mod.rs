//! Cross-platform utilities
//!
//! - [`fs`] - Atomic writes, directory helpers and modification-time handling
//! - [`progress`] - Progress bars and spinners for downloads

pub mod fs;
pub mod progress;

pub use fs::{atomic_write, ensure_dir};
pub use progress::ProgressBar;
