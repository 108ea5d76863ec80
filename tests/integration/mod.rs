//! Integration test suite for cliup
//!
//! End-to-end tests that drive the public API against temporary client roots,
//! an in-memory release source, a local HTTP server, and the compiled binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **extractor**: streamed archive installation and failure atomicity
//! - **update_flow**: the update state machine over a fake release source
//! - **http_source**: the reqwest release source against a wiremock server
//! - **cli**: the `cliup` binary

mod cli;
mod extractor;
mod http_source;
mod update_flow;
