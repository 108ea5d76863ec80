//! Host extension points around activation.
//!
//! The orchestrator calls [`UpdateHooks::preupdate`] right before a version is
//! installed or switched to, and [`UpdateHooks::update`] right after the shim
//! points at it. The engine does not look at what the hooks do; an error from
//! either one aborts the update like any other core-path failure.

use anyhow::Result;
use async_trait::async_trait;

/// What is about to happen, passed to both hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookContext {
    /// Version active before the update.
    pub from_version: String,
    /// Version being activated.
    pub to_version: String,
    /// Channel the update follows.
    pub channel: String,
}

#[async_trait]
pub trait UpdateHooks: Send + Sync {
    async fn preupdate(&self, context: &HookContext) -> Result<()>;

    async fn update(&self, context: &HookContext) -> Result<()>;
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

#[async_trait]
impl UpdateHooks for NoopHooks {
    async fn preupdate(&self, _context: &HookContext) -> Result<()> {
        Ok(())
    }

    async fn update(&self, _context: &HookContext) -> Result<()> {
        Ok(())
    }
}
