//! Compute handle: backend, configuration, attached workspace and the
//! device-memory size query mode.

use crate::backend::Level3Backend;
use crate::config::FactorConfig;
use crate::error::{Error, Result};
use crate::workspace::{Workspace, WorkspaceSizes};

/// Context every factorization call is issued on.
///
/// Calls borrow the handle mutably, so one workspace is never shared by two
/// calls in flight.
pub struct Handle<B: Level3Backend> {
    backend: B,
    config: FactorConfig,
    workspace: Option<Workspace>,
    query: Option<usize>,
}

impl<B: Level3Backend> Handle<B> {
    /// Create a handle with the default configuration.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, FactorConfig::default())
    }

    /// Create with custom configuration.
    pub fn with_config(mut backend: B, config: FactorConfig) -> Self {
        backend.set_min_items_per_task(config.min_items_per_task);
        log::info!(
            "Created handle on {} backend (nb={}, {:?} memory)",
            backend.backend_type(),
            config.block_size,
            config.memory
        );
        Self {
            backend,
            config,
            workspace: None,
            query: None,
        }
    }

    /// Get the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Get the configuration.
    pub fn config(&self) -> &FactorConfig {
        &self.config
    }

    /// Replace the configuration. Plans depend on it, so re-query afterwards.
    pub fn set_config(&mut self, config: FactorConfig) {
        self.backend
            .set_min_items_per_task(config.min_items_per_task);
        self.config = config;
    }

    /// Attach a caller-allocated workspace, returning the previous one.
    pub fn set_workspace(&mut self, workspace: Workspace) -> Option<Workspace> {
        self.workspace.replace(workspace)
    }

    /// Detach the workspace.
    pub fn take_workspace(&mut self) -> Option<Workspace> {
        self.workspace.take()
    }

    /// Bytes available in the attached workspace.
    pub fn workspace_bytes(&self) -> usize {
        self.workspace
            .as_ref()
            .map_or(0, Workspace::capacity_bytes)
    }

    /// Fail with `InvalidHandle` when the backend cannot accept work.
    pub fn check(&self) -> Result<()> {
        if !self.backend.is_available() {
            return Err(Error::InvalidHandle(format!(
                "{} backend is not available",
                self.backend.backend_type()
            )));
        }
        Ok(())
    }

    /// Enter size-query mode: subsequent calls only report their workspace needs.
    pub fn start_device_memory_size_query(&mut self) {
        log::debug!("Starting device memory size query");
        self.query = Some(0);
    }

    /// Whether the handle is in size-query mode.
    pub fn is_device_memory_size_query(&self) -> bool {
        self.query.is_some()
    }

    /// Record a plan seen in query mode; the query reports the largest one.
    pub fn record_size_query(&mut self, sizes: &WorkspaceSizes) {
        if let Some(max) = self.query.as_mut() {
            *max = (*max).max(sizes.total_bytes());
        }
    }

    /// Leave size-query mode, returning the bytes a workspace must hold to run
    /// every call issued while querying.
    pub fn stop_device_memory_size_query(&mut self) -> Result<usize> {
        let bytes = self.query.take().ok_or_else(|| {
            Error::InvalidValue("no device memory size query in progress".into())
        })?;
        log::debug!("Device memory size query: {} bytes", bytes);
        Ok(bytes)
    }

    /// Borrow the backend, configuration and workspace together for one call.
    pub fn parts_mut(&mut self) -> (&B, &FactorConfig, Option<&mut Workspace>) {
        (&self.backend, &self.config, self.workspace.as_mut())
    }
}
