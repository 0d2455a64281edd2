//! Tuning configuration for the factorization.
//!
//! None of these values affect results beyond rounding; they trade recursion
//! depth, scratch memory and parallel granularity against each other.

use crate::error::{Error, Result};

/// Default column block size of the blocked driver.
pub const DEFAULT_BLOCK_SIZE: usize = 32;

/// Default panel width below which panels are factored column by column.
pub const DEFAULT_PANEL_THRESHOLD: usize = 8;

/// Default number of matrices covered by Level-3 scratch in reduced memory mode.
pub const DEFAULT_REDUCED_CHUNK: usize = 16;

/// How much Level-3 scratch the planner requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryMode {
    /// Scratch for the whole batch, so each trailing update is one pass.
    #[default]
    Optimal,
    /// Scratch for a fixed chunk of matrices, reused across the batch.
    Reduced,
}

impl MemoryMode {
    /// Parse from a string.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "optimal" | "optim" | "full" => Some(Self::Optimal),
            "reduced" | "small" => Some(Self::Reduced),
            _ => None,
        }
    }
}

/// Factorization configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorConfig {
    /// Width of the leading panel split off by the blocked driver.
    pub block_size: usize,
    /// Panels narrower than this are factored unblocked.
    pub panel_threshold: usize,
    /// Level-3 scratch sizing policy.
    pub memory: MemoryMode,
    /// Matrices per scratch chunk in [`MemoryMode::Reduced`].
    pub reduced_chunk: usize,
    /// Minimum matrices handed to one parallel task.
    pub min_items_per_task: usize,
}

impl Default for FactorConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            panel_threshold: DEFAULT_PANEL_THRESHOLD,
            memory: MemoryMode::Optimal,
            reduced_chunk: DEFAULT_REDUCED_CHUNK,
            min_items_per_task: 1,
        }
    }
}

impl FactorConfig {
    /// Set the block size.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set the unblocked panel threshold.
    pub fn with_panel_threshold(mut self, threshold: usize) -> Self {
        self.panel_threshold = threshold;
        self
    }

    /// Set the memory mode.
    pub fn with_memory(mut self, memory: MemoryMode) -> Self {
        self.memory = memory;
        self
    }

    /// Set the reduced-mode chunk length.
    pub fn with_reduced_chunk(mut self, chunk: usize) -> Self {
        self.reduced_chunk = chunk;
        self
    }

    /// Set the minimum matrices per parallel task.
    pub fn with_min_items_per_task(mut self, items: usize) -> Self {
        self.min_items_per_task = items;
        self
    }

    /// Reject values the algorithm cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::InvalidValue("block_size must be positive".into()));
        }
        if self.panel_threshold == 0 {
            return Err(Error::InvalidValue(
                "panel_threshold must be positive".into(),
            ));
        }
        if self.memory == MemoryMode::Reduced && self.reduced_chunk == 0 {
            return Err(Error::InvalidValue(
                "reduced_chunk must be positive in reduced memory mode".into(),
            ));
        }
        if self.min_items_per_task == 0 {
            return Err(Error::InvalidValue(
                "min_items_per_task must be positive".into(),
            ));
        }
        Ok(())
    }

    /// True when an `m x n` problem goes through the blocked driver.
    pub fn uses_blocking(&self, m: usize, n: usize) -> bool {
        m.min(n) > self.block_size
    }

    /// Matrices covered by one Level-3 scratch chunk.
    pub fn scratch_chunk(&self, batch_count: usize) -> usize {
        match self.memory {
            MemoryMode::Optimal => batch_count,
            MemoryMode::Reduced => self.reduced_chunk.min(batch_count),
        }
    }

    /// Get a human-readable description of the dispatch decision for a shape.
    pub fn describe(&self, m: usize, n: usize) -> String {
        if self.uses_blocking(m, n) {
            format!(
                "blocked (nb={}, panel<{}) with {:?} memory",
                self.block_size, self.panel_threshold, self.memory
            )
        } else {
            "unblocked".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = FactorConfig::default();
        assert_eq!(config.block_size, 32);
        assert_eq!(config.panel_threshold, 8);
        assert_eq!(config.memory, MemoryMode::Optimal);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_block_size() {
        let config = FactorConfig::default().with_block_size(0);
        assert!(matches!(config.validate(), Err(Error::InvalidValue(_))));
    }

    #[test]
    fn scratch_chunk_by_mode() {
        let optimal = FactorConfig::default();
        assert_eq!(optimal.scratch_chunk(100), 100);

        let reduced = FactorConfig::default()
            .with_memory(MemoryMode::Reduced)
            .with_reduced_chunk(8);
        assert_eq!(reduced.scratch_chunk(100), 8);
        assert_eq!(reduced.scratch_chunk(3), 3);
    }

    #[test]
    fn describe_output() {
        let config = FactorConfig::default().with_block_size(16);
        assert_eq!(config.describe(16, 100), "unblocked");
        assert_eq!(
            config.describe(64, 64),
            "blocked (nb=16, panel<8) with Optimal memory"
        );
    }

    #[test]
    fn memory_mode_from_name() {
        assert_eq!(MemoryMode::from_name("Optimal"), Some(MemoryMode::Optimal));
        assert_eq!(MemoryMode::from_name("reduced"), Some(MemoryMode::Reduced));
        assert_eq!(MemoryMode::from_name("invalid"), None);
    }
}
