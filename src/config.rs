//! Core configuration

use crate::constants::*;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables of the ledger core. Missing fields take protocol defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Nominal block size limit in bytes
    pub block_size_limit: usize,
    /// Bytes kept free below the limit for the header and miscellany
    pub block_reserved_overhead: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            block_size_limit: BLOCK_SIZE_LIMIT,
            block_reserved_overhead: BLOCK_RESERVED_OVERHEAD,
        }
    }
}

impl CoreConfig {
    /// Bytes available to transactions in a block.
    pub fn transaction_budget(&self) -> usize {
        self.block_size_limit.saturating_sub(self.block_reserved_overhead)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.block_reserved_overhead >= self.block_size_limit {
            bail!(
                "block_reserved_overhead ({}) must be below block_size_limit ({})",
                self.block_reserved_overhead,
                self.block_size_limit
            );
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: CoreConfig = serde_json::from_str(json).context("parsing core config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading core config {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("loading core config {}", path.display()))
    }
}
