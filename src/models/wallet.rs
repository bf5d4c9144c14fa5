//! Monitored wallet model.

use serde::{Deserialize, Serialize};

/// A wallet whose swaps the bot mirrors.
///
/// Loaded once at startup and owned by the orchestrator for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredWallet {
    /// Human-readable label used in logs and CLI output
    pub tag: String,

    /// Solana account address (base58)
    pub address: String,
}

impl MonitoredWallet {
    pub fn new(tag: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            address: address.into(),
        }
    }
}

impl std::fmt::Display for MonitoredWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.tag, self.address)
    }
}
