//! Ledger configuration options.

/// Ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Maximum number of audit events to retain in memory.
    pub max_events: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
        }
    }
}
