//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the acquisition pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Upper bound on concurrent pipelines. The effective bound is also
    /// capped by the machine's available parallelism.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

fn default_max_workers() -> usize {
    10
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
        }
    }
}

impl AcquisitionConfig {
    /// `min(max_workers, available_parallelism)`, at least 1.
    pub fn pool_bound(&self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.max_workers.min(cores).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AcquisitionConfig::default();
        assert_eq!(config.max_workers, 10);
        assert!(config.pool_bound() >= 1);
        assert!(config.pool_bound() <= 10);
    }

    #[test]
    fn test_pool_bound_never_exceeds_cap() {
        let config = AcquisitionConfig { max_workers: 1 };
        assert_eq!(config.pool_bound(), 1);

        let config = AcquisitionConfig { max_workers: 0 };
        assert_eq!(config.pool_bound(), 1);
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: AcquisitionConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_workers, 10);
    }
}
