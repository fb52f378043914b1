//! Engine configuration.
//!
//! Every knob has a default, so an empty TOML document is a valid
//! configuration. Unknown keys are rejected.
//!
//! ```toml
//! timeout_ms = 30000
//!
//! [thresholds]
//! sequential_max = 4096
//! static_max = 262144
//! hybrid_max = 16777216
//!
//! [batch]
//! min_size = 64
//! max_size = 65536
//! per_worker = 16
//!
//! [queue]
//! depth = 8
//! aggregation = 4
//! poll_interval_ms = 20
//!
//! [hybrid]
//! static_fraction = 0.75
//! ```
//!
//! The mode thresholds were tuned for one workload. Recalibrate them for the
//! target hardware rather than treating the defaults as fixed.

use core::time::Duration;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// =============================================================================
// Sections
// =============================================================================

/// Problem-size cutoffs for automatic mode selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Thresholds {
    /// `N <= sequential_max` runs on the calling thread.
    pub sequential_max: u64,
    /// `N <= static_max` uses static chunks.
    pub static_max: u64,
    /// `N <= hybrid_max` uses hybrid stealing; larger spaces stream batches.
    pub hybrid_max: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            sequential_max: 4_096,
            static_max: 262_144,
            hybrid_max: 16_777_216,
        }
    }
}

/// Batch sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Smallest batch the selector will choose.
    pub min_size: u64,
    /// Largest batch the selector will choose.
    pub max_size: u64,
    /// Target number of batches per worker.
    pub per_worker: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            min_size: 64,
            max_size: 65_536,
            per_worker: 16,
        }
    }
}

/// Bounded queue behaviour for dynamic and hybrid modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    /// Maximum messages held by one queue. The producer blocks when full.
    pub depth: usize,
    /// Batches grouped into one queue message in dynamic mode.
    pub aggregation: usize,
    /// How long a blocked worker or producer waits before re-checking
    /// cancellation.
    pub poll_interval_ms: u64,
}

impl QueueConfig {
    /// Poll interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            depth: 8,
            aggregation: 4,
            poll_interval_ms: 20,
        }
    }
}

/// Hybrid mode split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HybridConfig {
    /// Share of `[0, N)` assigned as static chunks; the rest is streamed
    /// into per-worker queues and stolen.
    pub static_fraction: f64,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            static_fraction: 0.75,
        }
    }
}

// =============================================================================
// Engine configuration
// =============================================================================

/// Tunables shared by every enumeration an [`crate::Engine`] runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Mode selection cutoffs.
    pub thresholds: Thresholds,
    /// Batch sizing.
    pub batch: BatchConfig,
    /// Queue bounds and polling.
    pub queue: QueueConfig,
    /// Hybrid split.
    pub hybrid: HybridConfig,
    /// Parallel-phase deadline used when a request sets none.
    pub timeout_ms: Option<u64>,
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys, and
    /// any error from [`EngineConfig::validate`].
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`EngineConfig::from_toml_str`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        if t.sequential_max > t.static_max || t.static_max > t.hybrid_max {
            return Err(ConfigError::Thresholds {
                sequential_max: t.sequential_max,
                static_max: t.static_max,
                hybrid_max: t.hybrid_max,
            });
        }
        if self.batch.min_size == 0 || self.batch.per_worker == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.batch.min_size > self.batch.max_size {
            return Err(ConfigError::BatchBounds {
                min: self.batch.min_size,
                max: self.batch.max_size,
            });
        }
        if self.queue.depth == 0 {
            return Err(ConfigError::ZeroQueueDepth);
        }
        if self.queue.aggregation == 0 {
            return Err(ConfigError::ZeroAggregation);
        }
        if self.queue.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        let fraction = self.hybrid.static_fraction;
        if !(0.0..=1.0).contains(&fraction) {
            return Err(ConfigError::StaticFraction(fraction));
        }
        Ok(())
    }

    /// Default deadline as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.queue.depth, 8);
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = EngineConfig::from_toml_str(
            "timeout_ms = 250\n[queue]\ndepth = 2\n[hybrid]\nstatic_fraction = 0.5\n",
        )
        .unwrap();
        assert_eq!(config.queue.depth, 2);
        assert_eq!(config.queue.aggregation, 4);
        assert_eq!(config.hybrid.static_fraction, 0.5);
        assert_eq!(config.timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = EngineConfig::from_toml_str("[queue]\nlength = 4\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = EngineConfig::from_toml_str("[queue]\ndepth = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroQueueDepth));

        let err = EngineConfig::from_toml_str("[queue]\npoll_interval_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroPollInterval));

        let err = EngineConfig::from_toml_str("[hybrid]\nstatic_fraction = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::StaticFraction(f) if f == 1.5));

        let err = EngineConfig::from_toml_str("[thresholds]\nstatic_max = 10\n").unwrap_err();
        assert!(matches!(err, ConfigError::Thresholds { .. }));

        let err = EngineConfig::from_toml_str("[batch]\nmin_size = 100\nmax_size = 10\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::BatchBounds { min: 100, max: 10 }));
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::from_path("/nonexistent/orbit.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
