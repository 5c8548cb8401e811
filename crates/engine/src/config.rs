//! Validation configuration via `shacl.toml`
//!
//! Every key is optional; a missing key takes its default. The store reads the
//! configuration once when it is created.

use serde::{Deserialize, Serialize};
use shaclstore_core::{Error, IsolationLevel, Result};
use shaclstore_shacl::ResultLimits;
use std::path::Path;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "shacl.toml";

/// Validation configuration loaded from `shacl.toml`.
///
/// # Example
///
/// ```toml
/// validation_enabled = true
/// serializable_validation = true
/// validation_results_limit_per_constraint = 1000
/// default_isolation = "snapshot"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaclConfig {
    /// Validate transactions at all
    #[serde(default = "default_true")]
    pub validation_enabled: bool,
    /// Run shape plans on the worker pool
    #[serde(default = "default_true")]
    pub parallel_validation: bool,
    /// Memoize identical select reads within a pass
    #[serde(default = "default_true")]
    pub cache_select_nodes: bool,
    /// Apply RDFS subclass reasoning during validation
    #[serde(default = "default_true")]
    pub rdfs_subclass_reasoning: bool,
    /// Escalate validation under `snapshot` isolation
    #[serde(default = "default_true")]
    pub serializable_validation: bool,
    /// Log elapsed times
    #[serde(default)]
    pub performance_logging: bool,
    /// Log plan trees
    #[serde(default)]
    pub log_validation_plans: bool,
    /// Log each violation
    #[serde(default)]
    pub log_validation_violations: bool,
    /// Maximum results per report; negative means unbounded
    #[serde(default = "default_limit_total")]
    pub validation_results_limit_total: i64,
    /// Maximum results per constraint; negative falls back to the total
    #[serde(default = "default_limit_per_constraint")]
    pub validation_results_limit_per_constraint: i64,
    /// Diff size above which a transaction switches to bulk validation
    #[serde(default = "default_transactional_limit")]
    pub transactional_validation_limit: usize,
    /// Isolation level used by `begin()`
    #[serde(default = "default_isolation_str")]
    pub default_isolation: String,
    /// Worker pool size; defaults to the available parallelism
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_threads: Option<usize>,
}

fn default_true() -> bool {
    true
}

fn default_limit_total() -> i64 {
    1_000_000
}

fn default_limit_per_constraint() -> i64 {
    1_000
}

fn default_transactional_limit() -> usize {
    500_000
}

fn default_isolation_str() -> String {
    IsolationLevel::SnapshotRead.as_str().to_string()
}

impl Default for ShaclConfig {
    fn default() -> Self {
        Self {
            validation_enabled: true,
            parallel_validation: true,
            cache_select_nodes: true,
            rdfs_subclass_reasoning: true,
            serializable_validation: true,
            performance_logging: false,
            log_validation_plans: false,
            log_validation_violations: false,
            validation_results_limit_total: default_limit_total(),
            validation_results_limit_per_constraint: default_limit_per_constraint(),
            transactional_validation_limit: default_transactional_limit(),
            default_isolation: default_isolation_str(),
            worker_threads: None,
        }
    }
}

impl ShaclConfig {
    /// Parse `default_isolation`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unknown level name.
    pub fn isolation_level(&self) -> Result<IsolationLevel> {
        self.default_isolation.parse().map_err(|_| {
            Error::Config(format!(
                "Invalid default_isolation '{}' in {}. Expected one of \"none\", \"read-committed\", \
                 \"snapshot-read\", \"snapshot\", \"serializable\".",
                self.default_isolation, CONFIG_FILE_NAME
            ))
        })
    }

    /// Effective result limits
    pub fn result_limits(&self) -> ResultLimits {
        ResultLimits::from_signed(
            self.validation_results_limit_total,
            self.validation_results_limit_per_constraint,
        )
    }

    /// Worker pool size
    pub fn worker_count(&self) -> usize {
        self.worker_threads
            .filter(|n| *n > 0)
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
    }

    /// Reject values the store cannot run with
    pub fn validate(&self) -> Result<()> {
        self.isolation_level()?;
        if self.worker_threads == Some(0) {
            return Err(Error::Config("worker_threads must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# shaclstore validation configuration

# Validate transactions against the shapes graph (default: true)
validation_enabled = true

# Run shape plans on the validation worker pool (default: true)
parallel_validation = true

# Memoize identical select reads within one validation pass (default: true)
cache_select_nodes = true

# Treat instances of subclasses as instances of the class (default: true)
rdfs_subclass_reasoning = true

# Under "snapshot" isolation, validate under the store's exclusive lock
# against the latest committed state (default: true)
serializable_validation = true

# Logging (default: false)
performance_logging = false
log_validation_plans = false
log_validation_violations = false

# Result limits. A negative total means unbounded; a negative per-constraint
# limit falls back to the total.
validation_results_limit_total = 1000000
validation_results_limit_per_constraint = 1000

# Diff size above which a transaction switches to bulk validation
transactional_validation_limit = 500000

# Isolation level for begin(): "none", "read-committed", "snapshot-read",
# "snapshot" or "serializable"
default_isolation = "snapshot-read"

# Worker pool size (default: available parallelism)
# worker_threads = 4
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: ShaclConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
