use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LinemarkError;

/// Top-level configuration loaded from `.linemark.toml`.
///
/// # Examples
///
/// ```
/// use linemark_core::LinemarkConfig;
///
/// let config = LinemarkConfig::default();
/// assert_eq!(config.sync.quiet_period_ms, 500);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinemarkConfig {
    /// Line alignment settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Annotation update settings.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Baseline lookup settings.
    #[serde(default)]
    pub git: GitConfig,
}

impl LinemarkConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LinemarkError::Io`] if the file cannot be read, or
    /// [`LinemarkError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use linemark_core::LinemarkConfig;
    /// use std::path::Path;
    ///
    /// let config = LinemarkConfig::from_file(Path::new(".linemark.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, LinemarkError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`LinemarkError::Toml`] if parsing fails, or
    /// [`LinemarkError::Config`] if a value is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use linemark_core::LinemarkConfig;
    ///
    /// let toml = r#"
    /// [sync]
    /// quiet_period_ms = 250
    /// "#;
    /// let config = LinemarkConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.sync.quiet_period_ms, 250);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, LinemarkError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), LinemarkError> {
        if self.sync.quiet_period_ms == 0 {
            return Err(LinemarkError::Config(
                "sync.quiet_period_ms must be greater than zero".into(),
            ));
        }
        if self.engine.max_lines == 0 {
            return Err(LinemarkError::Config(
                "engine.max_lines must be greater than zero".into(),
            ));
        }
        if self.git.baseline_rev.trim().is_empty() {
            return Err(LinemarkError::Config("git.baseline_rev is empty".into()));
        }
        Ok(())
    }
}

/// Line alignment strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffAlgorithm {
    /// Myers' O(ND) shortest edit script.
    #[default]
    Myers,
    /// Patience diff, anchored on unique lines.
    Patience,
}

impl fmt::Display for DiffAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffAlgorithm::Myers => write!(f, "myers"),
            DiffAlgorithm::Patience => write!(f, "patience"),
        }
    }
}

impl FromStr for DiffAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "myers" => Ok(DiffAlgorithm::Myers),
            "patience" => Ok(DiffAlgorithm::Patience),
            other => Err(format!("unknown diff algorithm: {other}")),
        }
    }
}

/// Diff engine configuration.
///
/// # Examples
///
/// ```
/// use linemark_core::{DiffAlgorithm, EngineConfig};
///
/// let config = EngineConfig::default();
/// assert_eq!(config.algorithm, DiffAlgorithm::Myers);
/// assert_eq!(config.max_lines, 200_000);
/// assert!(config.deadline_ms.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Alignment algorithm (default: myers).
    #[serde(default)]
    pub algorithm: DiffAlgorithm,
    /// Inputs with more lines than this are not diffed (default: 200000).
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    /// Optional time budget for the alignment, in milliseconds.
    pub deadline_ms: Option<u64>,
}

fn default_max_lines() -> usize {
    200_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            algorithm: DiffAlgorithm::default(),
            max_lines: default_max_lines(),
            deadline_ms: None,
        }
    }
}

impl EngineConfig {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

/// Annotation synchronization configuration.
///
/// # Examples
///
/// ```
/// use linemark_core::SyncConfig;
/// use std::time::Duration;
///
/// let config = SyncConfig::default();
/// assert_eq!(config.quiet_period(), Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Debounce delay after the last edit before recomputing (default: 500).
    #[serde(default = "default_quiet_period_ms")]
    pub quiet_period_ms: u64,
}

fn default_quiet_period_ms() -> u64 {
    500
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: default_quiet_period_ms(),
        }
    }
}

impl SyncConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }
}

/// Git baseline configuration.
///
/// # Examples
///
/// ```
/// use linemark_core::GitConfig;
///
/// assert_eq!(GitConfig::default().baseline_rev, "HEAD");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Revision whose tree provides baseline content (default: `"HEAD"`).
    #[serde(default = "default_baseline_rev")]
    pub baseline_rev: String,
}

fn default_baseline_rev() -> String {
    "HEAD".into()
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            baseline_rev: default_baseline_rev(),
        }
    }
}
