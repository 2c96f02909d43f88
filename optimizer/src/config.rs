// config.rs — Sensor ranges, analysis limits and pipeline options
//
// The sensor file maps physical-quantity identifiers to declared bounds:
//
//   { "sensors": [ { "identifier": "Speed", "lower": 0.0, "upper": 120.0 } ] }
//
// Preconditions: none.
// Postconditions: a validated `SensorConfig` has finite, ordered, uniquely
//   named entries.
// Failure modes: unreadable or malformed files and invalid entries produce
//   `ConfigError`.
// Side effects: `SensorConfig::load` reads a file.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::bounds::SeedTable;
use crate::interval::Interval;
use crate::pass::PassId;

// ── Sensor configuration ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub identifier: String,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(default)]
    pub sensors: Vec<Sensor>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Json {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
    InvalidSensor {
        identifier: String,
        message: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            ConfigError::Json {
                path: Some(path),
                source,
            } => write!(f, "{}: {}", path.display(), source),
            ConfigError::Json { path: None, source } => write!(f, "{}", source),
            ConfigError::InvalidSensor {
                identifier,
                message,
            } => write!(f, "sensor '{}': {}", identifier, message),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Json { source, .. } => Some(source),
            ConfigError::InvalidSensor { .. } => None,
        }
    }
}

impl SensorConfig {
    /// Read and validate a sensor file.
    pub fn load(path: &Path) -> Result<SensorConfig, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SensorConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Json {
                path: Some(path.to_path_buf()),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<SensorConfig, ConfigError> {
        let config: SensorConfig =
            serde_json::from_str(text).map_err(|source| ConfigError::Json { path: None, source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for s in &self.sensors {
            let invalid = |message: &str| ConfigError::InvalidSensor {
                identifier: s.identifier.clone(),
                message: message.to_string(),
            };
            if s.identifier.is_empty() {
                return Err(invalid("empty identifier"));
            }
            if !s.lower.is_finite() || !s.upper.is_finite() {
                return Err(invalid("bounds must be finite"));
            }
            if s.lower > s.upper {
                return Err(invalid("lower bound exceeds upper bound"));
            }
            if !seen.insert(s.identifier.as_str()) {
                return Err(invalid("declared more than once"));
            }
        }
        Ok(())
    }

    pub fn seed_table(&self) -> SeedTable {
        self.sensors
            .iter()
            .map(|s| (s.identifier.clone(), Interval::ordered(s.lower, s.upper)))
            .collect()
    }

    /// Canonical compact JSON, used for the provenance fingerprint.
    pub fn canonical_json(&self) -> String {
        let mut sorted = self.clone();
        sorted
            .sensors
            .sort_by(|a, b| a.identifier.cmp(&b.identifier));
        serde_json::to_string(&sorted).unwrap_or_default()
    }
}

// ── Analysis limits ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisLimits {
    /// Deepest chain of nested call-site analyses.
    pub max_call_depth: usize,
    /// Instruction visits across one analysis run, callees included.
    pub max_visits: usize,
}

impl Default for AnalysisLimits {
    fn default() -> Self {
        AnalysisLimits {
            max_call_depth: 32,
            max_visits: 1_000_000,
        }
    }
}

// ── Pipeline options ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Passes to run; dependencies are added automatically.
    pub passes: Vec<PassId>,
    /// Output file suffix: `<stem>_<suffix>.<ext>`.
    pub suffix: String,
    pub limits: AnalysisLimits,
    pub verbose: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            passes: crate::pass::ALL_PASSES.to_vec(),
            suffix: "opt".to_string(),
            limits: AnalysisLimits::default(),
            verbose: false,
        }
    }
}
