// PairVM Configuration
// Fixed machine sizes and collector pacing, loadable from JSON

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_STACK_CAPACITY: usize = 1024;
pub const DEFAULT_MEMORY_SIZE: usize = 1024;
pub const DEFAULT_RETURN_STACK_CAPACITY: usize = 1024;
pub const DEFAULT_INITIAL_THRESHOLD: usize = 100;
pub const DEFAULT_THRESHOLD_FLOOR: usize = 100;
pub const DEFAULT_THRESHOLD_GROWTH: usize = 2;

/// Machine and collector settings.
///
/// After every collection the next trigger point becomes
/// `live * threshold_growth + threshold_floor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    pub stack_capacity: usize,
    pub memory_size: usize,
    pub return_stack_capacity: usize,
    pub initial_threshold: usize,
    pub threshold_floor: usize,
    pub threshold_growth: usize,
    /// Hard cap on live objects; allocating past it is fatal
    pub max_objects: Option<usize>,
    /// Print a `[GC]` line to stderr after each collection
    pub gc_stats: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_capacity: DEFAULT_STACK_CAPACITY,
            memory_size: DEFAULT_MEMORY_SIZE,
            return_stack_capacity: DEFAULT_RETURN_STACK_CAPACITY,
            initial_threshold: DEFAULT_INITIAL_THRESHOLD,
            threshold_floor: DEFAULT_THRESHOLD_FLOOR,
            threshold_growth: DEFAULT_THRESHOLD_GROWTH,
            max_objects: None,
            gc_stats: false,
        }
    }
}

impl VmConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: VmConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sizes = [
            ("stack_capacity", self.stack_capacity),
            ("memory_size", self.memory_size),
            ("return_stack_capacity", self.return_stack_capacity),
        ];
        for (name, size) in sizes {
            if size == 0 {
                return Err(ConfigError::Invalid(format!("{} must be non-zero", name)));
            }
        }
        if self.max_objects == Some(0) {
            return Err(ConfigError::Invalid("max_objects must be non-zero".to_string()));
        }
        Ok(())
    }
}
