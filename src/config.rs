//! Persistent processing configuration
//!
//! Stores buffer capacity, filter coefficients, and pipeline queue depths
//! in a JSON file. Every field falls back to its default when missing so
//! old config files keep loading across versions.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::stream::filter::{EMG_FILTER_ALPHA, IMU_FILTER_ALPHA};

fn default_buffer_capacity() -> usize {
    crate::DEFAULT_BUFFER_CAPACITY
}

fn default_emg_alpha() -> f64 {
    EMG_FILTER_ALPHA
}

fn default_imu_alpha() -> f64 {
    IMU_FILTER_ALPHA
}

fn default_queue_depth() -> usize {
    256
}

fn default_frame_tap_depth() -> usize {
    256
}

/// Stream processor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Per-channel history depth in samples
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// EMG low-pass coefficient
    #[serde(default = "default_emg_alpha")]
    pub emg_alpha: f64,
    /// IMU low-pass coefficient
    #[serde(default = "default_imu_alpha")]
    pub imu_alpha: f64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            emg_alpha: default_emg_alpha(),
            imu_alpha: default_imu_alpha(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Processor settings
    #[serde(default)]
    pub processor: ProcessorConfig,
    /// Sample handoff queue depth; a full queue blocks the producer rather
    /// than dropping samples, which would corrupt the loss statistics
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    /// Frame tap queue depth; a full tap drops frames for the lagging
    /// presentation consumer only, processor state is unaffected
    #[serde(default = "default_frame_tap_depth")]
    pub frame_tap_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            processor: ProcessorConfig::default(),
            queue_depth: default_queue_depth(),
            frame_tap_depth: default_frame_tap_depth(),
        }
    }
}

impl PipelineConfig {
    /// Load config from disk, falling back to defaults on any error
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded config from disk");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }
}
