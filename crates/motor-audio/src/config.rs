use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_INITIAL_PRELOAD: usize = 44_100;
const DEFAULT_UPDATE_PRELOAD: usize = 8_000;
const DEFAULT_OUTPUT_RATE: u32 = 44_100;

/// Audio engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Listener gain (0.0 - 1.0).
    pub master_volume: f32,
    /// Samples decoded into each stream buffer when a stream is (re)armed.
    pub initial_preload_samples: usize,
    /// Samples decoded per stream on every pump.
    pub update_preload_samples: usize,
    /// Mixer output rate of the software backend.
    pub output_sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            master_volume: 1.0,
            initial_preload_samples: DEFAULT_INITIAL_PRELOAD,
            update_preload_samples: DEFAULT_UPDATE_PRELOAD,
            output_sample_rate: DEFAULT_OUTPUT_RATE,
        }
    }
}

impl AudioConfig {
    /// Loads config from a specified path.
    /// Returns default config if file doesn't exist.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    /// Saves config to a specified path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Copy with the volume clamped and zero sizes replaced by defaults.
    pub fn sanitized(&self) -> Self {
        let nonzero = |value: usize, default: usize| if value == 0 { default } else { value };
        Self {
            master_volume: clamp_volume(self.master_volume),
            initial_preload_samples: nonzero(self.initial_preload_samples, DEFAULT_INITIAL_PRELOAD),
            update_preload_samples: nonzero(self.update_preload_samples, DEFAULT_UPDATE_PRELOAD),
            output_sample_rate: if self.output_sample_rate == 0 {
                DEFAULT_OUTPUT_RATE
            } else {
                self.output_sample_rate
            },
        }
    }
}

/// Clamp a gain to `[0, 1]`; NaN becomes silence.
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}
