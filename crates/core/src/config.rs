//! Model configuration.

use crate::{duty::DEFAULT_DUTY, prescaler::PrescalerPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
#[must_use]
pub enum Error {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
#[serde(default)] // Ensures new fields don't break existing configurations
pub struct Config {
    /// Duty value every register takes at reset.
    pub default_duty: u8,
    pub prescaler_policy: PrescalerPolicy,
    /// Clock period used as the waveform timescale.
    pub clock_period_ns: u64,
    /// Samples kept by the trace ring buffer.
    pub trace_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_duty: DEFAULT_DUTY,
            prescaler_policy: PrescalerPolicy::FreeRunning,
            // 100 kHz reference clock
            clock_period_ns: 10_000,
            trace_capacity: 4096,
        }
    }
}

impl Config {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text).map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(?path, "loaded config");
        Ok(config)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
