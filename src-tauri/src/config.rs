//! Predictor settings, stored as `config.json` in the app data directory.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// `model.json` location. `http(s)://` URLs are downloaded, anything else
    /// is read relative to the bundled assets directory.
    pub model_url: String,
    /// Directory name of the persisted classifier under the data dir.
    pub store_key: String,
    /// Pause before returning fallback results, keeps the "calculating"
    /// state visible. Zero disables it.
    pub fallback_delay_ms: u64,
    /// Upper bound for each fetch or store operation.
    pub fetch_timeout_ms: u64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            model_url: "./model.json".to_string(),
            store_key: "ortho-predict-model".to_string(),
            fallback_delay_ms: 400,
            fetch_timeout_ms: 10_000,
        }
    }
}

impl PredictorConfig {
    /// Reads the config at `path`, or the defaults if there is none.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| AppError {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;
        serde_json::from_str(&content).map_err(|e| AppError {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }

    pub fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.fallback_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}
