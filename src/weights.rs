//! User transition preference weights, persisted as JSON.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::plan::TransitionType;

/// File name under the app root.
pub const WEIGHTS_FILE_NAME: &str = "preference_weights.json";

/// Relative preference for each transition type and each bar length. Higher
/// weight means the planner favors it both when generating candidates and
/// when scoring scenarios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_type_weights")]
    pub type_weights: BTreeMap<TransitionType, f64>,
    #[serde(default = "default_bar_weights")]
    pub bar_weights: BTreeMap<u32, f64>,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            type_weights: default_type_weights(),
            bar_weights: default_bar_weights(),
        }
    }
}

impl WeightsConfig {
    /// Weight used when scoring a selected candidate; missing types count 0.
    pub(crate) fn type_weight(&self, kind: TransitionType) -> f64 {
        self.type_weights.get(&kind).copied().unwrap_or(0.0)
    }
}

fn default_type_weights() -> BTreeMap<TransitionType, f64> {
    BTreeMap::from([
        (TransitionType::Crossfade, 0.5),
        (TransitionType::BassSwap, 1.6),
        (TransitionType::Cut, 1.2),
        (TransitionType::FilterFade, 1.0),
        (TransitionType::Mashup, 1.0),
    ])
}

fn default_bar_weights() -> BTreeMap<u32, f64> {
    BTreeMap::from([(4, 1.0), (8, 1.3)])
}

/// Read weights from disk; a missing file is normal and yields defaults, a
/// corrupt file is logged and yields defaults.
pub fn load_weights(path: &Path) -> WeightsConfig {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(_) => return WeightsConfig::default(),
    };
    match serde_json::from_slice(&data) {
        Ok(config) => config,
        Err(err) => {
            warn!("Weights file {} unparsable, using defaults: {err}", path.display());
            WeightsConfig::default()
        }
    }
}

pub fn save_weights(path: &Path, config: &WeightsConfig) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|err| format!("Create weights dir {} failed: {err}", parent.display()))?;
    }
    let data = serde_json::to_vec_pretty(config)
        .map_err(|err| format!("Serialize weights failed: {err}"))?;
    std::fs::write(path, data).map_err(|err| format!("Write {} failed: {err}", path.display()))
}
