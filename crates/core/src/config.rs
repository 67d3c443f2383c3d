use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Tunables of the synchronization engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Padding between an arrow's endpoints and its containing box, in
    /// viewport units. Also the detour distance of backward arrows.
    pub arrow_padding: f64,
    /// Hit radius of an arrow's endpoint drag handles.
    pub handle_radius: f64,
    /// Longest predecessor chain followed before giving up.
    pub max_chain_depth: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            arrow_padding: 8.0,
            handle_radius: 6.0,
            max_chain_depth: 256,
        }
    }
}

impl SyncConfig {
    pub fn from_json(data: &str) -> Result<Self, SyncError> {
        Ok(serde_json::from_str(data)?)
    }
}
