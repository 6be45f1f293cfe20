//! Editor tuning knobs.

use crate::autosave::DEFAULT_AUTOSAVE_DELAY_MS;
use crate::debounce::Millis;
use crate::history::DEFAULT_MAX_HISTORY;
use crate::persist::MAX_VERSIONS;
use serde::{Deserialize, Serialize};

/// Timings and caps used by [`crate::editor::Editor`]. Every field has a
/// default, so a partial JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Snapshots kept for undo. Default: **50**.
    pub history_depth: usize,

    /// Quiet period before the recovery copy is written. Default: **2000** ms.
    pub autosave_delay_ms: Millis,

    /// Quiet period after the last drag frame before the move is recorded.
    /// Default: **150** ms.
    pub drag_settle_ms: Millis,

    /// Quiet period after a keyboard delete before it is recorded.
    /// Default: **100** ms.
    pub delete_settle_ms: Millis,

    /// Versions retained by the fallback version store. Default: **10**.
    pub max_versions: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_depth: DEFAULT_MAX_HISTORY,
            autosave_delay_ms: DEFAULT_AUTOSAVE_DELAY_MS,
            drag_settle_ms: 150,
            delete_settle_ms: 100,
            max_versions: MAX_VERSIONS,
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg = EditorConfig::from_json(r#"{"autosaveDelayMs": 500}"#).unwrap();
        assert_eq!(cfg.autosave_delay_ms, 500);
        assert_eq!(cfg.history_depth, 50);
        assert_eq!(cfg.drag_settle_ms, 150);
    }
}
