//! Startup override file.
//!
//! `signal_override.json` lives next to the host's other resources and lets an
//! operator point the signaling transport at a different endpoint without
//! touching the settings file. Only the endpoint has override semantics.

use std::path::Path;

use serde::{Deserialize, Serialize};
use streamhost_core::SignalingParams;
use tracing::debug;

use crate::errors::{Result, SettingsError};

pub const OVERRIDE_FILE_NAME: &str = "signal_override.json";
/// Name used by older deployments. Read only when the current name is absent.
pub const LEGACY_OVERRIDE_FILE_NAME: &str = "RSUrlSignalOverride.json";

/// Parsed contents of the override file. Missing fields take zero values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverrideConfig {
    #[serde(rename = "endpointURLOverride", alias = "urlSignalOverride")]
    pub endpoint_url_override: String,
    /// Carried for file compatibility; nothing reads it.
    #[serde(rename = "renderTiledCanvas")]
    pub render_tiled_canvas: bool,
}

impl OverrideConfig {
    pub fn has_endpoint_override(&self) -> bool {
        !self.endpoint_url_override.trim().is_empty()
    }

    /// Replace the endpoint if an override is set. Returns whether anything changed.
    pub fn apply_to(&self, params: &mut SignalingParams) -> bool {
        if !self.has_endpoint_override() {
            return false;
        }
        params.endpoint_url = self.endpoint_url_override.trim().to_string();
        true
    }
}

/// Read `search_root/signal_override.json`, falling back to
/// `search_root/RSUrlSignalOverride.json`.
///
/// A missing file is not an error and yields [`OverrideConfig::default()`].
/// A file that exists but does not parse yields [`SettingsError::Parse`].
pub fn resolve_override(search_root: &Path) -> Result<OverrideConfig> {
    let Some(path) = [OVERRIDE_FILE_NAME, LEGACY_OVERRIDE_FILE_NAME]
        .iter()
        .map(|name| search_root.join(name))
        .find(|path| path.exists())
    else {
        debug!(?search_root, "no override file");
        return Ok(OverrideConfig::default());
    };

    let content = std::fs::read_to_string(&path)?;
    let config: OverrideConfig =
        serde_json::from_str(&content).map_err(|e| SettingsError::parse(&path, e))?;
    debug!(
        ?path,
        endpoint_override = config.has_endpoint_override(),
        "loaded override file"
    );
    Ok(config)
}
