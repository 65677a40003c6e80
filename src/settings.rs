use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::source::UpAxis;

/// Node-name substring some exporters emit for synthetic pivot/helper nodes.
pub const DEFAULT_HELPER_MARKER: &str = "_$AssimpFbx$_";

/// Keyframe reduction settings applied to every extracted animation track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnimationFilter {
    /// Enables the lossy simplification pass.
    pub enabled: bool,
    /// Perpendicular-distance tolerance for position tracks, relative to chord length.
    pub position_threshold: f32,
    /// Angular tolerance for quaternion tracks.
    pub rotation_threshold: f32,
    /// Perpendicular-distance tolerance for scale tracks, relative to chord length.
    pub scale_threshold: f32,
}

impl Default for AnimationFilter {
    fn default() -> Self {
        Self {
            enabled: true,
            position_threshold: 0.001,
            rotation_threshold: 0.01,
            scale_threshold: 0.001,
        }
    }
}

/// Persisted import settings used by CLI and tool workflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Multiplier applied on top of the unit scale reported by the source.
    pub scale_factor: f32,
    /// Nodes whose name contains this marker are folded into their children.
    pub helper_marker: String,
    /// Overrides the up axis reported by the source metadata.
    pub up_axis: Option<UpAxis>,
    pub import_animations: bool,
    pub animation_filter: AnimationFilter,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            helper_marker: DEFAULT_HELPER_MARKER.to_string(),
            up_axis: None,
            import_animations: true,
            animation_filter: AnimationFilter::default(),
        }
    }
}

/// Save import settings to a JSON file.
pub fn save_import_settings(path: &Path, settings: &ImportSettings) -> Result<()> {
    let content = serde_json::to_string_pretty(settings)
        .context("failed to serialize import settings as JSON")?;
    fs::write(path, content)
        .with_context(|| format!("failed to save import settings: {}", path.display()))?;
    Ok(())
}

/// Load import settings from a JSON file.
pub fn load_import_settings(path: &Path) -> Result<ImportSettings> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to load import settings: {}", path.display()))?;
    let settings: ImportSettings =
        serde_json::from_str(&content).context("failed to parse import settings JSON")?;
    Ok(settings)
}
