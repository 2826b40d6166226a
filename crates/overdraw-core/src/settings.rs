//! Overdraw pipeline settings.
//!
//! Loaded from `overdraw.toml` so the override materials and the composite
//! behaviour can be swapped without code changes. Every field is optional; a
//! missing file or table falls back to the built-in counting materials.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default settings file looked up by [`OverdrawSettings::load_or_default`].
pub const DEFAULT_SETTINGS_FILE: &str = "overdraw.toml";

/// Top-level settings for one overdraw pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverdrawSettings {
    /// Counting material used for the opaque queue range.
    pub opaque_material: MaterialSettings,
    /// Counting material used for the transparent queue range.
    pub transparent_material: MaterialSettings,
    /// What the composite stage presents.
    pub composite: CompositeMode,
    /// How the previous frame's reduction is read back.
    pub readback: ReadbackMode,
    /// Overdraw count mapped to the hot end of the heatmap ramp.
    pub heatmap_scale: f32,
    /// Clear color of the off-screen color attachment (linear RGBA).
    pub clear_color: [f64; 4],
}

/// Source of one override material.
///
/// Unset fields fall back to the built-in counting shader and its entry
/// points for the material's queue class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialSettings {
    /// Path to a WGSL module implementing the counting material interface.
    pub shader: Option<PathBuf>,
    pub vertex_entry: Option<String>,
    pub fragment_entry: Option<String>,
}

/// Image written to the presentation target by the composite stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositeMode {
    /// Per-pixel shade counts through a color ramp.
    #[default]
    Heatmap,
    /// The shaded scene from the color side channel.
    Scene,
}

impl CompositeMode {
    pub fn toggled(self) -> Self {
        match self {
            CompositeMode::Heatmap => CompositeMode::Scene,
            CompositeMode::Scene => CompositeMode::Heatmap,
        }
    }
}

/// Readback strategy for the previous frame's reduction grids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadbackMode {
    /// Wait on the previous frame's submission before reading it.
    #[default]
    Wait,
    /// Never block; a result that is not ready yet is picked up on a later frame.
    Poll,
}

impl Default for OverdrawSettings {
    fn default() -> Self {
        Self {
            opaque_material: MaterialSettings::default(),
            transparent_material: MaterialSettings::default(),
            composite: CompositeMode::Heatmap,
            readback: ReadbackMode::Wait,
            heatmap_scale: 8.0,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl OverdrawSettings {
    /// Load settings from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load `path` if it exists, otherwise use defaults.
    ///
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.heatmap_scale > 0.0) {
            return Err(ConfigError::InvalidHeatmapScale(self.heatmap_scale));
        }
        Ok(())
    }
}

impl MaterialSettings {
    /// Read the configured shader, or `None` when the built-in one applies.
    pub fn load_source(&self, material: &str) -> Result<Option<String>, ConfigError> {
        let Some(path) = &self.shader else {
            return Ok(None);
        };
        std::fs::read_to_string(path)
            .map(Some)
            .map_err(|source| ConfigError::MissingShader {
                material: material.to_string(),
                path: path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        let settings = OverdrawSettings::from_toml_str("").unwrap();
        assert_eq!(settings, OverdrawSettings::default());
        assert_eq!(settings.composite, CompositeMode::Heatmap);
        assert_eq!(settings.readback, ReadbackMode::Wait);
    }

    #[test]
    fn test_parse_full_file() {
        let settings = OverdrawSettings::from_toml_str(
            r#"
            composite = "scene"
            readback = "poll"
            heatmap_scale = 4.0
            clear_color = [0.1, 0.2, 0.3, 1.0]

            [opaque_material]
            shader = "shaders/custom.wgsl"
            fragment_entry = "fs_count"

            [transparent_material]
            vertex_entry = "vs_custom"
            "#,
        )
        .unwrap();

        assert_eq!(settings.composite, CompositeMode::Scene);
        assert_eq!(settings.readback, ReadbackMode::Poll);
        assert_eq!(settings.heatmap_scale, 4.0);
        assert_eq!(settings.clear_color, [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(
            settings.opaque_material.shader.as_deref(),
            Some(Path::new("shaders/custom.wgsl"))
        );
        assert_eq!(settings.opaque_material.fragment_entry.as_deref(), Some("fs_count"));
        assert_eq!(settings.opaque_material.vertex_entry, None);
        assert_eq!(settings.transparent_material.shader, None);
        assert_eq!(settings.transparent_material.vertex_entry.as_deref(), Some("vs_custom"));
    }

    #[test]
    fn test_unknown_composite_mode_rejected() {
        let err = OverdrawSettings::from_toml_str(r#"composite = "wireframe""#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_non_positive_heatmap_scale_rejected() {
        let err = OverdrawSettings::from_toml_str("heatmap_scale = 0.0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHeatmapScale(_)));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let settings =
            OverdrawSettings::load_or_default("this/settings/file/does/not/exist.toml").unwrap();
        assert_eq!(settings, OverdrawSettings::default());
    }

    #[test]
    fn test_builtin_material_has_no_source() {
        let material = MaterialSettings::default();
        assert_eq!(material.load_source("opaque").unwrap(), None);
    }

    #[test]
    fn test_missing_shader_is_config_error() {
        let material = MaterialSettings {
            shader: Some(PathBuf::from("no/such/counting.wgsl")),
            ..Default::default()
        };
        let err = material.load_source("opaque").unwrap_err();
        assert!(matches!(err, ConfigError::MissingShader { .. }));
        assert!(err.to_string().contains("opaque"));
    }

    #[test]
    fn test_composite_toggle() {
        assert_eq!(CompositeMode::Heatmap.toggled(), CompositeMode::Scene);
        assert_eq!(CompositeMode::Scene.toggled(), CompositeMode::Heatmap);
    }
}
