//! Error types for settings and override-material configuration.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading overdraw settings or their override materials.
///
/// These are configuration mistakes on the host side and are only ever
/// produced at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("override material `{material}` shader {path} could not be loaded: {source}")]
    MissingShader {
        material: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("heatmap scale must be positive, got {0}")]
    InvalidHeatmapScale(f32),
}
