//! Construction-time errors of the overdraw pipeline.

use overdraw_core::ConfigError;
use thiserror::Error;

/// Errors returned while building an [`crate::OverdrawPipeline`].
///
/// Per-frame work never fails: a lost readback only delays the next ratio.
#[derive(Debug, Error)]
pub enum OverdrawError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("override material `{label}` is invalid: {message}")]
    Material { label: String, message: String },
}
