//! # Overdraw Core
//!
//! GPU-independent building blocks for overdraw measurement: the reduction grid
//! and its dispatch math, reduction results, the shared ratio, render-queue
//! filtering and sorting, and settings.

pub mod constants;
pub mod error;
pub mod grid;
pub mod queue;
pub mod ratio;
pub mod reduction;
pub mod settings;

pub use constants::*;
pub use error::*;
pub use grid::*;
pub use queue::*;
pub use ratio::*;
pub use reduction::*;
pub use settings::*;
