//! # Overdraw Renderer
//!
//! wgpu implementation of the overdraw measurement pipeline: an instrumented
//! geometry pass, a compute reduction with pipelined readback, and a composite
//! blit back onto the presented frame.

pub mod camera;
pub mod composite;
pub mod error;
pub mod geometry_pass;
pub mod material;
pub mod mesh;
pub mod pass;
pub mod pipeline;
pub mod readback;
pub mod reduction;
pub mod target;

pub use camera::*;
pub use composite::CompositeStage;
pub use error::*;
pub use geometry_pass::GeometryPass;
pub use material::*;
pub use mesh::*;
pub use pass::*;
pub use pipeline::*;
pub use reduction::ReductionStage;
pub use target::*;

pub use overdraw_core::{
    CompositeMode, OverdrawRatio, OverdrawSettings, ReadbackMode, ReductionResult, RenderQueue,
    SharedRatio,
};
