//! Capability interface shared by the pipeline's stages.
//!
//! The host drives frames on its own schedule. Each stage only sees this
//! small lifecycle; `OverdrawPipeline` adapts it to whatever frame callback
//! the host has.

use crate::mesh::Drawable;
use crate::target::{OffscreenTargets, RenderTargetDescriptor};
use glam::Mat4;

/// Everything the host supplies for one frame.
pub struct FrameInput<'a> {
    pub descriptor: RenderTargetDescriptor,
    pub view_proj: Mat4,
    pub drawables: &'a [Drawable<'a>],
    /// Scene-inspection views render true shading instead of the counting materials.
    pub scene_view: bool,
    /// Presentation target; must match `descriptor` in size and format.
    pub destination: &'a wgpu::TextureView,
}

/// State available to a stage while it records commands.
pub struct PassContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub targets: &'a OffscreenTargets,
    pub frame: &'a FrameInput<'a>,
    /// Monotonic index of the frame being recorded, starting at 0.
    pub frame_index: u64,
}

/// One stage of the overdraw pipeline.
pub trait OverdrawPass {
    fn label(&self) -> &'static str;

    /// Called once at construction and again whenever the attachments are
    /// recreated for a new descriptor.
    fn setup(&mut self, _device: &wgpu::Device, _targets: &OffscreenTargets) {}

    /// Record this stage's commands for the current frame.
    fn execute(&mut self, ctx: &mut PassContext<'_>);

    /// Called after the frame's command buffer has been submitted.
    fn on_submitted(&mut self, _submission: &wgpu::SubmissionIndex) {}

    /// Release owned GPU resources. Must be idempotent.
    fn teardown(&mut self) {}
}
