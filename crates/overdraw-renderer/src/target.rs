//! Off-screen attachments written by the geometry pass.
//!
//! Three textures, all sized from the host's frame descriptor:
//! - color: the shaded scene (side channel for `CompositeMode::Scene`)
//! - counter: `R16Float`, additively blended `+1.0` per shaded fragment
//! - depth: occlusion for the counting materials

use overdraw_core::TileGrid;

/// Format of the per-pixel shade counter.
///
/// Blendable without extra device features. Integer counts are exact up to
/// [`overdraw_core::MAX_EXACT_COUNT`] (2048) layers per pixel; past that a
/// `+1.0` blend rounds back to the same value, the pixel stops counting and
/// the frame's fragment total becomes a lower bound.
pub const COUNTER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Float;

/// Size and formats of the frame the host is about to present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetDescriptor {
    pub width: u32,
    pub height: u32,
    pub color_format: wgpu::TextureFormat,
    pub depth_format: wgpu::TextureFormat,
}

impl RenderTargetDescriptor {
    pub fn new(width: u32, height: u32, color_format: wgpu::TextureFormat) -> Self {
        Self {
            width,
            height,
            color_format,
            depth_format: wgpu::TextureFormat::Depth32Float,
        }
    }

    pub fn from_surface_config(config: &wgpu::SurfaceConfiguration) -> Self {
        Self::new(config.width, config.height, config.format)
    }

    /// Texture extent, clamped to at least one pixel.
    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width.max(1),
            height: self.height.max(1),
            depth_or_array_layers: 1,
        }
    }

    pub fn tile_grid(&self) -> TileGrid {
        let extent = self.extent();
        TileGrid::new(extent.width, extent.height)
    }
}

/// The off-screen color, counter and depth attachments for one descriptor.
pub struct OffscreenTargets {
    descriptor: RenderTargetDescriptor,
    color: wgpu::Texture,
    counter: wgpu::Texture,
    depth: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    pub counter_view: wgpu::TextureView,
    pub depth_view: wgpu::TextureView,
}

impl OffscreenTargets {
    pub fn new(device: &wgpu::Device, descriptor: RenderTargetDescriptor) -> Self {
        let color = create_texture(
            device,
            "Overdraw Color Attachment",
            &descriptor,
            descriptor.color_format,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let counter = create_texture(
            device,
            "Overdraw Counter Attachment",
            &descriptor,
            COUNTER_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let depth = create_texture(
            device,
            "Overdraw Depth Attachment",
            &descriptor,
            descriptor.depth_format,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );

        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let counter_view = counter.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        log::debug!(
            "Created overdraw attachments {}x{} ({:?})",
            descriptor.width,
            descriptor.height,
            descriptor.color_format
        );

        Self {
            descriptor,
            color,
            counter,
            depth,
            color_view,
            counter_view,
            depth_view,
        }
    }

    pub fn descriptor(&self) -> &RenderTargetDescriptor {
        &self.descriptor
    }

    /// Release the GPU memory now instead of waiting for the last reference.
    pub fn destroy(&self) {
        self.color.destroy();
        self.counter.destroy();
        self.depth.destroy();
    }
}

fn create_texture(
    device: &wgpu::Device,
    label: &str,
    descriptor: &RenderTargetDescriptor,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: descriptor.extent(),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_never_zero() {
        let descriptor = RenderTargetDescriptor::new(0, 0, wgpu::TextureFormat::Rgba8Unorm);
        let extent = descriptor.extent();
        assert_eq!((extent.width, extent.height), (1, 1));
        assert_eq!(descriptor.tile_grid().dispatch_size(), (1, 1));
    }

    #[test]
    fn test_descriptor_defaults_to_depth32() {
        let descriptor = RenderTargetDescriptor::new(640, 480, wgpu::TextureFormat::Bgra8UnormSrgb);
        assert_eq!(descriptor.depth_format, wgpu::TextureFormat::Depth32Float);
        assert_eq!(descriptor.tile_grid().dispatch_size(), (20, 15));
    }
}
