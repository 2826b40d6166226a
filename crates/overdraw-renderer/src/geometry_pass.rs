//! Instrumented geometry pass.
//!
//! Renders the host's drawables with the counting materials into the
//! off-screen attachments: opaque queue range front to back first, then the
//! transparent range back to front on top of the opaque depth.

use crate::camera::FrameUniform;
use crate::material::{create_scene_view_pipeline, MaterialKind, OverdrawMaterial};
use crate::mesh::{Drawable, DrawUniform};
use crate::pass::{OverdrawPass, PassContext};
use crate::target::OffscreenTargets;
use overdraw_core::filter_and_sort;
use std::num::NonZeroU64;
use wgpu::util::DeviceExt;

const INITIAL_DRAW_CAPACITY: u64 = 64;

/// Pipelines built for one pair of attachment formats.
struct GeometryPipelines {
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
    opaque: wgpu::RenderPipeline,
    transparent: wgpu::RenderPipeline,
    scene_opaque: wgpu::RenderPipeline,
    scene_transparent: wgpu::RenderPipeline,
}

impl GeometryPipelines {
    fn select(&self, kind: MaterialKind, scene_view: bool) -> &wgpu::RenderPipeline {
        match (kind, scene_view) {
            (MaterialKind::Opaque, false) => &self.opaque,
            (MaterialKind::Transparent, false) => &self.transparent,
            (MaterialKind::Opaque, true) => &self.scene_opaque,
            (MaterialKind::Transparent, true) => &self.scene_transparent,
        }
    }
}

pub struct GeometryPass {
    clear_color: wgpu::Color,
    opaque_material: OverdrawMaterial,
    transparent_material: OverdrawMaterial,

    pipeline_layout: wgpu::PipelineLayout,
    draw_layout: wgpu::BindGroupLayout,

    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,

    draw_buffer: wgpu::Buffer,
    draw_bind_group: wgpu::BindGroup,
    draw_capacity: u64,
    draw_stride: u64,

    pipelines: Option<GeometryPipelines>,
    staging: Vec<u8>,
}

impl GeometryPass {
    pub fn new(
        device: &wgpu::Device,
        opaque_material: OverdrawMaterial,
        transparent_material: OverdrawMaterial,
        clear_color: [f64; 4],
    ) -> Self {
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Overdraw Frame Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Overdraw Draw Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(draw_uniform_size()),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Overdraw Geometry Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &draw_layout],
            push_constant_ranges: &[],
        });

        let frame_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Overdraw Frame Uniform Buffer"),
            contents: bytemuck::cast_slice(&[FrameUniform::new(glam::Mat4::IDENTITY)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Overdraw Frame Bind Group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let draw_stride = draw_uniform_size().div_ceil(alignment) * alignment;
        let (draw_buffer, draw_bind_group) =
            create_draw_buffer(device, &draw_layout, draw_stride, INITIAL_DRAW_CAPACITY);

        let [r, g, b, a] = clear_color;

        Self {
            clear_color: wgpu::Color { r, g, b, a },
            opaque_material,
            transparent_material,
            pipeline_layout,
            draw_layout,
            frame_buffer,
            frame_bind_group,
            draw_buffer,
            draw_bind_group,
            draw_capacity: INITIAL_DRAW_CAPACITY,
            draw_stride,
            pipelines: None,
            staging: Vec::new(),
        }
    }

    fn ensure_draw_capacity(&mut self, device: &wgpu::Device, draws: u64) {
        if draws <= self.draw_capacity {
            return;
        }

        let capacity = draws.next_power_of_two();
        log::debug!(
            "Growing overdraw draw uniforms {} -> {}",
            self.draw_capacity,
            capacity
        );

        self.draw_buffer.destroy();
        let (buffer, bind_group) =
            create_draw_buffer(device, &self.draw_layout, self.draw_stride, capacity);
        self.draw_buffer = buffer;
        self.draw_bind_group = bind_group;
        self.draw_capacity = capacity;
    }

    /// Pack the per-draw uniforms for `draws` at `draw_stride` intervals.
    fn pack_draws(&mut self, draws: &[&Drawable<'_>]) {
        let stride = self.draw_stride as usize;
        self.staging.clear();
        self.staging.resize(draws.len() * stride, 0);

        for (i, drawable) in draws.iter().enumerate() {
            let uniform = DrawUniform::from(*drawable);
            let offset = i * stride;
            self.staging[offset..offset + std::mem::size_of::<DrawUniform>()]
                .copy_from_slice(bytemuck::bytes_of(&uniform));
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        targets: &OffscreenTargets,
        pipeline: &wgpu::RenderPipeline,
        label: &str,
        clear: bool,
        draws: &[&Drawable<'_>],
        first_slot: usize,
    ) {
        let (color_load, counter_load, depth_load) = if clear {
            (
                wgpu::LoadOp::Clear(self.clear_color),
                wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                wgpu::LoadOp::Clear(1.0),
            )
        } else {
            (wgpu::LoadOp::Load, wgpu::LoadOp::Load, wgpu::LoadOp::Load)
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[
                Some(wgpu::RenderPassColorAttachment {
                    view: &targets.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                }),
                Some(wgpu::RenderPassColorAttachment {
                    view: &targets.counter_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: counter_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                }),
            ],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &targets.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if draws.is_empty() {
            return;
        }

        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &self.frame_bind_group, &[]);
        for (i, drawable) in draws.iter().enumerate() {
            let offset = ((first_slot + i) as u64 * self.draw_stride) as u32;
            render_pass.set_bind_group(1, &self.draw_bind_group, &[offset]);
            drawable.mesh.draw(&mut render_pass);
        }
    }
}

impl OverdrawPass for GeometryPass {
    fn label(&self) -> &'static str {
        "Overdraw Geometry Pass"
    }

    fn setup(&mut self, device: &wgpu::Device, targets: &OffscreenTargets) {
        let descriptor = targets.descriptor();
        if let Some(pipelines) = &self.pipelines {
            if pipelines.color_format == descriptor.color_format
                && pipelines.depth_format == descriptor.depth_format
            {
                return;
            }
        }

        let (color, depth) = (descriptor.color_format, descriptor.depth_format);
        log::debug!(
            "Building geometry pipelines for {:?}/{:?} ({}, {})",
            color,
            depth,
            self.opaque_material.label,
            self.transparent_material.label
        );

        let layout = &self.pipeline_layout;
        self.pipelines = Some(GeometryPipelines {
            color_format: color,
            depth_format: depth,
            opaque: self
                .opaque_material
                .create_pipeline(device, layout, color, depth),
            transparent: self
                .transparent_material
                .create_pipeline(device, layout, color, depth),
            scene_opaque: create_scene_view_pipeline(
                device,
                layout,
                MaterialKind::Opaque,
                color,
                depth,
            ),
            scene_transparent: create_scene_view_pipeline(
                device,
                layout,
                MaterialKind::Transparent,
                color,
                depth,
            ),
        });
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) {
        let frame = ctx.frame;
        ctx.queue.write_buffer(
            &self.frame_buffer,
            0,
            bytemuck::cast_slice(&[FrameUniform::new(frame.view_proj)]),
        );

        let opaque = filter_and_sort(
            frame.drawables,
            MaterialKind::Opaque.queue_range(),
            MaterialKind::Opaque.sorting(),
        );
        let transparent = filter_and_sort(
            frame.drawables,
            MaterialKind::Transparent.queue_range(),
            MaterialKind::Transparent.sorting(),
        );

        let mut draws = Vec::with_capacity(opaque.len() + transparent.len());
        draws.extend(opaque.iter().copied());
        draws.extend(transparent.iter().copied());

        if !draws.is_empty() {
            self.ensure_draw_capacity(ctx.device, draws.len() as u64);
            self.pack_draws(&draws);
            ctx.queue.write_buffer(&self.draw_buffer, 0, &self.staging);
        }

        let Some(pipelines) = &self.pipelines else {
            log::warn!("Geometry pass executed before setup, skipping frame");
            return;
        };

        self.record(
            ctx.encoder,
            ctx.targets,
            pipelines.select(MaterialKind::Opaque, frame.scene_view),
            "Overdraw Opaque Render Pass",
            true,
            &opaque,
            0,
        );

        if !transparent.is_empty() {
            self.record(
                ctx.encoder,
                ctx.targets,
                pipelines.select(MaterialKind::Transparent, frame.scene_view),
                "Overdraw Transparent Render Pass",
                false,
                &transparent,
                opaque.len(),
            );
        }
    }

    fn teardown(&mut self) {
        self.frame_buffer.destroy();
        self.draw_buffer.destroy();
        self.pipelines = None;
    }
}

fn draw_uniform_size() -> u64 {
    std::mem::size_of::<DrawUniform>() as u64
}

fn create_draw_buffer(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    stride: u64,
    capacity: u64,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Overdraw Draw Uniform Buffer"),
        size: stride * capacity,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Overdraw Draw Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: NonZeroU64::new(draw_uniform_size()),
            }),
        }],
    });

    (buffer, bind_group)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_uniform_fits_uniform_rules() {
        // mat4 + vec4, 16-byte aligned.
        assert_eq!(draw_uniform_size(), 80);
        assert_eq!(draw_uniform_size() % 16, 0);
        assert_eq!(draw_uniform_size().div_ceil(256) * 256, 256);
    }
}
