//! Composite stage: copies an off-screen attachment onto the host's
//! destination view with a full-screen triangle.

use crate::pass::{OverdrawPass, PassContext};
use crate::target::OffscreenTargets;
use bytemuck::{Pod, Zeroable};
use overdraw_core::CompositeMode;
use std::collections::HashMap;

pub const COMPOSITE_WGSL: &str = include_str!("shaders/composite.wgsl");

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct CompositeParams {
    mode: u32,
    heatmap_scale: f32,
    _padding: [f32; 2],
}

impl CompositeParams {
    /// Parameters for one frame. Scene views always present the shaded
    /// scene; their counter holds no counts to visualize.
    fn for_frame(mode: CompositeMode, scene_view: bool, heatmap_scale: f32) -> Self {
        let mode = if scene_view { CompositeMode::Scene } else { mode };
        Self::new(mode, heatmap_scale)
    }

    fn new(mode: CompositeMode, heatmap_scale: f32) -> Self {
        Self {
            mode: match mode {
                CompositeMode::Heatmap => 0,
                CompositeMode::Scene => 1,
            },
            heatmap_scale,
            _padding: [0.0; 2],
        }
    }
}

pub struct CompositeStage {
    mode: CompositeMode,
    heatmap_scale: f32,
    shader: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    params_buffer: wgpu::Buffer,
    bind_group: Option<wgpu::BindGroup>,
    pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

impl CompositeStage {
    pub fn new(device: &wgpu::Device, mode: CompositeMode, heatmap_scale: f32) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Overdraw Composite Shader"),
            source: wgpu::ShaderSource::Wgsl(COMPOSITE_WGSL.into()),
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Overdraw Composite Bind Group Layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Overdraw Composite Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Overdraw Composite Params"),
            size: std::mem::size_of::<CompositeParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            mode,
            heatmap_scale,
            shader,
            bind_group_layout,
            pipeline_layout,
            params_buffer,
            bind_group: None,
            pipelines: HashMap::new(),
        }
    }

    pub fn mode(&self) -> CompositeMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: CompositeMode) {
        self.mode = mode;
    }

    fn pipeline_for(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
    ) -> &wgpu::RenderPipeline {
        let (shader, layout) = (&self.shader, &self.pipeline_layout);
        self.pipelines.entry(format).or_insert_with(|| {
            log::debug!("Building composite pipeline for {format:?}");
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Overdraw Composite Pipeline"),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: shader,
                    entry_point: Some("vs_fullscreen"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: shader,
                    entry_point: Some("fs_composite"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })
    }
}

impl OverdrawPass for CompositeStage {
    fn label(&self) -> &'static str {
        "Overdraw Composite Stage"
    }

    fn setup(&mut self, device: &wgpu::Device, targets: &OffscreenTargets) {
        // Warm the cache for the host's presentation format.
        self.pipeline_for(device, targets.descriptor().color_format);

        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Overdraw Composite Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&targets.color_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&targets.counter_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.params_buffer.as_entire_binding(),
                },
            ],
        }));
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) {
        ctx.queue.write_buffer(
            &self.params_buffer,
            0,
            bytemuck::cast_slice(&[CompositeParams::for_frame(
                self.mode,
                ctx.frame.scene_view,
                self.heatmap_scale,
            )]),
        );

        let format = ctx.frame.descriptor.color_format;
        self.pipeline_for(ctx.device, format);
        let (Some(bind_group), Some(pipeline)) = (&self.bind_group, self.pipelines.get(&format))
        else {
            log::warn!("Composite stage executed before setup, skipping frame");
            return;
        };

        let mut render_pass = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Overdraw Composite Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: ctx.frame.destination,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }

    fn teardown(&mut self) {
        self.bind_group = None;
        self.pipelines.clear();
        self.params_buffer.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_layout_matches_wgsl() {
        // mode u32, heatmap_scale f32, vec2 padding
        assert_eq!(std::mem::size_of::<CompositeParams>(), 16);
        assert!(COMPOSITE_WGSL.contains("mode: u32"));
        assert!(COMPOSITE_WGSL.contains("heatmap_scale: f32"));
    }

    #[test]
    fn test_mode_encoding() {
        assert_eq!(CompositeParams::new(CompositeMode::Heatmap, 8.0).mode, 0);
        assert_eq!(CompositeParams::new(CompositeMode::Scene, 8.0).mode, 1);
        assert!(COMPOSITE_WGSL.contains("params.mode == 1u"));
    }

    #[test]
    fn test_scene_view_presents_scene_color() {
        let heatmap = CompositeParams::for_frame(CompositeMode::Heatmap, true, 8.0);
        let scene = CompositeParams::for_frame(CompositeMode::Scene, true, 8.0);
        assert_eq!(heatmap.mode, 1);
        assert_eq!(scene.mode, 1);

        let counting = CompositeParams::for_frame(CompositeMode::Heatmap, false, 8.0);
        assert_eq!(counting.mode, 0);
    }
}
