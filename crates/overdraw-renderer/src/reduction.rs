//! Overdraw reduction stage.
//!
//! Folds the counter attachment into the `cover` / `fragments` grids on the
//! GPU, then hands the grids to the readback ring. The CPU sums are published
//! one frame later.

use crate::pass::{OverdrawPass, PassContext};
use crate::readback::ReadbackRing;
use crate::target::OffscreenTargets;
use overdraw_core::{
    LatestResult, ReadbackMode, ReductionResult, SharedRatio, TileGrid, GRID_BYTES, MAX_EXACT_COUNT,
};

pub const REDUCTION_WGSL: &str = include_str!("shaders/reduction.wgsl");

pub struct ReductionStage {
    cover_buffer: wgpu::Buffer,
    fragments_buffer: wgpu::Buffer,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: Option<wgpu::BindGroup>,
    compute_pipeline: wgpu::ComputePipeline,
    grid: TileGrid,
    ring: ReadbackRing,
    ratio: SharedRatio,
    latest: LatestResult,
}

impl ReductionStage {
    pub fn new(device: &wgpu::Device, mode: ReadbackMode, ratio: SharedRatio) -> Self {
        let grid_usage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC;

        let cover_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Overdraw Cover Grid"),
            size: GRID_BYTES,
            usage: grid_usage,
            mapped_at_creation: false,
        });
        let fragments_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Overdraw Fragments Grid"),
            size: GRID_BYTES,
            usage: grid_usage,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Overdraw Reduction Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                storage_entry(1),
                storage_entry(2),
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Overdraw Reduction Shader"),
            source: wgpu::ShaderSource::Wgsl(REDUCTION_WGSL.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Overdraw Reduction Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let compute_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Overdraw Reduction Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            cover_buffer,
            fragments_buffer,
            bind_group_layout,
            bind_group: None,
            compute_pipeline,
            grid: TileGrid::new(1, 1),
            ring: ReadbackRing::new(device, mode),
            ratio,
            latest: LatestResult::default(),
        }
    }

    pub fn last_result(&self) -> Option<ReductionResult> {
        self.latest.result()
    }

    fn publish(&mut self, frame_index: u64, result: ReductionResult) {
        if !self.latest.offer(frame_index, result) {
            log::debug!(
                "Dropping overdraw result of frame {frame_index}, frame {:?} already published",
                self.latest.frame_index()
            );
            return;
        }

        if !result.is_consistent() {
            log::warn!(
                "Overdraw accumulation defect: {} fragments over {} covered pixels",
                result.fragment_count,
                result.covered_count
            );
        }
        if result.exceeds_exact_counts() {
            log::warn!(
                "Frame {frame_index} averages {} layers per pixel, counter saturates at {MAX_EXACT_COUNT}",
                result.ratio()
            );
        }
        self.ratio.store(result.ratio());
    }

    fn collect(&mut self, device: &wgpu::Device, slot: usize) {
        if let Some((frame_index, result)) = self.ring.collect(device, slot) {
            self.publish(frame_index, result);
        }
    }
}

impl OverdrawPass for ReductionStage {
    fn label(&self) -> &'static str {
        "Overdraw Reduction Stage"
    }

    fn setup(&mut self, device: &wgpu::Device, targets: &OffscreenTargets) {
        self.grid = targets.descriptor().tile_grid();
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Overdraw Reduction Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&targets.counter_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.cover_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.fragments_buffer.as_entire_binding(),
                },
            ],
        }));
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) {
        let frame_index = ctx.frame_index;
        let slot = ReadbackRing::slot_for(frame_index);

        // Oldest first: this frame's slot may still hold frame N-2.
        self.collect(ctx.device, slot);
        if frame_index > 0 {
            self.collect(ctx.device, ReadbackRing::slot_for(frame_index - 1));
        }

        if !self.ring.is_idle(slot) {
            log::debug!("Readback slot {slot} still in flight, skipping reduction of frame {frame_index}");
            return;
        }

        let Some(bind_group) = &self.bind_group else {
            log::warn!("Reduction stage executed before setup, skipping frame");
            return;
        };

        let encoder = &mut *ctx.encoder;
        encoder.clear_buffer(&self.cover_buffer, 0, None);
        encoder.clear_buffer(&self.fragments_buffer, 0, None);

        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Overdraw Reduction Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.compute_pipeline);
            compute_pass.set_bind_group(0, bind_group, &[]);
            let (groups_x, groups_y) = self.grid.dispatch_size();
            compute_pass.dispatch_workgroups(groups_x, groups_y, 1);
        }

        let staging = self.ring.buffer(slot);
        encoder.copy_buffer_to_buffer(&self.cover_buffer, 0, staging, 0, GRID_BYTES);
        encoder.copy_buffer_to_buffer(&self.fragments_buffer, 0, staging, GRID_BYTES, GRID_BYTES);
        self.ring.arm(slot, frame_index);
    }

    fn on_submitted(&mut self, submission: &wgpu::SubmissionIndex) {
        self.ring.map_armed(submission);
    }

    fn teardown(&mut self) {
        self.bind_group = None;
        self.cover_buffer.destroy();
        self.fragments_buffer.destroy();
        self.ring.destroy();
    }
}

fn storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(GRID_BYTES),
        },
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overdraw_core::{DATA_DIMENSION, GROUP_DIMENSION, GROUP_THREADS, PIXELS_PER_THREAD};

    fn wgsl_const(name: &str) -> u32 {
        let prefix = format!("const {name}: u32 = ");
        let line = REDUCTION_WGSL
            .lines()
            .find(|line| line.starts_with(&prefix))
            .unwrap_or_else(|| panic!("{name} not declared in reduction.wgsl"));
        line[prefix.len()..]
            .trim_end_matches(';')
            .trim_end_matches('u')
            .parse()
            .unwrap()
    }

    #[test]
    fn test_wgsl_constants_match_core() {
        assert_eq!(wgsl_const("GROUP_DIMENSION"), GROUP_DIMENSION);
        assert_eq!(wgsl_const("PIXELS_PER_THREAD"), PIXELS_PER_THREAD);
        assert_eq!(wgsl_const("DATA_DIMENSION"), DATA_DIMENSION);
    }

    #[test]
    fn test_workgroup_size_matches_core() {
        let expected = format!("@workgroup_size({GROUP_THREADS}, {GROUP_THREADS}, 1)");
        assert!(REDUCTION_WGSL.contains(&expected));
    }
}
