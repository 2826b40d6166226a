//! Per-frame orchestration of the overdraw stages.

use crate::composite::CompositeStage;
use crate::error::OverdrawError;
use crate::geometry_pass::GeometryPass;
use crate::material::{MaterialKind, OverdrawMaterial};
use crate::pass::{FrameInput, OverdrawPass, PassContext};
use crate::reduction::ReductionStage;
use crate::target::{OffscreenTargets, RenderTargetDescriptor};
use overdraw_core::{CompositeMode, OverdrawSettings, ReductionResult, SharedRatio};

/// Overdraw measurement pipeline bound to one device.
///
/// Drive it with [`OverdrawPipeline::render_frame`] once per presented frame.
/// The ratio published after frame `F` describes frame `F - 1`.
pub struct OverdrawPipeline {
    device: wgpu::Device,
    queue: wgpu::Queue,
    targets: OffscreenTargets,
    geometry: GeometryPass,
    reduction: ReductionStage,
    composite: CompositeStage,
    ratio: SharedRatio,
    frame_index: u64,
    torn_down: bool,
}

impl OverdrawPipeline {
    /// Build every stage for `descriptor`.
    ///
    /// Fails when a configured material file is missing or when a material
    /// does not compile or validate against the counting interface.
    pub async fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        settings: &OverdrawSettings,
        descriptor: RenderTargetDescriptor,
    ) -> Result<Self, OverdrawError> {
        settings.validate()?;
        let opaque = OverdrawMaterial::from_settings(MaterialKind::Opaque, &settings.opaque_material)?;
        let transparent =
            OverdrawMaterial::from_settings(MaterialKind::Transparent, &settings.transparent_material)?;
        let material_label = format!("{} / {}", opaque.label, transparent.label);

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let targets = OffscreenTargets::new(device, descriptor);
        let ratio = SharedRatio::new();
        let mut geometry = GeometryPass::new(device, opaque, transparent, settings.clear_color);
        let mut reduction = ReductionStage::new(device, settings.readback, ratio.clone());
        let mut composite = CompositeStage::new(device, settings.composite, settings.heatmap_scale);

        geometry.setup(device, &targets);
        reduction.setup(device, &targets);
        composite.setup(device, &targets);

        if let Some(error) = device.pop_error_scope().await {
            targets.destroy();
            geometry.teardown();
            reduction.teardown();
            composite.teardown();
            return Err(OverdrawError::Material {
                label: material_label,
                message: error.to_string(),
            });
        }

        log::info!(
            "Overdraw pipeline ready: {}x{} {:?}, composite {:?}, readback {:?}",
            descriptor.width,
            descriptor.height,
            descriptor.color_format,
            settings.composite,
            settings.readback
        );

        Ok(Self {
            device: device.clone(),
            queue: queue.clone(),
            targets,
            geometry,
            reduction,
            composite,
            ratio,
            frame_index: 0,
            torn_down: false,
        })
    }

    /// Record and submit one frame: geometry, reduction, then composite onto
    /// `frame.destination`.
    pub fn render_frame(&mut self, frame: &FrameInput<'_>) -> wgpu::SubmissionIndex {
        if self.torn_down {
            log::warn!("render_frame called after teardown, submitting nothing");
            return self.queue.submit(std::iter::empty());
        }

        if *self.targets.descriptor() != frame.descriptor {
            self.resize(frame.descriptor);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Overdraw Frame Encoder"),
            });

        {
            let mut ctx = PassContext {
                device: &self.device,
                queue: &self.queue,
                encoder: &mut encoder,
                targets: &self.targets,
                frame,
                frame_index: self.frame_index,
            };

            let stages: [&mut dyn OverdrawPass; 3] =
                [&mut self.geometry, &mut self.reduction, &mut self.composite];
            for stage in stages {
                stage.execute(&mut ctx);
            }
        }

        let submission = self.queue.submit(std::iter::once(encoder.finish()));
        self.geometry.on_submitted(&submission);
        self.reduction.on_submitted(&submission);
        self.composite.on_submitted(&submission);
        self.frame_index += 1;

        submission
    }

    fn resize(&mut self, descriptor: RenderTargetDescriptor) {
        log::info!(
            "Recreating overdraw attachments {}x{} {:?}",
            descriptor.width,
            descriptor.height,
            descriptor.color_format
        );

        self.targets.destroy();
        self.targets = OffscreenTargets::new(&self.device, descriptor);
        self.geometry.setup(&self.device, &self.targets);
        self.reduction.setup(&self.device, &self.targets);
        self.composite.setup(&self.device, &self.targets);
    }

    /// Latest published ratio; 1.0 until the first frame has been collected.
    pub fn overdraw_ratio(&self) -> f32 {
        self.ratio.load().value()
    }

    /// Shared handle for readers outside the render loop.
    pub fn ratio_handle(&self) -> SharedRatio {
        self.ratio.clone()
    }

    pub fn last_result(&self) -> Option<ReductionResult> {
        self.reduction.last_result()
    }

    pub fn composite_mode(&self) -> CompositeMode {
        self.composite.mode()
    }

    pub fn set_composite_mode(&mut self, mode: CompositeMode) {
        self.composite.set_mode(mode);
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Release every GPU resource owned by the pipeline. Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }

        let stages: [&mut dyn OverdrawPass; 3] =
            [&mut self.geometry, &mut self.reduction, &mut self.composite];
        for stage in stages {
            log::debug!("Tearing down {}", stage.label());
            stage.teardown();
        }
        self.targets.destroy();
        self.torn_down = true;
    }
}

impl Drop for OverdrawPipeline {
    fn drop(&mut self) {
        if !self.torn_down {
            log::warn!("OverdrawPipeline dropped without teardown, releasing GPU resources");
            self.teardown();
        }
    }
}
