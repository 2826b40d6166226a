//! Override materials for the instrumented geometry pass.
//!
//! A material is a WGSL module plus entry points. Render state (blending,
//! depth) is fixed by the queue class it draws, so a custom material only has
//! to honour the binding interface documented in `shaders/counting.wgsl`.

use crate::mesh::Vertex;
use overdraw_core::{ConfigError, MaterialSettings, RenderQueueRange, SortingCriteria};

pub const COUNTING_WGSL: &str = include_str!("shaders/counting.wgsl");
pub const SCENE_VIEW_WGSL: &str = include_str!("shaders/scene_view.wgsl");

/// Additive blend used on the counter attachment.
pub const COUNTER_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/// Queue class a material draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    Opaque,
    Transparent,
}

impl MaterialKind {
    pub fn name(self) -> &'static str {
        match self {
            MaterialKind::Opaque => "opaque",
            MaterialKind::Transparent => "transparent",
        }
    }

    pub fn queue_range(self) -> RenderQueueRange {
        match self {
            MaterialKind::Opaque => RenderQueueRange::OPAQUE,
            MaterialKind::Transparent => RenderQueueRange::TRANSPARENT,
        }
    }

    pub fn sorting(self) -> SortingCriteria {
        match self {
            MaterialKind::Opaque => SortingCriteria::CommonOpaque,
            MaterialKind::Transparent => SortingCriteria::CommonTransparent,
        }
    }

    fn default_fragment_entry(self) -> &'static str {
        match self {
            MaterialKind::Opaque => "fs_opaque",
            MaterialKind::Transparent => "fs_transparent",
        }
    }

    fn color_blend(self) -> Option<wgpu::BlendState> {
        match self {
            MaterialKind::Opaque => None,
            MaterialKind::Transparent => Some(wgpu::BlendState::ALPHA_BLENDING),
        }
    }

    fn depth_stencil(self, format: wgpu::TextureFormat) -> wgpu::DepthStencilState {
        wgpu::DepthStencilState {
            format,
            // Transparent geometry is tested against opaque depth but never occludes.
            depth_write_enabled: self == MaterialKind::Opaque,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }
    }
}

/// WGSL source and entry points of one counting material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverdrawMaterial {
    pub label: String,
    pub kind: MaterialKind,
    pub source: String,
    pub vertex_entry: String,
    pub fragment_entry: String,
}

impl OverdrawMaterial {
    pub fn builtin(kind: MaterialKind) -> Self {
        Self {
            label: format!("Overdraw {} (built-in)", kind.name()),
            kind,
            source: COUNTING_WGSL.to_string(),
            vertex_entry: "vs_main".to_string(),
            fragment_entry: kind.default_fragment_entry().to_string(),
        }
    }

    /// Resolve a material from settings, falling back to the built-in shader
    /// and entry points for anything left unset.
    pub fn from_settings(kind: MaterialKind, settings: &MaterialSettings) -> Result<Self, ConfigError> {
        let builtin = Self::builtin(kind);
        let source = settings.load_source(kind.name())?;
        let label = match &settings.shader {
            Some(path) => format!("Overdraw {} ({})", kind.name(), path.display()),
            None => builtin.label.clone(),
        };

        Ok(Self {
            label,
            kind,
            source: source.unwrap_or(builtin.source),
            vertex_entry: settings
                .vertex_entry
                .clone()
                .unwrap_or(builtin.vertex_entry),
            fragment_entry: settings
                .fragment_entry
                .clone()
                .unwrap_or(builtin.fragment_entry),
        })
    }

    /// Build the counting pipeline for this material.
    pub(crate) fn create_pipeline(
        &self,
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> wgpu::RenderPipeline {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&self.label),
            source: wgpu::ShaderSource::Wgsl(self.source.as_str().into()),
        });

        create_geometry_pipeline(
            device,
            &self.label,
            &shader,
            &self.vertex_entry,
            &self.fragment_entry,
            layout,
            self.kind,
            color_format,
            depth_format,
            wgpu::ColorWrites::ALL,
        )
    }
}

/// Unlit pipeline used instead of the override material for scene views.
///
/// Shares the counting layout so one render pass serves both, but masks the
/// counter attachment.
pub(crate) fn create_scene_view_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    kind: MaterialKind,
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Scene View Shader"),
        source: wgpu::ShaderSource::Wgsl(SCENE_VIEW_WGSL.into()),
    });

    create_geometry_pipeline(
        device,
        &format!("Scene View {} Pipeline", kind.name()),
        &shader,
        "vs_main",
        "fs_main",
        layout,
        kind,
        color_format,
        depth_format,
        wgpu::ColorWrites::empty(),
    )
}

#[allow(clippy::too_many_arguments)]
fn create_geometry_pipeline(
    device: &wgpu::Device,
    label: &str,
    shader: &wgpu::ShaderModule,
    vertex_entry: &str,
    fragment_entry: &str,
    layout: &wgpu::PipelineLayout,
    kind: MaterialKind,
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
    counter_writes: wgpu::ColorWrites,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(vertex_entry),
            buffers: &[Vertex::layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fragment_entry),
            targets: &[
                Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: kind.color_blend(),
                    write_mask: wgpu::ColorWrites::ALL,
                }),
                Some(wgpu::ColorTargetState {
                    format: crate::target::COUNTER_FORMAT,
                    blend: Some(COUNTER_BLEND),
                    write_mask: counter_writes,
                }),
            ],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // Counting must see back faces too; culling would hide real overdraw.
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: Some(kind.depth_stencil(depth_format)),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_builtin_entries() {
        let opaque = OverdrawMaterial::builtin(MaterialKind::Opaque);
        let transparent = OverdrawMaterial::builtin(MaterialKind::Transparent);

        assert_eq!(opaque.fragment_entry, "fs_opaque");
        assert_eq!(transparent.fragment_entry, "fs_transparent");
        for material in [&opaque, &transparent] {
            assert!(material.source.contains(&format!("fn {}", material.vertex_entry)));
            assert!(material.source.contains(&format!("fn {}", material.fragment_entry)));
        }
    }

    #[test]
    fn test_settings_override_entries_only() {
        let settings = MaterialSettings {
            shader: None,
            vertex_entry: None,
            fragment_entry: Some("fs_custom".to_string()),
        };
        let material = OverdrawMaterial::from_settings(MaterialKind::Transparent, &settings).unwrap();

        assert_eq!(material.source, COUNTING_WGSL);
        assert_eq!(material.vertex_entry, "vs_main");
        assert_eq!(material.fragment_entry, "fs_custom");
    }

    #[test]
    fn test_missing_shader_file_fails() {
        let settings = MaterialSettings {
            shader: Some(PathBuf::from("missing/overdraw_opaque.wgsl")),
            ..Default::default()
        };
        let err = OverdrawMaterial::from_settings(MaterialKind::Opaque, &settings).unwrap_err();
        assert!(matches!(err, ConfigError::MissingShader { .. }));
    }

    #[test]
    fn test_render_state_per_kind() {
        assert!(MaterialKind::Opaque.color_blend().is_none());
        assert!(MaterialKind::Transparent.color_blend().is_some());

        let format = wgpu::TextureFormat::Depth32Float;
        assert!(MaterialKind::Opaque.depth_stencil(format).depth_write_enabled);
        assert!(!MaterialKind::Transparent.depth_stencil(format).depth_write_enabled);
        assert_eq!(MaterialKind::Opaque.sorting(), SortingCriteria::CommonOpaque);
        assert_eq!(
            MaterialKind::Transparent.queue_range(),
            RenderQueueRange::TRANSPARENT
        );
    }
}
