//! Host-side geometry handed to the geometry pass.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2};
use overdraw_core::{RenderQueue, Sortable};
use wgpu::util::DeviceExt;

/// Vertex layout every override material must accept at location 0.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Indexed triangle list owned by the host.
pub struct Mesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl Mesh {
    pub fn new(device: &wgpu::Device, label: &str, vertices: &[Vertex], indices: &[u32]) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Vertex Buffer")),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Index Buffer")),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        }
    }

    /// Axis-aligned quad in the XY plane at depth `z`.
    pub fn quad(device: &wgpu::Device, label: &str, min: Vec2, max: Vec2, z: f32) -> Self {
        let vertices = [
            Vertex {
                position: [min.x, min.y, z],
            },
            Vertex {
                position: [max.x, min.y, z],
            },
            Vertex {
                position: [max.x, max.y, z],
            },
            Vertex {
                position: [min.x, max.y, z],
            },
        ];
        Self::new(device, label, &vertices, &[0, 1, 2, 0, 2, 3])
    }

    pub(crate) fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

/// One visible object for this frame.
#[derive(Clone, Copy)]
pub struct Drawable<'a> {
    pub mesh: &'a Mesh,
    pub transform: Mat4,
    /// Linear RGBA used by the shaded color channel; alpha matters for transparent queues.
    pub color: [f32; 4],
    pub render_queue: RenderQueue,
    /// View-space distance, typically from [`crate::Camera::view_depth`].
    pub sort_key: f32,
}

impl Sortable for Drawable<'_> {
    fn render_queue(&self) -> RenderQueue {
        self.render_queue
    }

    fn sort_key(&self) -> f32 {
        self.sort_key
    }
}

/// Per-draw uniform (group 1, dynamic offset).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct DrawUniform {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl From<&Drawable<'_>> for DrawUniform {
    fn from(drawable: &Drawable<'_>) -> Self {
        Self {
            model: drawable.transform.to_cols_array_2d(),
            color: drawable.color,
        }
    }
}
