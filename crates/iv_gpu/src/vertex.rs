use bytemuck::{Pod, Zeroable};

/// Quad vertex: NDC position plus texture coordinate (v grows downwards).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub tex_coords: [f32; 2],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Unit quad covering [-1, 1]²; the transform uniform places it on screen.
pub const QUAD_VERTICES: [Vertex; 4] = [
    Vertex { position: [-1.0, -1.0], tex_coords: [0.0, 1.0] }, // Bottom-left
    Vertex { position: [1.0, -1.0], tex_coords: [1.0, 1.0] },  // Bottom-right
    Vertex { position: [1.0, 1.0], tex_coords: [1.0, 0.0] },   // Top-right
    Vertex { position: [-1.0, 1.0], tex_coords: [0.0, 0.0] },  // Top-left
];

pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];
