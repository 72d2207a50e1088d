//! Mesh representation for 3D models
//!
//! Contains the vertex record uploaded to the GPU, its fixed attribute layout,
//! and the GPU-side buffers a scene node owns once its mesh is uploaded.

use std::mem::{offset_of, size_of};

use bytemuck::{Pod, Zeroable};

use crate::render::backend::{
    BackendResult, BufferHandle, BufferKind, GraphicsBackend, VertexArrayHandle,
};

/// 3D vertex data structure for rendering
///
/// Tightly packed: position, colour, texture coordinates, normal.
/// The `#[repr(C)]` layout is what the attribute slots in
/// [`VERTEX_ATTRIBUTES`] describe.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    /// Position in 3D space
    pub position: [f32; 3],

    /// RGBA colour
    pub colour: [f32; 4],

    /// Texture coordinates
    pub tex_coords: [f32; 2],

    /// Normal vector
    pub normal: [f32; 3],
}

impl Vertex {
    /// Create a new vertex
    pub fn new(
        position: [f32; 3],
        colour: [f32; 4],
        tex_coords: [f32; 2],
        normal: [f32; 3],
    ) -> Self {
        Self {
            position,
            colour,
            tex_coords,
            normal,
        }
    }
}

/// One attribute slot of the vertex layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Attribute slot the shader reads from
    pub location: u32,
    /// Name the vertex shader declares for this input
    pub name: &'static str,
    /// Number of `f32` components
    pub components: u32,
    /// Byte offset inside [`Vertex`]
    pub offset: usize,
    /// Distance in bytes between consecutive vertices
    pub stride: usize,
}

/// Size of one [`Vertex`] record in bytes
pub const VERTEX_STRIDE: usize = size_of::<Vertex>();

/// Fixed attribute slots for [`Vertex`]
pub const VERTEX_ATTRIBUTES: [VertexAttribute; 4] = [
    VertexAttribute {
        location: 0,
        name: "vertexPosition",
        components: 3,
        offset: offset_of!(Vertex, position),
        stride: VERTEX_STRIDE,
    },
    VertexAttribute {
        location: 1,
        name: "vertexColour",
        components: 4,
        offset: offset_of!(Vertex, colour),
        stride: VERTEX_STRIDE,
    },
    VertexAttribute {
        location: 2,
        name: "vertexTexCoords",
        components: 2,
        offset: offset_of!(Vertex, tex_coords),
        stride: VERTEX_STRIDE,
    },
    VertexAttribute {
        location: 3,
        name: "vertexNormal",
        components: 3,
        offset: offset_of!(Vertex, normal),
        stride: VERTEX_STRIDE,
    },
];

/// CPU-side mesh data
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Vertex data
    pub vertices: Vec<Vertex>,

    /// Index data for triangles
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a new mesh
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Unit cube centered at the origin, one colour per face
    ///
    /// Each face has its own four vertices so normals stay flat:
    /// 24 vertices, 36 indices.
    pub fn cube() -> Self {
        // (normal, colour) per face
        let faces: [([f32; 3], [f32; 4]); 6] = [
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0, 1.0]),
            ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0, 1.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 1.0]),
            ([1.0, 0.0, 0.0], [1.0, 1.0, 0.0, 1.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 1.0, 1.0]),
            ([0.0, -1.0, 0.0], [0.0, 1.0, 1.0, 1.0]),
        ];
        let tex_coords = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);

        for (normal, colour) in faces {
            let n = normal;
            // Two tangent axes spanning the face
            let (u, v) = if n[0] != 0.0 {
                ([0.0, 0.0, -n[0]], [0.0, 1.0, 0.0])
            } else if n[1] != 0.0 {
                ([1.0, 0.0, 0.0], [0.0, 0.0, -n[1]])
            } else {
                ([n[2], 0.0, 0.0], [0.0, 1.0, 0.0])
            };

            let base = vertices.len() as u32;
            for (corner, uv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
                .into_iter()
                .zip(tex_coords)
            {
                let (cu, cv) = corner;
                let position = [
                    0.5 * (n[0] + cu * u[0] + cv * v[0]),
                    0.5 * (n[1] + cu * u[1] + cv * v[1]),
                    0.5 * (n[2] + cu * u[2] + cv * v[2]),
                ];
                vertices.push(Vertex::new(position, colour, uv, normal));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        Self::new(vertices, indices)
    }

    /// Single triangle in the XY plane facing +Z
    pub fn triangle() -> Self {
        let normal = [0.0, 0.0, 1.0];
        Self::new(
            vec![
                Vertex::new([-0.5, -0.5, 0.0], [1.0, 0.0, 0.0, 1.0], [0.0, 0.0], normal),
                Vertex::new([0.5, -0.5, 0.0], [0.0, 1.0, 0.0, 1.0], [1.0, 0.0], normal),
                Vertex::new([0.0, 0.5, 0.0], [0.0, 0.0, 1.0, 1.0], [0.5, 1.0], normal),
            ],
            vec![0, 1, 2],
        )
    }
}

/// GPU buffers backing one uploaded mesh
///
/// Either fully created or not at all; a failed upload releases whatever it
/// had already allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshBuffers {
    /// Vertex array holding the attribute layout
    pub vertex_array: VertexArrayHandle,
    /// Vertex data
    pub vertex_buffer: BufferHandle,
    /// Index data
    pub index_buffer: BufferHandle,
    /// Number of vertices uploaded
    pub vertex_count: usize,
    /// Number of indices uploaded
    pub index_count: usize,
}

impl MeshBuffers {
    /// Upload vertices and indices and configure the four attribute slots
    pub fn upload<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> BackendResult<Self> {
        let vertex_array = backend.create_vertex_array()?;

        let vertex_data = bytemuck::cast_slice(vertices);
        let vertex_buffer = match backend.create_buffer(BufferKind::Vertex, vertex_data) {
            Ok(buffer) => buffer,
            Err(e) => {
                backend.delete_vertex_array(vertex_array);
                return Err(e);
            }
        };

        let index_data = bytemuck::cast_slice(indices);
        let index_buffer = match backend.create_buffer(BufferKind::Index, index_data) {
            Ok(buffer) => buffer,
            Err(e) => {
                backend.delete_buffer(vertex_buffer);
                backend.delete_vertex_array(vertex_array);
                return Err(e);
            }
        };

        let buffers = Self {
            vertex_array,
            vertex_buffer,
            index_buffer,
            vertex_count: vertices.len(),
            index_count: indices.len(),
        };

        if let Err(e) = buffers.configure_layout(backend) {
            buffers.release(backend);
            return Err(e);
        }

        log::debug!(
            "Uploaded mesh: {} vertices, {} indices ({}, {}, {})",
            buffers.vertex_count,
            buffers.index_count,
            vertex_array,
            vertex_buffer,
            index_buffer
        );

        Ok(buffers)
    }

    fn configure_layout<B: GraphicsBackend + ?Sized>(&self, backend: &mut B) -> BackendResult<()> {
        backend.set_index_buffer(self.vertex_array, self.index_buffer)?;
        for attribute in &VERTEX_ATTRIBUTES {
            backend.set_vertex_attribute(self.vertex_array, self.vertex_buffer, attribute)?;
        }
        Ok(())
    }

    /// Release all three GPU objects
    pub fn release<B: GraphicsBackend + ?Sized>(self, backend: &mut B) {
        backend.delete_buffer(self.index_buffer);
        backend.delete_buffer(self.vertex_buffer);
        backend.delete_vertex_array(self.vertex_array);
    }
}
