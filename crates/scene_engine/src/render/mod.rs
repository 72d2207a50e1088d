//! Rendering: backend abstraction, meshes, materials and shader programs
//!
//! [`GraphicsBackend`] is the seam between the scene and a graphics API.
//! [`HeadlessBackend`] implements it in memory; the `vulkan` feature adds
//! `VulkanBackend`.

pub mod backend;
pub mod headless;
pub mod material;
pub mod mesh;
pub mod shader;

#[cfg(feature = "vulkan")]
pub mod vulkan;

pub use backend::{
    BackendError, BackendResult, BufferHandle, BufferKind, BuildStatus, GraphicsBackend,
    ProgramHandle, ShaderHandle, ShaderStage, UniformLocation, VertexArrayHandle,
};
pub use headless::{HeadlessBackend, ResourceStats, UniformValue};
pub use material::{Material, SpecularPowerSource, DEFAULT_SPECULAR_POWER_SOURCE};
pub use mesh::{Mesh, MeshBuffers, Vertex, VertexAttribute, VERTEX_ATTRIBUTES, VERTEX_STRIDE};
pub use shader::{load_program, ShaderError, MODEL_MATRIX_UNIFORM};

#[cfg(feature = "vulkan")]
pub use vulkan::VulkanBackend;
