//! Vulkan implementation of [`GraphicsBackend`]
//!
//! Vulkan has no program objects or name-addressed uniforms, so a "program"
//! here is the pair of stage modules, the attribute bindings, and one
//! host-visible uniform buffer laid out as [`UNIFORM_BLOCK`] (std140).
//! Pipelines are built by the caller from [`VulkanBackend::vertex_input`]
//! and [`VulkanBackend::program_modules`].

use ash::vk;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::rc::Rc;

use super::buffer::Buffer;
use super::context::VulkanContext;
use super::shader::{CompiledStage, ShaderModule};
use super::vertex_layout::VulkanVertexLayout;
use crate::render::backend::{
    BackendError, BackendResult, BufferHandle, BufferKind, BuildStatus, GraphicsBackend,
    ProgramHandle, ShaderHandle, ShaderStage, UniformLocation, VertexArrayHandle,
};
use crate::render::material::{
    AMBIENT_UNIFORM, DIFFUSE_UNIFORM, SPECULAR_POWER_UNIFORM, SPECULAR_UNIFORM,
};
use crate::render::mesh::VertexAttribute;
use crate::render::shader::MODEL_MATRIX_UNIFORM;

/// Per-program uniform block: (name, byte offset, byte size)
pub const UNIFORM_BLOCK: [(&str, u64, usize); 5] = [
    (MODEL_MATRIX_UNIFORM, 0, 64),
    (AMBIENT_UNIFORM, 64, 16),
    (DIFFUSE_UNIFORM, 80, 16),
    (SPECULAR_UNIFORM, 96, 16),
    (SPECULAR_POWER_UNIFORM, 112, 4),
];

/// Size of the uniform block in bytes
pub const UNIFORM_BLOCK_SIZE: u64 = 128;

struct VulkanProgram {
    attached: Vec<(ShaderStage, Option<Rc<ShaderModule>>, BuildStatus)>,
    attribute_bindings: BTreeMap<u32, String>,
    status: Option<BuildStatus>,
    uniforms: Option<Buffer>,
}

/// Graphics backend on top of a headless [`VulkanContext`]
///
/// Field order matters: every resource must drop before the context.
pub struct VulkanBackend {
    next_id: u32,
    buffers: HashMap<u32, Buffer>,
    vertex_arrays: HashMap<u32, VulkanVertexLayout>,
    shaders: HashMap<u32, CompiledStage>,
    programs: HashMap<u32, VulkanProgram>,
    context: VulkanContext,
}

impl VulkanBackend {
    /// Create the backend, opening a new Vulkan device
    pub fn new(app_name: &str) -> BackendResult<Self> {
        let context = VulkanContext::new(app_name)?;
        Ok(Self::with_context(context))
    }

    /// Create the backend on an existing context
    pub fn with_context(context: VulkanContext) -> Self {
        Self {
            next_id: 0,
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            context,
        }
    }

    /// Underlying context
    pub fn context(&self) -> &VulkanContext {
        &self.context
    }

    /// Raw Vulkan buffer for a handle
    pub fn buffer(&self, buffer: BufferHandle) -> Option<vk::Buffer> {
        self.buffers.get(&buffer.0).map(Buffer::handle)
    }

    /// Vertex input state for pipeline creation
    pub fn vertex_input(
        &self,
        vertex_array: VertexArrayHandle,
    ) -> Option<(vk::VertexInputBindingDescription, Vec<vk::VertexInputAttributeDescription>)> {
        let layout = self.vertex_arrays.get(&vertex_array.0)?;
        Some((layout.binding_description(), layout.attribute_descriptions()))
    }

    /// Vertex and fragment modules of a linked program
    pub fn program_modules(
        &self,
        program: ProgramHandle,
    ) -> Option<(vk::ShaderModule, vk::ShaderModule)> {
        let record = self.programs.get(&program.0)?;
        if !matches!(record.status, Some(BuildStatus::Success)) {
            return None;
        }
        let module_for = |stage: ShaderStage| {
            record
                .attached
                .iter()
                .find(|(s, _, _)| *s == stage)
                .and_then(|(_, module, _)| module.as_ref().map(|m| m.handle()))
        };
        Some((module_for(ShaderStage::Vertex)?, module_for(ShaderStage::Fragment)?))
    }

    /// Uniform buffer of a linked program
    pub fn uniform_buffer(&self, program: ProgramHandle) -> Option<vk::Buffer> {
        self.programs.get(&program.0)?.uniforms.as_ref().map(Buffer::handle)
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn write_uniform(&self, program: ProgramHandle, location: UniformLocation, bytes: &[u8]) {
        let Ok(index) = usize::try_from(location.0) else {
            return;
        };
        let Some((name, offset, size)) = UNIFORM_BLOCK.get(index).copied() else {
            log::warn!("{} has no uniform at location {}", program, location.0);
            return;
        };
        if size != bytes.len() {
            log::warn!("{} expects {} bytes, got {}", name, size, bytes.len());
            return;
        }
        let Some(buffer) = self.programs.get(&program.0).and_then(|p| p.uniforms.as_ref()) else {
            log::warn!("Uniform upload to unlinked {}", program);
            return;
        };
        if let Err(e) = buffer.write_at(offset, bytes) {
            log::error!("Failed to write {} on {}: {}", name, program, e);
        }
    }

    fn link(record: &VulkanProgram) -> BuildStatus {
        let mut errors = Vec::new();
        for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
            let stages: Vec<_> = record.attached.iter().filter(|(s, _, _)| *s == stage).collect();
            match stages.as_slice() {
                [] => errors.push(format!("no {stage} shader attached")),
                [(_, _, status)] if !status.is_success() => {
                    errors.push(format!("{stage} shader is not compiled"));
                }
                [_] => {}
                _ => errors.push(format!("{} {stage} shaders attached", stages.len())),
            }
        }

        if errors.is_empty() {
            BuildStatus::Success
        } else {
            BuildStatus::Failed { log: errors.join("\n") }
        }
    }
}

impl GraphicsBackend for VulkanBackend {
    fn create_vertex_array(&mut self) -> BackendResult<VertexArrayHandle> {
        let id = self.next_id();
        self.vertex_arrays.insert(id, VulkanVertexLayout::default());
        Ok(VertexArrayHandle(id))
    }

    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> BackendResult<BufferHandle> {
        let usage = match kind {
            BufferKind::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferKind::Index => vk::BufferUsageFlags::INDEX_BUFFER,
        };
        let buffer =
            Buffer::with_data(&self.context, usage, data).map_err(|e| match BackendError::from(e) {
                BackendError::OutOfMemory { .. } => {
                    BackendError::OutOfMemory { requested: data.len() }
                }
                other => other,
            })?;

        let id = self.next_id();
        self.buffers.insert(id, buffer);
        log::debug!("Created {:?} buffer {} ({} bytes)", kind, id, data.len());
        Ok(BufferHandle(id))
    }

    fn set_index_buffer(
        &mut self,
        vertex_array: VertexArrayHandle,
        buffer: BufferHandle,
    ) -> BackendResult<()> {
        if !self.buffers.contains_key(&buffer.0) {
            return Err(BackendError::InvalidHandle { kind: "index buffer", id: buffer.0 });
        }
        let layout = self
            .vertex_arrays
            .get_mut(&vertex_array.0)
            .ok_or(BackendError::InvalidHandle { kind: "vertex array", id: vertex_array.0 })?;
        layout.index_buffer = Some(buffer.0);
        Ok(())
    }

    fn set_vertex_attribute(
        &mut self,
        vertex_array: VertexArrayHandle,
        buffer: BufferHandle,
        attribute: &VertexAttribute,
    ) -> BackendResult<()> {
        if !self.buffers.contains_key(&buffer.0) {
            return Err(BackendError::InvalidHandle { kind: "vertex buffer", id: buffer.0 });
        }
        let layout = self
            .vertex_arrays
            .get_mut(&vertex_array.0)
            .ok_or(BackendError::InvalidHandle { kind: "vertex array", id: vertex_array.0 })?;
        layout.attributes.insert(attribute.location, (buffer.0, *attribute));
        Ok(())
    }

    fn compile_shader(&mut self, stage: ShaderStage, path: &Path) -> BackendResult<ShaderHandle> {
        let bytes = std::fs::read(path).map_err(|source| BackendError::ShaderSource {
            path: path.to_path_buf(),
            source,
        })?;

        let compiled = CompiledStage::compile(self.context.device(), stage, &bytes);
        let id = self.next_id();
        self.shaders.insert(id, compiled);
        Ok(ShaderHandle(id))
    }

    fn shader_status(&self, shader: ShaderHandle) -> BackendResult<BuildStatus> {
        self.shaders
            .get(&shader.0)
            .map(|s| s.status.clone())
            .ok_or(BackendError::InvalidHandle { kind: "shader", id: shader.0 })
    }

    fn create_program(&mut self) -> BackendResult<ProgramHandle> {
        let id = self.next_id();
        self.programs.insert(
            id,
            VulkanProgram {
                attached: Vec::new(),
                attribute_bindings: BTreeMap::new(),
                status: None,
                uniforms: None,
            },
        );
        Ok(ProgramHandle(id))
    }

    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) -> BackendResult<()> {
        let stage = self
            .shaders
            .get(&shader.0)
            .ok_or(BackendError::InvalidHandle { kind: "shader", id: shader.0 })?;
        let entry = (stage.stage, stage.module.clone(), stage.status.clone());
        self.programs
            .get_mut(&program.0)
            .ok_or(BackendError::InvalidHandle { kind: "program", id: program.0 })?
            .attached
            .push(entry);
        Ok(())
    }

    fn bind_attribute_location(
        &mut self,
        program: ProgramHandle,
        location: u32,
        name: &str,
    ) -> BackendResult<()> {
        let record = self
            .programs
            .get_mut(&program.0)
            .ok_or(BackendError::InvalidHandle { kind: "program", id: program.0 })?;
        record.attribute_bindings.retain(|_, bound| bound.as_str() != name);
        record.attribute_bindings.insert(location, name.to_string());
        Ok(())
    }

    fn link_program(&mut self, program: ProgramHandle) -> BackendResult<()> {
        let status = {
            let record = self
                .programs
                .get(&program.0)
                .ok_or(BackendError::InvalidHandle { kind: "program", id: program.0 })?;
            Self::link(record)
        };

        let uniforms = if status.is_success() {
            Some(Buffer::new(
                &self.context,
                UNIFORM_BLOCK_SIZE,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
            )?)
        } else {
            None
        };

        if let Some(record) = self.programs.get_mut(&program.0) {
            record.status = Some(status);
            record.uniforms = uniforms;
        }
        Ok(())
    }

    fn program_status(&self, program: ProgramHandle) -> BackendResult<BuildStatus> {
        let record = self
            .programs
            .get(&program.0)
            .ok_or(BackendError::InvalidHandle { kind: "program", id: program.0 })?;
        Ok(record.status.clone().unwrap_or(BuildStatus::Failed {
            log: "program has not been linked".to_string(),
        }))
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> UniformLocation {
        let linked = self
            .programs
            .get(&program.0)
            .is_some_and(|p| matches!(p.status, Some(BuildStatus::Success)));
        if !linked {
            return UniformLocation::INVALID;
        }
        UNIFORM_BLOCK
            .iter()
            .position(|(uniform, _, _)| *uniform == name)
            .and_then(|i| i32::try_from(i).ok())
            .map_or(UniformLocation::INVALID, UniformLocation)
    }

    fn set_uniform_vec4(
        &mut self,
        program: ProgramHandle,
        location: UniformLocation,
        value: [f32; 4],
    ) {
        self.write_uniform(program, location, bytemuck::cast_slice(&value));
    }

    fn set_uniform_f32(&mut self, program: ProgramHandle, location: UniformLocation, value: f32) {
        self.write_uniform(program, location, bytemuck::bytes_of(&value));
    }

    fn set_uniform_mat4(
        &mut self,
        program: ProgramHandle,
        location: UniformLocation,
        value: [[f32; 4]; 4],
    ) {
        self.write_uniform(program, location, bytemuck::cast_slice(&value));
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        if self.shaders.remove(&shader.0).is_none() {
            log::warn!("Delete of unknown {}", shader);
        }
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program.0).is_none() {
            log::warn!("Delete of unknown {}", program);
        }
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer.0).is_none() {
            log::warn!("Delete of unknown {}", buffer);
        }
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        if self.vertex_arrays.remove(&vertex_array.0).is_none() {
            log::warn!("Delete of unknown {}", vertex_array);
        }
    }
}
