//! Backend abstraction for GPU resource management
//!
//! Scene nodes never touch a graphics API directly. Every call goes through
//! [`GraphicsBackend`] with the resource it acts on passed explicitly, so no
//! call depends on what some other object bound earlier.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::render::mesh::VertexAttribute;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

macro_rules! resource_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            /// Raw backend identifier
            pub fn id(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

resource_handle!(
    /// Handle to a vertex or index buffer
    BufferHandle
);
resource_handle!(
    /// Handle to a vertex array (attribute layout plus bound buffers)
    VertexArrayHandle
);
resource_handle!(
    /// Handle to a single compiled shader stage
    ShaderHandle
);
resource_handle!(
    /// Handle to a linked shader program
    ProgramHandle
);

/// Location of a uniform inside a program
///
/// Lookups of names the program does not declare return [`UniformLocation::INVALID`];
/// uploads to that location are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub i32);

impl UniformLocation {
    /// Location returned for unknown uniform names
    pub const INVALID: Self = Self(-1);

    /// Whether this location refers to a declared uniform
    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

/// Kind of data a buffer holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Per-vertex attribute data
    Vertex,
    /// Triangle indices
    Index,
}

/// Programmable pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader
    Vertex,
    /// Fragment shader
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// Outcome of a compile or link step as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    /// The step succeeded
    Success,
    /// The step failed; `log` holds the backend's info log
    Failed {
        /// Diagnostic text
        log: String,
    },
}

impl BuildStatus {
    /// Whether the step succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Backend-level errors
#[derive(Error, Debug)]
pub enum BackendError {
    /// Device memory could not be allocated
    #[error("Out of memory: {requested} bytes")]
    OutOfMemory {
        /// Number of bytes that were requested
        requested: usize,
    },

    /// A handle does not name a live resource of the expected kind
    #[error("Invalid {kind} handle: {id}")]
    InvalidHandle {
        /// Resource kind
        kind: &'static str,
        /// Raw handle value
        id: u32,
    },

    /// Shader source file could not be read
    #[error("Failed to read shader source {path}: {source}")]
    ShaderSource {
        /// File that was requested
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Graphics API reported an error
    #[error("Backend API error: {0}")]
    Api(String),
}

/// Capability set a renderer must provide for scene nodes
///
/// The surface mirrors the classic buffer / shader / program / uniform model.
/// Creation calls return errors for allocation or I/O failures; compile and
/// link problems are not errors at this level and are queried through
/// [`shader_status`](Self::shader_status) and
/// [`program_status`](Self::program_status).
pub trait GraphicsBackend {
    /// Create an empty vertex array
    fn create_vertex_array(&mut self) -> BackendResult<VertexArrayHandle>;

    /// Allocate a buffer and upload `data` into it as static contents
    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> BackendResult<BufferHandle>;

    /// Bind an index buffer to a vertex array
    fn set_index_buffer(
        &mut self,
        vertex_array: VertexArrayHandle,
        buffer: BufferHandle,
    ) -> BackendResult<()>;

    /// Enable an attribute slot on a vertex array, sourcing it from `buffer`
    fn set_vertex_attribute(
        &mut self,
        vertex_array: VertexArrayHandle,
        buffer: BufferHandle,
        attribute: &VertexAttribute,
    ) -> BackendResult<()>;

    /// Load a shader stage from `path` and compile it
    fn compile_shader(&mut self, stage: ShaderStage, path: &Path) -> BackendResult<ShaderHandle>;

    /// Compile diagnostics for a stage
    fn shader_status(&self, shader: ShaderHandle) -> BackendResult<BuildStatus>;

    /// Create an empty program
    fn create_program(&mut self) -> BackendResult<ProgramHandle>;

    /// Attach a compiled stage to a program
    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) -> BackendResult<()>;

    /// Bind a vertex input name to an attribute slot; takes effect at link time
    fn bind_attribute_location(
        &mut self,
        program: ProgramHandle,
        location: u32,
        name: &str,
    ) -> BackendResult<()>;

    /// Link the attached stages
    fn link_program(&mut self, program: ProgramHandle) -> BackendResult<()>;

    /// Link diagnostics for a program
    fn program_status(&self, program: ProgramHandle) -> BackendResult<BuildStatus>;

    /// Look up a uniform by name
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> UniformLocation;

    /// Upload a four-component vector uniform
    fn set_uniform_vec4(
        &mut self,
        program: ProgramHandle,
        location: UniformLocation,
        value: [f32; 4],
    );

    /// Upload a scalar uniform
    fn set_uniform_f32(&mut self, program: ProgramHandle, location: UniformLocation, value: f32);

    /// Upload a column-major 4x4 matrix uniform
    fn set_uniform_mat4(
        &mut self,
        program: ProgramHandle,
        location: UniformLocation,
        value: [[f32; 4]; 4],
    );

    /// Release a shader stage
    fn delete_shader(&mut self, shader: ShaderHandle);

    /// Release a program
    fn delete_program(&mut self, program: ProgramHandle);

    /// Release a buffer
    fn delete_buffer(&mut self, buffer: BufferHandle);

    /// Release a vertex array
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle);
}

/// Lets a scene run on a backend the caller keeps ownership of
impl<B: GraphicsBackend + ?Sized> GraphicsBackend for &mut B {
    fn create_vertex_array(&mut self) -> BackendResult<VertexArrayHandle> {
        (**self).create_vertex_array()
    }

    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> BackendResult<BufferHandle> {
        (**self).create_buffer(kind, data)
    }

    fn set_index_buffer(
        &mut self,
        vertex_array: VertexArrayHandle,
        buffer: BufferHandle,
    ) -> BackendResult<()> {
        (**self).set_index_buffer(vertex_array, buffer)
    }

    fn set_vertex_attribute(
        &mut self,
        vertex_array: VertexArrayHandle,
        buffer: BufferHandle,
        attribute: &VertexAttribute,
    ) -> BackendResult<()> {
        (**self).set_vertex_attribute(vertex_array, buffer, attribute)
    }

    fn compile_shader(&mut self, stage: ShaderStage, path: &Path) -> BackendResult<ShaderHandle> {
        (**self).compile_shader(stage, path)
    }

    fn shader_status(&self, shader: ShaderHandle) -> BackendResult<BuildStatus> {
        (**self).shader_status(shader)
    }

    fn create_program(&mut self) -> BackendResult<ProgramHandle> {
        (**self).create_program()
    }

    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) -> BackendResult<()> {
        (**self).attach_shader(program, shader)
    }

    fn bind_attribute_location(
        &mut self,
        program: ProgramHandle,
        location: u32,
        name: &str,
    ) -> BackendResult<()> {
        (**self).bind_attribute_location(program, location, name)
    }

    fn link_program(&mut self, program: ProgramHandle) -> BackendResult<()> {
        (**self).link_program(program)
    }

    fn program_status(&self, program: ProgramHandle) -> BackendResult<BuildStatus> {
        (**self).program_status(program)
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> UniformLocation {
        (**self).uniform_location(program, name)
    }

    fn set_uniform_vec4(
        &mut self,
        program: ProgramHandle,
        location: UniformLocation,
        value: [f32; 4],
    ) {
        (**self).set_uniform_vec4(program, location, value);
    }

    fn set_uniform_f32(&mut self, program: ProgramHandle, location: UniformLocation, value: f32) {
        (**self).set_uniform_f32(program, location, value);
    }

    fn set_uniform_mat4(
        &mut self,
        program: ProgramHandle,
        location: UniformLocation,
        value: [[f32; 4]; 4],
    ) {
        (**self).set_uniform_mat4(program, location, value);
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        (**self).delete_shader(shader);
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        (**self).delete_program(program);
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        (**self).delete_buffer(buffer);
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        (**self).delete_vertex_array(vertex_array);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_location_validity() {
        assert!(!UniformLocation::INVALID.is_valid());
        assert!(UniformLocation(0).is_valid());
        assert!(UniformLocation(7).is_valid());
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(BufferHandle(3).to_string(), "BufferHandle(3)");
        assert_eq!(ProgramHandle(1).id(), 1);
    }

    #[test]
    fn test_backend_error_messages() {
        let err = BackendError::OutOfMemory { requested: 96 };
        assert_eq!(err.to_string(), "Out of memory: 96 bytes");

        let err = BackendError::InvalidHandle { kind: "buffer", id: 4 };
        assert_eq!(err.to_string(), "Invalid buffer handle: 4");
    }
}
