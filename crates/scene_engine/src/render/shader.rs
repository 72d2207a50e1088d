//! Shader program setup
//!
//! Builds a linked program from a vertex and a fragment source file with the
//! attribute slots of [`VERTEX_ATTRIBUTES`](crate::render::mesh::VERTEX_ATTRIBUTES)
//! bound by name.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::render::backend::{
    BackendError, BuildStatus, GraphicsBackend, ProgramHandle, ShaderHandle, ShaderStage,
};
use crate::render::mesh::VERTEX_ATTRIBUTES;

/// Uniform receiving a node's world matrix
pub const MODEL_MATRIX_UNIFORM: &str = "modelMatrix";

/// Shader setup errors
#[derive(Error, Debug)]
pub enum ShaderError {
    /// A stage failed to compile
    #[error("{stage} shader {path} failed to compile: {log}")]
    Compile {
        /// Stage that failed
        stage: ShaderStage,
        /// Source file of the stage
        path: PathBuf,
        /// Compiler info log
        log: String,
    },

    /// The program failed to link
    #[error("Shader program failed to link: {log}")]
    Link {
        /// Linker info log
        log: String,
    },

    /// The backend could not create or load a shader object
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Compile both stages, bind the fixed attribute slots and link
///
/// The two stage objects are always released before returning. On failure
/// the program object is released too, so nothing is left behind.
pub fn load_program<B: GraphicsBackend + ?Sized>(
    backend: &mut B,
    vertex_path: &Path,
    fragment_path: &Path,
) -> Result<ProgramHandle, ShaderError> {
    let vertex = compile_stage(backend, ShaderStage::Vertex, vertex_path)?;
    let fragment = match compile_stage(backend, ShaderStage::Fragment, fragment_path) {
        Ok(fragment) => fragment,
        Err(e) => {
            backend.delete_shader(vertex);
            return Err(e);
        }
    };

    let result = link(backend, vertex, fragment);

    backend.delete_shader(vertex);
    backend.delete_shader(fragment);

    let program = result?;
    log::debug!(
        "Linked {} from {} and {}",
        program,
        vertex_path.display(),
        fragment_path.display()
    );
    Ok(program)
}

fn compile_stage<B: GraphicsBackend + ?Sized>(
    backend: &mut B,
    stage: ShaderStage,
    path: &Path,
) -> Result<ShaderHandle, ShaderError> {
    let shader = backend.compile_shader(stage, path)?;

    let status = match backend.shader_status(shader) {
        Ok(status) => status,
        Err(e) => {
            backend.delete_shader(shader);
            return Err(e.into());
        }
    };

    match status {
        BuildStatus::Success => Ok(shader),
        BuildStatus::Failed { log } => {
            log::error!("{} shader {} failed to compile:\n{}", stage, path.display(), log);
            backend.delete_shader(shader);
            Err(ShaderError::Compile {
                stage,
                path: path.to_path_buf(),
                log,
            })
        }
    }
}

fn link<B: GraphicsBackend + ?Sized>(
    backend: &mut B,
    vertex: ShaderHandle,
    fragment: ShaderHandle,
) -> Result<ProgramHandle, ShaderError> {
    let program = backend.create_program()?;

    match link_attached(backend, program, vertex, fragment) {
        Ok(()) => Ok(program),
        Err(e) => {
            backend.delete_program(program);
            Err(e)
        }
    }
}

fn link_attached<B: GraphicsBackend + ?Sized>(
    backend: &mut B,
    program: ProgramHandle,
    vertex: ShaderHandle,
    fragment: ShaderHandle,
) -> Result<(), ShaderError> {
    backend.attach_shader(program, vertex)?;
    backend.attach_shader(program, fragment)?;

    for attribute in &VERTEX_ATTRIBUTES {
        backend.bind_attribute_location(program, attribute.location, attribute.name)?;
    }

    backend.link_program(program)?;

    match backend.program_status(program)? {
        BuildStatus::Success => Ok(()),
        BuildStatus::Failed { log } => {
            log::error!("{} failed to link:\n{}", program, log);
            Err(ShaderError::Link { log })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::HeadlessBackend;
    use crate::testing::{shader_pair, write_temp, FRAGMENT_SHADER};

    #[test]
    fn test_load_program_binds_attribute_slots() {
        let (vertex, fragment) = shader_pair();
        let mut backend = HeadlessBackend::new();

        let program = load_program(&mut backend, &vertex, &fragment).unwrap();

        let bindings = backend.attribute_bindings(program).unwrap();
        assert_eq!(bindings.get(&0).map(String::as_str), Some("vertexPosition"));
        assert_eq!(bindings.get(&1).map(String::as_str), Some("vertexColour"));
        assert_eq!(bindings.get(&2).map(String::as_str), Some("vertexTexCoords"));
        assert_eq!(bindings.get(&3).map(String::as_str), Some("vertexNormal"));
        assert!(backend.program_status(program).unwrap().is_success());
    }

    #[test]
    fn test_load_program_deletes_stages() {
        let (vertex, fragment) = shader_pair();
        let mut backend = HeadlessBackend::new();

        let program = load_program(&mut backend, &vertex, &fragment).unwrap();

        let stats = backend.stats();
        assert_eq!(stats.shaders_created, 2);
        assert_eq!(stats.shaders_deleted, 2);
        assert_eq!(stats.live(), 1);
        assert!(backend.is_program_live(program));
    }

    #[test]
    fn test_fragment_compile_failure_leaves_nothing_behind() {
        let (vertex, _) = shader_pair();
        let broken = write_temp("broken.frag", &FRAGMENT_SHADER.replace("void main", "void entry"));
        let mut backend = HeadlessBackend::new();

        let err = load_program(&mut backend, &vertex, &broken).unwrap_err();

        match err {
            ShaderError::Compile { stage, path, log } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert_eq!(path, broken.path());
                assert!(log.contains("main"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(backend.stats().live(), 0);
        assert_eq!(backend.stats().programs_created, 0);
        assert_eq!(backend.stats().invalid_deletes, 0);
    }

    #[test]
    fn test_missing_source_is_a_backend_error() {
        let (vertex, _) = shader_pair();
        let missing = std::env::temp_dir().join("scene_engine_missing_shader.frag");
        let mut backend = HeadlessBackend::new();

        let err = load_program(&mut backend, &vertex, &missing).unwrap_err();

        assert!(matches!(err, ShaderError::Backend(BackendError::ShaderSource { .. })));
        assert_eq!(backend.stats().live(), 0);
    }
}
