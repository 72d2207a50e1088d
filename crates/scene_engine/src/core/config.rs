//! # Scene Configuration
//!
//! File-backed settings for a scene: logging, the specular power upload
//! behaviour, the shader pair nodes load by default and the default material.
//!
//! Everything has a default, so a missing file or a partial file is valid:
//!
//! ```toml
//! [engine]
//! log_level = "debug"
//! specular_power_source = "MaterialValue"
//!
//! [shaders]
//! vertex_shader_path = "resources/shaders/basic.vert"
//! fragment_shader_path = "resources/shaders/basic.frag"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use crate::config::{Config, ConfigError};
use crate::foundation::math::Vec4;
use crate::render::material::{Material, SpecularPowerSource, DEFAULT_SPECULAR_POWER_SOURCE};

/// Directories searched by [`ShaderConfig::with_path_resolution`], in order
pub const SHADER_SEARCH_DIRS: [&str; 4] =
    ["resources/shaders/", "shaders/", "../resources/shaders/", "./"];

/// Vertex shader loaded when nothing else is configured
pub const DEFAULT_VERTEX_SHADER: &str = "basic.vert";
/// Fragment shader loaded when nothing else is configured
pub const DEFAULT_FRAGMENT_SHADER: &str = "basic.frag";

/// # Shader Configuration
///
/// Source files for the vertex and fragment stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Path to the vertex shader source
    pub vertex_shader_path: String,
    /// Path to the fragment shader source
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Create shader config with automatic path resolution
    ///
    /// Each file is looked up in [`SHADER_SEARCH_DIRS`]; the first directory
    /// containing it wins. Unresolved files fall back to the first directory.
    pub fn with_path_resolution(base_vertex: &str, base_fragment: &str) -> Self {
        Self {
            vertex_shader_path: resolve_shader(base_vertex),
            fragment_shader_path: resolve_shader(base_fragment),
        }
    }

    /// Validate that shader files exist
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !Path::new(&self.vertex_shader_path).exists() {
            return Err(ConfigError::Invalid(format!(
                "Vertex shader not found: {}",
                self.vertex_shader_path
            )));
        }
        if !Path::new(&self.fragment_shader_path).exists() {
            return Err(ConfigError::Invalid(format!(
                "Fragment shader not found: {}",
                self.fragment_shader_path
            )));
        }
        Ok(())
    }

    /// Vertex shader path
    pub fn vertex_path(&self) -> &Path {
        Path::new(&self.vertex_shader_path)
    }

    /// Fragment shader path
    pub fn fragment_path(&self) -> &Path {
        Path::new(&self.fragment_shader_path)
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution(DEFAULT_VERTEX_SHADER, DEFAULT_FRAGMENT_SHADER)
    }
}

fn resolve_shader(file: &str) -> String {
    SHADER_SEARCH_DIRS
        .iter()
        .map(|dir| PathBuf::from(dir).join(file))
        .find(|candidate| candidate.exists())
        .unwrap_or_else(|| PathBuf::from(SHADER_SEARCH_DIRS[0]).join(file))
        .to_string_lossy()
        .into_owned()
}

/// # Engine Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default log filter, overridden by `RUST_LOG`
    pub log_level: String,
    /// What nodes write to the `specularPower` uniform
    pub specular_power_source: SpecularPowerSource,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            specular_power_source: DEFAULT_SPECULAR_POWER_SOURCE,
        }
    }
}

/// # Material Configuration
///
/// Material given to newly created nodes. Colours are RGBA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    /// Ambient colour
    pub ambient: [f32; 4],
    /// Diffuse colour
    pub diffuse: [f32; 4],
    /// Specular colour
    pub specular: [f32; 4],
    /// Specular exponent
    pub specular_power: f32,
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Material::default().into()
    }
}

impl From<MaterialConfig> for Material {
    fn from(config: MaterialConfig) -> Self {
        Self::new(
            Vec4::from(config.ambient),
            Vec4::from(config.diffuse),
            Vec4::from(config.specular),
            config.specular_power,
        )
    }
}

impl From<Material> for MaterialConfig {
    fn from(material: Material) -> Self {
        Self {
            ambient: material.ambient.into(),
            diffuse: material.diffuse.into(),
            specular: material.specular.into(),
            specular_power: material.specular_power,
        }
    }
}

/// # Scene Configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Engine behaviour
    pub engine: EngineConfig,
    /// Default shader pair
    pub shaders: ShaderConfig,
    /// Default material
    pub material: MaterialConfig,
}

impl Config for SceneConfig {}

impl SceneConfig {
    /// Reject values that would make every node render wrong
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.material.specular_power.is_finite() || self.material.specular_power < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "specular_power must be a non-negative number, got {}",
                self.material.specular_power
            )));
        }
        Ok(())
    }
}
