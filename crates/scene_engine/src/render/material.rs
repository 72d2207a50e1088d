//! Material properties and their upload to shader uniforms
//!
//! A material is four values uploaded by name: ambient, diffuse and specular
//! colours plus a specular power.

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec4;
use crate::render::backend::{GraphicsBackend, ProgramHandle};

/// Uniform receiving the ambient colour
pub const AMBIENT_UNIFORM: &str = "ambientMaterialColour";
/// Uniform receiving the diffuse colour
pub const DIFFUSE_UNIFORM: &str = "diffuseMaterialColour";
/// Uniform receiving the specular colour
pub const SPECULAR_UNIFORM: &str = "specularMaterialColour";
/// Uniform receiving the specular power
pub const SPECULAR_POWER_UNIFORM: &str = "specularPower";

/// What gets written to the `specularPower` uniform
///
/// Older content was authored against an upload that sent the uniform's
/// *location* instead of the material's specular power. That behaviour is
/// kept selectable so such content can be rendered unchanged, but it is never
/// the implicit choice: see [`DEFAULT_SPECULAR_POWER_SOURCE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecularPowerSource {
    /// Upload [`Material::specular_power`]
    MaterialValue,
    /// Upload the uniform location index converted to a float (legacy)
    UniformLocation,
}

/// Specular power behaviour used unless a scene is configured otherwise
pub const DEFAULT_SPECULAR_POWER_SOURCE: SpecularPowerSource = SpecularPowerSource::MaterialValue;

impl Default for SpecularPowerSource {
    fn default() -> Self {
        DEFAULT_SPECULAR_POWER_SOURCE
    }
}

/// Surface material of a scene node
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Ambient colour (RGBA)
    pub ambient: Vec4,
    /// Diffuse colour (RGBA)
    pub diffuse: Vec4,
    /// Specular colour (RGBA)
    pub specular: Vec4,
    /// Specular exponent
    pub specular_power: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Vec4::new(0.2, 0.2, 0.2, 1.0),
            diffuse: Vec4::new(0.6, 0.6, 0.6, 1.0),
            specular: Vec4::new(1.0, 1.0, 1.0, 1.0),
            specular_power: 20.0,
        }
    }
}

impl Material {
    /// Create a material from explicit values
    pub fn new(ambient: Vec4, diffuse: Vec4, specular: Vec4, specular_power: f32) -> Self {
        Self {
            ambient,
            diffuse,
            specular,
            specular_power,
        }
    }

    /// Builder pattern: set diffuse colour
    pub fn with_diffuse(mut self, diffuse: Vec4) -> Self {
        self.diffuse = diffuse;
        self
    }

    /// Builder pattern: set specular power
    pub fn with_specular_power(mut self, power: f32) -> Self {
        self.specular_power = power;
        self
    }

    /// Value written to the `specularPower` uniform for a given location
    pub fn specular_power_upload(&self, location: i32, source: SpecularPowerSource) -> f32 {
        match source {
            SpecularPowerSource::MaterialValue => self.specular_power,
            #[allow(clippy::cast_precision_loss)]
            SpecularPowerSource::UniformLocation => location as f32,
        }
    }

    /// Upload the four material uniforms to `program`
    ///
    /// Names the program does not declare resolve to an invalid location and
    /// their upload is skipped by the backend.
    pub fn upload<B: GraphicsBackend + ?Sized>(
        &self,
        backend: &mut B,
        program: ProgramHandle,
        source: SpecularPowerSource,
    ) {
        let colours = [
            (AMBIENT_UNIFORM, self.ambient),
            (DIFFUSE_UNIFORM, self.diffuse),
            (SPECULAR_UNIFORM, self.specular),
        ];
        for (name, colour) in colours {
            let location = backend.uniform_location(program, name);
            if !location.is_valid() {
                log::trace!("{} does not declare {}", program, name);
            }
            backend.set_uniform_vec4(program, location, colour.into());
        }

        let location = backend.uniform_location(program, SPECULAR_POWER_UNIFORM);
        backend.set_uniform_f32(program, location, self.specular_power_upload(location.0, source));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_material_values() {
        let material = Material::default();
        assert_eq!(material.ambient, Vec4::new(0.2, 0.2, 0.2, 1.0));
        assert_eq!(material.diffuse, Vec4::new(0.6, 0.6, 0.6, 1.0));
        assert_eq!(material.specular, Vec4::new(1.0, 1.0, 1.0, 1.0));
        assert_eq!(material.specular_power, 20.0);
    }

    #[test]
    fn test_specular_power_upload_modes() {
        let material = Material::default().with_specular_power(64.0);
        assert_eq!(material.specular_power_upload(3, SpecularPowerSource::MaterialValue), 64.0);
        assert_eq!(material.specular_power_upload(3, SpecularPowerSource::UniformLocation), 3.0);
        assert_eq!(material.specular_power_upload(-1, SpecularPowerSource::UniformLocation), -1.0);
    }

    #[test]
    fn test_default_source_is_named_constant() {
        assert_eq!(SpecularPowerSource::default(), DEFAULT_SPECULAR_POWER_SOURCE);
    }
}
