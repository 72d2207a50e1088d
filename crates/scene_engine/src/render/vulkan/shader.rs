//! SPIR-V shader module loading
//!
//! A stage that fails validation is still returned as a handle; its problem
//! is reported through the compile status like any other compiler.

use ash::{vk, Device};
use std::io::Cursor;

use crate::render::backend::{BuildStatus, ShaderStage};

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Validate SPIR-V bytecode and create a module from it
    pub fn from_spirv(device: &Device, bytes: &[u8]) -> Result<Self, String> {
        let words = ash::util::read_spv(&mut Cursor::new(bytes))
            .map_err(|e| format!("invalid SPIR-V: {e}"))?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);
        let module = unsafe { device.create_shader_module(&create_info, None) }
            .map_err(|e| format!("vkCreateShaderModule failed: {e:?}"))?;

        Ok(Self {
            device: device.clone(),
            module,
        })
    }

    /// Get shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Vulkan stage flag for a pipeline stage
pub fn stage_flags(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
    }
}

/// Result of compiling one stage
pub struct CompiledStage {
    /// Stage kind
    pub stage: ShaderStage,
    /// Module, present when compilation succeeded
    pub module: Option<std::rc::Rc<ShaderModule>>,
    /// Compile status
    pub status: BuildStatus,
}

impl CompiledStage {
    /// Build a stage record from SPIR-V bytes
    pub fn compile(device: &Device, stage: ShaderStage, bytes: &[u8]) -> Self {
        match ShaderModule::from_spirv(device, bytes) {
            Ok(module) => Self {
                stage,
                module: Some(std::rc::Rc::new(module)),
                status: BuildStatus::Success,
            },
            Err(log) => Self {
                stage,
                module: None,
                status: BuildStatus::Failed { log },
            },
        }
    }
}
