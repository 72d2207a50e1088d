//! Vulkan backend
//!
//! Headless: no surface or swapchain is created. Shader stages are SPIR-V
//! files.

mod backend;
pub mod buffer;
pub mod context;
pub mod shader;
pub mod vertex_layout;

pub use backend::{VulkanBackend, UNIFORM_BLOCK, UNIFORM_BLOCK_SIZE};
pub use context::{VulkanContext, VulkanError, VulkanResult};
