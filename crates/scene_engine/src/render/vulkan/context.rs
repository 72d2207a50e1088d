//! Vulkan context management
//!
//! Creates an instance, picks a physical device with a graphics queue and
//! opens a logical device on it. No surface or swapchain is created.

use ash::{vk, Device, Entry, Instance};
use std::ffi::{CStr, CString};
use thiserror::Error;

use crate::render::backend::BackendError;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

impl From<VulkanError> for BackendError {
    fn from(err: VulkanError) -> Self {
        match err {
            VulkanError::Api(
                vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY,
            ) => Self::OutOfMemory { requested: 0 },
            other => Self::Api(other.to_string()),
        }
    }
}

/// Instance, physical device and logical device with RAII cleanup
pub struct VulkanContext {
    _entry: Entry,
    instance: Instance,
    physical_device: vk::PhysicalDevice,
    device: Device,
    graphics_family: u32,
}

impl VulkanContext {
    /// Create a headless context
    pub fn new(app_name: &str) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| {
            VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e:?}"))
        })?;

        let app_name_cstr = CString::new(app_name).map_err(|_| {
            VulkanError::InitializationFailed("Application name contains a NUL byte".to_string())
        })?;
        let engine_name_cstr = CString::new("SceneEngine").map_err(|_| {
            VulkanError::InitializationFailed("Engine name contains a NUL byte".to_string())
        })?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let create_info = vk::InstanceCreateInfo::builder().application_info(&app_info);

        let instance =
            unsafe { entry.create_instance(&create_info, None).map_err(VulkanError::Api)? };

        let (physical_device, graphics_family) = match Self::select_physical_device(&instance) {
            Ok(selected) => selected,
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                return Err(e);
            }
        };

        let priorities = [1.0_f32];
        let queue_infos = [vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(graphics_family)
            .queue_priorities(&priorities)
            .build()];
        let device_info = vk::DeviceCreateInfo::builder().queue_create_infos(&queue_infos);

        let device = match unsafe { instance.create_device(physical_device, &device_info, None) } {
            Ok(device) => device,
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                return Err(VulkanError::Api(e));
            }
        };

        Ok(Self {
            _entry: entry,
            instance,
            physical_device,
            device,
            graphics_family,
        })
    }

    fn select_physical_device(instance: &Instance) -> VulkanResult<(vk::PhysicalDevice, u32)> {
        let devices = unsafe { instance.enumerate_physical_devices().map_err(VulkanError::Api)? };

        for device in devices {
            let queue_families =
                unsafe { instance.get_physical_device_queue_family_properties(device) };
            let graphics_family = queue_families
                .iter()
                .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS));

            if let Some(index) = graphics_family {
                let properties = unsafe { instance.get_physical_device_properties(device) };
                log::info!("Selected GPU: {}", unsafe {
                    CStr::from_ptr(properties.device_name.as_ptr()).to_string_lossy()
                });
                let index = u32::try_from(index).map_err(|_| {
                    VulkanError::InitializationFailed("Queue family index overflow".to_string())
                })?;
                return Ok((device, index));
            }
        }

        Err(VulkanError::InitializationFailed("No suitable GPU found".to_string()))
    }

    /// Logical device
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Instance
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Selected physical device
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Queue family used for graphics work
    pub fn graphics_family(&self) -> u32 {
        self.graphics_family
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
