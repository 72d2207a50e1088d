//! Vulkan vertex input descriptions
//!
//! Translates the backend-agnostic [`VertexAttribute`] slots into the binding
//! and attribute descriptions a Vulkan graphics pipeline consumes.

use ash::vk;
use std::collections::BTreeMap;

use crate::render::mesh::{VertexAttribute, VERTEX_STRIDE};

/// Vulkan format for an attribute with `components` 32-bit floats
pub fn attribute_format(components: u32) -> vk::Format {
    match components {
        1 => vk::Format::R32_SFLOAT,
        2 => vk::Format::R32G32_SFLOAT,
        3 => vk::Format::R32G32B32_SFLOAT,
        _ => vk::Format::R32G32B32A32_SFLOAT,
    }
}

/// Attribute layout recorded for one vertex array
#[derive(Debug, Default)]
pub struct VulkanVertexLayout {
    /// Index buffer id bound to this layout
    pub index_buffer: Option<u32>,
    /// Enabled slots with the buffer id each reads from
    pub attributes: BTreeMap<u32, (u32, VertexAttribute)>,
}

impl VulkanVertexLayout {
    /// Binding description; all attributes share binding 0
    pub fn binding_description(&self) -> vk::VertexInputBindingDescription {
        let stride = self
            .attributes
            .values()
            .next()
            .map_or(VERTEX_STRIDE, |(_, attribute)| attribute.stride);

        vk::VertexInputBindingDescription {
            binding: 0,
            stride: u32::try_from(stride).unwrap_or(u32::MAX),
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Attribute descriptions in slot order
    pub fn attribute_descriptions(&self) -> Vec<vk::VertexInputAttributeDescription> {
        self.attributes
            .values()
            .map(|(_, attribute)| vk::VertexInputAttributeDescription {
                binding: 0,
                location: attribute.location,
                format: attribute_format(attribute.components),
                offset: u32::try_from(attribute.offset).unwrap_or(u32::MAX),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::mesh::VERTEX_ATTRIBUTES;

    #[test]
    fn test_descriptions_match_vertex_layout() {
        let mut layout = VulkanVertexLayout::default();
        for attribute in VERTEX_ATTRIBUTES {
            layout.attributes.insert(attribute.location, (1, attribute));
        }

        let binding = layout.binding_description();
        assert_eq!(binding.stride, 48);

        let formats: Vec<vk::Format> =
            layout.attribute_descriptions().iter().map(|d| d.format).collect();
        assert_eq!(
            formats,
            vec![
                vk::Format::R32G32B32_SFLOAT,
                vk::Format::R32G32B32A32_SFLOAT,
                vk::Format::R32G32_SFLOAT,
                vk::Format::R32G32B32_SFLOAT,
            ]
        );
    }
}
