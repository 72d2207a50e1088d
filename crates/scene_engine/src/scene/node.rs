//! Scene node: transform, material and owned GPU resources
//!
//! Nodes are plain data. Everything that touches the backend or another node
//! goes through [`Scene`](super::Scene), which owns both.

use crate::foundation::collections::NodeKey;
use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::render::backend::{BufferHandle, ProgramHandle, VertexArrayHandle};
use crate::render::material::Material;
use crate::render::mesh::MeshBuffers;

/// One node of a scene hierarchy
#[derive(Debug)]
pub struct SceneNode {
    name: String,
    position: Vec3,
    rotation: Vec3,
    scale: Vec3,
    world: Mat4,
    material: Material,
    pub(super) mesh: Option<MeshBuffers>,
    pub(super) program: Option<ProgramHandle>,
    pub(super) parent: Option<NodeKey>,
    pub(super) children: Vec<NodeKey>,
}

impl SceneNode {
    /// Create a node at the origin with no resources
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: Vec3::zeros(),
            rotation: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            world: Mat4::identity(),
            material: Material::default(),
            mesh: None,
            program: None,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Builder pattern: set material
    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    /// Builder pattern: set position
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Builder pattern: set scale
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Local transform `S * Rx * Ry * Rz * T`
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::new_nonuniform_scaling(&self.scale)
            * Mat4::euler_xyz(&self.rotation)
            * Mat4::new_translation(&self.position)
    }

    /// World transform for a given parent world transform
    ///
    /// The parent is applied on the right: `local * parent_world`.
    pub fn compose_world(&self, parent_world: Option<&Mat4>) -> Mat4 {
        match parent_world {
            Some(parent) => self.local_matrix() * parent,
            None => self.local_matrix(),
        }
    }

    pub(super) fn set_world_matrix(&mut self, world: Mat4) {
        self.world = world;
    }

    /// Name used in log output
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the node
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Position in the parent's frame
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Set position
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Per-axis Euler rotation in radians
    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    /// Set rotation
    pub fn set_rotation(&mut self, rotation: Vec3) {
        self.rotation = rotation;
    }

    /// Scale factors
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Set scale
    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
    }

    /// World matrix computed by the last update
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world
    }

    /// Material
    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Mutable material
    pub fn material_mut(&mut self) -> &mut Material {
        &mut self.material
    }

    /// Replace the material
    pub fn set_material(&mut self, material: Material) {
        self.material = material;
    }

    /// Uploaded mesh, if any
    pub fn mesh(&self) -> Option<&MeshBuffers> {
        self.mesh.as_ref()
    }

    /// Linked shader program, if any
    pub fn shader_program(&self) -> Option<ProgramHandle> {
        self.program
    }

    /// Vertex array of the uploaded mesh
    pub fn vertex_array(&self) -> Option<VertexArrayHandle> {
        self.mesh.map(|m| m.vertex_array)
    }

    /// Vertex buffer of the uploaded mesh
    pub fn vertex_buffer(&self) -> Option<BufferHandle> {
        self.mesh.map(|m| m.vertex_buffer)
    }

    /// Index buffer of the uploaded mesh
    pub fn index_buffer(&self) -> Option<BufferHandle> {
        self.mesh.map(|m| m.index_buffer)
    }

    /// Number of uploaded vertices, 0 without a mesh
    pub fn vertex_count(&self) -> usize {
        self.mesh.map_or(0, |m| m.vertex_count)
    }

    /// Number of uploaded indices, 0 without a mesh
    pub fn index_count(&self) -> usize {
        self.mesh.map_or(0, |m| m.index_count)
    }

    /// Parent node
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    /// Children in insertion order
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    /// Number of children
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Child at `index` in insertion order
    pub fn child(&self, index: usize) -> Option<NodeKey> {
        self.children.get(index).copied()
    }
}

impl Default for SceneNode {
    fn default() -> Self {
        Self::new("node")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_node_state() {
        let node = SceneNode::default();

        assert_eq!(node.position(), Vec3::zeros());
        assert_eq!(node.rotation(), Vec3::zeros());
        assert_eq!(node.scale(), Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(*node.world_matrix(), Mat4::identity());
        assert_eq!(*node.material(), Material::default());
        assert_eq!(node.vertex_array(), None);
        assert_eq!(node.vertex_buffer(), None);
        assert_eq!(node.index_buffer(), None);
        assert_eq!(node.shader_program(), None);
        assert_eq!(node.vertex_count(), 0);
        assert_eq!(node.index_count(), 0);
        assert_eq!(node.child_count(), 0);
        assert_eq!(node.parent(), None);
    }

    #[test]
    fn test_local_matrix_composition_order() {
        let mut node = SceneNode::new("n");
        node.set_position(Vec3::new(1.0, 2.0, 3.0));
        node.set_rotation(Vec3::new(0.1, 0.2, 0.3));
        node.set_scale(Vec3::new(2.0, 3.0, 4.0));

        let expected = Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 3.0, 4.0))
            * Mat4::rotation_x(0.1)
            * Mat4::rotation_y(0.2)
            * Mat4::rotation_z(0.3)
            * Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));

        assert_relative_eq!(node.local_matrix(), expected, epsilon = 1e-6);
        assert_relative_eq!(node.compose_world(None), expected, epsilon = 1e-6);
    }

    #[test]
    fn test_translation_is_scaled_by_own_scale() {
        let node = SceneNode::new("n")
            .with_position(Vec3::new(1.0, 0.0, 0.0))
            .with_scale(Vec3::new(2.0, 2.0, 2.0));

        // Translation sits right of the scale, so it is scaled too
        assert_relative_eq!(
            node.local_matrix().translation_part(),
            Vec3::new(2.0, 0.0, 0.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_parent_is_applied_on_the_right() {
        let node = SceneNode::new("n").with_position(Vec3::new(1.0, 0.0, 0.0));
        let parent = Mat4::new_nonuniform_scaling(&Vec3::new(3.0, 3.0, 3.0));

        let world = node.compose_world(Some(&parent));

        assert_relative_eq!(world, node.local_matrix() * parent, epsilon = 1e-6);
        assert_relative_eq!(world.translation_part(), Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-6);
    }
}
