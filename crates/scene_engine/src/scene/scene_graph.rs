//! Scene graph arena
//!
//! Nodes live in a [`NodeMap`] and refer to each other by [`NodeKey`]. The
//! scene owns the backend too, so every resource a node holds is created and
//! released through the same object, and nothing outlives the scene.

use std::path::Path;
use thiserror::Error;

use super::node::SceneNode;
use crate::core::config::SceneConfig;
use crate::foundation::collections::{NodeKey, NodeMap};
use crate::foundation::math::{to_cols_array, Mat4};
use crate::render::backend::{BackendError, GraphicsBackend, ProgramHandle};
use crate::render::material::{Material, SpecularPowerSource};
use crate::render::mesh::{Mesh, MeshBuffers, Vertex};
use crate::render::shader::{load_program, ShaderError, MODEL_MATRIX_UNIFORM};

/// Scene operation errors
#[derive(Error, Debug)]
pub enum SceneError {
    /// The key does not name a live node
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeKey),

    /// Attaching would make a node its own ancestor
    #[error("Attaching {child:?} under {parent:?} would create a cycle")]
    WouldCreateCycle {
        /// Node being attached
        child: NodeKey,
        /// Requested parent
        parent: NodeKey,
    },

    /// Backend allocation or I/O failure
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Shader compile or link failure
    #[error(transparent)]
    Shader(#[from] ShaderError),
}

/// Result type for scene operations
pub type SceneResult<T> = Result<T, SceneError>;

/// Arena of scene nodes driving a graphics backend
pub struct Scene<B: GraphicsBackend> {
    nodes: NodeMap<SceneNode>,
    roots: Vec<NodeKey>,
    specular_power_source: SpecularPowerSource,
    default_material: Material,
    backend: B,
}

impl<B: GraphicsBackend> Scene<B> {
    /// Create an empty scene with default settings
    pub fn new(backend: B) -> Self {
        Self {
            nodes: NodeMap::with_key(),
            roots: Vec::new(),
            specular_power_source: SpecularPowerSource::default(),
            default_material: Material::default(),
            backend,
        }
    }

    /// Create an empty scene using the engine and material settings of `config`
    pub fn with_config(backend: B, config: &SceneConfig) -> Self {
        let mut scene = Self::new(backend);
        scene.default_material = config.material.clone().into();
        scene.set_specular_power_source(config.engine.specular_power_source);
        scene
    }

    /// Backend the scene's resources live in
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable backend access for work outside the scene's nodes
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Value written to `specularPower` by [`Scene::setup_material`]
    pub fn specular_power_source(&self) -> SpecularPowerSource {
        self.specular_power_source
    }

    /// Change what [`Scene::setup_material`] writes to `specularPower`
    pub fn set_specular_power_source(&mut self, source: SpecularPowerSource) {
        if source == SpecularPowerSource::UniformLocation {
            log::warn!(
                "specularPower will receive the uniform location instead of the material value"
            );
        }
        self.specular_power_source = source;
    }

    /// Material given to nodes created by [`Scene::create_node`]
    pub fn default_material(&self) -> &Material {
        &self.default_material
    }

    /// Create a root node with the scene's default material
    pub fn create_node(&mut self, name: impl Into<String>) -> NodeKey {
        let node = SceneNode::new(name).with_material(self.default_material.clone());
        self.insert_node(node)
    }

    /// Create a node as the last child of `parent`
    pub fn create_child(
        &mut self,
        parent: NodeKey,
        name: impl Into<String>,
    ) -> SceneResult<NodeKey> {
        self.node_ref(parent)?;
        let child = self.create_node(name);
        self.attach(child, parent)?;
        Ok(child)
    }

    /// Add a freshly built node as a root
    pub fn insert_node(&mut self, mut node: SceneNode) -> NodeKey {
        node.parent = None;
        node.children.clear();
        let name = node.name().to_string();
        let key = self.nodes.insert(node);
        self.roots.push(key);
        log::debug!("Created node '{}' {:?}", name, key);
        key
    }

    /// Node by key
    pub fn node(&self, key: NodeKey) -> Option<&SceneNode> {
        self.nodes.get(key)
    }

    /// Mutable node by key
    ///
    /// Only the transform, material and name can be changed this way.
    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut SceneNode> {
        self.nodes.get_mut(key)
    }

    /// Whether `key` names a live node
    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the scene has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Parentless nodes in creation order
    pub fn roots(&self) -> &[NodeKey] {
        &self.roots
    }

    /// All nodes in arena order
    pub fn iter(&self) -> impl Iterator<Item = (NodeKey, &SceneNode)> {
        self.nodes.iter()
    }

    fn node_ref(&self, key: NodeKey) -> SceneResult<&SceneNode> {
        self.nodes.get(key).ok_or(SceneError::NodeNotFound(key))
    }

    fn node_entry(&mut self, key: NodeKey) -> SceneResult<&mut SceneNode> {
        self.nodes.get_mut(key).ok_or(SceneError::NodeNotFound(key))
    }

    /// Make `child` the last child of `parent`, detaching it from any previous parent
    pub fn attach(&mut self, child: NodeKey, parent: NodeKey) -> SceneResult<()> {
        self.node_ref(child)?;
        self.node_ref(parent)?;

        let mut ancestor = Some(parent);
        while let Some(key) = ancestor {
            if key == child {
                return Err(SceneError::WouldCreateCycle { child, parent });
            }
            ancestor = self.nodes.get(key).and_then(SceneNode::parent);
        }

        self.unlink(child);
        self.node_entry(child)?.parent = Some(parent);
        self.node_entry(parent)?.children.push(child);
        Ok(())
    }

    /// Turn `child` into a root
    pub fn detach(&mut self, child: NodeKey) -> SceneResult<()> {
        if self.node_ref(child)?.parent.is_none() {
            return Ok(());
        }
        self.unlink(child);
        self.node_entry(child)?.parent = None;
        self.roots.push(child);
        Ok(())
    }

    /// Remove `key` from its parent's child list or from the root list
    fn unlink(&mut self, key: NodeKey) {
        match self.nodes.get(key).and_then(SceneNode::parent) {
            Some(parent) => {
                if let Some(parent) = self.nodes.get_mut(parent) {
                    parent.children.retain(|&c| c != key);
                }
            }
            None => self.roots.retain(|&r| r != key),
        }
    }

    /// Recompute the world matrix of `key` and then of its descendants
    ///
    /// The node composes with its parent's current world matrix. Children are
    /// visited depth first in insertion order, each after its parent.
    pub fn update(&mut self, key: NodeKey) -> SceneResult<()> {
        let parent_world = self
            .node_ref(key)?
            .parent
            .and_then(|p| self.nodes.get(p))
            .map(|p| *p.world_matrix());
        self.update_subtree(key, parent_world);
        Ok(())
    }

    /// Update every root and its descendants, roots in creation order
    pub fn update_all(&mut self) {
        for index in 0..self.roots.len() {
            let root = self.roots[index];
            self.update_subtree(root, None);
        }
    }

    fn update_subtree(&mut self, key: NodeKey, parent_world: Option<Mat4>) {
        let mut pending = vec![(key, parent_world)];
        while let Some((key, parent_world)) = pending.pop() {
            let Some(node) = self.nodes.get_mut(key) else {
                continue;
            };
            let world = node.compose_world(parent_world.as_ref());
            node.set_world_matrix(world);
            pending.extend(node.children.iter().rev().map(|&child| (child, Some(world))));
        }
    }

    /// Upload a mesh for `key`, replacing any previous one
    ///
    /// The previous buffers are released before the new ones are allocated.
    /// If the upload fails the node is left without a mesh.
    pub fn create_buffer(
        &mut self,
        key: NodeKey,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> SceneResult<()> {
        let node = self.nodes.get_mut(key).ok_or(SceneError::NodeNotFound(key))?;
        if let Some(previous) = node.mesh.take() {
            log::debug!("Replacing mesh of '{}'", node.name());
            previous.release(&mut self.backend);
        }

        let buffers = MeshBuffers::upload(&mut self.backend, vertices, indices)?;
        node.mesh = Some(buffers);
        Ok(())
    }

    /// Upload a [`Mesh`] for `key`
    pub fn set_mesh(&mut self, key: NodeKey, mesh: &Mesh) -> SceneResult<()> {
        self.create_buffer(key, &mesh.vertices, &mesh.indices)
    }

    /// Build a shader program for `key` from two source files
    ///
    /// On failure the node keeps its previous program and no backend objects
    /// are left behind. On success the previous program is released.
    pub fn load_shader(
        &mut self,
        key: NodeKey,
        vertex_path: &Path,
        fragment_path: &Path,
    ) -> SceneResult<()> {
        let node = self.nodes.get_mut(key).ok_or(SceneError::NodeNotFound(key))?;
        let program = load_program(&mut self.backend, vertex_path, fragment_path)?;

        if let Some(previous) = node.program.replace(program) {
            self.backend.delete_program(previous);
        }
        log::debug!("Node '{}' uses {}", node.name(), program);
        Ok(())
    }

    /// Upload the material of `key` to `program`
    ///
    /// `program` need not be the node's own program.
    pub fn setup_material(&mut self, key: NodeKey, program: ProgramHandle) -> SceneResult<()> {
        let node = self.nodes.get(key).ok_or(SceneError::NodeNotFound(key))?;
        node.material().upload(&mut self.backend, program, self.specular_power_source);
        Ok(())
    }

    /// Upload the world matrix of `key` to the `modelMatrix` uniform of `program`
    pub fn upload_model_matrix(&mut self, key: NodeKey, program: ProgramHandle) -> SceneResult<()> {
        let node = self.nodes.get(key).ok_or(SceneError::NodeNotFound(key))?;
        let location = self.backend.uniform_location(program, MODEL_MATRIX_UNIFORM);
        self.backend
            .set_uniform_mat4(program, location, to_cols_array(node.world_matrix()));
        Ok(())
    }

    fn release_resources(&mut self, key: NodeKey) {
        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };
        if let Some(mesh) = node.mesh.take() {
            mesh.release(&mut self.backend);
        }
        if let Some(program) = node.program.take() {
            self.backend.delete_program(program);
        }
    }

    /// Destroy one node
    ///
    /// Its GPU resources are released and its children become roots, keeping
    /// their order.
    pub fn destroy(&mut self, key: NodeKey) -> SceneResult<()> {
        self.node_ref(key)?;
        self.release_resources(key);
        self.unlink(key);

        let Some(node) = self.nodes.remove(key) else {
            return Err(SceneError::NodeNotFound(key));
        };
        log::debug!("Destroyed node '{}' {:?}", node.name(), key);
        for child in node.children {
            if let Some(child_node) = self.nodes.get_mut(child) {
                child_node.parent = None;
                self.roots.push(child);
            }
        }
        Ok(())
    }

    /// Destroy a node and all of its descendants, returning how many were removed
    pub fn destroy_subtree(&mut self, key: NodeKey) -> SceneResult<usize> {
        self.node_ref(key)?;

        let mut order = vec![key];
        let mut index = 0;
        while index < order.len() {
            if let Some(node) = self.nodes.get(order[index]) {
                order.extend_from_slice(&node.children);
            }
            index += 1;
        }

        // Leaves first, so no node is orphaned into the root list on the way
        for &node in order.iter().rev() {
            self.destroy(node)?;
        }
        Ok(order.len())
    }

    /// Release every node's resources and empty the scene
    pub fn clear(&mut self) {
        let keys: Vec<NodeKey> = self.nodes.keys().collect();
        for key in keys {
            self.release_resources(key);
        }
        self.nodes.clear();
        self.roots.clear();
    }
}

impl<B: GraphicsBackend> Drop for Scene<B> {
    fn drop(&mut self) {
        if !self.nodes.is_empty() {
            log::info!("Releasing {} scene nodes", self.nodes.len());
            self.clear();
        }
    }
}
