//! Scene hierarchy
//!
//! [`SceneNode`] holds a transform, a material and the handles of the GPU
//! objects it owns. [`Scene`] is the arena that owns the nodes and the
//! backend, links nodes into a tree and runs every operation that creates or
//! releases GPU objects.
//!
//! ```text
//! Scene
//!  ├── NodeMap<SceneNode>   (slotmap arena, NodeKey handles)
//!  ├── roots                (creation order)
//!  └── GraphicsBackend      (owns every buffer and program)
//! ```

mod node;
mod scene_graph;

#[cfg(test)]
mod tests;

pub use node::SceneNode;
pub use scene_graph::{Scene, SceneError, SceneResult};
