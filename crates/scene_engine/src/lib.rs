//! # Scene Engine
//!
//! A small scene graph for real-time 3D rendering. Nodes carry a local
//! transform, a material, a mesh and a shader program; world matrices are
//! recomputed each frame by walking the parent/child tree.
//!
//! ## Features
//!
//! - **Arena hierarchy**: nodes addressed by stable [`NodeKey`](foundation::collections::NodeKey)s
//! - **Explicit backend handles**: every GPU call names the objects it touches
//! - **Typed diagnostics**: shader compile and link failures come back as errors
//! - **Headless backend**: in-memory resource tracking for tools and tests
//! - **Vulkan backend**: enabled with the `vulkan` feature
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_engine::prelude::*;
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut scene = Scene::new(HeadlessBackend::new());
//!
//!     let root = scene.create_node("root");
//!     let child = scene.create_child(root, "child")?;
//!     scene.set_mesh(child, &Mesh::cube())?;
//!     scene.load_shader(
//!         child,
//!         Path::new("resources/shaders/basic.vert"),
//!         Path::new("resources/shaders/basic.frag"),
//!     )?;
//!
//!     scene.update_all();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        core::config::{Config, SceneConfig, ShaderConfig},
        foundation::{
            collections::NodeKey,
            math::{Mat4, Mat4Ext, Vec3, Vec4},
        },
        render::{
            GraphicsBackend, HeadlessBackend, Material, Mesh, ShaderError, SpecularPowerSource,
            Vertex,
        },
        scene::{Scene, SceneError, SceneNode, SceneResult},
    };
}
