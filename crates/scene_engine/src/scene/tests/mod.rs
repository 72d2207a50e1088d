//! Cross-module scene scenarios run against the headless backend

mod resources;

use crate::render::headless::HeadlessBackend;
use crate::scene::Scene;

fn headless_scene() -> Scene<HeadlessBackend> {
    Scene::new(HeadlessBackend::new())
}
