//! Scene demo application
//!
//! Builds a sun/planet/moon hierarchy of cubes on the headless backend, spins
//! it for a fixed number of frames and tears it down again.
//!
//! Usage: `scene_demo [config.toml|config.ron]` (defaults to `scene.toml`)

use scene_engine::foundation::{logging, math::utils::wrap_angle};
use scene_engine::prelude::*;

const FRAMES: u32 = 240;
const FRAME_TIME: f32 = 1.0 / 60.0;

/// Radians per second about the Y axis
const SUN_SPIN: f32 = 0.4;
const PLANET_SPIN: f32 = 1.5;
const MOON_SPIN: f32 = 3.0;

struct SolarSystem {
    sun: NodeKey,
    planet: NodeKey,
    moon: NodeKey,
}

impl SolarSystem {
    fn build(scene: &mut Scene<HeadlessBackend>, shaders: &ShaderConfig) -> SceneResult<Self> {
        let sun = scene.create_node("sun");
        let planet = scene.create_child(sun, "planet")?;
        let moon = scene.create_child(planet, "moon")?;

        let cube = Mesh::cube();
        let bodies = [
            (sun, Vec3::zeros(), 2.0, Vec4::new(1.0, 0.8, 0.2, 1.0)),
            (planet, Vec3::new(4.0, 0.0, 0.0), 0.5, Vec4::new(0.2, 0.4, 1.0, 1.0)),
            (moon, Vec3::new(3.0, 0.0, 0.0), 0.4, Vec4::new(0.7, 0.7, 0.7, 1.0)),
        ];

        for (key, position, scale, diffuse) in bodies {
            scene.set_mesh(key, &cube)?;
            scene.load_shader(key, shaders.vertex_path(), shaders.fragment_path())?;
            if let Some(node) = scene.node_mut(key) {
                node.set_position(position);
                node.set_scale(Vec3::new(scale, scale, scale));
                let material = node.material().clone().with_diffuse(diffuse);
                node.set_material(material);
            }
        }

        Ok(Self { sun, planet, moon })
    }

    fn spin(&self, scene: &mut Scene<HeadlessBackend>, dt: f32) {
        let spins = [(self.sun, SUN_SPIN), (self.planet, PLANET_SPIN), (self.moon, MOON_SPIN)];
        for (key, speed) in spins {
            if let Some(node) = scene.node_mut(key) {
                let mut rotation = node.rotation();
                rotation.y = wrap_angle(rotation.y + speed * dt);
                node.set_rotation(rotation);
            }
        }
    }

    fn upload(&self, scene: &mut Scene<HeadlessBackend>) -> SceneResult<()> {
        for key in [self.sun, self.planet, self.moon] {
            let Some(program) = scene.node(key).and_then(SceneNode::shader_program) else {
                continue;
            };
            scene.upload_model_matrix(key, program)?;
            scene.setup_material(key, program)?;
        }
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "scene.toml".to_string());
    let config = SceneConfig::load_or_default(&config_path)?;
    config.validate()?;

    logging::init_with_level(&config.engine.log_level);
    log::info!("Starting scene demo ({})", config_path);

    config.shaders.validate()?;
    log::info!(
        "Shaders: {} + {}",
        config.shaders.vertex_shader_path,
        config.shaders.fragment_shader_path
    );

    let mut scene = Scene::with_config(HeadlessBackend::new(), &config);
    let system = SolarSystem::build(&mut scene, &config.shaders)?;
    log::info!(
        "Built scene: {} nodes, {} GPU objects, {} bytes of buffers",
        scene.len(),
        scene.backend().stats().live(),
        scene.backend().buffer_memory()
    );

    let mut uploads = 0;
    for frame in 0..FRAMES {
        system.spin(&mut scene, FRAME_TIME);
        scene.update_all();
        system.upload(&mut scene)?;
        uploads += scene.backend_mut().take_uniform_writes().len();

        if frame % 60 == 0 {
            if let Some(moon) = scene.node(system.moon) {
                let p = moon.world_matrix().translation_part();
                log::debug!("Frame {}: moon at ({:.3}, {:.3}, {:.3})", frame, p.x, p.y, p.z);
            }
        }
    }

    if let Some(moon) = scene.node(system.moon) {
        let p = moon.world_matrix().translation_part();
        log::info!(
            "After {} frames the moon is at ({:.3}, {:.3}, {:.3})",
            FRAMES,
            p.x,
            p.y,
            p.z
        );
    }
    log::info!("Uniform uploads issued: {}", uploads);

    scene.clear();
    let stats = scene.backend().stats();
    log::info!(
        "Teardown: {} live GPU objects, {} invalid deletes",
        stats.live(),
        stats.invalid_deletes
    );
    if stats.live() != 0 || stats.invalid_deletes != 0 {
        return Err(format!("resource leak after teardown: {stats:?}").into());
    }

    Ok(())
}
