//! GPU resource ownership: meshes, programs and material uploads

use super::headless_scene;
use crate::core::config::SceneConfig;
use crate::foundation::math::{to_cols_array, Vec3, Vec4};
use crate::render::backend::{BackendError, GraphicsBackend, UniformLocation};
use crate::render::headless::{HeadlessBackend, UniformValue};
use crate::render::material::{Material, SpecularPowerSource};
use crate::render::mesh::{Mesh, Vertex, VERTEX_STRIDE};
use crate::render::shader::ShaderError;
use crate::scene::{Scene, SceneError};
use crate::testing::{shader_pair, write_temp, FRAGMENT_SHADER, VERTEX_SHADER};

#[test]
fn test_create_buffer_reports_counts() {
    let mut scene = headless_scene();
    let node = scene.create_node("tri");
    let mesh = Mesh::triangle();

    scene.create_buffer(node, &mesh.vertices, &mesh.indices).unwrap();

    let n = scene.node(node).unwrap();
    assert_eq!(n.vertex_count(), 3);
    assert_eq!(n.index_count(), 3);
    let backend = scene.backend();
    let vertex_bytes = backend.buffer_data(n.vertex_buffer().unwrap()).unwrap();
    assert_eq!(vertex_bytes, bytemuck::cast_slice::<Vertex, u8>(&mesh.vertices));
    assert_eq!(vertex_bytes.len(), 3 * VERTEX_STRIDE);
    let index_bytes = backend.buffer_data(n.index_buffer().unwrap()).unwrap();
    assert_eq!(index_bytes, bytemuck::cast_slice::<u32, u8>(&mesh.indices));
}

#[test]
fn test_create_buffer_configures_four_slots() {
    let mut scene = headless_scene();
    let node = scene.create_node("cube");
    scene.set_mesh(node, &Mesh::cube()).unwrap();

    let n = scene.node(node).unwrap();
    let vertex_array = n.vertex_array().unwrap();
    let attributes = scene.backend().vertex_attributes(vertex_array);

    let slots: Vec<(u32, usize)> = attributes.iter().map(|(_, a)| (a.location, a.offset)).collect();
    assert_eq!(slots, vec![(0, 0), (1, 12), (2, 28), (3, 36)]);
    assert!(attributes
        .iter()
        .all(|(buffer, a)| Some(*buffer) == n.vertex_buffer() && a.stride == 48));
    assert_eq!(scene.backend().index_buffer_of(vertex_array), n.index_buffer());
}

#[test]
fn test_replacing_mesh_releases_previous_buffers() {
    let mut scene = headless_scene();
    let node = scene.create_node("node");
    scene.set_mesh(node, &Mesh::cube()).unwrap();
    let old = *scene.node(node).unwrap().mesh().unwrap();

    scene.set_mesh(node, &Mesh::triangle()).unwrap();

    let backend = scene.backend();
    assert!(!backend.is_buffer_live(old.vertex_buffer));
    assert!(!backend.is_buffer_live(old.index_buffer));
    assert!(!backend.is_vertex_array_live(old.vertex_array));
    assert_eq!(backend.stats().live(), 3);
    assert_eq!(backend.stats().invalid_deletes, 0);
    assert_eq!(scene.node(node).unwrap().vertex_count(), 3);
}

#[test]
fn test_failed_upload_leaves_node_without_mesh() {
    let mut scene = Scene::new(HeadlessBackend::new().with_memory_budget(64));
    let node = scene.create_node("big");

    let err = scene.set_mesh(node, &Mesh::cube()).unwrap_err();

    assert!(matches!(err, SceneError::Backend(BackendError::OutOfMemory { .. })));
    assert_eq!(scene.node(node).unwrap().vertex_array(), None);
    assert_eq!(scene.node(node).unwrap().vertex_count(), 0);
    assert_eq!(scene.backend().stats().live(), 0);
}

#[test]
fn test_load_shader_assigns_program() {
    let (vertex, fragment) = shader_pair();
    let mut scene = headless_scene();
    let node = scene.create_node("lit");

    scene.load_shader(node, &vertex, &fragment).unwrap();

    let program = scene.node(node).unwrap().shader_program().unwrap();
    assert!(scene.backend().is_program_live(program));
    assert_eq!(scene.backend().stats().live(), 1);
}

#[test]
fn test_reloading_shader_releases_previous_program() {
    let (vertex, fragment) = shader_pair();
    let mut scene = headless_scene();
    let node = scene.create_node("lit");
    scene.load_shader(node, &vertex, &fragment).unwrap();
    let first = scene.node(node).unwrap().shader_program().unwrap();

    scene.load_shader(node, &vertex, &fragment).unwrap();

    let second = scene.node(node).unwrap().shader_program().unwrap();
    assert_ne!(first, second);
    assert!(!scene.backend().is_program_live(first));
    assert_eq!(scene.backend().stats().live(), 1);
}

#[test]
fn test_failed_shader_keeps_previous_program() {
    let (vertex, fragment) = shader_pair();
    let broken = write_temp("broken.vert", &VERTEX_SHADER.replace("#version 330 core", ""));
    let mut scene = headless_scene();
    let node = scene.create_node("lit");
    scene.load_shader(node, &vertex, &fragment).unwrap();
    let program = scene.node(node).unwrap().shader_program();

    let err = scene.load_shader(node, &broken, &fragment).unwrap_err();

    assert!(matches!(err, SceneError::Shader(ShaderError::Compile { .. })));
    assert_eq!(scene.node(node).unwrap().shader_program(), program);
    assert_eq!(scene.backend().stats().live(), 1);
}

#[test]
fn test_destroy_releases_each_resource_once() {
    let (vertex, fragment) = shader_pair();
    let mut scene = headless_scene();
    let parent = scene.create_node("parent");
    let node = scene.create_child(parent, "node").unwrap();
    scene.set_mesh(node, &Mesh::cube()).unwrap();
    scene.load_shader(node, &vertex, &fragment).unwrap();

    scene.destroy(node).unwrap();

    let stats = scene.backend().stats();
    assert_eq!(stats.buffers_deleted, 2);
    assert_eq!(stats.vertex_arrays_deleted, 1);
    assert_eq!(stats.programs_deleted, 1);
    assert_eq!(stats.invalid_deletes, 0);
    assert_eq!(stats.live(), 0);
}

#[test]
fn test_clear_releases_everything() {
    let (vertex, fragment) = shader_pair();
    let mut scene = headless_scene();
    let root = scene.create_node("root");
    for i in 0..3 {
        let child = scene.create_child(root, format!("child{i}")).unwrap();
        scene.set_mesh(child, &Mesh::cube()).unwrap();
        scene.load_shader(child, &vertex, &fragment).unwrap();
    }

    scene.clear();

    assert!(scene.is_empty());
    assert_eq!(scene.backend().stats().live(), 0);
    assert_eq!(scene.backend().stats().invalid_deletes, 0);
}

#[test]
fn test_dropping_scene_releases_everything() {
    let (vertex, fragment) = shader_pair();
    let mut backend = HeadlessBackend::new();
    {
        let mut scene = Scene::new(&mut backend);
        let root = scene.create_node("root");
        let child = scene.create_child(root, "child").unwrap();
        for key in [root, child] {
            scene.set_mesh(key, &Mesh::cube()).unwrap();
            scene.load_shader(key, &vertex, &fragment).unwrap();
        }
        assert_eq!(scene.backend().stats().live(), 8);
    }

    let stats = backend.stats();
    assert_eq!(stats.buffers_deleted, 4);
    assert_eq!(stats.vertex_arrays_deleted, 2);
    assert_eq!(stats.programs_deleted, 2);
    assert_eq!(stats.invalid_deletes, 0);
    assert_eq!(stats.live(), 0);
}

#[test]
fn test_material_upload_uses_material_value() {
    let (vertex, fragment) = shader_pair();
    let mut scene = headless_scene();
    let node = scene.create_node("lit");
    scene.load_shader(node, &vertex, &fragment).unwrap();
    scene
        .node_mut(node)
        .unwrap()
        .set_material(Material::default().with_diffuse(Vec4::new(1.0, 0.0, 0.0, 1.0)));
    let program = scene.node(node).unwrap().shader_program().unwrap();

    scene.setup_material(node, program).unwrap();

    let backend = scene.backend();
    assert_eq!(
        backend.uniform_value(program, "ambientMaterialColour"),
        Some(UniformValue::Vec4([0.2, 0.2, 0.2, 1.0]))
    );
    assert_eq!(
        backend.uniform_value(program, "diffuseMaterialColour"),
        Some(UniformValue::Vec4([1.0, 0.0, 0.0, 1.0]))
    );
    assert_eq!(
        backend.uniform_value(program, "specularMaterialColour"),
        Some(UniformValue::Vec4([1.0, 1.0, 1.0, 1.0]))
    );
    assert_eq!(backend.uniform_value(program, "specularPower"), Some(UniformValue::Float(20.0)));
}

#[test]
fn test_legacy_mode_uploads_uniform_location() {
    let (vertex, fragment) = shader_pair();
    let mut config = SceneConfig::default();
    config.engine.specular_power_source = SpecularPowerSource::UniformLocation;
    let mut scene = Scene::with_config(HeadlessBackend::new(), &config);
    let node = scene.create_node("legacy");
    scene.load_shader(node, &vertex, &fragment).unwrap();
    let program = scene.node(node).unwrap().shader_program().unwrap();

    scene.setup_material(node, program).unwrap();

    let location = scene.backend().uniform_location(program, "specularPower");
    assert!(location.is_valid());
    assert_ne!(location.0, 20);
    #[allow(clippy::cast_precision_loss)]
    let expected = location.0 as f32;
    assert_eq!(
        scene.backend().uniform_value(program, "specularPower"),
        Some(UniformValue::Float(expected))
    );
}

#[test]
fn test_material_upload_to_program_without_uniforms_is_ignored() {
    let plain_fragment = write_temp(
        "plain.frag",
        "#version 330 core\nout vec4 colour;\nvoid main() {\n    colour = vec4(1.0);\n}\n",
    );
    let (vertex, _) = shader_pair();
    let mut scene = headless_scene();
    let node = scene.create_node("plain");
    scene.load_shader(node, &vertex, &plain_fragment).unwrap();
    let program = scene.node(node).unwrap().shader_program().unwrap();

    scene.setup_material(node, program).unwrap();

    let backend = scene.backend();
    assert_eq!(backend.uniform_value(program, "specularPower"), None);
    let writes = backend.uniform_writes();
    assert_eq!(writes.len(), 4);
    assert!(writes.iter().all(|w| w.location == UniformLocation::INVALID));
}

#[test]
fn test_comma_declared_uniforms_receive_material() {
    let combined = FRAGMENT_SHADER.replace(
        "uniform vec4 ambientMaterialColour;\nuniform vec4 diffuseMaterialColour;",
        "uniform vec4 ambientMaterialColour, diffuseMaterialColour;",
    );
    assert_ne!(combined, FRAGMENT_SHADER);
    let fragment = write_temp("combined.frag", &combined);
    let (vertex, _) = shader_pair();
    let mut scene = headless_scene();
    let node = scene.create_node("combined");
    scene.load_shader(node, &vertex, &fragment).unwrap();
    let program = scene.node(node).unwrap().shader_program().unwrap();

    scene.setup_material(node, program).unwrap();

    let backend = scene.backend();
    assert!(backend.uniform_location(program, "ambientMaterialColour").is_valid());
    assert_eq!(
        backend.uniform_value(program, "ambientMaterialColour"),
        Some(UniformValue::Vec4([0.2, 0.2, 0.2, 1.0]))
    );
    assert!(backend.uniform_value(program, "diffuseMaterialColour").is_some());
}

#[test]
fn test_repeated_material_uploads_keep_log_bounded() {
    let (vertex, fragment) = shader_pair();
    let mut scene = Scene::new(HeadlessBackend::new().with_uniform_log_capacity(64));
    let node = scene.create_node("lit");
    scene.load_shader(node, &vertex, &fragment).unwrap();
    let program = scene.node(node).unwrap().shader_program().unwrap();

    for _ in 0..1000 {
        scene.setup_material(node, program).unwrap();
    }
    assert_eq!(scene.backend().uniform_writes().len(), 64);

    scene.backend_mut().clear_uniform_writes();
    for _ in 0..10 {
        scene.setup_material(node, program).unwrap();
        assert_eq!(scene.backend_mut().take_uniform_writes().len(), 4);
    }
    assert!(scene.backend().uniform_writes().is_empty());
}

#[test]
fn test_model_matrix_upload() {
    let (vertex, fragment) = shader_pair();
    let mut scene = headless_scene();
    let node = scene.create_node("moved");
    scene.load_shader(node, &vertex, &fragment).unwrap();
    scene.node_mut(node).unwrap().set_position(Vec3::new(1.0, 2.0, 3.0));
    scene.update(node).unwrap();
    let program = scene.node(node).unwrap().shader_program().unwrap();

    scene.upload_model_matrix(node, program).unwrap();

    let expected = to_cols_array(scene.node(node).unwrap().world_matrix());
    assert_eq!(
        scene.backend().uniform_value(program, "modelMatrix"),
        Some(UniformValue::Mat4(expected))
    );
    assert_eq!(expected[3][..3], [1.0, 2.0, 3.0]);
}

#[test]
fn test_config_material_becomes_node_default() {
    let mut config = SceneConfig::default();
    config.material.specular_power = 64.0;
    let mut scene = Scene::with_config(HeadlessBackend::new(), &config);

    let node = scene.create_node("shiny");

    assert_eq!(scene.node(node).unwrap().material().specular_power, 64.0);
    assert_eq!(scene.specular_power_source(), SpecularPowerSource::MaterialValue);
}
