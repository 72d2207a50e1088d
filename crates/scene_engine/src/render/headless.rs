//! Headless rendering backend
//!
//! Implements [`GraphicsBackend`] entirely in memory. Buffers keep their
//! uploaded bytes, shader sources are read from disk and given a light GLSL
//! check, linked programs expose the uniforms their stages declare, and
//! recent uploads are kept in a bounded log. Creation and deletion are counted so callers can
//! verify that each resource is released exactly once.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};

use crate::render::backend::{
    BackendError, BackendResult, BufferHandle, BufferKind, BuildStatus, GraphicsBackend,
    ProgramHandle, ShaderHandle, ShaderStage, UniformLocation, VertexArrayHandle,
};
use crate::render::mesh::VertexAttribute;

/// Value last written to a uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// Scalar
    Float(f32),
    /// Four-component vector
    Vec4([f32; 4]),
    /// Column-major 4x4 matrix
    Mat4([[f32; 4]; 4]),
}

/// One recorded uniform upload
#[derive(Debug, Clone, PartialEq)]
pub struct UniformWrite {
    /// Program written to
    pub program: ProgramHandle,
    /// Location written to (possibly invalid)
    pub location: UniformLocation,
    /// Uploaded value
    pub value: UniformValue,
}

/// Creation and deletion counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceStats {
    /// Buffers created
    pub buffers_created: usize,
    /// Buffers deleted
    pub buffers_deleted: usize,
    /// Vertex arrays created
    pub vertex_arrays_created: usize,
    /// Vertex arrays deleted
    pub vertex_arrays_deleted: usize,
    /// Shader stages created
    pub shaders_created: usize,
    /// Shader stages deleted
    pub shaders_deleted: usize,
    /// Programs created
    pub programs_created: usize,
    /// Programs deleted
    pub programs_deleted: usize,
    /// Deletions of handles that were not live (double frees or bad handles)
    pub invalid_deletes: usize,
}

impl ResourceStats {
    /// Number of objects created and not yet deleted
    pub fn live(&self) -> usize {
        (self.buffers_created - self.buffers_deleted)
            + (self.vertex_arrays_created - self.vertex_arrays_deleted)
            + (self.shaders_created - self.shaders_deleted)
            + (self.programs_created - self.programs_deleted)
    }
}

#[derive(Debug)]
struct BufferRecord {
    kind: BufferKind,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct VertexArrayRecord {
    index_buffer: Option<BufferHandle>,
    attributes: BTreeMap<u32, (BufferHandle, VertexAttribute)>,
}

/// Declarations pulled out of a GLSL source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SourceReflection {
    uniforms: Vec<String>,
    inputs: Vec<String>,
}

#[derive(Debug, Clone)]
struct ShaderRecord {
    stage: ShaderStage,
    path: PathBuf,
    status: BuildStatus,
    reflection: SourceReflection,
}

#[derive(Debug, Default)]
struct ProgramRecord {
    attached: Vec<ShaderRecord>,
    attribute_bindings: BTreeMap<u32, String>,
    status: Option<BuildStatus>,
    uniforms: Vec<String>,
    values: HashMap<i32, UniformValue>,
}

/// Uniform uploads kept before the oldest are dropped
pub const DEFAULT_UNIFORM_LOG_CAPACITY: usize = 4096;

/// Attribute slots per vertex array, the GL minimum for `MAX_VERTEX_ATTRIBS`
pub const DEFAULT_MAX_VERTEX_ATTRIBUTES: u32 = 16;

/// In-memory [`GraphicsBackend`]
#[derive(Debug)]
pub struct HeadlessBackend {
    next_id: u32,
    buffers: HashMap<u32, BufferRecord>,
    vertex_arrays: HashMap<u32, VertexArrayRecord>,
    shaders: HashMap<u32, ShaderRecord>,
    programs: HashMap<u32, ProgramRecord>,
    memory_budget: Option<usize>,
    max_vertex_attributes: u32,
    stats: ResourceStats,
    uniform_writes: VecDeque<UniformWrite>,
    uniform_log_capacity: usize,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self {
            next_id: 0,
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            memory_budget: None,
            max_vertex_attributes: DEFAULT_MAX_VERTEX_ATTRIBUTES,
            stats: ResourceStats::default(),
            uniform_writes: VecDeque::new(),
            uniform_log_capacity: DEFAULT_UNIFORM_LOG_CAPACITY,
        }
    }
}

impl HeadlessBackend {
    /// Create a backend with unlimited buffer memory
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the attribute slots a vertex array can enable
    pub fn with_max_vertex_attributes(mut self, count: u32) -> Self {
        self.max_vertex_attributes = count;
        self
    }

    /// Keep at most `capacity` uniform uploads in the log
    pub fn with_uniform_log_capacity(mut self, capacity: usize) -> Self {
        self.uniform_log_capacity = capacity;
        self
    }

    /// Limit the total bytes of live buffers; allocations past it fail
    pub fn with_memory_budget(mut self, bytes: usize) -> Self {
        self.memory_budget = Some(bytes);
        self
    }

    /// Creation and deletion counters
    pub fn stats(&self) -> ResourceStats {
        self.stats
    }

    /// Total bytes held by live buffers
    pub fn buffer_memory(&self) -> usize {
        self.buffers.values().map(|b| b.data.len()).sum()
    }

    /// Contents of a live buffer
    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer.0).map(|b| b.data.as_slice())
    }

    /// Kind of a live buffer
    pub fn buffer_kind(&self, buffer: BufferHandle) -> Option<BufferKind> {
        self.buffers.get(&buffer.0).map(|b| b.kind)
    }

    /// Whether a buffer is live
    pub fn is_buffer_live(&self, buffer: BufferHandle) -> bool {
        self.buffers.contains_key(&buffer.0)
    }

    /// Whether a vertex array is live
    pub fn is_vertex_array_live(&self, vertex_array: VertexArrayHandle) -> bool {
        self.vertex_arrays.contains_key(&vertex_array.0)
    }

    /// Whether a program is live
    pub fn is_program_live(&self, program: ProgramHandle) -> bool {
        self.programs.contains_key(&program.0)
    }

    /// Index buffer bound to a vertex array
    pub fn index_buffer_of(&self, vertex_array: VertexArrayHandle) -> Option<BufferHandle> {
        self.vertex_arrays.get(&vertex_array.0)?.index_buffer
    }

    /// Enabled attributes of a vertex array, ordered by slot
    pub fn vertex_attributes(
        &self,
        vertex_array: VertexArrayHandle,
    ) -> Vec<(BufferHandle, VertexAttribute)> {
        self.vertex_arrays
            .get(&vertex_array.0)
            .map(|va| va.attributes.values().copied().collect())
            .unwrap_or_default()
    }

    /// Attribute names bound to slots on a program
    pub fn attribute_bindings(&self, program: ProgramHandle) -> Option<&BTreeMap<u32, String>> {
        self.programs.get(&program.0).map(|p| &p.attribute_bindings)
    }

    /// Uniforms a linked program exposes, in location order
    pub fn active_uniforms(&self, program: ProgramHandle) -> &[String] {
        self.programs
            .get(&program.0)
            .map(|p| p.uniforms.as_slice())
            .unwrap_or_default()
    }

    /// Last value uploaded to a uniform, looked up by name
    pub fn uniform_value(&self, program: ProgramHandle, name: &str) -> Option<UniformValue> {
        let location = self.uniform_location(program, name);
        self.programs.get(&program.0)?.values.get(&location.0).copied()
    }

    /// Most recent uniform uploads in call order, including ignored ones
    pub fn uniform_writes(&self) -> &VecDeque<UniformWrite> {
        &self.uniform_writes
    }

    /// Drain the upload log, oldest first
    pub fn take_uniform_writes(&mut self) -> Vec<UniformWrite> {
        self.uniform_writes.drain(..).collect()
    }

    /// Discard the upload log
    pub fn clear_uniform_writes(&mut self) {
        self.uniform_writes.clear();
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn write_uniform(
        &mut self,
        program: ProgramHandle,
        location: UniformLocation,
        value: UniformValue,
    ) {
        if self.uniform_log_capacity > 0 {
            if self.uniform_writes.len() == self.uniform_log_capacity {
                self.uniform_writes.pop_front();
            }
            self.uniform_writes.push_back(UniformWrite {
                program,
                location,
                value,
            });
        }

        if !location.is_valid() {
            return;
        }
        match self.programs.get_mut(&program.0) {
            Some(record) if (location.0 as usize) < record.uniforms.len() => {
                record.values.insert(location.0, value);
            }
            Some(_) => log::warn!("{} has no uniform at location {}", program, location.0),
            None => log::warn!("Uniform upload to unknown {}", program),
        }
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn create_vertex_array(&mut self) -> BackendResult<VertexArrayHandle> {
        let id = self.next_id();
        self.vertex_arrays.insert(id, VertexArrayRecord::default());
        self.stats.vertex_arrays_created += 1;
        Ok(VertexArrayHandle(id))
    }

    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> BackendResult<BufferHandle> {
        if let Some(budget) = self.memory_budget {
            if self.buffer_memory() + data.len() > budget {
                return Err(BackendError::OutOfMemory { requested: data.len() });
            }
        }

        let id = self.next_id();
        self.buffers.insert(
            id,
            BufferRecord {
                kind,
                data: data.to_vec(),
            },
        );
        self.stats.buffers_created += 1;
        Ok(BufferHandle(id))
    }

    fn set_index_buffer(
        &mut self,
        vertex_array: VertexArrayHandle,
        buffer: BufferHandle,
    ) -> BackendResult<()> {
        match self.buffers.get(&buffer.0) {
            Some(record) if record.kind == BufferKind::Index => {}
            _ => return Err(BackendError::InvalidHandle { kind: "index buffer", id: buffer.0 }),
        }
        let record = self
            .vertex_arrays
            .get_mut(&vertex_array.0)
            .ok_or(BackendError::InvalidHandle { kind: "vertex array", id: vertex_array.0 })?;
        record.index_buffer = Some(buffer);
        Ok(())
    }

    fn set_vertex_attribute(
        &mut self,
        vertex_array: VertexArrayHandle,
        buffer: BufferHandle,
        attribute: &VertexAttribute,
    ) -> BackendResult<()> {
        match self.buffers.get(&buffer.0) {
            Some(record) if record.kind == BufferKind::Vertex => {}
            _ => return Err(BackendError::InvalidHandle { kind: "vertex buffer", id: buffer.0 }),
        }
        if attribute.location >= self.max_vertex_attributes {
            return Err(BackendError::Api(format!(
                "attribute slot {} exceeds the {} supported",
                attribute.location, self.max_vertex_attributes
            )));
        }
        let record = self
            .vertex_arrays
            .get_mut(&vertex_array.0)
            .ok_or(BackendError::InvalidHandle { kind: "vertex array", id: vertex_array.0 })?;
        record.attributes.insert(attribute.location, (buffer, *attribute));
        Ok(())
    }

    fn compile_shader(&mut self, stage: ShaderStage, path: &Path) -> BackendResult<ShaderHandle> {
        let source = std::fs::read_to_string(path).map_err(|source| BackendError::ShaderSource {
            path: path.to_path_buf(),
            source,
        })?;

        let (status, reflection) = check_glsl(stage, &source);
        let id = self.next_id();
        self.shaders.insert(
            id,
            ShaderRecord {
                stage,
                path: path.to_path_buf(),
                status,
                reflection,
            },
        );
        self.stats.shaders_created += 1;
        Ok(ShaderHandle(id))
    }

    fn shader_status(&self, shader: ShaderHandle) -> BackendResult<BuildStatus> {
        self.shaders
            .get(&shader.0)
            .map(|s| s.status.clone())
            .ok_or(BackendError::InvalidHandle { kind: "shader", id: shader.0 })
    }

    fn create_program(&mut self) -> BackendResult<ProgramHandle> {
        let id = self.next_id();
        self.programs.insert(id, ProgramRecord::default());
        self.stats.programs_created += 1;
        Ok(ProgramHandle(id))
    }

    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) -> BackendResult<()> {
        let shader_record = self
            .shaders
            .get(&shader.0)
            .cloned()
            .ok_or(BackendError::InvalidHandle { kind: "shader", id: shader.0 })?;
        let program_record = self
            .programs
            .get_mut(&program.0)
            .ok_or(BackendError::InvalidHandle { kind: "program", id: program.0 })?;
        program_record.attached.push(shader_record);
        Ok(())
    }

    fn bind_attribute_location(
        &mut self,
        program: ProgramHandle,
        location: u32,
        name: &str,
    ) -> BackendResult<()> {
        let record = self
            .programs
            .get_mut(&program.0)
            .ok_or(BackendError::InvalidHandle { kind: "program", id: program.0 })?;
        record.attribute_bindings.retain(|_, bound| bound.as_str() != name);
        record.attribute_bindings.insert(location, name.to_string());
        Ok(())
    }

    fn link_program(&mut self, program: ProgramHandle) -> BackendResult<()> {
        let record = self
            .programs
            .get_mut(&program.0)
            .ok_or(BackendError::InvalidHandle { kind: "program", id: program.0 })?;

        let (status, uniforms) = link_stages(&record.attached, &record.attribute_bindings);
        record.status = Some(status);
        record.uniforms = uniforms;
        record.values.clear();
        Ok(())
    }

    fn program_status(&self, program: ProgramHandle) -> BackendResult<BuildStatus> {
        let record = self
            .programs
            .get(&program.0)
            .ok_or(BackendError::InvalidHandle { kind: "program", id: program.0 })?;
        Ok(record.status.clone().unwrap_or(BuildStatus::Failed {
            log: "program has not been linked".to_string(),
        }))
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> UniformLocation {
        self.programs
            .get(&program.0)
            .and_then(|p| p.uniforms.iter().position(|u| u == name))
            .and_then(|i| i32::try_from(i).ok())
            .map_or(UniformLocation::INVALID, UniformLocation)
    }

    fn set_uniform_vec4(
        &mut self,
        program: ProgramHandle,
        location: UniformLocation,
        value: [f32; 4],
    ) {
        self.write_uniform(program, location, UniformValue::Vec4(value));
    }

    fn set_uniform_f32(&mut self, program: ProgramHandle, location: UniformLocation, value: f32) {
        self.write_uniform(program, location, UniformValue::Float(value));
    }

    fn set_uniform_mat4(
        &mut self,
        program: ProgramHandle,
        location: UniformLocation,
        value: [[f32; 4]; 4],
    ) {
        self.write_uniform(program, location, UniformValue::Mat4(value));
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        if self.shaders.remove(&shader.0).is_some() {
            self.stats.shaders_deleted += 1;
        } else {
            log::warn!("Delete of unknown {}", shader);
            self.stats.invalid_deletes += 1;
        }
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program.0).is_some() {
            self.stats.programs_deleted += 1;
        } else {
            log::warn!("Delete of unknown {}", program);
            self.stats.invalid_deletes += 1;
        }
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer.0).is_some() {
            self.stats.buffers_deleted += 1;
        } else {
            log::warn!("Delete of unknown {}", buffer);
            self.stats.invalid_deletes += 1;
        }
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        if self.vertex_arrays.remove(&vertex_array.0).is_some() {
            self.stats.vertex_arrays_deleted += 1;
        } else {
            log::warn!("Delete of unknown {}", vertex_array);
            self.stats.invalid_deletes += 1;
        }
    }
}

/// Light structural check of a GLSL stage plus uniform/input reflection
fn check_glsl(stage: ShaderStage, source: &str) -> (BuildStatus, SourceReflection) {
    let code = strip_comments(source);

    let mut errors = Vec::new();

    match code.lines().map(str::trim).find(|line| !line.is_empty()) {
        None => errors.push("ERROR: 0:0: empty shader source".to_string()),
        Some(first) if !first.starts_with("#version") => {
            errors.push("ERROR: 0:1: missing #version directive".to_string());
        }
        Some(_) => {}
    }

    let opened = code.matches('{').count();
    let closed = code.matches('}').count();
    if opened != closed {
        errors.push(format!("ERROR: unbalanced braces ({opened} opened, {closed} closed)"));
    }

    if !has_entry_point(&code) {
        errors.push("ERROR: missing entry point main()".to_string());
    }

    let reflection = reflect(stage, &code);

    if errors.is_empty() {
        (BuildStatus::Success, reflection)
    } else {
        (BuildStatus::Failed { log: errors.join("\n") }, reflection)
    }
}

/// Replace `//` and `/* */` comments with whitespace, keeping line breaks
fn strip_comments(source: &str) -> String {
    let mut code = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, chars.peek().copied()) {
            ('/', Some('/')) => {
                while chars.peek().is_some_and(|&next| next != '\n') {
                    chars.next();
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut previous = ' ';
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        code.push('\n');
                    }
                    if previous == '*' && inner == '/' {
                        break;
                    }
                    previous = inner;
                }
                code.push(' ');
            }
            _ => code.push(c),
        }
    }

    code
}

/// Identifiers and single punctuation characters
fn tokens(code: &str) -> Vec<&str> {
    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let mut tokens = Vec::new();
    let mut rest = code.trim_start();

    while let Some(first) = rest.chars().next() {
        let len = if is_ident(first) {
            rest.find(|c: char| !is_ident(c)).unwrap_or(rest.len())
        } else {
            first.len_utf8()
        };
        tokens.push(&rest[..len]);
        rest = rest[len..].trim_start();
    }

    tokens
}

fn has_entry_point(code: &str) -> bool {
    tokens(code).windows(3).any(|w| w == ["void", "main", "("])
}

fn reflect(stage: ShaderStage, code: &str) -> SourceReflection {
    let mut reflection = SourceReflection::default();

    for statement in code.split(|c: char| c == ';' || c == '{' || c == '}') {
        // Drop preprocessor lines and layout qualifiers
        let statement: String = statement
            .lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .collect::<Vec<_>>()
            .join(" ");
        let statement = match statement.find(')') {
            Some(end) if statement.trim_start().starts_with("layout") => &statement[end + 1..],
            _ => statement.as_str(),
        };

        let Some((qualifier, declaration)) = statement.trim().split_once(char::is_whitespace) else {
            continue;
        };
        match qualifier {
            "uniform" => reflection.uniforms.extend(declared_names(declaration)),
            "in" | "attribute" if stage == ShaderStage::Vertex => {
                reflection.inputs.extend(declared_names(declaration));
            }
            _ => {}
        }
    }

    reflection
}

/// Names declared by `type a, b[2], c = init`
fn declared_names(declaration: &str) -> Vec<String> {
    let mut names = Vec::new();

    for (i, declarator) in split_top_level(declaration).into_iter().enumerate() {
        let declarator = declarator.split('=').next().unwrap_or_default();
        let declarator = strip_array_sizes(declarator);
        let words: Vec<&str> = declarator.split_whitespace().collect();
        // The first declarator carries the type (and any precision) before its name
        let name = match (i, words.as_slice()) {
            (0, [_, .., name]) => *name,
            (0, _) => continue,
            (_, [name, ..]) => *name,
            (_, []) => continue,
        };
        names.push(name.to_string());
    }

    names
}

/// Split on commas outside parentheses and brackets
fn split_top_level(declaration: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in declaration.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&declaration[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&declaration[start..]);

    parts
}

fn strip_array_sizes(declarator: &str) -> String {
    let mut depth = 0usize;
    declarator
        .chars()
        .filter(|&c| match c {
            '[' => {
                depth += 1;
                false
            }
            ']' => {
                depth = depth.saturating_sub(1);
                false
            }
            _ => depth == 0,
        })
        .collect()
}

fn link_stages(
    attached: &[ShaderRecord],
    bindings: &BTreeMap<u32, String>,
) -> (BuildStatus, Vec<String>) {
    let mut errors = Vec::new();

    for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
        let count = attached.iter().filter(|s| s.stage == stage).count();
        if count == 0 {
            errors.push(format!("ERROR: no {stage} shader attached"));
        } else if count > 1 {
            errors.push(format!("ERROR: {count} {stage} shaders attached"));
        }
    }

    for shader in attached.iter().filter(|s| !s.status.is_success()) {
        errors.push(format!(
            "ERROR: {} shader {} is not compiled",
            shader.stage,
            shader.path.display()
        ));
    }

    // Binding a name the vertex stage never declares is legal
    for vertex in attached.iter().filter(|s| s.stage == ShaderStage::Vertex) {
        for (location, name) in bindings {
            if !vertex.reflection.inputs.contains(name) {
                log::debug!("Slot {} bound to undeclared input {}", location, name);
            }
        }
    }

    if !errors.is_empty() {
        return (BuildStatus::Failed { log: errors.join("\n") }, Vec::new());
    }

    let mut uniforms: Vec<String> = Vec::new();
    for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
        for shader in attached.iter().filter(|s| s.stage == stage) {
            for name in &shader.reflection.uniforms {
                if !uniforms.contains(name) {
                    uniforms.push(name.clone());
                }
            }
        }
    }

    (BuildStatus::Success, uniforms)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX_SOURCE: &str = "#version 330 core\n\
        in vec3 vertexPosition;\n\
        in vec4 vertexColour;\n\
        uniform mat4 modelMatrix;\n\
        void main() {\n\
            gl_Position = modelMatrix * vec4(vertexPosition, 1.0);\n\
        }\n";

    #[test]
    fn test_check_glsl_accepts_valid_source() {
        let (status, reflection) = check_glsl(ShaderStage::Vertex, VERTEX_SOURCE);
        assert_eq!(status, BuildStatus::Success);
        assert_eq!(reflection.uniforms, vec!["modelMatrix".to_string()]);
        assert_eq!(
            reflection.inputs,
            vec!["vertexPosition".to_string(), "vertexColour".to_string()]
        );
    }

    #[test]
    fn test_check_glsl_reports_every_problem() {
        let (status, _) = check_glsl(ShaderStage::Fragment, "out vec4 colour;\nvoid mian() {\n");
        let BuildStatus::Failed { log } = status else {
            panic!("expected compile failure");
        };
        assert!(log.contains("missing #version"));
        assert!(log.contains("unbalanced braces"));
        assert!(log.contains("missing entry point"));
    }

    #[test]
    fn test_check_glsl_empty_source() {
        let (status, _) = check_glsl(ShaderStage::Vertex, "  \n// nothing here\n");
        assert!(
            matches!(status, BuildStatus::Failed { log } if log.contains("empty shader source"))
        );
    }

    #[test]
    fn test_reflect_skips_layout_and_arrays() {
        let source = "#version 450\n\
            layout(location = 0) uniform vec4 tints[4];\n\
            uniform highp float specularPower;\n\
            void main() {}\n";
        let reflection = reflect(ShaderStage::Fragment, source);
        assert_eq!(
            reflection.uniforms,
            vec!["tints".to_string(), "specularPower".to_string()]
        );
    }

    #[test]
    fn test_reflect_comma_separated_declarations() {
        let source = "#version 330 core\n\
            uniform vec4 ambientMaterialColour, diffuseMaterialColour;\n\
            uniform float weights[2], bias = max(0.5, 0.25), scale;\n\
            in vec3 normal, tangent;\n\
            void main() {}\n";

        let fragment = reflect(ShaderStage::Fragment, source);
        assert_eq!(
            fragment.uniforms,
            ["ambientMaterialColour", "diffuseMaterialColour", "weights", "bias", "scale"]
        );
        assert!(fragment.inputs.is_empty());

        let vertex = reflect(ShaderStage::Vertex, source);
        assert_eq!(vertex.inputs, ["normal", "tangent"]);
    }

    #[test]
    fn test_check_glsl_ignores_block_comments() {
        let source = "#version 330 core\n\
            /* legacy: } */\n\
            out vec4 colour;\n\
            /* uniform float unused;\n\
               void main() { */\n\
            void main() {\n\
                colour = vec4(1.0);\n\
            }\n";

        let (status, reflection) = check_glsl(ShaderStage::Fragment, source);
        assert_eq!(status, BuildStatus::Success);
        assert!(reflection.uniforms.is_empty());
    }

    #[test]
    fn test_check_glsl_entry_point_by_tokens() {
        for source in [
            "#version 330 core\nvoid\nmain()\n{\n}\n",
            "#version 330 core\nvoid  main (void) {}\n",
        ] {
            let (status, _) = check_glsl(ShaderStage::Vertex, source);
            assert_eq!(status, BuildStatus::Success, "{source:?}");
        }

        let source = "#version 330 core\nvoid mainLoop() {}\n";
        let (status, _) = check_glsl(ShaderStage::Vertex, source);
        assert!(
            matches!(status, BuildStatus::Failed { log } if log.contains("missing entry point"))
        );
    }

    #[test]
    fn test_buffer_budget() {
        let mut backend = HeadlessBackend::new().with_memory_budget(16);
        let first = backend.create_buffer(BufferKind::Vertex, &[0u8; 12]).unwrap();
        let err = backend.create_buffer(BufferKind::Index, &[0u8; 8]).unwrap_err();
        assert!(matches!(err, BackendError::OutOfMemory { requested: 8 }));

        backend.delete_buffer(first);
        assert!(backend.create_buffer(BufferKind::Index, &[0u8; 8]).is_ok());
    }

    #[test]
    fn test_double_delete_is_counted() {
        let mut backend = HeadlessBackend::new();
        let buffer = backend.create_buffer(BufferKind::Vertex, &[1, 2, 3]).unwrap();
        backend.delete_buffer(buffer);
        backend.delete_buffer(buffer);

        let stats = backend.stats();
        assert_eq!(stats.buffers_deleted, 1);
        assert_eq!(stats.invalid_deletes, 1);
        assert_eq!(stats.live(), 0);
    }

    #[test]
    fn test_attribute_requires_vertex_buffer() {
        let mut backend = HeadlessBackend::new();
        let vertex_array = backend.create_vertex_array().unwrap();
        let index_buffer = backend.create_buffer(BufferKind::Index, &[0; 4]).unwrap();
        let attribute = crate::render::mesh::VERTEX_ATTRIBUTES[0];

        let err = backend
            .set_vertex_attribute(vertex_array, index_buffer, &attribute)
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidHandle { kind: "vertex buffer", .. }));
    }

    #[test]
    fn test_unlinked_program_has_no_uniforms() {
        let mut backend = HeadlessBackend::new();
        let program = backend.create_program().unwrap();
        assert_eq!(backend.uniform_location(program, "modelMatrix"), UniformLocation::INVALID);
        assert!(!backend.program_status(program).unwrap().is_success());
    }

    #[test]
    fn test_invalid_location_upload_is_ignored() {
        let mut backend = HeadlessBackend::new();
        let program = backend.create_program().unwrap();
        backend.set_uniform_f32(program, UniformLocation::INVALID, 5.0);

        assert_eq!(backend.uniform_writes().len(), 1);
        assert_eq!(backend.uniform_value(program, "specularPower"), None);
    }

    #[test]
    fn test_uniform_log_keeps_most_recent_writes() {
        let mut backend = HeadlessBackend::new().with_uniform_log_capacity(3);
        let program = backend.create_program().unwrap();
        for i in 0..10u8 {
            backend.set_uniform_f32(program, UniformLocation(0), f32::from(i));
        }

        let values: Vec<UniformValue> = backend.uniform_writes().iter().map(|w| w.value).collect();
        assert_eq!(
            values,
            [UniformValue::Float(7.0), UniformValue::Float(8.0), UniformValue::Float(9.0)]
        );
    }

    #[test]
    fn test_take_uniform_writes_drains_log() {
        let mut backend = HeadlessBackend::new();
        let program = backend.create_program().unwrap();
        backend.set_uniform_f32(program, UniformLocation::INVALID, 1.0);
        backend.set_uniform_vec4(program, UniformLocation::INVALID, [0.0; 4]);

        let drained = backend.take_uniform_writes();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].value, UniformValue::Float(1.0));
        assert!(backend.uniform_writes().is_empty());

        backend.set_uniform_f32(program, UniformLocation::INVALID, 2.0);
        backend.clear_uniform_writes();
        assert!(backend.uniform_writes().is_empty());
    }

    #[test]
    fn test_zero_capacity_disables_uniform_log() {
        let mut backend = HeadlessBackend::new().with_uniform_log_capacity(0);
        let program = backend.create_program().unwrap();
        backend.set_uniform_f32(program, UniformLocation::INVALID, 1.0);
        assert!(backend.uniform_writes().is_empty());
    }
}
