use std::collections::BTreeMap;

use glam::Vec2;

use crate::{assets::TextureHandle, scene::Color};

/// Vertex stage of the waving flag, compiled into the binary.
pub const FLAG_VERTEX_SHADER: &str = include_str!("../../shaders/flag/vertex.glsl");
/// Fragment stage of the waving flag.
pub const FLAG_FRAGMENT_SHADER: &str = include_str!("../../shaders/flag/fragment.glsl");

pub const U_FREQUENCY: &str = "uFrequency";
pub const U_TIME: &str = "uTime";
pub const U_COLOR: &str = "uColor";
pub const U_TEXTURE: &str = "uTexture";
/// Per-vertex random attribute consumed by the flag vertex stage.
pub const A_RANDOM: &str = "aRandom";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Color(Color),
    Texture(TextureHandle),
}

/// Named uniform cells of one shader program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Uniforms {
    values: BTreeMap<String, UniformValue>,
}

impl Uniforms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: UniformValue) -> &mut Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.values.get(name)
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        match self.values.get(name) {
            Some(UniformValue::Float(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn vec2(&self, name: &str) -> Option<Vec2> {
        match self.values.get(name) {
            Some(UniformValue::Vec2(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn vec2_mut(&mut self, name: &str) -> Option<&mut Vec2> {
        match self.values.get_mut(name) {
            Some(UniformValue::Vec2(value)) => Some(value),
            _ => None,
        }
    }

    /// Writes a float cell. Returns `false` when the cell is missing or holds
    /// another type; the cell is left untouched in that case.
    pub fn set_float(&mut self, name: &str, value: f32) -> bool {
        match self.values.get_mut(name) {
            Some(UniformValue::Float(cell)) => {
                *cell = value;
                true
            }
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Shader program given verbatim to the backend, with no built-in chunks prepended.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderMaterial {
    pub vertex_shader: String,
    pub fragment_shader: String,
    pub uniforms: Uniforms,
    pub transparent: bool,
}

impl ShaderMaterial {
    pub fn new(vertex_shader: impl Into<String>, fragment_shader: impl Into<String>) -> Self {
        Self {
            vertex_shader: vertex_shader.into(),
            fragment_shader: fragment_shader.into(),
            uniforms: Uniforms::new(),
            transparent: false,
        }
    }

    /// The waving flag program with its four uniforms; time starts at zero.
    pub fn flag(frequency: Vec2, color: Color, texture: TextureHandle) -> Self {
        let mut material = Self::new(FLAG_VERTEX_SHADER, FLAG_FRAGMENT_SHADER);
        material
            .uniforms
            .insert(U_FREQUENCY, UniformValue::Vec2(frequency))
            .insert(U_TIME, UniformValue::Float(0.0))
            .insert(U_COLOR, UniformValue::Color(color))
            .insert(U_TEXTURE, UniformValue::Texture(texture));
        material
    }
}
