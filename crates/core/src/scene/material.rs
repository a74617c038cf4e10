use glam::Vec3;

use crate::{assets::TextureHandle, shader::ShaderMaterial, SceneError, Result};

use super::SceneGraph;

/// Linear RGB colour with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parses a `#rrggbb` (or `rrggbb`) hex string.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(SceneError::msg(format!("`{hex}` is not a #rrggbb colour")));
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map(|value| value as f32 / 255.0)
                .map_err(|_| SceneError::msg(format!("`{hex}` is not a #rrggbb colour")))
        };

        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.r, self.g, self.b)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Material variants a mesh can carry.
///
/// Only [`Material::Standard`] reacts to the scene environment; callers reach
/// it through [`Material::environment_mut`] instead of matching on the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    Standard(StandardMaterial),
    Basic(BasicMaterial),
    RawShader(ShaderMaterial),
}

impl Material {
    /// The environment-lit half of the material, if it has one.
    pub fn environment(&self) -> Option<&StandardMaterial> {
        match self {
            Material::Standard(material) => Some(material),
            Material::Basic(_) | Material::RawShader(_) => None,
        }
    }

    pub fn environment_mut(&mut self) -> Option<&mut StandardMaterial> {
        match self {
            Material::Standard(material) => Some(material),
            Material::Basic(_) | Material::RawShader(_) => None,
        }
    }

    pub fn as_shader(&self) -> Option<&ShaderMaterial> {
        match self {
            Material::RawShader(material) => Some(material),
            _ => None,
        }
    }

    pub fn as_shader_mut(&mut self) -> Option<&mut ShaderMaterial> {
        match self {
            Material::RawShader(material) => Some(material),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Material::Standard(_) => "standard",
            Material::Basic(_) => "basic",
            Material::RawShader(_) => "raw-shader",
        }
    }

    /// Clears the pending refresh flag and reports whether it was set.
    pub(crate) fn take_refresh(&mut self) -> bool {
        match self {
            Material::Standard(material) => std::mem::take(&mut material.needs_update),
            Material::Basic(_) | Material::RawShader(_) => false,
        }
    }
}

/// Physically based material lit by the directional light and the environment map.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardMaterial {
    pub name: String,
    pub color: Color,
    pub metalness: f32,
    pub roughness: f32,
    pub env_map: Option<TextureHandle>,
    pub env_map_intensity: f32,
    /// Set when the renderer has to rebuild its state for this material.
    pub needs_update: bool,
}

impl Default for StandardMaterial {
    fn default() -> Self {
        Self {
            name: String::new(),
            color: Color::WHITE,
            metalness: 0.0,
            roughness: 1.0,
            env_map: None,
            env_map_intensity: 1.0,
            needs_update: false,
        }
    }
}

/// Unlit material; ignores lights and the environment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BasicMaterial {
    pub name: String,
    pub color: Color,
}

/// Hands the environment map and intensity to every environment-capable mesh
/// and turns on its shadows. Returns the number of meshes touched.
///
/// Walks the whole graph, so callers only run it after the model is placed or
/// when the intensity control changes.
pub fn normalize_materials(
    scene: &mut SceneGraph,
    environment: Option<TextureHandle>,
    intensity: f32,
) -> usize {
    let mut touched = 0;
    scene.traverse_mut(|node| {
        let shadows = match node.as_mesh_mut().and_then(|mesh| mesh.material.environment_mut()) {
            Some(material) => {
                material.env_map = environment;
                material.env_map_intensity = intensity;
                material.needs_update = true;
                true
            }
            None => false,
        };

        if shadows {
            node.cast_shadow = true;
            node.receive_shadow = true;
            touched += 1;
        }
    });

    tracing::debug!(touched, intensity, "normalized materials");
    touched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Geometry, Mesh, Node, NodeKind};

    fn mesh_node(name: &str, material: Material) -> Node {
        Node::new(
            name,
            NodeKind::Mesh(Mesh {
                geometry: Geometry::external(3),
                material,
            }),
        )
    }

    #[test]
    fn parses_hex_colours() {
        let color = Color::from_hex("#8D6F64").unwrap();
        assert!((color.r - 141.0 / 255.0).abs() < 1e-6);
        assert!((color.g - 111.0 / 255.0).abs() < 1e-6);
        assert!((color.b - 100.0 / 255.0).abs() < 1e-6);

        assert_eq!(Color::from_hex("ffffff").unwrap(), Color::WHITE);
        assert!(Color::from_hex("#fff").is_err());
        assert!(Color::from_hex("#gg0000").is_err());
    }

    #[test]
    fn normalization_skips_materials_without_environment() {
        let mut scene = SceneGraph::new();
        let root = scene.root();
        let standard = scene.add(root, mesh_node("body", Material::Standard(StandardMaterial::default())));
        let basic = scene.add(root, mesh_node("decal", Material::Basic(BasicMaterial::default())));

        let touched = normalize_materials(&mut scene, Some(TextureHandle::new(7)), 2.5);
        assert_eq!(touched, 1);

        let body = scene.get(standard).unwrap();
        assert!(body.cast_shadow && body.receive_shadow);
        let material = body.as_mesh().unwrap().material.environment().unwrap();
        assert_eq!(material.env_map, Some(TextureHandle::new(7)));
        assert_eq!(material.env_map_intensity, 2.5);
        assert!(material.needs_update);

        let decal = scene.get(basic).unwrap();
        assert!(!decal.cast_shadow);
    }

    #[test]
    fn normalization_is_idempotent() {
        let mut scene = SceneGraph::new();
        let root = scene.root();
        let group = scene.add(root, Node::group("model"));
        for index in 0..3 {
            scene.add(
                group,
                mesh_node(&format!("part-{index}"), Material::Standard(StandardMaterial::default())),
            );
        }

        normalize_materials(&mut scene, Some(TextureHandle::new(1)), 4.0);
        let first = scene.clone();
        normalize_materials(&mut scene, Some(TextureHandle::new(1)), 4.0);

        assert_eq!(first, scene);
    }

    #[test]
    fn refresh_flag_is_consumed_once() {
        let mut material = Material::Standard(StandardMaterial {
            needs_update: true,
            ..StandardMaterial::default()
        });

        assert!(material.take_refresh());
        assert!(!material.take_refresh());
    }
}
