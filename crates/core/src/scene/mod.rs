//! Ownership tree of everything the renderer draws.

mod geometry;
mod material;

use glam::{EulerRot, Mat4, Quat, UVec2, Vec3};
use serde::Serialize;

use crate::{assets::TextureHandle, shader::ShaderMaterial};

pub use geometry::{random_attribute, Geometry, MAX_PLANE_SEGMENTS};
pub use material::{normalize_materials, BasicMaterial, Color, Material, StandardMaterial};

/// Index of a node inside its [`SceneGraph`]. Nodes are never removed, so an
/// id stays valid for the lifetime of the graph that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Local transform. Rotation is Euler XYZ in radians so single axes can be
/// bound to controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    pub fn from_trs(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        let (x, y, z) = rotation.to_euler(EulerRot::XYZ);
        Self {
            position,
            rotation: Vec3::new(x, y, z),
            scale,
        }
    }

    pub fn quat(&self) -> Quat {
        Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z)
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.quat(), self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub geometry: Geometry,
    pub material: Material,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSettings {
    /// Far plane of the orthographic shadow camera.
    pub far: f32,
    pub map_size: UVec2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    pub color: Color,
    pub intensity: f32,
    pub shadow: ShadowSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group,
    Mesh(Mesh),
    DirectionalLight(DirectionalLight),
    Camera,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Group => "group",
            NodeKind::Mesh(_) => "mesh",
            NodeKind::DirectionalLight(_) => "directional-light",
            NodeKind::Camera => "camera",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            kind,
            cast_shadow: false,
            receive_shadow: false,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn as_mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn as_mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn as_light(&self) -> Option<&DirectionalLight> {
        match &self.kind {
            NodeKind::DirectionalLight(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_light_mut(&mut self) -> Option<&mut DirectionalLight> {
        match &mut self.kind {
            NodeKind::DirectionalLight(light) => Some(light),
            _ => None,
        }
    }

    pub fn shader(&self) -> Option<&ShaderMaterial> {
        self.as_mesh().and_then(|mesh| mesh.material.as_shader())
    }

    pub fn shader_mut(&mut self) -> Option<&mut ShaderMaterial> {
        self.as_mesh_mut().and_then(|mesh| mesh.material.as_shader_mut())
    }
}

/// Arena-backed scene tree. The root owns every other node.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    pub background: Option<TextureHandle>,
    pub environment: Option<TextureHandle>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::group("Scene")],
            background: None,
            environment: None,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Inserts `node` under `parent`. An unknown parent falls back to the root.
    pub fn add(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        let parent = if parent.0 < self.nodes.len() {
            parent
        } else {
            tracing::warn!(parent = parent.0, "unknown parent, attaching to root");
            self.root()
        };

        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn add_to_root(&mut self, node: Node) -> NodeId {
        self.add(self.root(), node)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Depth-first, parents before children, siblings in insertion order.
    pub fn traverse(&self, mut visit: impl FnMut(NodeId, usize, &Node)) {
        for (id, depth) in self.depth_first() {
            visit(id, depth, &self.nodes[id.0]);
        }
    }

    pub fn traverse_mut(&mut self, mut visit: impl FnMut(&mut Node)) {
        for (id, _) in self.depth_first() {
            visit(&mut self.nodes[id.0]);
        }
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.depth_first()
            .into_iter()
            .map(|(id, _)| id)
            .find(|id| self.nodes[id.0].name == name)
    }

    pub fn mesh_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.as_mesh().is_some()).count()
    }

    /// Composed parent-to-child transform of `id`.
    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut node = self.get(id)?;
        let mut matrix = node.transform.matrix();
        while let Some(parent) = node.parent {
            node = &self.nodes[parent.0];
            matrix = node.transform.matrix() * matrix;
        }
        Some(matrix)
    }

    fn depth_first(&self) -> Vec<(NodeId, usize)> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root(), 0)];
        while let Some((id, depth)) = stack.pop() {
            order.push((id, depth));
            for child in self.nodes[id.0].children.iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
        order
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}
