//! Structure-only reader for glTF 2.0 documents.
//!
//! Only the node hierarchy, transforms, mesh primitives and material
//! parameters are read. Buffers stay on disk.

use std::{collections::HashSet, fs, path::Path};

use glam::{Quat, Vec3};
use gltf::{mesh::Semantic, Gltf};

use crate::{
    scene::{BasicMaterial, Color, Geometry, Material, Mesh, NodeKind, StandardMaterial, Transform},
    Result, SceneError,
};

/// Model content ready to be instantiated into a scene graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelAsset {
    pub name: String,
    /// Parents always precede their children.
    pub nodes: Vec<ModelNode>,
}

impl ModelAsset {
    pub fn mesh_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node.kind, NodeKind::Mesh(_)))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelNode {
    pub name: String,
    /// Index into [`ModelAsset::nodes`]; `None` hangs off the model root.
    pub parent: Option<usize>,
    pub transform: Transform,
    pub kind: NodeKind,
}

/// Reads a `.gltf` file from disk.
pub fn load_model(path: &Path) -> Result<ModelAsset> {
    let is_gltf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gltf"))
        .unwrap_or(false);
    if !is_gltf {
        return Err(SceneError::UnsupportedFormat(path.to_path_buf()));
    }

    let bytes = fs::read(path)?;
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());

    parse_model(&name, &bytes).map_err(|err| match err {
        SceneError::Message(reason) => SceneError::asset(path, reason),
        SceneError::Gltf(err) => SceneError::asset(path, err.to_string()),
        other => other,
    })
}

/// Parses a glTF document into a [`ModelAsset`] named `name`.
///
/// The hierarchy is walked with an explicit stack, so nesting depth is only
/// bounded by memory.
pub fn parse_model(name: &str, bytes: &[u8]) -> Result<ModelAsset> {
    let gltf = Gltf::from_slice(bytes)?;
    let version = &gltf.as_json().asset.version;
    if !version.starts_with("2.") {
        return Err(SceneError::msg(format!("glTF version {version} is not supported")));
    }

    let roots: Vec<gltf::Node<'_>> = match gltf.default_scene().or_else(|| gltf.scenes().next()) {
        Some(scene) => scene.nodes().collect(),
        None => {
            let children: HashSet<usize> = gltf
                .nodes()
                .flat_map(|node| node.children().map(|child| child.index()))
                .collect();
            gltf.nodes().filter(|node| !children.contains(&node.index())).collect()
        }
    };

    let mut nodes = Vec::new();
    let mut visited = HashSet::new();
    let mut stack: Vec<(gltf::Node<'_>, Option<usize>)> =
        roots.into_iter().rev().map(|node| (node, None)).collect();

    while let Some((node, parent)) = stack.pop() {
        if !visited.insert(node.index()) {
            return Err(SceneError::msg(format!(
                "node {} is referenced more than once",
                node.index()
            )));
        }

        let name = node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node_{}", node.index()));
        let transform = node_transform(&node);
        let primitives = node.mesh().map(|mesh| mesh_primitives(&mesh)).unwrap_or_default();

        // A single primitive becomes the node itself; several hang under a group.
        let slot = nodes.len();
        let mut primitives = primitives.into_iter();
        match (primitives.next(), primitives.len()) {
            (Some(mesh), 0) => nodes.push(ModelNode {
                name,
                parent,
                transform,
                kind: NodeKind::Mesh(mesh),
            }),
            (first, _) => {
                nodes.push(ModelNode {
                    name: name.clone(),
                    parent,
                    transform,
                    kind: NodeKind::Group,
                });
                for (index, mesh) in first.into_iter().chain(primitives).enumerate() {
                    nodes.push(ModelNode {
                        name: format!("{name}_{index}"),
                        parent: Some(slot),
                        transform: Transform::IDENTITY,
                        kind: NodeKind::Mesh(mesh),
                    });
                }
            }
        }

        let children: Vec<_> = node.children().collect();
        stack.extend(children.into_iter().rev().map(|child| (child, Some(slot))));
    }

    tracing::debug!(model = name, nodes = nodes.len(), "parsed model");
    Ok(ModelAsset {
        name: name.to_string(),
        nodes,
    })
}

fn node_transform(node: &gltf::Node<'_>) -> Transform {
    let (translation, [x, y, z, w], scale) = node.transform().decomposed();
    Transform::from_trs(
        Vec3::from_array(translation),
        Quat::from_xyzw(x, y, z, w).normalize(),
        Vec3::from_array(scale),
    )
}

fn mesh_primitives(mesh: &gltf::Mesh<'_>) -> Vec<Mesh> {
    mesh.primitives()
        .map(|primitive| {
            let vertex_count = primitive
                .get(&Semantic::Positions)
                .map(|accessor| accessor.count())
                .unwrap_or(0);
            Mesh {
                geometry: Geometry::external(vertex_count),
                material: to_material(&primitive.material()),
            }
        })
        .collect()
}

fn to_material(material: &gltf::Material<'_>) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, _] = pbr.base_color_factor();
    let color = Color::new(r, g, b);
    let name = material.name().unwrap_or_default().to_string();

    if material.unlit() {
        return Material::Basic(BasicMaterial { name, color });
    }

    Material::Standard(StandardMaterial {
        name,
        color,
        metalness: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        ..StandardMaterial::default()
    })
}
