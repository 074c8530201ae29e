//! glTF 2.0 scene bounds
//!
//! Only the JSON document is read, either from a `.gltf` file or from the
//! first chunk of a binary GLB container. Bounds come from the min/max that
//! POSITION accessors must carry, transformed through the node hierarchy
//! of the default scene. Vertex buffers are never loaded.

use glam::{Mat4, Quat, Vec3};
use miniview_core::Bounds;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

const GLB_MAGIC: u32 = 0x4654_6C67;
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const GLB_HEADER_LEN: usize = 12;
const MAX_DEPTH: usize = 64;

#[derive(Error, Debug)]
pub enum GltfError {
    #[error("GLB container is truncated")]
    Truncated,
    #[error("unsupported GLB version {0}")]
    Version(u32),
    #[error("GLB header declares {declared} bytes but {actual} are present")]
    Length { declared: usize, actual: usize },
    #[error("first GLB chunk is not JSON")]
    MissingJson,
    #[error("invalid glTF document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("scene {0} does not exist")]
    MissingScene(usize),
    #[error("node {0} does not exist")]
    MissingNode(usize),
    #[error("mesh {0} does not exist")]
    MissingMesh(usize),
    #[error("accessor {0} does not exist")]
    MissingAccessor(usize),
    #[error("node hierarchy is deeper than {0} levels")]
    TooDeep(usize),
    #[error("node {0} has more than one parent")]
    SharedNode(usize),
}

/// What the viewer needs to know about a parsed model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSummary {
    /// World-space bounds of every mesh in the default scene
    pub bounds: Option<Bounds>,
    pub meshes: usize,
    pub generator: Option<String>,
}

#[derive(Deserialize, Default)]
struct Document {
    #[serde(default)]
    asset: Asset,
    scene: Option<usize>,
    #[serde(default)]
    scenes: Vec<Scene>,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    meshes: Vec<Mesh>,
    #[serde(default)]
    accessors: Vec<Accessor>,
}

#[derive(Deserialize, Default)]
struct Asset {
    generator: Option<String>,
}

#[derive(Deserialize)]
struct Scene {
    #[serde(default)]
    nodes: Vec<usize>,
}

#[derive(Deserialize)]
struct Node {
    mesh: Option<usize>,
    #[serde(default)]
    children: Vec<usize>,
    matrix: Option<[f32; 16]>,
    translation: Option<[f32; 3]>,
    rotation: Option<[f32; 4]>,
    scale: Option<[f32; 3]>,
}

impl Node {
    fn local_transform(&self) -> Mat4 {
        if let Some(matrix) = &self.matrix {
            return Mat4::from_cols_array(matrix);
        }
        Mat4::from_scale_rotation_translation(
            self.scale.map(Vec3::from).unwrap_or(Vec3::ONE),
            self.rotation.map(Quat::from_array).unwrap_or(Quat::IDENTITY),
            self.translation.map(Vec3::from).unwrap_or(Vec3::ZERO),
        )
    }
}

#[derive(Deserialize)]
struct Mesh {
    #[serde(default)]
    primitives: Vec<Primitive>,
}

#[derive(Deserialize)]
struct Primitive {
    #[serde(default)]
    attributes: HashMap<String, usize>,
}

#[derive(Deserialize)]
struct Accessor {
    #[serde(default)]
    min: Vec<f32>,
    #[serde(default)]
    max: Vec<f32>,
}

pub fn is_glb(bytes: &[u8]) -> bool {
    read_u32(bytes, 0) == Some(GLB_MAGIC)
}

/// Parse a `.gltf` or `.glb` file
pub fn parse(bytes: &[u8]) -> Result<ModelSummary, GltfError> {
    let json = if is_glb(bytes) { glb_json_chunk(bytes)? } else { bytes };
    let document: Document = serde_json::from_slice(json)?;

    Ok(ModelSummary {
        bounds: scene_bounds(&document)?,
        meshes: document.meshes.len(),
        generator: document.asset.generator.clone(),
    })
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let word = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
}

fn glb_json_chunk(bytes: &[u8]) -> Result<&[u8], GltfError> {
    let version = read_u32(bytes, 4).ok_or(GltfError::Truncated)?;
    if version != GLB_VERSION {
        return Err(GltfError::Version(version));
    }

    let declared = read_u32(bytes, 8).ok_or(GltfError::Truncated)? as usize;
    if declared > bytes.len() {
        return Err(GltfError::Length {
            declared,
            actual: bytes.len(),
        });
    }

    let chunk_len = read_u32(bytes, GLB_HEADER_LEN).ok_or(GltfError::Truncated)? as usize;
    let chunk_type = read_u32(bytes, GLB_HEADER_LEN + 4).ok_or(GltfError::Truncated)?;
    if chunk_type != CHUNK_JSON {
        return Err(GltfError::MissingJson);
    }

    let start = GLB_HEADER_LEN + 8;
    bytes.get(start..start + chunk_len).ok_or(GltfError::Truncated)
}

fn scene_bounds(document: &Document) -> Result<Option<Bounds>, GltfError> {
    let mut bounds = None;

    // Without a scene graph every mesh sits at the origin
    if document.nodes.is_empty() {
        for index in 0..document.meshes.len() {
            if let Some(mesh) = mesh_bounds(document, index)? {
                merge(&mut bounds, mesh);
            }
        }
        return Ok(bounds);
    }

    // Node graphs are disjoint trees; a node reached twice is rejected
    let mut visited = HashSet::new();
    for root in root_nodes(document)? {
        visit(document, root, Mat4::IDENTITY, 0, &mut visited, &mut bounds)?;
    }
    Ok(bounds)
}

fn root_nodes(document: &Document) -> Result<Vec<usize>, GltfError> {
    let scene = document
        .scene
        .or(if document.scenes.is_empty() { None } else { Some(0) });

    if let Some(index) = scene {
        let scene = document
            .scenes
            .get(index)
            .ok_or(GltfError::MissingScene(index))?;
        return Ok(scene.nodes.clone());
    }

    let children: HashSet<usize> = document
        .nodes
        .iter()
        .flat_map(|node| node.children.iter().copied())
        .collect();
    Ok((0..document.nodes.len())
        .filter(|index| !children.contains(index))
        .collect())
}

fn visit(
    document: &Document,
    index: usize,
    parent: Mat4,
    depth: usize,
    visited: &mut HashSet<usize>,
    bounds: &mut Option<Bounds>,
) -> Result<(), GltfError> {
    if depth > MAX_DEPTH {
        return Err(GltfError::TooDeep(MAX_DEPTH));
    }
    if !visited.insert(index) {
        return Err(GltfError::SharedNode(index));
    }

    let node = document.nodes.get(index).ok_or(GltfError::MissingNode(index))?;
    let world = parent * node.local_transform();

    if let Some(mesh) = node.mesh {
        if let Some(local) = mesh_bounds(document, mesh)? {
            if let Some(transformed) = transform_bounds(&local, &world) {
                merge(bounds, transformed);
            }
        }
    }

    for &child in &node.children {
        visit(document, child, world, depth + 1, visited, bounds)?;
    }
    Ok(())
}

fn mesh_bounds(document: &Document, index: usize) -> Result<Option<Bounds>, GltfError> {
    let mesh = document.meshes.get(index).ok_or(GltfError::MissingMesh(index))?;
    let mut bounds = None;

    for primitive in &mesh.primitives {
        let Some(&position) = primitive.attributes.get("POSITION") else {
            continue;
        };
        let accessor = document
            .accessors
            .get(position)
            .ok_or(GltfError::MissingAccessor(position))?;
        if accessor.min.len() < 3 || accessor.max.len() < 3 {
            continue;
        }

        let min = Vec3::new(accessor.min[0], accessor.min[1], accessor.min[2]);
        let max = Vec3::new(accessor.max[0], accessor.max[1], accessor.max[2]);
        merge(&mut bounds, Bounds::new(min, max));
    }

    Ok(bounds)
}

fn transform_bounds(bounds: &Bounds, world: &Mat4) -> Option<Bounds> {
    let (min, max) = (bounds.min, bounds.max);
    let corners = (0..8u8).map(|i| {
        Vec3::new(
            if i & 1 == 0 { min.x } else { max.x },
            if i & 2 == 0 { min.y } else { max.y },
            if i & 4 == 0 { min.z } else { max.z },
        )
    });
    Bounds::from_points(corners.map(|corner| world.transform_point3(corner)))
}

fn merge(acc: &mut Option<Bounds>, bounds: Bounds) {
    let merged = match acc.take() {
        Some(existing) => existing.union(&bounds),
        None => bounds,
    };
    *acc = Some(merged);
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUBE: &str = r#"{
        "asset": {"version": "2.0", "generator": "test"},
        "scene": 0,
        "scenes": [{"nodes": [0]}],
        "nodes": [
            {"translation": [10.0, 0.0, 0.0], "children": [1]},
            {"mesh": 0, "scale": [2.0, 2.0, 2.0]}
        ],
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0, "NORMAL": 1}}]}],
        "accessors": [
            {"min": [-1.0, -1.0, -1.0], "max": [1.0, 1.0, 1.0]},
            {}
        ]
    }"#;

    fn glb(json: &str, chunk_type: u32) -> Vec<u8> {
        let mut chunk = json.as_bytes().to_vec();
        while chunk.len() % 4 != 0 {
            chunk.push(b' ');
        }

        let total = (GLB_HEADER_LEN + 8 + chunk.len()) as u32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&GLB_MAGIC.to_le_bytes());
        bytes.extend_from_slice(&GLB_VERSION.to_le_bytes());
        bytes.extend_from_slice(&total.to_le_bytes());
        bytes.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&chunk_type.to_le_bytes());
        bytes.extend_from_slice(&chunk);
        bytes
    }

    #[test]
    fn test_gltf_bounds_follow_node_transforms() {
        let summary = parse(CUBE.as_bytes()).unwrap();

        assert_eq!(summary.meshes, 1);
        assert_eq!(summary.generator.as_deref(), Some("test"));
        assert_eq!(
            summary.bounds,
            Some(Bounds::new(Vec3::new(8.0, -2.0, -2.0), Vec3::new(12.0, 2.0, 2.0)))
        );
    }

    #[test]
    fn test_glb_container() {
        let bytes = glb(CUBE, CHUNK_JSON);
        assert!(is_glb(&bytes));
        assert_eq!(parse(&bytes).unwrap(), parse(CUBE.as_bytes()).unwrap());
    }

    #[test]
    fn test_matrix_transform() {
        let json = r#"{
            "nodes": [{"mesh": 0, "matrix": [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,5,0,1]}],
            "meshes": [{"primitives": [{"attributes": {"POSITION": 0}}]}],
            "accessors": [{"min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 1.0]}]
        }"#;

        let bounds = parse(json.as_bytes()).unwrap().bounds.unwrap();
        assert_eq!(bounds.min, Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(1.0, 6.0, 1.0));
    }

    #[test]
    fn test_meshes_without_nodes_and_empty_documents() {
        let json = r#"{
            "meshes": [{"primitives": [{"attributes": {"POSITION": 0}}]}],
            "accessors": [{"min": [-3.0, 0.0, 0.0], "max": [3.0, 1.0, 1.0]}]
        }"#;
        let bounds = parse(json.as_bytes()).unwrap().bounds.unwrap();
        assert_eq!(bounds.size(), Vec3::new(6.0, 1.0, 1.0));

        let empty = parse(br#"{"asset": {"version": "2.0"}}"#).unwrap();
        assert_eq!(empty.bounds, None);
        assert_eq!(empty.meshes, 0);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(parse(b"not json"), Err(GltfError::Json(_))));

        let bytes = glb(CUBE, 0x004E_4942);
        assert!(matches!(parse(&bytes), Err(GltfError::MissingJson)));

        let mut bytes = glb(CUBE, CHUNK_JSON);
        bytes.truncate(30);
        assert!(matches!(parse(&bytes), Err(GltfError::Length { .. })));

        let dangling = r#"{"scenes": [{"nodes": [3]}], "nodes": [{}]}"#;
        assert!(matches!(
            parse(dangling.as_bytes()),
            Err(GltfError::MissingNode(3))
        ));
    }

    #[test]
    fn test_cyclic_hierarchy_is_rejected() {
        let json = r#"{
            "scenes": [{"nodes": [0]}],
            "nodes": [{"children": [1]}, {"children": [0]}]
        }"#;
        assert!(matches!(parse(json.as_bytes()), Err(GltfError::SharedNode(0))));
    }

    fn chain(levels: usize, children_per_node: usize) -> String {
        let nodes: Vec<String> = (0..levels)
            .map(|i| {
                let children = if i + 1 < levels {
                    vec![(i + 1).to_string(); children_per_node].join(",")
                } else {
                    String::new()
                };
                format!(r#"{{"children": [{}]}}"#, children)
            })
            .collect();
        format!(r#"{{"scenes": [{{"nodes": [0]}}], "nodes": [{}]}}"#, nodes.join(","))
    }

    #[test]
    fn test_node_with_two_parents_is_rejected() {
        // Each level lists the same child twice; the walk stops at the
        // first repeat instead of doubling per level
        let json = chain(40, 2);
        assert!(matches!(parse(json.as_bytes()), Err(GltfError::SharedNode(39))));

        let json = r#"{
            "scenes": [{"nodes": [0, 1]}],
            "nodes": [{"children": [2]}, {"children": [2]}, {}]
        }"#;
        assert!(matches!(parse(json.as_bytes()), Err(GltfError::SharedNode(2))));
    }

    #[test]
    fn test_deep_hierarchy_is_rejected() {
        assert!(parse(chain(MAX_DEPTH, 1).as_bytes()).is_ok());
        assert!(matches!(
            parse(chain(MAX_DEPTH + 2, 1).as_bytes()),
            Err(GltfError::TooDeep(_))
        ));
    }
}
