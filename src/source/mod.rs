//! In-memory scene graph produced by the external scene-import library.
//!
//! Everything in this module is read-only input to the import pipeline. The
//! [`gltf_scene`] submodule fills it from glTF/GLB files; tests build it by hand.

pub mod gltf_scene;

use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};

/// Up axis declared by the source file metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpAxis {
    #[default]
    Y,
    Z,
}

/// Scene-level metadata key/values the pipeline cares about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneMetadata {
    pub unit_scale: f32,
    pub up_axis: UpAxis,
}

impl Default for SceneMetadata {
    fn default() -> Self {
        Self {
            unit_scale: 1.0,
            up_axis: UpAxis::Y,
        }
    }
}

/// A node of the immutable source tree.
#[derive(Debug, Clone)]
pub struct SourceNode {
    pub name: String,
    pub transform: Matrix4<f32>,
    pub children: Vec<SourceNode>,
    /// Indices into [`SourceScene::meshes`].
    pub meshes: Vec<usize>,
}

impl SourceNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Matrix4::identity(),
            children: Vec::new(),
            meshes: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Matrix4<f32>) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_child(mut self, child: SourceNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_meshes(mut self, meshes: Vec<usize>) -> Self {
        self.meshes = meshes;
        self
    }
}

/// Primitive topology of a source sub-mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimitiveKind {
    Points,
    Lines,
    #[default]
    Triangles,
}

/// One `(vertex, weight)` pair of a bone influence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexWeight {
    pub vertex: u32,
    pub weight: f32,
}

/// A bone influence list attached to a mesh.
#[derive(Debug, Clone)]
pub struct SourceBone {
    pub name: String,
    /// Mesh space → bone space (inverse bind) matrix.
    pub offset: Matrix4<f32>,
    pub weights: Vec<VertexWeight>,
}

/// A source sub-mesh. Optional channels are `None` when the file lacks them.
#[derive(Debug, Clone, Default)]
pub struct SourceMesh {
    pub name: String,
    pub primitive: PrimitiveKind,
    pub positions: Vec<Vector3<f32>>,
    pub normals: Option<Vec<Vector3<f32>>>,
    pub tangents: Option<Vec<[f32; 4]>>,
    pub uvs: Option<Vec<[f32; 2]>>,
    pub colors: Option<Vec<[f32; 4]>>,
    pub indices: Vec<u32>,
    pub bones: Vec<SourceBone>,
}

impl SourceMesh {
    pub fn has_bones(&self) -> bool {
        !self.bones.is_empty()
    }
}

/// Vector keyframe in source ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorKey {
    pub time: f64,
    pub value: Vector3<f32>,
}

/// Quaternion keyframe in source ticks, stored as `[x, y, z, w]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuatKey {
    pub time: f64,
    pub value: [f32; 4],
}

/// Per-node animation channel with independent key lists.
#[derive(Debug, Clone, Default)]
pub struct SourceChannel {
    pub node_name: String,
    pub position_keys: Vec<VectorKey>,
    pub rotation_keys: Vec<QuatKey>,
    pub scale_keys: Vec<VectorKey>,
}

#[derive(Debug, Clone, Default)]
pub struct SourceAnimation {
    pub name: String,
    pub ticks_per_second: f64,
    pub channels: Vec<SourceChannel>,
}

/// Complete scene handed over by the import library.
#[derive(Debug, Clone)]
pub struct SourceScene {
    pub root: SourceNode,
    pub meshes: Vec<SourceMesh>,
    pub animations: Vec<SourceAnimation>,
    pub metadata: SceneMetadata,
}

impl SourceScene {
    pub fn new(root: SourceNode) -> Self {
        Self {
            root,
            meshes: Vec::new(),
            animations: Vec::new(),
            metadata: SceneMetadata::default(),
        }
    }
}
