//! Runtime asset types produced by the import pipeline.

use serde::{Deserialize, Serialize};

/// Number of bone influence slots per vertex.
pub const MAX_INFLUENCES: usize = 4;

// ─── Mesh ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkinnedVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 4],
    pub uv: [f32; 2],
    pub color: [f32; 4],
    pub bone_indices: [u16; MAX_INFLUENCES],
    pub bone_weights: [f32; MAX_INFLUENCES],
}

impl Default for SkinnedVertex {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            normal: [0.0; 3],
            tangent: [0.0; 4],
            uv: [0.0; 2],
            color: [1.0; 4],
            bone_indices: [0; MAX_INFLUENCES],
            bone_weights: [0.0; MAX_INFLUENCES],
        }
    }
}

impl SkinnedVertex {
    /// Write `(bone, weight)` into the first slot whose weight is not positive.
    /// Returns `false` (and leaves the vertex untouched) when all slots are taken.
    pub fn add_influence(&mut self, bone: u16, weight: f32) -> bool {
        let Some(slot) = self.bone_weights.iter().position(|w| *w <= 0.0) else {
            return false;
        };
        self.bone_indices[slot] = bone;
        self.bone_weights[slot] = weight;
        true
    }

    pub fn influence_count(&self) -> usize {
        self.bone_weights.iter().filter(|w| **w != 0.0).count()
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Aabb {
    pub fn empty() -> Self {
        Self {
            min: [f32::INFINITY; 3],
            max: [f32::NEG_INFINITY; 3],
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.min[axis] > self.max[axis])
    }

    pub fn include(&mut self, point: [f32; 3]) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(point[axis]);
            self.max[axis] = self.max[axis].max(point[axis]);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<SkinnedVertex>,
    pub indices: Vec<u32>,
    /// True when at least one consumed sub-mesh carried bone influences.
    pub skinned: bool,
    pub bounds: Aabb,
}

impl Mesh {
    pub fn is_skinned(&self) -> bool {
        self.skinned
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

// ─── Pose ─────────────────────────────────────────────────────────────────────

/// Translation / Euler rotation / scale triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trs {
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
}

impl Default for Trs {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseBone {
    pub name: String,
    /// Identity of the hierarchy node this bone drives, `None` when unresolved.
    pub node: Option<u32>,
    /// Index of the nearest ancestor bone in this pose.
    pub parent: Option<usize>,
    /// Bind transform relative to `parent` (or to the skeleton root when `None`).
    pub local: Trs,
    /// Decomposed inverse bind (offset) matrix in engine space.
    pub offset: Trs,
}

/// Rest pose of a skeleton; bone order equals the import's bone collection order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub bones: Vec<PoseBone>,
}

impl Pose {
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }
}

// ─── Animation ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackProperty {
    Position,
    Quaternion,
    Scale,
}

impl TrackProperty {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackProperty::Position => "position",
            TrackProperty::Quaternion => "quaternion",
            TrackProperty::Scale => "scale",
        }
    }

    pub fn component_count(&self) -> usize {
        match self {
            TrackProperty::Quaternion => 4,
            TrackProperty::Position | TrackProperty::Scale => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Normalized time in `[0, 1]`.
    pub time: f32,
    pub value: f32,
    pub interpolation: Interpolation,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Curve {
    pub keyframes: Vec<Keyframe>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationTrack {
    /// Slash-delimited path relative to the clip's root actor.
    pub target: String,
    pub property: TrackProperty,
    pub duration_ms: f32,
    /// One curve per component (x, y, z[, w]), index-aligned.
    pub curves: Vec<Curve>,
}

impl AnimationTrack {
    pub fn keyframe_count(&self) -> usize {
        self.curves.first().map(|c| c.keyframes.len()).unwrap_or(0)
    }

    /// Component values of keyframe `index` across all curves.
    pub fn sample_at(&self, index: usize) -> Vec<f32> {
        self.curves
            .iter()
            .map(|curve| curve.keyframes[index].value)
            .collect()
    }

    /// Remove keyframe `index` from every curve.
    pub fn remove_keyframe(&mut self, index: usize) {
        for curve in &mut self.curves {
            curve.keyframes.remove(index);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnimationClip {
    pub name: String,
    pub tracks: Vec<AnimationTrack>,
}

impl AnimationClip {
    /// Order tracks by descending target path; ties keep extraction order.
    pub fn sort_tracks(&mut self) {
        self.tracks.sort_by(|a, b| b.target.cmp(&a.target));
    }
}
