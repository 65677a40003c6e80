//! Runtime skinning evaluator.
//!
//! Consumes an imported [`Pose`] plus the live actor hierarchy and produces
//! one packed 3×4 bone matrix per pose bone every frame.

use std::sync::Arc;

use nalgebra::{Matrix4, Vector3};

use crate::assets::{Aabb, Pose, Trs};
use crate::math::{compose_trs, joint_inverse_bind, transform_point};
use crate::scene::{ActorId, Scene};
use crate::{log_debug, log_warn};

/// Hard ceiling of the GPU bone buffer.
pub const MAX_SKIN_BONES: usize = 170;

/// Row-major 3×4 matrix: three rows of four, translation in the last column.
pub type BoneMatrix = [f32; 12];

const IDENTITY_BONE: BoneMatrix = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkinState {
    Clean,
    Dirty,
}

fn trs_matrix(trs: &Trs) -> Matrix4<f32> {
    compose_trs(
        &Vector3::from(trs.position),
        &Vector3::from(trs.rotation),
        &Vector3::from(trs.scale),
    )
}

fn pack(matrix: &Matrix4<f32>) -> BoneMatrix {
    let mut packed = [0.0; 12];
    for row in 0..3 {
        for column in 0..4 {
            packed[row * 4 + column] = matrix[(row, column)];
        }
    }
    packed
}

/// Per skinned actor bone state. Not shared between actors.
#[derive(Debug, Clone)]
pub struct SkinningEvaluator {
    owner: Option<ActorId>,
    pose: Option<Arc<Pose>>,
    state: SkinState,
    bones: Vec<Option<ActorId>>,
    inverse_binds: Vec<Matrix4<f32>>,
    last_worlds: Vec<Matrix4<f32>>,
    buffer: Box<[BoneMatrix; MAX_SKIN_BONES]>,
    bone_count: usize,
    bounds: Aabb,
}

impl Default for SkinningEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl SkinningEvaluator {
    pub fn new() -> Self {
        Self {
            owner: None,
            pose: None,
            state: SkinState::Clean,
            bones: Vec::new(),
            inverse_binds: Vec::new(),
            last_worlds: Vec::new(),
            buffer: Box::new([IDENTITY_BONE; MAX_SKIN_BONES]),
            bone_count: 0,
            bounds: Aabb::empty(),
        }
    }

    /// Bind `pose` to the armature actor `owner`. Marks the state dirty only
    /// when the owner or the pose contents differ from the current binding.
    pub fn set_bind_pose(&mut self, owner: ActorId, pose: Arc<Pose>) {
        let unchanged = self.owner == Some(owner)
            && self
                .pose
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, &pose) || **current == *pose);
        if unchanged {
            return;
        }
        self.owner = Some(owner);
        self.pose = Some(pose);
        self.state = SkinState::Dirty;
    }

    pub fn state(&self) -> SkinState {
        self.state
    }

    pub fn bone_count(&self) -> usize {
        self.bone_count
    }

    /// Live actor resolved for each represented pose bone.
    pub fn bones(&self) -> &[Option<ActorId>] {
        &self.bones
    }

    /// Matrices written by the last repack.
    pub fn bone_matrices(&self) -> &[BoneMatrix] {
        &self.buffer[..self.bone_count]
    }

    /// The full fixed-capacity buffer handed to the GPU.
    pub fn bone_buffer(&self) -> &[BoneMatrix; MAX_SKIN_BONES] {
        &self.buffer
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Per-frame update. Rebuilds the bind data when dirty, then repacks the
    /// buffer if that happened or any bone moved. Returns whether it repacked.
    pub fn evaluate(&mut self, scene: &Scene, local_bounds: &Aabb) -> bool {
        let (Some(owner), Some(pose)) = (self.owner, self.pose.clone()) else {
            return false;
        };

        let rebuilt = self.state == SkinState::Dirty;
        if rebuilt {
            self.rebuild(scene, owner, &pose);
        }

        let worlds: Vec<Matrix4<f32>> = self
            .bones
            .iter()
            .map(|bone| bone.map(|actor| scene.world_matrix(actor)).unwrap_or_else(Matrix4::identity))
            .collect();
        if !rebuilt && worlds == self.last_worlds {
            return false;
        }

        let mut bounds = Aabb::empty();
        for (slot, (world, inverse_bind)) in worlds.iter().zip(&self.inverse_binds).enumerate() {
            let skin = world * inverse_bind;
            self.buffer[slot] = pack(&skin);
            if !local_bounds.is_empty() {
                for corner in [local_bounds.min, local_bounds.max] {
                    bounds.include(transform_point(&skin, &Vector3::from(corner)).into());
                }
            }
        }
        self.bounds = if self.bone_count == 0 || bounds.is_empty() {
            *local_bounds
        } else {
            bounds
        };
        self.last_worlds = worlds;
        true
    }

    fn rebuild(&mut self, scene: &Scene, owner: ActorId, pose: &Pose) {
        let live = scene.descendants(owner);
        if pose.len() > MAX_SKIN_BONES {
            log_warn!(
                "pose has {} bones; only the first {} are skinned",
                pose.len(),
                MAX_SKIN_BONES
            );
        }

        let count = pose.len().min(MAX_SKIN_BONES);
        let mut accumulated = Vec::<Matrix4<f32>>::with_capacity(count);
        self.bones.clear();
        self.inverse_binds.clear();

        for bone in pose.bones.iter().take(count) {
            let actor = live
                .iter()
                .copied()
                .find(|actor| {
                    bone.node.is_some()
                        && scene.actor(*actor).map(|a| a.identity) == bone.node
                })
                .or_else(|| {
                    live.iter()
                        .copied()
                        .find(|actor| scene.actor(*actor).is_some_and(|a| a.name == bone.name))
                });

            let parent_accumulated = bone
                .parent
                .and_then(|parent| accumulated.get(parent).copied())
                .unwrap_or_else(Matrix4::identity);
            let local = trs_matrix(&bone.local);
            let inverse_bind = joint_inverse_bind(&parent_accumulated, &local)
                .unwrap_or_else(|| {
                    log_warn!("bone '{}' has a singular bind transform", bone.name);
                    Matrix4::identity()
                });

            accumulated.push(parent_accumulated * local);
            self.bones.push(actor);
            self.inverse_binds.push(inverse_bind);
        }

        for slot in &mut self.buffer[count..] {
            *slot = IDENTITY_BONE;
        }
        self.bone_count = count;
        self.last_worlds.clear();
        self.state = SkinState::Clean;
        log_debug!("skin rebuilt with {} bones", count);
    }
}
