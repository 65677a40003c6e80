use nalgebra::Matrix4;

use super::{ImportContext, ImportWarning, ReferenceKind, asset_identity, path_identity};
use crate::assets::{Pose, PoseBone, Trs};
use crate::error::ImportError;
use crate::math::{Decomposed, decompose};
use crate::scene::{ActorId, Armature, Component, ComponentKind, Scene};
use crate::{log_debug, log_warn};

fn to_trs(parts: &Decomposed) -> Trs {
    Trs {
        position: parts.translation.into(),
        rotation: parts.euler().into(),
        scale: parts.scale.into(),
    }
}

/// Build the rest pose from the collected bones, in collection order.
///
/// Each bone keeps its decomposed engine-space offset and its bind transform
/// relative to the nearest ancestor actor that is also a pose bone.
pub fn extract_pose(scene: &Scene, ctx: &mut ImportContext) -> Pose {
    let conversion = ctx.conversion;
    let mut actors = Vec::<Option<ActorId>>::with_capacity(ctx.bones.len());
    let mut bind_worlds = Vec::<Matrix4<f32>>::with_capacity(ctx.bones.len());
    let mut bones = Vec::<PoseBone>::with_capacity(ctx.bones.len());

    let entries = ctx.bones.clone();
    for entry in &entries {
        let actor = ctx.actors_by_name.get(&entry.name).copied();
        if actor.is_none() {
            ctx.warn(ImportWarning::UnresolvedReference {
                kind: ReferenceKind::Bone,
                name: entry.name.clone(),
            });
        }

        let offset = conversion.matrix(&entry.offset);
        let bind_world = offset.try_inverse().unwrap_or_else(|| {
            log_warn!("bone '{}' has a singular offset matrix", entry.name);
            Matrix4::identity()
        });

        let parent = actor
            .and_then(|actor| scene.find_ancestor(actor, |candidate| actors.contains(&Some(candidate))))
            .and_then(|ancestor| actors.iter().position(|known| *known == Some(ancestor)));

        let local = match parent {
            Some(parent) => {
                let parent_inverse = bind_worlds[parent]
                    .try_inverse()
                    .unwrap_or_else(Matrix4::identity);
                parent_inverse * bind_world
            }
            None => bind_world,
        };

        bones.push(PoseBone {
            name: entry.name.clone(),
            node: actor.map(|actor| path_identity(&ctx.actor_path(scene, actor))),
            parent,
            local: to_trs(&decompose(&local)),
            offset: to_trs(&decompose(&offset)),
        });
        actors.push(actor);
        bind_worlds.push(bind_world);
    }

    Pose { bones }
}

/// Attach the armature to the root bone and bind every skinned renderer of
/// this import to it. Returns the pose identity.
pub(super) fn bind_armature(
    pose: &Pose,
    scene: &mut Scene,
    ctx: &ImportContext,
) -> Result<u32, ImportError> {
    let owner = ctx.root_bone.or(ctx.root_actor);
    let owner_path = owner
        .map(|owner| ctx.actor_path(scene, owner))
        .unwrap_or_default();
    let identity = asset_identity(&owner_path, "pose");

    let Some(root_bone) = ctx.root_bone else {
        log_debug!(
            "no root bone found; pose with {} bones left unbound",
            pose.len()
        );
        return Ok(identity);
    };

    scene.add_component(root_bone, Component::Armature(Armature { pose: identity }))?;

    for &actor in &ctx.skinned_renders {
        if let Some(Component::SkinnedMeshRender(render)) =
            scene.component_mut(actor, ComponentKind::SkinnedMeshRender)
        {
            render.armature = Some(root_bone);
        }
    }

    Ok(identity)
}
