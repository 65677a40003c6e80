use nalgebra::Matrix4;

use super::{BoneEntry, ImportContext, skin};
use crate::error::ImportError;
use crate::log_debug;
use crate::math::decompose;
use crate::scene::{ActorId, Component, MeshRender, Scene, SkinnedMeshRender, Transform};
use crate::source::{SourceMesh, SourceNode, SourceScene};

// ─── Bone collection ──────────────────────────────────────────────────────────

/// Distinct bones across all meshes in mesh order; the first occurrence of a
/// name wins and its position becomes the bone index.
pub fn collect_bones(meshes: &[SourceMesh]) -> Vec<BoneEntry> {
    let mut bones = Vec::<BoneEntry>::new();
    for bone in meshes.iter().flat_map(|mesh| mesh.bones.iter()) {
        if bones.iter().any(|known| known.name == bone.name) {
            continue;
        }
        bones.push(BoneEntry {
            name: bone.name.clone(),
            offset: bone.offset,
        });
    }
    bones
}

// ─── Hierarchy rewrite ────────────────────────────────────────────────────────

/// Materialize the source tree under `parent` and return the top-level actors.
/// A helper-named source root yields several of them.
pub(super) fn import_hierarchy(
    source: &SourceScene,
    scene: &mut Scene,
    parent: Option<ActorId>,
    ctx: &mut ImportContext,
) -> Result<Vec<ActorId>, ImportError> {
    ctx.import_parent = parent;
    let top_level = materialize(&source.root, Matrix4::identity(), parent, source, scene, ctx)?;
    if top_level.len() > 1 {
        log_debug!(
            "source root is a helper node; {} top-level actors materialized",
            top_level.len()
        );
    }
    Ok(top_level)
}

/// Rewrite one source node. Helper nodes fold their transform into their
/// children and contribute those children (materialized under the same
/// parent) instead of an actor of their own.
fn materialize(
    node: &SourceNode,
    accumulated: Matrix4<f32>,
    parent: Option<ActorId>,
    source: &SourceScene,
    scene: &mut Scene,
    ctx: &mut ImportContext,
) -> Result<Vec<ActorId>, ImportError> {
    let combined = accumulated * node.transform;

    if node.name.contains(ctx.settings.helper_marker.as_str()) {
        let mut lifted = Vec::new();
        for child in &node.children {
            lifted.extend(materialize(child, combined, parent, source, scene, ctx)?);
        }
        return Ok(lifted);
    }

    let actor = scene.create_actor(node.name.clone(), parent);
    let parts = ctx.conversion.decomposed(&decompose(&combined));
    scene.add_component(actor, Component::Transform(Transform::from_decomposed(&parts)))?;
    ctx.actors_by_name.entry(node.name.clone()).or_insert(actor);

    if parent == ctx.import_parent {
        ctx.roots.push(actor);
    }
    if ctx.root_actor.is_none() {
        ctx.root_actor = Some(actor);
    }

    if ctx.root_bone.is_none() && ctx.bone_index(&node.name).is_some() {
        // Skeletons are conventionally authored with one unweighted node above
        // the first bone; top-level actors have no parent inside this import.
        ctx.root_bone = if ctx.roots.contains(&actor) {
            Some(actor)
        } else {
            parent
        };
    }

    if !node.meshes.is_empty() {
        if let Some(handle) = skin::build(node, &node.meshes, actor, source, scene, ctx)? {
            let component = if handle.skinned {
                ctx.skinned_renders.push(actor);
                Component::SkinnedMeshRender(SkinnedMeshRender {
                    mesh: handle.identity,
                    armature: None,
                })
            } else {
                Component::MeshRender(MeshRender {
                    mesh: handle.identity,
                })
            };
            scene.add_component(actor, component)?;
            ctx.renderables.push(actor);
        }
    }

    for child in &node.children {
        materialize(child, Matrix4::identity(), Some(actor), source, scene, ctx)?;
    }

    Ok(vec![actor])
}
