use nalgebra::{Matrix4, Vector3};
use xxhash_rust::xxh3::Xxh3;

use super::{ImportContext, ImportWarning, ImportedMesh, VertexChannel, asset_identity};
use crate::assets::{Aabb, Mesh, SkinnedVertex};
use crate::error::ImportError;
use crate::math::{transform_direction, transform_point};
use crate::scene::{ActorId, Scene};
use crate::source::{PrimitiveKind, SourceMesh, SourceNode, SourceScene};

/// Reference to a mesh produced (or reused) for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct MeshHandle {
    pub identity: u32,
    pub skinned: bool,
}

/// Cache key combining every mesh index a node references.
fn mesh_set_key(mesh_indices: &[usize]) -> u64 {
    let mut hasher = Xxh3::new();
    for index in mesh_indices {
        hasher.update(&(*index as u64).to_le_bytes());
    }
    hasher.digest()
}

/// Consolidate the node's triangle sub-meshes into one engine mesh.
///
/// Returns the cached handle when the same mesh set was already built during
/// this import, and `None` when no triangle sub-mesh contributed vertices.
pub(super) fn build(
    node: &SourceNode,
    mesh_indices: &[usize],
    owner: ActorId,
    source: &SourceScene,
    scene: &Scene,
    ctx: &mut ImportContext,
) -> Result<Option<MeshHandle>, ImportError> {
    let key = mesh_set_key(mesh_indices);
    if let Some(cached) = ctx.mesh_cache.get(&key).and_then(|slot| ctx.meshes.get(*slot)) {
        return Ok(Some(MeshHandle {
            identity: cached.identity,
            skinned: cached.mesh.skinned,
        }));
    }

    let owner_world = scene.world_matrix(owner);
    let mut mesh = Mesh {
        name: node.name.clone(),
        vertices: Vec::new(),
        indices: Vec::new(),
        skinned: false,
        bounds: Aabb::empty(),
    };

    for &index in mesh_indices {
        let sub_mesh = source.meshes.get(index).ok_or_else(|| {
            ImportError::Malformed(format!(
                "node '{}' references missing mesh {}",
                node.name, index
            ))
        })?;
        if sub_mesh.primitive != PrimitiveKind::Triangles {
            continue;
        }
        append_sub_mesh(&mut mesh, sub_mesh, &owner_world, ctx)?;
    }

    if mesh.vertices.is_empty() {
        return Ok(None);
    }

    let identity = asset_identity(&ctx.actor_path(scene, owner), "mesh");
    let handle = MeshHandle {
        identity,
        skinned: mesh.skinned,
    };
    ctx.mesh_cache.insert(key, ctx.meshes.len());
    ctx.meshes.push(ImportedMesh { identity, mesh });
    Ok(Some(handle))
}

fn append_sub_mesh(
    mesh: &mut Mesh,
    sub_mesh: &SourceMesh,
    owner_world: &Matrix4<f32>,
    ctx: &mut ImportContext,
) -> Result<(), ImportError> {
    let base = mesh.vertices.len();
    let vertex_count = sub_mesh.positions.len();
    let skinned = sub_mesh.has_bones();

    for (channel, present) in [
        (VertexChannel::Normal, sub_mesh.normals.is_some()),
        (VertexChannel::Tangent, sub_mesh.tangents.is_some()),
        (VertexChannel::Uv, sub_mesh.uvs.is_some()),
    ] {
        if !present {
            ctx.warn(ImportWarning::MissingChannel {
                mesh: sub_mesh.name.clone(),
                channel,
            });
        }
    }

    let conversion = ctx.conversion;
    for vertex in 0..vertex_count {
        let mut position = conversion.point(&sub_mesh.positions[vertex]);
        let mut normal = sub_mesh
            .normals
            .as_ref()
            .and_then(|normals| normals.get(vertex))
            .map(|n| conversion.direction(n))
            .unwrap_or_else(Vector3::zeros);
        let tangent = sub_mesh
            .tangents
            .as_ref()
            .and_then(|tangents| tangents.get(vertex))
            .copied()
            .unwrap_or([0.0; 4]);
        let mut tangent_xyz = conversion.direction(&Vector3::new(tangent[0], tangent[1], tangent[2]));

        if skinned {
            position = transform_point(owner_world, &position);
            if normal != Vector3::zeros() {
                normal = transform_direction(owner_world, &normal);
            }
            if tangent_xyz != Vector3::zeros() {
                tangent_xyz = transform_direction(owner_world, &tangent_xyz);
            }
        }

        let uv = sub_mesh
            .uvs
            .as_ref()
            .and_then(|uvs| uvs.get(vertex))
            .copied()
            .unwrap_or([0.0; 2]);
        let color = sub_mesh
            .colors
            .as_ref()
            .and_then(|colors| colors.get(vertex))
            .copied()
            .unwrap_or([1.0; 4]);

        mesh.bounds.include(position.into());
        mesh.vertices.push(SkinnedVertex {
            position: position.into(),
            normal: normal.into(),
            tangent: [tangent_xyz.x, tangent_xyz.y, tangent_xyz.z, tangent[3]],
            uv,
            color,
            ..SkinnedVertex::default()
        });
    }

    for &index in &sub_mesh.indices {
        if index as usize >= vertex_count {
            return Err(ImportError::Malformed(format!(
                "mesh '{}' index {} out of range ({} vertices)",
                sub_mesh.name, index, vertex_count
            )));
        }
        let offset = u32::try_from(base + index as usize).map_err(|_| {
            ImportError::Malformed(format!("mesh '{}' exceeds u32 vertex range", mesh.name))
        })?;
        mesh.indices.push(offset);
    }

    for bone in &sub_mesh.bones {
        let Some(bone_index) = ctx.bone_index(&bone.name) else {
            continue;
        };
        let bone_index = u16::try_from(bone_index).map_err(|_| {
            ImportError::Malformed(format!("bone index {} exceeds u16 range", bone_index))
        })?;
        for weight in &bone.weights {
            let Some(vertex) = mesh.vertices.get_mut(base + weight.vertex as usize) else {
                return Err(ImportError::Malformed(format!(
                    "bone '{}' weights vertex {} of {}",
                    bone.name, weight.vertex, vertex_count
                )));
            };
            // A fifth influence is dropped without notice.
            vertex.add_influence(bone_index, weight.weight);
        }
    }

    mesh.skinned |= skinned;
    Ok(())
}
