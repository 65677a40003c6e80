use std::{collections::HashMap, path::Path};

use gltf::{Document, animation::util::ReadOutputs, mesh::Mode};
use nalgebra::{Matrix4, Vector3};

use super::{
    PrimitiveKind, QuatKey, SceneMetadata, SourceAnimation, SourceBone, SourceChannel,
    SourceMesh, SourceNode, SourceScene, UpAxis, VectorKey, VertexWeight,
};
use crate::error::ImportError;

/// Open a glTF/GLB file and convert it into a [`SourceScene`].
pub fn load_gltf_scene(path: &Path) -> Result<SourceScene, ImportError> {
    let (document, buffers, _images) = gltf::import(path).map_err(|err| ImportError::Open {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;

    scene_from_document(&document, &buffers)
}

/// Convert glTF bytes (GLB or self-contained JSON) into a [`SourceScene`].
pub fn load_gltf_slice(bytes: &[u8]) -> Result<SourceScene, ImportError> {
    let (document, buffers, _images) =
        gltf::import_slice(bytes).map_err(|err| ImportError::Open {
            path: "<memory>".to_string(),
            message: err.to_string(),
        })?;

    scene_from_document(&document, &buffers)
}

fn scene_from_document(
    document: &Document,
    buffers: &[gltf::buffer::Data],
) -> Result<SourceScene, ImportError> {
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| ImportError::Malformed("document contains no scene".to_string()))?;

    // A mesh referenced by a skinned node takes that node's skin.
    let mut skin_of_mesh = HashMap::<usize, gltf::Skin>::new();
    for node in document.nodes() {
        if let (Some(mesh), Some(skin)) = (node.mesh(), node.skin()) {
            skin_of_mesh.entry(mesh.index()).or_insert(skin);
        }
    }

    let mut meshes = Vec::<SourceMesh>::new();
    let mut mesh_ranges = HashMap::<usize, Vec<usize>>::new();
    for mesh in document.meshes() {
        let skin = skin_of_mesh.get(&mesh.index());
        let mut range = Vec::new();
        for (primitive_index, primitive) in mesh.primitives().enumerate() {
            let name = format!(
                "{}_{}",
                mesh.name().unwrap_or("mesh"),
                primitive_index
            );
            range.push(meshes.len());
            meshes.push(read_primitive(name, &primitive, skin, buffers));
        }
        mesh_ranges.insert(mesh.index(), range);
    }

    let mut root = SourceNode::new(scene.name().unwrap_or("Scene"));
    for node in scene.nodes() {
        root.children.push(convert_node(&node, &mesh_ranges));
    }

    let animations = document
        .animations()
        .map(|animation| read_animation(&animation, buffers))
        .collect();

    Ok(SourceScene {
        root,
        meshes,
        animations,
        // glTF is always metres, Y-up.
        metadata: SceneMetadata {
            unit_scale: 1.0,
            up_axis: UpAxis::Y,
        },
    })
}

fn node_name(node: &gltf::Node) -> String {
    node.name()
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| format!("node_{}", node.index()))
}

fn to_matrix(columns: [[f32; 4]; 4]) -> Matrix4<f32> {
    let flat: Vec<f32> = columns.iter().flatten().copied().collect();
    Matrix4::from_column_slice(&flat)
}

fn convert_node(node: &gltf::Node, mesh_ranges: &HashMap<usize, Vec<usize>>) -> SourceNode {
    let meshes = node
        .mesh()
        .and_then(|mesh| mesh_ranges.get(&mesh.index()).cloned())
        .unwrap_or_default();

    SourceNode {
        name: node_name(node),
        transform: to_matrix(node.transform().matrix()),
        children: node
            .children()
            .map(|child| convert_node(&child, mesh_ranges))
            .collect(),
        meshes,
    }
}

fn read_primitive(
    name: String,
    primitive: &gltf::Primitive,
    skin: Option<&gltf::Skin>,
    buffers: &[gltf::buffer::Data],
) -> SourceMesh {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|b| &b.0[..]));

    let primitive_kind = match primitive.mode() {
        Mode::Triangles | Mode::TriangleStrip | Mode::TriangleFan => PrimitiveKind::Triangles,
        Mode::Lines | Mode::LineLoop | Mode::LineStrip => PrimitiveKind::Lines,
        Mode::Points => PrimitiveKind::Points,
    };

    let positions: Vec<Vector3<f32>> = reader
        .read_positions()
        .map(|iter| iter.map(Vector3::from).collect())
        .unwrap_or_default();

    let indices: Vec<u32> = match primitive.mode() {
        Mode::Triangles => reader
            .read_indices()
            .map(|indices| indices.into_u32().collect())
            .unwrap_or_else(|| (0..positions.len() as u32).collect()),
        Mode::TriangleStrip | Mode::TriangleFan => {
            let raw: Vec<u32> = reader
                .read_indices()
                .map(|indices| indices.into_u32().collect())
                .unwrap_or_else(|| (0..positions.len() as u32).collect());
            triangulate(&raw, primitive.mode())
        }
        _ => Vec::new(),
    };

    let bones = skin
        .map(|skin| read_skin_bones(&reader, skin, buffers))
        .unwrap_or_default();

    SourceMesh {
        name,
        primitive: primitive_kind,
        normals: reader
            .read_normals()
            .map(|iter| iter.map(Vector3::from).collect()),
        tangents: reader.read_tangents().map(|iter| iter.collect()),
        uvs: reader
            .read_tex_coords(0)
            .map(|coords| coords.into_f32().collect()),
        colors: reader
            .read_colors(0)
            .map(|colors| colors.into_rgba_f32().collect()),
        positions,
        indices,
        bones,
    }
}

fn triangulate(raw: &[u32], mode: Mode) -> Vec<u32> {
    let mut out = Vec::new();
    if raw.len() < 3 {
        return out;
    }
    for i in 2..raw.len() {
        match mode {
            Mode::TriangleStrip if i % 2 == 1 => out.extend([raw[i - 1], raw[i - 2], raw[i]]),
            Mode::TriangleStrip => out.extend([raw[i - 2], raw[i - 1], raw[i]]),
            _ => out.extend([raw[0], raw[i - 1], raw[i]]),
        }
    }
    out
}

fn read_skin_bones<'a, 's, F>(
    reader: &gltf::mesh::Reader<'a, 's, F>,
    skin: &gltf::Skin,
    buffers: &[gltf::buffer::Data],
) -> Vec<SourceBone>
where
    F: Clone + Fn(gltf::Buffer<'a>) -> Option<&'s [u8]>,
{
    let skin_reader = skin.reader(|buffer| buffers.get(buffer.index()).map(|b| &b.0[..]));
    let offsets: Vec<Matrix4<f32>> = skin_reader
        .read_inverse_bind_matrices()
        .map(|iter| iter.map(to_matrix).collect())
        .unwrap_or_default();

    let mut bones: Vec<SourceBone> = skin
        .joints()
        .enumerate()
        .map(|(slot, joint)| SourceBone {
            name: node_name(&joint),
            offset: offsets.get(slot).copied().unwrap_or_else(Matrix4::identity),
            weights: Vec::new(),
        })
        .collect();

    let (Some(joints), Some(weights)) = (reader.read_joints(0), reader.read_weights(0)) else {
        return bones;
    };

    for (vertex, (joint_slots, lane_weights)) in
        joints.into_u16().zip(weights.into_f32()).enumerate()
    {
        for lane in 0..4 {
            let weight = lane_weights[lane];
            if weight <= 0.0 {
                continue;
            }
            if let Some(bone) = bones.get_mut(joint_slots[lane] as usize) {
                bone.weights.push(VertexWeight {
                    vertex: vertex as u32,
                    weight,
                });
            }
        }
    }

    bones
}

fn read_animation(
    animation: &gltf::Animation,
    buffers: &[gltf::buffer::Data],
) -> SourceAnimation {
    let mut channels = Vec::<SourceChannel>::new();

    for channel in animation.channels() {
        let target_name = node_name(&channel.target().node());
        let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(|b| &b.0[..]));
        let Some(inputs) = reader.read_inputs() else {
            continue;
        };
        let times: Vec<f64> = inputs.map(f64::from).collect();
        let Some(outputs) = reader.read_outputs() else {
            continue;
        };

        let index = match channels.iter().position(|c| c.node_name == target_name) {
            Some(index) => index,
            None => {
                channels.push(SourceChannel {
                    node_name: target_name,
                    ..SourceChannel::default()
                });
                channels.len() - 1
            }
        };
        let target = &mut channels[index];

        match outputs {
            ReadOutputs::Translations(values) => {
                target.position_keys = times
                    .iter()
                    .zip(values)
                    .map(|(&time, value)| VectorKey {
                        time,
                        value: Vector3::from(value),
                    })
                    .collect();
            }
            ReadOutputs::Rotations(values) => {
                target.rotation_keys = times
                    .iter()
                    .zip(values.into_f32())
                    .map(|(&time, value)| QuatKey { time, value })
                    .collect();
            }
            ReadOutputs::Scales(values) => {
                target.scale_keys = times
                    .iter()
                    .zip(values)
                    .map(|(&time, value)| VectorKey {
                        time,
                        value: Vector3::from(value),
                    })
                    .collect();
            }
            ReadOutputs::MorphTargetWeights(_) => {}
        }
    }

    SourceAnimation {
        name: animation
            .name()
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| format!("animation_{}", animation.index())),
        // glTF keyframe times are seconds.
        ticks_per_second: 1.0,
        channels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One triangle (positions only, u16 indices) embedded as a base64 data URI.
    const TRIANGLE_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [ { "name": "Root", "nodes": [0] } ],
        "nodes": [ { "name": "Triangle", "mesh": 0 } ],
        "meshes": [ { "name": "tri", "primitives": [ { "attributes": { "POSITION": 0 }, "indices": 1 } ] } ],
        "buffers": [ {
            "byteLength": 44,
            "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAABAAIAAAA="
        } ],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
              "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
        ]
    }"#;

    #[test]
    fn given_missing_file_when_loading_then_open_error_is_returned() {
        let result = load_gltf_scene(Path::new("/nonexistent/scene.glb"));
        assert!(matches!(result, Err(ImportError::Open { .. })));
    }

    #[test]
    fn given_embedded_triangle_when_loading_then_single_triangle_mesh_is_read() {
        let scene = load_gltf_slice(TRIANGLE_GLTF.as_bytes()).expect("load triangle");

        assert_eq!(scene.root.name, "Root");
        assert_eq!(scene.root.children.len(), 1);
        assert_eq!(scene.root.children[0].name, "Triangle");
        assert_eq!(scene.root.children[0].meshes, vec![0]);
        assert_eq!(scene.meshes.len(), 1);
        assert_eq!(scene.meshes[0].positions.len(), 3);
        assert_eq!(scene.meshes[0].indices, vec![0, 1, 2]);
        assert!(scene.meshes[0].normals.is_none());
        assert!(!scene.meshes[0].has_bones());
        assert!(scene.animations.is_empty());
    }

    #[test]
    fn given_strip_indices_when_triangulating_then_winding_alternates() {
        let triangles = triangulate(&[0, 1, 2, 3], Mode::TriangleStrip);
        assert_eq!(triangles, vec![0, 1, 2, 2, 1, 3]);
    }
}
