use std::{path::Path, sync::Arc};

use nalgebra::{Matrix4, Translation3, Vector3};
use scene_import::assets::{AnimationClip, Mesh, Pose, TrackProperty};
use scene_import::import::{ImportWarning, ReferenceKind, asset_identity, path_identity};
use scene_import::scene::{ActorId, Component, ComponentKind, Scene};
use scene_import::source::{
    QuatKey, SourceAnimation, SourceBone, SourceChannel, SourceMesh, SourceNode, SourceScene,
    VectorKey, VertexWeight,
};
use scene_import::store::{Artifact, ArtifactKind, JsonDirStore, MemoryStore, ResourceStore};
use scene_import::{
    ImportError, ImportSettings, SkinState, SkinningEvaluator, StoreError, import_file,
    import_scene,
};

fn translation(x: f32, y: f32, z: f32) -> Matrix4<f32> {
    Translation3::new(x, y, z).to_homogeneous()
}

fn triangle(name: &str) -> SourceMesh {
    SourceMesh {
        name: name.to_string(),
        positions: vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        ],
        normals: Some(vec![Vector3::z(); 3]),
        tangents: Some(vec![[1.0, 0.0, 0.0, 1.0]; 3]),
        uvs: Some(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]),
        indices: vec![0, 1, 2],
        ..SourceMesh::default()
    }
}

fn influence(name: &str, bind_height: f32, weights: &[(u32, f32)]) -> SourceBone {
    SourceBone {
        name: name.to_string(),
        offset: translation(0.0, -bind_height, 0.0),
        weights: weights
            .iter()
            .map(|&(vertex, weight)| VertexWeight { vertex, weight })
            .collect(),
    }
}

fn vector_keys(values: &[[f32; 3]]) -> Vec<VectorKey> {
    values
        .iter()
        .enumerate()
        .map(|(index, value)| VectorKey {
            time: index as f64 * 10.0,
            value: Vector3::from(*value),
        })
        .collect()
}

/// Scene → Armature → Root → Spine → Head, plus a skinned Body mesh and a
/// "walk" clip animating Head (position) and Root (rotation).
fn character() -> SourceScene {
    let skeleton = SourceNode::new("Armature").with_child(
        SourceNode::new("Root")
            .with_transform(translation(0.0, 1.0, 0.0))
            .with_child(
                SourceNode::new("Spine")
                    .with_transform(translation(0.0, 0.5, 0.0))
                    .with_child(
                        SourceNode::new("Head").with_transform(translation(0.0, 0.5, 0.0)),
                    ),
            ),
    );
    let root = SourceNode::new("Scene")
        .with_child(skeleton)
        .with_child(SourceNode::new("Body").with_meshes(vec![0]));

    let mut body = triangle("Body");
    body.bones = vec![
        influence("Root", 1.0, &[(0, 1.0)]),
        influence("Spine", 1.5, &[(1, 0.5)]),
        influence("Head", 2.0, &[(1, 0.5), (2, 1.0)]),
    ];

    let mut source = SourceScene::new(root);
    source.meshes = vec![body];
    source.animations = vec![SourceAnimation {
        name: "walk".to_string(),
        ticks_per_second: 30.0,
        channels: vec![
            SourceChannel {
                node_name: "Head".to_string(),
                position_keys: vector_keys(&[
                    [0.0, 0.5, 0.0],
                    [0.1, 0.51, 0.0],
                    [0.2, 0.5, 0.0],
                    [0.3, 0.49, 0.0],
                    [0.4, 0.5, 0.0],
                ]),
                ..SourceChannel::default()
            },
            SourceChannel {
                node_name: "Root".to_string(),
                rotation_keys: vec![
                    QuatKey {
                        time: 0.0,
                        value: [0.0, 0.0, 0.0, 1.0],
                    },
                    QuatKey {
                        time: 40.0,
                        value: [0.0, 0.38268343, 0.0, 0.9238795],
                    },
                ],
                ..SourceChannel::default()
            },
            SourceChannel {
                node_name: "Ghost".to_string(),
                position_keys: vector_keys(&[[0.0; 3], [1.0; 3]]),
                ..SourceChannel::default()
            },
        ],
    }];
    source
}

fn character_settings() -> ImportSettings {
    let mut settings = ImportSettings::default();
    settings.animation_filter.position_threshold = 0.5;
    settings
}

fn find_actor(scene: &Scene, name: &str) -> ActorId {
    (0..scene.len())
        .map(ActorId)
        .find(|id| scene.actor(*id).is_some_and(|actor| actor.name == name))
        .unwrap_or_else(|| panic!("actor {name} should exist"))
}

/// Delegates to a [`MemoryStore`] but fails the persist call numbered `fail_on` (1-based).
struct FailingStore {
    inner: MemoryStore,
    fail_on: usize,
    persist_calls: usize,
}

impl FailingStore {
    fn new(inner: MemoryStore, fail_on: usize) -> Self {
        Self {
            inner,
            fail_on,
            persist_calls: 0,
        }
    }
}

impl ResourceStore for FailingStore {
    fn load_by_identity(&self, identity: u32) -> Result<Option<Artifact>, StoreError> {
        self.inner.load_by_identity(identity)
    }

    fn persist(&mut self, artifact: Artifact, identity: u32) -> Result<(), StoreError> {
        self.persist_calls += 1;
        if self.persist_calls == self.fail_on {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.inner.persist(artifact, identity)
    }

    fn remove(&mut self, identity: u32) -> Result<(), StoreError> {
        self.inner.remove(identity)
    }
}

fn stored_mesh(store: &MemoryStore, identity: u32) -> &Mesh {
    match store.get(identity) {
        Some(Artifact::Mesh(mesh)) => mesh,
        other => panic!("expected mesh artifact, got {other:?}"),
    }
}

fn stored_of_kind(store: &MemoryStore, kind: ArtifactKind) -> Vec<&Artifact> {
    store
        .identities()
        .into_iter()
        .filter_map(|identity| store.get(identity))
        .filter(|artifact| artifact.kind() == kind)
        .collect()
}

#[test]
fn given_single_unskinned_triangle_when_importing_then_one_actor_and_one_plain_mesh() {
    let mut source = SourceScene::new(SourceNode::new("Triangle").with_meshes(vec![0]));
    source.meshes = vec![triangle("Triangle")];
    let mut scene = Scene::new();
    let mut store = MemoryStore::new();

    let report = import_scene(&source, &mut scene, None, &ImportSettings::default(), &mut store)
        .expect("import should succeed");

    assert_eq!(report.actor_count, 1);
    assert_eq!(report.mesh_count, 1);
    assert_eq!(report.bone_count, 0);
    assert_eq!(store.len(), 1);
    assert!(stored_of_kind(&store, ArtifactKind::Pose).is_empty());
    assert!(stored_of_kind(&store, ArtifactKind::Clip).is_empty());

    let mesh = stored_mesh(&store, asset_identity("Triangle", "mesh"));
    assert!(!mesh.is_skinned());
    assert_eq!(mesh.triangle_count(), 1);
    assert!(mesh.vertices.iter().all(|v| v.influence_count() == 0));

    let actor = find_actor(&scene, "Triangle");
    assert!(matches!(
        scene.component(actor, ComponentKind::MeshRender),
        Some(Component::MeshRender(render)) if render.mesh == asset_identity("Triangle", "mesh")
    ));
}

#[test]
fn given_character_when_importing_then_bone_indices_are_valid_pose_indices() {
    let mut scene = Scene::new();
    let mut store = MemoryStore::new();

    let report = import_scene(&character(), &mut scene, None, &character_settings(), &mut store)
        .expect("import should succeed");

    let pose_identity = asset_identity("Scene/Armature", "pose");
    let Some(Artifact::Pose(pose)) = store.get(pose_identity) else {
        panic!("pose should be persisted");
    };
    assert_eq!(pose.len(), report.bone_count);
    let names: Vec<&str> = pose.bones.iter().map(|bone| bone.name.as_str()).collect();
    assert_eq!(names, vec!["Root", "Spine", "Head"]);
    assert_eq!(pose.bones[2].node, Some(path_identity("Scene/Armature/Root/Spine/Head")));

    let mesh = stored_mesh(&store, asset_identity("Scene/Body", "mesh"));
    assert!(mesh.is_skinned());
    for vertex in &mesh.vertices {
        assert!(vertex.influence_count() <= 4);
        for (index, weight) in vertex.bone_indices.iter().zip(vertex.bone_weights) {
            if weight != 0.0 {
                assert!((*index as usize) < pose.len());
            }
        }
    }
    assert_eq!(mesh.vertices[1].bone_indices[..2], [1, 2]);
    assert_eq!(mesh.vertices[1].bone_weights[..2], [0.5, 0.5]);

    let armature = find_actor(&scene, "Armature");
    let body = find_actor(&scene, "Body");
    assert!(matches!(
        scene.component(armature, ComponentKind::Armature),
        Some(Component::Armature(bound)) if bound.pose == pose_identity
    ));
    assert!(matches!(
        scene.component(body, ComponentKind::SkinnedMeshRender),
        Some(Component::SkinnedMeshRender(render)) if render.armature == Some(armature)
    ));
}

#[test]
fn given_nearly_collinear_head_keys_when_importing_then_track_keeps_endpoints_and_is_sorted() {
    let mut scene = Scene::new();
    let mut store = MemoryStore::new();

    let report = import_scene(&character(), &mut scene, None, &character_settings(), &mut store)
        .expect("import should succeed");

    let Some(Artifact::Clip(clip)) = store.get(asset_identity("Scene", "clip/walk")) else {
        panic!("clip should be persisted");
    };
    let clip: &AnimationClip = clip;
    let targets: Vec<&str> = clip.tracks.iter().map(|track| track.target.as_str()).collect();
    assert_eq!(targets, vec!["Armature/Root/Spine/Head", "Armature/Root"]);

    let head = &clip.tracks[0];
    assert_eq!(head.property, TrackProperty::Position);
    assert_eq!(head.keyframe_count(), 2);
    assert_eq!(head.curves.len(), 3);
    assert!((head.duration_ms - 40.0 / 30.0 * 1000.0).abs() < 1e-3);
    assert_eq!(head.curves[0].keyframes[0].time, 0.0);
    assert_eq!(head.curves[0].keyframes[1].time, 1.0);
    assert_eq!(head.sample_at(1), vec![0.4, 0.5, 0.0]);

    assert_eq!(clip.tracks[1].property, TrackProperty::Quaternion);
    assert_eq!(clip.tracks[1].curves.len(), 4);
    assert_eq!(report.removed_keyframes, 3);
    assert!(report.warnings.contains(&ImportWarning::UnresolvedReference {
        kind: ReferenceKind::Channel,
        name: "Ghost".to_string(),
    }));
}

#[test]
fn given_same_source_when_reimporting_then_identities_are_reused() {
    let mut store = MemoryStore::new();
    let settings = character_settings();

    let mut first_scene = Scene::new();
    let first = import_scene(&character(), &mut first_scene, None, &settings, &mut store)
        .expect("first import");
    let records = store.len();

    let mut second_scene = Scene::new();
    let second = import_scene(&character(), &mut second_scene, None, &settings, &mut store)
        .expect("second import");

    assert_eq!(store.len(), records);
    assert!(first.persisted.iter().all(|artifact| !artifact.reused));
    assert!(second.persisted.iter().all(|artifact| artifact.reused));
    let identities = |scene: &Scene| -> Vec<u32> {
        (0..scene.len())
            .filter_map(|index| scene.actor(ActorId(index)).map(|actor| actor.identity))
            .collect()
    };
    assert_eq!(identities(&first_scene), identities(&second_scene));
}

#[test]
fn given_five_influences_on_one_vertex_when_importing_then_first_four_are_kept() {
    let names = ["B0", "B1", "B2", "B3", "B4"];
    let mut root = SourceNode::new("Scene").with_child(SourceNode::new("Skin").with_meshes(vec![0]));
    for name in names {
        root = root.with_child(SourceNode::new(name));
    }
    let mut mesh = triangle("Skin");
    mesh.bones = names
        .iter()
        .map(|name| influence(name, 0.0, &[(0, 0.2)]))
        .collect();
    let mut source = SourceScene::new(root);
    source.meshes = vec![mesh];
    let mut scene = Scene::new();
    let mut store = MemoryStore::new();

    import_scene(&source, &mut scene, None, &ImportSettings::default(), &mut store)
        .expect("import should succeed");

    let mesh = stored_mesh(&store, asset_identity("Scene/Skin", "mesh"));
    assert_eq!(mesh.vertices[0].bone_indices, [0, 1, 2, 3]);
    assert_eq!(mesh.vertices[0].bone_weights, [0.2; 4]);
    assert_eq!(mesh.vertices[1].influence_count(), 0);
}

#[test]
fn given_imported_character_when_evaluating_skin_then_rest_pose_is_identity() {
    let mut scene = Scene::new();
    let mut store = MemoryStore::new();
    import_scene(&character(), &mut scene, None, &character_settings(), &mut store)
        .expect("import should succeed");
    let Some(Artifact::Pose(pose)) = store.get(asset_identity("Scene/Armature", "pose")) else {
        panic!("pose should be persisted");
    };
    let pose: Arc<Pose> = Arc::new(pose.clone());
    let armature = find_actor(&scene, "Armature");

    let mut evaluator = SkinningEvaluator::new();
    evaluator.set_bind_pose(armature, pose);
    assert_eq!(evaluator.state(), SkinState::Dirty);
    assert!(evaluator.evaluate(&scene, &stored_mesh(&store, asset_identity("Scene/Body", "mesh")).bounds));
    assert_eq!(evaluator.state(), SkinState::Clean);

    assert_eq!(evaluator.bone_count(), 3);
    assert!(evaluator.bones().iter().all(Option::is_some));
    for matrix in evaluator.bone_matrices() {
        let identity = [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        for (value, expected) in matrix.iter().zip(identity) {
            assert!((value - expected).abs() < 1e-4, "{matrix:?}");
        }
    }
}

#[test]
fn given_missing_file_when_importing_then_open_error_and_nothing_persisted() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut store = JsonDirStore::open(dir.path()).expect("open store");
    let mut scene = Scene::new();

    let result = import_file(
        Path::new("does/not/exist.glb"),
        &mut scene,
        None,
        &ImportSettings::default(),
        &mut store,
    );

    assert!(matches!(result, Err(ImportError::Open { .. })));
    assert!(scene.is_empty());
    let written = std::fs::read_dir(dir.path()).expect("read dir").count();
    assert_eq!(written, 0);
}

#[test]
fn given_directory_store_when_importing_then_records_round_trip_from_disk() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut store = JsonDirStore::open(dir.path()).expect("open store");
    let mut scene = Scene::new();

    let report = import_scene(&character(), &mut scene, None, &character_settings(), &mut store)
        .expect("import should succeed");

    for artifact in &report.persisted {
        assert!(store.record_path(artifact.identity).exists());
        let loaded = store
            .load_by_identity(artifact.identity)
            .expect("load")
            .expect("record exists");
        assert_eq!(loaded.kind(), artifact.kind);
    }
}

#[test]
fn given_helper_named_root_when_importing_then_every_top_level_subtree_gets_identities() {
    let settings = ImportSettings::default();
    let root = SourceNode::new(format!("Root{}Pivot", settings.helper_marker))
        .with_child(SourceNode::new("A").with_meshes(vec![0]))
        .with_child(SourceNode::new("B").with_child(SourceNode::new("C")));
    let mut source = SourceScene::new(root);
    source.meshes = vec![triangle("A")];
    let mut scene = Scene::new();
    let mut store = MemoryStore::new();

    let report = import_scene(&source, &mut scene, None, &settings, &mut store)
        .expect("import should succeed");

    let (a, b, c) = (
        find_actor(&scene, "A"),
        find_actor(&scene, "B"),
        find_actor(&scene, "C"),
    );
    assert_eq!(report.roots, vec![a, b]);
    assert_eq!(report.root, Some(a));
    for (actor, path) in [(a, "A"), (b, "B"), (c, "B/C")] {
        let identity = scene.actor(actor).map(|actor| actor.identity);
        assert_eq!(identity, Some(path_identity(path)), "identity of {path}");
    }
    assert!(store.get(asset_identity("A", "mesh")).is_some());
}

#[test]
fn given_store_failing_second_write_when_importing_then_earlier_writes_are_rolled_back() {
    let pose_identity = asset_identity("Scene/Armature", "pose");
    let mut seeded = MemoryStore::new();
    seeded
        .persist(Artifact::Pose(Pose::default()), pose_identity)
        .expect("seed pose");
    let mut store = FailingStore::new(seeded, 2);
    let mut scene = Scene::new();

    let result = import_scene(&character(), &mut scene, None, &character_settings(), &mut store);

    assert!(matches!(result, Err(ImportError::Store(StoreError::Io(_)))));
    assert_eq!(store.inner.identities(), vec![pose_identity]);
    assert_eq!(store.inner.get(pose_identity), Some(&Artifact::Pose(Pose::default())));
}

#[test]
fn given_store_failing_after_new_records_when_importing_then_they_are_removed() {
    let mut store = FailingStore::new(MemoryStore::new(), 3);
    let mut scene = Scene::new();

    let result = import_scene(&character(), &mut scene, None, &character_settings(), &mut store);

    assert!(result.is_err());
    assert!(store.inner.is_empty());
}

#[test]
fn given_sibling_nodes_sharing_a_name_when_importing_then_duplicate_identity_is_reported() {
    let root = SourceNode::new("Scene")
        .with_child(SourceNode::new("Part").with_meshes(vec![0]))
        .with_child(SourceNode::new("Part").with_meshes(vec![1]));
    let mut source = SourceScene::new(root);
    let mut wide = triangle("Wide");
    wide.positions[1] = Vector3::new(4.0, 0.0, 0.0);
    source.meshes = vec![triangle("Narrow"), wide];
    let mut scene = Scene::new();
    let mut store = MemoryStore::new();

    let report = import_scene(&source, &mut scene, None, &ImportSettings::default(), &mut store)
        .expect("import should succeed");

    let identity = asset_identity("Scene/Part", "mesh");
    assert_eq!(report.mesh_count, 2);
    assert!(report.warnings.contains(&ImportWarning::DuplicateIdentity {
        kind: ArtifactKind::Mesh,
        name: stored_mesh(&store, identity).name.clone(),
        identity,
    }));
    assert_eq!(store.len(), 1);
}
