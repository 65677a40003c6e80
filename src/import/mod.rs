//! Scene import pipeline: hierarchy → skin binding → pose → animation →
//! identity → persistence.

mod animation;
mod hierarchy;
mod identity;
mod pose;
mod skin;

use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use nalgebra::Matrix4;
use thiserror::Error;

use crate::assets::Mesh;
use crate::error::ImportError;
use crate::logging::ResultExt;
use crate::math::AxisConversion;
use crate::scene::{ActorId, Scene, Transform};
use crate::settings::ImportSettings;
use crate::source::{SourceScene, UpAxis, gltf_scene::load_gltf_scene};
use crate::store::{Artifact, ArtifactKind, ResourceStore};
use crate::{log_error, log_info, log_warn};

pub use animation::{CompressedClip, compress_animation, simplify_quaternion_track, simplify_vector_track};
pub use hierarchy::collect_bones;
pub use identity::{asset_identity, path_identity, stabilize};
pub use pose::extract_pose;

// ─── Warnings ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Bone,
    Channel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexChannel {
    Normal,
    Tangent,
    Uv,
}

/// Non-fatal conditions; each is logged once and the import continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportWarning {
    #[error("{kind:?} '{name}' has no matching hierarchy node")]
    UnresolvedReference { kind: ReferenceKind, name: String },

    #[error("mesh '{mesh}' has no {channel:?} data; channel is zero-filled")]
    MissingChannel { mesh: String, channel: VertexChannel },

    #[error("{kind:?} '{name}' shares identity {identity:08x} with an earlier artifact and replaces it")]
    DuplicateIdentity {
        kind: ArtifactKind,
        name: String,
        identity: u32,
    },
}

// ─── Import context ───────────────────────────────────────────────────────────

/// A distinct bone referenced by any mesh; its position in
/// [`ImportContext::bones`] is the bone index skin weights refer to.
#[derive(Debug, Clone)]
pub struct BoneEntry {
    pub name: String,
    pub offset: Matrix4<f32>,
}

/// A mesh produced during this import, keyed by its persisted identity.
#[derive(Debug, Clone)]
pub struct ImportedMesh {
    pub identity: u32,
    pub mesh: Mesh,
}

/// State shared by every stage of one import call. Never outlives the call.
pub struct ImportContext<'a> {
    pub settings: &'a ImportSettings,
    pub conversion: AxisConversion,
    pub bones: Vec<BoneEntry>,
    pub actors_by_name: HashMap<String, ActorId>,
    pub mesh_cache: HashMap<u64, usize>,
    pub meshes: Vec<ImportedMesh>,
    /// Parent the import was placed under; actors created directly below it are roots.
    pub import_parent: Option<ActorId>,
    /// Top-level actors in creation order. More than one when the source root is a helper.
    pub roots: Vec<ActorId>,
    pub root_actor: Option<ActorId>,
    pub root_bone: Option<ActorId>,
    pub renderables: Vec<ActorId>,
    pub skinned_renders: Vec<ActorId>,
    pub warnings: Vec<ImportWarning>,
}

impl<'a> ImportContext<'a> {
    pub fn new(settings: &'a ImportSettings, conversion: AxisConversion) -> Self {
        Self {
            settings,
            conversion,
            bones: Vec::new(),
            actors_by_name: HashMap::new(),
            mesh_cache: HashMap::new(),
            meshes: Vec::new(),
            import_parent: None,
            roots: Vec::new(),
            root_actor: None,
            root_bone: None,
            renderables: Vec::new(),
            skinned_renders: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Linear first-match lookup of a bone index by name.
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|bone| bone.name == name)
    }

    /// Path of `actor` from the top-level actor it descends from, falling back
    /// to the bare name.
    pub fn actor_path(&self, scene: &Scene, actor: ActorId) -> String {
        self.roots
            .iter()
            .find_map(|root| scene.path_from(*root, actor))
            .or_else(|| scene.actor(actor).map(|a| a.name.clone()))
            .unwrap_or_default()
    }

    /// Path of `actor` below the import root. Actors in other top-level
    /// subtrees keep their top-level name as the first segment.
    pub fn target_path(&self, scene: &Scene, actor: ActorId) -> Option<String> {
        let root = self.root_actor?;
        scene
            .relative_path(root, actor)
            .or_else(|| self.roots.iter().find_map(|other| scene.path_from(*other, actor)))
    }

    pub fn warn(&mut self, warning: ImportWarning) {
        log_warn!("{}", warning);
        self.warnings.push(warning);
    }
}

// ─── Report ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedArtifact {
    pub kind: ArtifactKind,
    pub identity: u32,
    pub name: String,
    /// True when the store already held a record for this identity.
    pub reused: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub root: Option<ActorId>,
    pub roots: Vec<ActorId>,
    pub actor_count: usize,
    pub mesh_count: usize,
    pub bone_count: usize,
    pub clip_count: usize,
    pub track_count: usize,
    pub removed_keyframes: usize,
    pub warnings: Vec<ImportWarning>,
    pub persisted: Vec<PersistedArtifact>,
}

// ─── Public API ───────────────────────────────────────────────────────────────

/// Open `path` through the glTF adapter and import it under `parent`.
pub fn import_file(
    path: &Path,
    scene: &mut Scene,
    parent: Option<ActorId>,
    settings: &ImportSettings,
    store: &mut dyn ResourceStore,
) -> Result<ImportReport, ImportError> {
    let source = load_gltf_scene(path).log_error(Some("scene import"))?;
    import_scene(&source, scene, parent, settings, store)
}

/// Import an already-parsed source scene under `parent` and persist every
/// produced mesh, pose and clip. Nothing is persisted unless all stages succeed.
pub fn import_scene(
    source: &SourceScene,
    scene: &mut Scene,
    parent: Option<ActorId>,
    settings: &ImportSettings,
    store: &mut dyn ResourceStore,
) -> Result<ImportReport, ImportError> {
    let up_axis = settings.up_axis.unwrap_or(source.metadata.up_axis);
    let conversion = AxisConversion::new(
        source.metadata.unit_scale * settings.scale_factor,
        up_axis == UpAxis::Z,
    );
    let mut ctx = ImportContext::new(settings, conversion);
    ctx.bones = collect_bones(&source.meshes);

    let actors_before = scene.len();
    let roots = hierarchy::import_hierarchy(source, scene, parent, &mut ctx)?;
    let root = roots.first().copied();

    if let [single] = ctx.renderables.as_slice() {
        if let Some(transform) = scene.transform_mut(*single) {
            *transform = Transform::identity();
        }
    }

    let mut artifacts = Vec::<(u32, String, Artifact)>::new();

    if !ctx.bones.is_empty() {
        let pose = extract_pose(scene, &mut ctx);
        let identity = pose::bind_armature(&pose, scene, &ctx)?;
        artifacts.push((identity, "pose".to_string(), Artifact::Pose(pose)));
    }

    let mut report = ImportReport {
        root,
        roots: roots.clone(),
        bone_count: ctx.bones.len(),
        ..ImportReport::default()
    };

    if let (true, Some(root)) = (settings.import_animations, root) {
        let root_path = ctx.actor_path(scene, root);
        for animation in &source.animations {
            let compressed = compress_animation(animation, scene, &mut ctx);
            report.removed_keyframes += compressed.removed_keyframes;
            report.track_count += compressed.clip.tracks.len();
            report.clip_count += 1;
            let identity = asset_identity(&root_path, &format!("clip/{}", compressed.clip.name));
            artifacts.push((
                identity,
                compressed.clip.name.clone(),
                Artifact::Clip(compressed.clip),
            ));
        }
    }

    for &top_level in &roots {
        stabilize(scene, top_level);
    }

    report.mesh_count = ctx.meshes.len();
    for imported in ctx.meshes.drain(..) {
        artifacts.push((
            imported.identity,
            imported.mesh.name.clone(),
            Artifact::Mesh(imported.mesh),
        ));
    }

    let mut seen = HashSet::new();
    for (identity, name, artifact) in &artifacts {
        if !seen.insert(*identity) {
            ctx.warn(ImportWarning::DuplicateIdentity {
                kind: artifact.kind(),
                name: name.clone(),
                identity: *identity,
            });
        }
    }

    report.persisted = persist_all(store, artifacts)?;

    report.actor_count = scene.len() - actors_before;
    report.warnings = std::mem::take(&mut ctx.warnings);

    log_info!(
        "Imported scene: {} actors, {} meshes, {} bones, {} clips ({} keyframes removed)",
        report.actor_count,
        report.mesh_count,
        report.bone_count,
        report.clip_count,
        report.removed_keyframes
    );

    Ok(report)
}

/// Persist every artifact or none: when a write fails, records already written
/// by this call are restored to their previous state (or removed) in reverse order.
fn persist_all(
    store: &mut dyn ResourceStore,
    artifacts: Vec<(u32, String, Artifact)>,
) -> Result<Vec<PersistedArtifact>, ImportError> {
    let mut persisted = Vec::with_capacity(artifacts.len());
    let mut previous_records = Vec::<(u32, Option<Artifact>)>::with_capacity(artifacts.len());

    for (identity, name, artifact) in artifacts {
        let previous = match store.load_by_identity(identity) {
            Ok(previous) => previous,
            Err(error) => {
                roll_back(store, previous_records);
                return Err(error.into());
            }
        };
        match persist_artifact(store, identity, name, artifact, previous.clone()) {
            Ok(record) => {
                previous_records.push((identity, previous));
                persisted.push(record);
            }
            Err(error) => {
                roll_back(store, previous_records);
                return Err(error);
            }
        }
    }

    Ok(persisted)
}

fn roll_back(store: &mut dyn ResourceStore, previous_records: Vec<(u32, Option<Artifact>)>) {
    log_warn!(
        "persistence failed; rolling back {} written artifacts",
        previous_records.len()
    );
    for (identity, previous) in previous_records.into_iter().rev() {
        let restored = match previous {
            Some(record) => store.persist(record, identity),
            None => store.remove(identity),
        };
        if let Err(error) = restored {
            log_error!("failed to roll back artifact {:08x}: {}", identity, error);
        }
    }
}

fn persist_artifact(
    store: &mut dyn ResourceStore,
    identity: u32,
    name: String,
    artifact: Artifact,
    previous: Option<Artifact>,
) -> Result<PersistedArtifact, ImportError> {
    let kind = artifact.kind();
    let existing = previous.filter(|record| record.kind() == kind);
    let reused = existing.is_some();
    let mut record = match existing {
        Some(record) => record,
        None => store.create_artifact(kind),
    };

    match (&mut record, artifact) {
        (Artifact::Mesh(slot), Artifact::Mesh(mesh)) => *slot = mesh,
        (Artifact::Pose(slot), Artifact::Pose(pose)) => *slot = pose,
        (Artifact::Clip(slot), Artifact::Clip(clip)) => *slot = clip,
        (slot, artifact) => *slot = artifact,
    }

    store.persist(record, identity)?;

    Ok(PersistedArtifact {
        kind,
        identity,
        name,
        reused,
    })
}
