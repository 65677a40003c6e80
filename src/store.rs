//! Resource store boundary used to persist imported artifacts by identity.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::assets::{Aabb, AnimationClip, Mesh, Pose};
use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    Mesh,
    Pose,
    Clip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum Artifact {
    Mesh(Mesh),
    Pose(Pose),
    Clip(AnimationClip),
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::Mesh(_) => ArtifactKind::Mesh,
            Artifact::Pose(_) => ArtifactKind::Pose,
            Artifact::Clip(_) => ArtifactKind::Clip,
        }
    }
}

/// Persistence collaborator. Implementations key records by identity so a
/// re-import overwrites the existing record instead of adding a new one.
pub trait ResourceStore {
    fn load_by_identity(&self, identity: u32) -> Result<Option<Artifact>, StoreError>;

    fn create_artifact(&mut self, kind: ArtifactKind) -> Artifact {
        match kind {
            ArtifactKind::Mesh => Artifact::Mesh(Mesh {
                name: String::new(),
                vertices: Vec::new(),
                indices: Vec::new(),
                skinned: false,
                bounds: Aabb {
                    min: [0.0; 3],
                    max: [0.0; 3],
                },
            }),
            ArtifactKind::Pose => Artifact::Pose(Pose::default()),
            ArtifactKind::Clip => Artifact::Clip(AnimationClip::default()),
        }
    }

    fn persist(&mut self, artifact: Artifact, identity: u32) -> Result<(), StoreError>;

    /// Drop the record stored under `identity`; a missing record is not an error.
    fn remove(&mut self, identity: u32) -> Result<(), StoreError>;
}

// ─── In-memory store ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: BTreeMap<u32, Artifact>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn identities(&self) -> Vec<u32> {
        self.records.keys().copied().collect()
    }

    pub fn get(&self, identity: u32) -> Option<&Artifact> {
        self.records.get(&identity)
    }
}

impl ResourceStore for MemoryStore {
    fn load_by_identity(&self, identity: u32) -> Result<Option<Artifact>, StoreError> {
        Ok(self.records.get(&identity).cloned())
    }

    fn persist(&mut self, artifact: Artifact, identity: u32) -> Result<(), StoreError> {
        self.records.insert(identity, artifact);
        Ok(())
    }

    fn remove(&mut self, identity: u32) -> Result<(), StoreError> {
        self.records.remove(&identity);
        Ok(())
    }
}

// ─── JSON directory store ─────────────────────────────────────────────────────

/// Stores each artifact as `<dir>/<identity as 8 hex digits>.json`.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn record_path(&self, identity: u32) -> PathBuf {
        self.root.join(format!("{:08x}.json", identity))
    }
}

impl ResourceStore for JsonDirStore {
    fn load_by_identity(&self, identity: u32) -> Result<Option<Artifact>, StoreError> {
        let path = self.record_path(identity);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&content)?))
    }

    fn persist(&mut self, artifact: Artifact, identity: u32) -> Result<(), StoreError> {
        let content = serde_json::to_vec_pretty(&artifact)?;
        let path = self.record_path(identity);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, content)?;
        fs::rename(&staging, &path)?;
        Ok(())
    }

    fn remove(&mut self, identity: u32) -> Result<(), StoreError> {
        let path = self.record_path(identity);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}
