//! Runtime scene-object system: actors, parent/child links and components.
//!
//! Component kinds form a closed set resolved at compile time. The by-name
//! lookup ([`ComponentKind::from_name`]) exists only for external tools that
//! still address components by their type string.

use std::str::FromStr;

use nalgebra::{Matrix4, Vector3};

use crate::error::SceneError;
use crate::math::{Decomposed, compose_trs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub usize);

/// Local transform of an actor relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    /// XYZ Euler angles in radians.
    pub rotation: Vector3<f32>,
    pub scale: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: Vector3::zeros(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn from_decomposed(parts: &Decomposed) -> Self {
        Self {
            position: parts.translation,
            rotation: parts.euler(),
            scale: parts.scale,
        }
    }

    pub fn local_matrix(&self) -> Matrix4<f32> {
        compose_trs(&self.position, &self.rotation, &self.scale)
    }
}

/// Plain mesh renderer referencing a produced mesh by identity.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshRender {
    pub mesh: u32,
}

/// Skinned mesh renderer; `armature` is the actor carrying the bound [`Armature`].
#[derive(Debug, Clone, PartialEq)]
pub struct SkinnedMeshRender {
    pub mesh: u32,
    pub armature: Option<ActorId>,
}

/// Skeleton root component bound to a pose asset by identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Armature {
    pub pose: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Transform(Transform),
    MeshRender(MeshRender),
    SkinnedMeshRender(SkinnedMeshRender),
    Armature(Armature),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Transform,
    MeshRender,
    SkinnedMeshRender,
    Armature,
}

impl ComponentKind {
    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::Transform => "Transform",
            ComponentKind::MeshRender => "MeshRender",
            ComponentKind::SkinnedMeshRender => "SkinnedMeshRender",
            ComponentKind::Armature => "Armature",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, SceneError> {
        match name {
            "Transform" => Ok(ComponentKind::Transform),
            "MeshRender" => Ok(ComponentKind::MeshRender),
            "SkinnedMeshRender" => Ok(ComponentKind::SkinnedMeshRender),
            "Armature" => Ok(ComponentKind::Armature),
            other => Err(SceneError::UnknownComponent(other.to_string())),
        }
    }

    /// Default-initialized component of this kind.
    pub fn instantiate(&self) -> Component {
        match self {
            ComponentKind::Transform => Component::Transform(Transform::identity()),
            ComponentKind::MeshRender => Component::MeshRender(MeshRender { mesh: 0 }),
            ComponentKind::SkinnedMeshRender => Component::SkinnedMeshRender(SkinnedMeshRender {
                mesh: 0,
                armature: None,
            }),
            ComponentKind::Armature => Component::Armature(Armature { pose: 0 }),
        }
    }
}

impl FromStr for ComponentKind {
    type Err = SceneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::Transform(_) => ComponentKind::Transform,
            Component::MeshRender(_) => ComponentKind::MeshRender,
            Component::SkinnedMeshRender(_) => ComponentKind::SkinnedMeshRender,
            Component::Armature(_) => ComponentKind::Armature,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Actor {
    pub name: String,
    pub parent: Option<ActorId>,
    pub children: Vec<ActorId>,
    /// Path-derived identifier assigned by the identity pass; 0 until then.
    pub identity: u32,
    pub components: Vec<Component>,
}

/// Arena of actors. Ids stay valid for the lifetime of the scene.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    actors: Vec<Actor>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn create_actor(&mut self, name: impl Into<String>, parent: Option<ActorId>) -> ActorId {
        let id = ActorId(self.actors.len());
        self.actors.push(Actor {
            name: name.into(),
            parent,
            children: Vec::new(),
            identity: 0,
            components: Vec::new(),
        });
        if let Some(parent) = parent.and_then(|p| self.actors.get_mut(p.0)) {
            parent.children.push(id);
        }
        id
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(id.0)
    }

    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.get_mut(id.0)
    }

    pub fn add_component(&mut self, id: ActorId, component: Component) -> Result<(), SceneError> {
        let actor = self.actors.get_mut(id.0).ok_or(SceneError::MissingActor(id.0))?;
        actor.components.push(component);
        Ok(())
    }

    /// Attach a default-initialized component addressed by its type name.
    pub fn add_component_by_name(
        &mut self,
        id: ActorId,
        type_name: &str,
    ) -> Result<&mut Component, SceneError> {
        let kind = ComponentKind::from_name(type_name)?;
        let actor = self.actors.get_mut(id.0).ok_or(SceneError::MissingActor(id.0))?;
        let slot = actor.components.len();
        actor.components.push(kind.instantiate());
        Ok(&mut actor.components[slot])
    }

    pub fn component(&self, id: ActorId, kind: ComponentKind) -> Option<&Component> {
        self.actor(id)?
            .components
            .iter()
            .find(|component| component.kind() == kind)
    }

    pub fn component_mut(&mut self, id: ActorId, kind: ComponentKind) -> Option<&mut Component> {
        self.actor_mut(id)?
            .components
            .iter_mut()
            .find(|component| component.kind() == kind)
    }

    pub fn transform(&self, id: ActorId) -> Option<&Transform> {
        match self.component(id, ComponentKind::Transform)? {
            Component::Transform(transform) => Some(transform),
            _ => None,
        }
    }

    pub fn transform_mut(&mut self, id: ActorId) -> Option<&mut Transform> {
        match self.component_mut(id, ComponentKind::Transform)? {
            Component::Transform(transform) => Some(transform),
            _ => None,
        }
    }

    pub fn local_matrix(&self, id: ActorId) -> Matrix4<f32> {
        self.transform(id)
            .map(Transform::local_matrix)
            .unwrap_or_else(Matrix4::identity)
    }

    /// Accumulated transform from the scene root down to `id`.
    pub fn world_matrix(&self, id: ActorId) -> Matrix4<f32> {
        let mut world = self.local_matrix(id);
        let mut current = self.actor(id).and_then(|actor| actor.parent);
        while let Some(parent) = current {
            world = self.local_matrix(parent) * world;
            current = self.actor(parent).and_then(|actor| actor.parent);
        }
        world
    }

    /// `id` followed by all of its descendants in depth-first pre-order.
    pub fn descendants(&self, id: ActorId) -> Vec<ActorId> {
        let mut ordered = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(actor) = self.actor(current) else {
                continue;
            };
            ordered.push(current);
            stack.extend(actor.children.iter().rev().copied());
        }
        ordered
    }

    /// Slash-joined names from `root` (inclusive) down to `id`.
    /// Returns `None` when `id` is not `root` or one of its descendants.
    pub fn path_from(&self, root: ActorId, id: ActorId) -> Option<String> {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            let actor = self.actor(node)?;
            names.push(actor.name.as_str());
            if node == root {
                names.reverse();
                return Some(names.join("/"));
            }
            current = actor.parent;
        }
        None
    }

    /// Like [`Scene::path_from`] but without the root's own name; `root`
    /// itself maps to the empty path.
    pub fn relative_path(&self, root: ActorId, id: ActorId) -> Option<String> {
        let full = self.path_from(root, id)?;
        let root_name = self.actor(root)?.name.as_str();
        Some(match full.strip_prefix(root_name) {
            Some(rest) => rest.trim_start_matches('/').to_string(),
            None => full,
        })
    }

    /// Nearest ancestor (excluding `id`) that satisfies `predicate`.
    pub fn find_ancestor(
        &self,
        id: ActorId,
        mut predicate: impl FnMut(ActorId) -> bool,
    ) -> Option<ActorId> {
        let mut current = self.actor(id)?.parent;
        while let Some(node) = current {
            if predicate(node) {
                return Some(node);
            }
            current = self.actor(node)?.parent;
        }
        None
    }
}
