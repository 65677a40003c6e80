use xxhash_rust::xxh32::xxh32;

use crate::scene::{ActorId, Scene};

/// 32-bit identifier of a slash-joined hierarchy path.
pub fn path_identity(path: &str) -> u32 {
    xxh32(path.as_bytes(), 0)
}

/// Identifier of a sub-asset owned by the actor at `owner_path`.
pub fn asset_identity(owner_path: &str, asset: &str) -> u32 {
    path_identity(&format!("{}#{}", owner_path, asset))
}

/// Assign every actor under `root` the hash of its path from `root`
/// (root name included), parents before children.
pub fn stabilize(scene: &mut Scene, root: ActorId) {
    let Some(name) = scene.actor(root).map(|actor| actor.name.clone()) else {
        return;
    };
    assign(scene, root, name);
}

fn assign(scene: &mut Scene, id: ActorId, path: String) {
    let Some(actor) = scene.actor_mut(id) else {
        return;
    };
    actor.identity = path_identity(&path);
    let children = actor.children.clone();
    for child in children {
        let Some(name) = scene.actor(child).map(|actor| actor.name.clone()) else {
            continue;
        };
        assign(scene, child, format!("{}/{}", path, name));
    }
}
