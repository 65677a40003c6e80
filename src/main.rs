use std::{env, path::PathBuf, process};

use anyhow::Context;
use scene_import::{
    ImportSettings, import_file, load_import_settings, scene::Scene, store::JsonDirStore,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    if let Err(err) = run() {
        eprintln!("{err:#}");
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if !(3..=4).contains(&args.len()) {
        eprintln!("Usage: scene-import <input.gltf|glb> <output-dir> [settings.json]");
        process::exit(2);
    }

    let input = PathBuf::from(&args[1]);
    let output = PathBuf::from(&args[2]);
    let settings = match args.get(3) {
        Some(path) => load_import_settings(&PathBuf::from(path))?,
        None => ImportSettings::default(),
    };

    let mut store = JsonDirStore::open(&output)
        .with_context(|| format!("failed to open output directory: {}", output.display()))?;
    let mut scene = Scene::new();
    let report = import_file(&input, &mut scene, None, &settings, &mut store)?;

    println!(
        "Actors: {}, Meshes: {}, Bones: {}",
        report.actor_count, report.mesh_count, report.bone_count
    );
    println!(
        "Clips: {}, Tracks: {} ({} keyframes removed)",
        report.clip_count, report.track_count, report.removed_keyframes
    );
    for artifact in &report.persisted {
        println!(
            "  {:?} {:08x} {}{}",
            artifact.kind,
            artifact.identity,
            artifact.name,
            if artifact.reused { " (updated)" } else { "" }
        );
    }
    println!("Warnings: {}", report.warnings.len());

    Ok(())
}
