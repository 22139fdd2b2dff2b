//! Diagnostic: import each file given on the command line and print what
//! was decoded.
//!
//! Usage: `scene_info [--failsafe] FILE...` (set `RUST_LOG=debug` for the
//! decoder trace)

use anyhow::{bail, Context, Result};
use scene_import::{ImportConfiguration, Scene, SceneImporter};

fn print_scene(path: &str, scene: &Scene) {
    println!("{path}");
    println!(
        "  objects={} vertices={} faces={} materials={} textures={}",
        scene.objects.len(),
        scene.vertex_count(),
        scene.face_count(),
        scene.materials().len(),
        scene.textures.len()
    );
    if let Some(scale) = scene.master_scale {
        println!("  master scale {scale}");
    }
    for object in &scene.objects {
        println!(
            "  {:<24} v={:<7} f={:<7} nodes={}",
            object.name,
            object.vertex_count(),
            object.face_count(),
            object.nodes.len()
        );
    }
    for note in scene.notifications.iter() {
        println!("  {note}");
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let mut failsafe = false;
    let mut paths = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--failsafe" => failsafe = true,
            _ => paths.push(arg),
        }
    }
    if paths.is_empty() {
        bail!("usage: scene_info [--failsafe] FILE...");
    }

    let importer = SceneImporter::new()
        .with_configuration(ImportConfiguration::new().failsafe(failsafe));
    for path in &paths {
        let scene = importer
            .decode_file(path)
            .with_context(|| format!("failed to import {path}"))?;
        print_scene(path, &scene);
    }
    Ok(())
}
