use std::fs::File;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use rust_sfm::config::ReconstructionConfig;
use rust_sfm::geometry::Solvers;
use rust_sfm::reconstruction::Reconstruction;
use rust_sfm::synthetic::{SceneConfig, SyntheticScene};

/// Demo configuration: reconstruction settings plus the synthetic scene.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DemoConfig {
    reconstruction: ReconstructionConfig,
    scene: SceneConfig,
}

fn load_config(path: Option<String>) -> Result<DemoConfig> {
    let Some(path) = path else {
        return Ok(DemoConfig::default());
    };
    let file = File::open(&path).with_context(|| format!("Failed to open {}", path))?;
    let config: DemoConfig =
        serde_yaml::from_reader(file).with_context(|| format!("Failed to parse {}", path))?;
    config.reconstruction.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config(std::env::args().nth(1))?;

    let scene = SyntheticScene::generate(&config.scene);
    println!(
        "Synthetic scene: {} views, {} points, {} match sets",
        scene.views.len(),
        scene.points.len(),
        scene.match_sets.len()
    );

    let solvers = Solvers::reference(&config.reconstruction.solver);
    let mut reconstruction = Reconstruction::new(
        scene.views,
        scene.match_sets,
        config.reconstruction,
        solvers,
    )
    .context("Invalid reconstruction input")?;

    let summary = reconstruction
        .run_to_completion()
        .context("Reconstruction failed")?;

    let combined = reconstruction.combine_map();
    let removed = reconstruction.filter_map();
    println!(
        "Registered {} of {} views, {} points ({} combined, {} filtered)",
        summary.registered_views.len(),
        summary.registered_views.len() + summary.unregistered_views.len(),
        reconstruction.map().len(),
        combined,
        removed
    );

    for view in reconstruction.registered_views() {
        let camera = reconstruction.camera(*view)?;
        let center = camera.center();
        println!(
            "  {} center: [{:.3}, {:.3}, {:.3}]",
            view, center.x, center.y, center.z
        );
    }

    println!("{}", reconstruction.map_stats());
    Ok(())
}
