//! Config assembly and the run sequence.

use crate::Args;
use ddad_sync::{DatasetConfig, DatasetItem, SynchronizedDataset, SynchronizedSample};
use std::error::Error;
use tracing::{info, warn};

pub fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .init();
}

/// Start from the config file, if any, then apply flags.
pub fn build_config(args: &Args) -> Result<DatasetConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => DatasetConfig::from_json_file(path)?,
        None => DatasetConfig::default(),
    };
    if let Some(manifest) = &args.manifest {
        config.manifest_path = manifest.clone();
    }
    if let Some(split) = args.split {
        config.split = split;
    }
    if !args.datums.is_empty() {
        config.datum_names = args.datums.clone();
    }
    if args.pivot.is_some() {
        config.pivot_datum_name = args.pivot.clone();
    }
    if args.depth_from.is_some() {
        config.generate_depth_from_datum = args.depth_from.clone();
    }
    if let Some(backward) = args.backward {
        config.backward_context = backward;
    }
    if let Some(forward) = args.forward {
        config.forward_context = forward;
    }
    if !args.annotations.is_empty() {
        config.requested_annotations = args.annotations.clone();
    }
    if args.only_annotated {
        config.only_annotated_datums = true;
    }
    if let Some(tolerance) = args.tolerance_us {
        config.sync_tolerance_us = tolerance;
    }
    Ok(config)
}

pub fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = build_config(&args)?;
    let dataset = SynchronizedDataset::new(config)?;

    let metadata = dataset.metadata();
    info!(
        "Dataset '{}' v{}: {} items, pivot {:?}",
        metadata.name,
        metadata.version,
        dataset.len(),
        dataset.pivot()
    );
    let index = dataset.index();
    for (i, scene) in dataset.scenes().iter().enumerate() {
        let range = index.scene_range(i);
        let addressable = index
            .flat_positions()
            .iter()
            .filter(|&&flat| range.contains(&flat))
            .count();
        info!(
            "Scene '{}': {} samples, {} addressable, {} datums",
            scene.name(),
            range.len(),
            addressable,
            scene.streams().len()
        );
    }

    if let Some(position) = args.sample {
        match dataset.get(position)? {
            DatasetItem::Sample(sample) => describe(&sample),
            DatasetItem::Window(samples) => {
                info!("Window of {} samples", samples.len());
                samples.iter().for_each(describe);
            }
        }
    }
    Ok(())
}

fn describe(sample: &SynchronizedSample) {
    info!(
        "Sample {} of scene '{}' at {}us",
        sample.sample.local,
        sample.scene.name(),
        sample.timestamp
    );
    for entry in &sample.entries {
        let payload = match &entry.payload {
            None => "not loaded".to_string(),
            Some(Ok(_)) if entry.image().is_some() => {
                let (w, h) = entry.image().map(|i| i.dimensions()).unwrap_or_default();
                format!("image {}x{}", w, h)
            }
            Some(Ok(_)) => format!(
                "{} points",
                entry.point_cloud().map_or(0, |cloud| cloud.len())
            ),
            Some(Err(e)) => {
                warn!("{}: payload failed: {}", entry.datum_name, e);
                "failed".to_string()
            }
        };
        let depth = match &entry.depth {
            Some(Ok(depth)) => format!(", depth {} valid pixels", depth.valid_pixels()),
            Some(Err(e)) => format!(", depth failed: {}", e),
            None => String::new(),
        };
        info!(
            "  {} @ {}us: {}, annotations {:?}{}",
            entry.datum_name,
            entry.timestamp(),
            payload,
            entry.annotations.keys().collect::<Vec<_>>(),
            depth
        );
    }
}
