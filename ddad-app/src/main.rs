//! DDAD Application
//!
//! Command-line front end for synchronized dataset access.
//!
//! Features:
//! - Config from a JSON file, overridden by flags
//! - Index summary per scene
//! - Optional assembly of one sample with its payloads and depth

mod app;

use clap::Parser;
use ddad_data::Split;
use std::path::PathBuf;

/// DDAD - synchronized multi-sensor dataset access
#[derive(Parser, Debug)]
#[command(name = "ddad")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON dataset config; flags below override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dataset manifest file or directory
    #[arg(short, long)]
    manifest: Option<PathBuf>,

    /// Split to index (train, val, test)
    #[arg(short, long)]
    split: Option<Split>,

    /// Requested datum, repeatable and kept in order
    #[arg(short, long = "datum")]
    datums: Vec<String>,

    /// Datum whose timestamps define samples
    #[arg(long)]
    pivot: Option<String>,

    /// Point cloud datum projected into every requested camera
    #[arg(long)]
    depth_from: Option<String>,

    /// Preceding samples per item
    #[arg(long)]
    backward: Option<usize>,

    /// Following samples per item
    #[arg(long)]
    forward: Option<usize>,

    /// Requested annotation type, repeatable
    #[arg(short, long = "annotation")]
    annotations: Vec<String>,

    /// Keep only samples carrying every requested annotation
    #[arg(long)]
    only_annotated: bool,

    /// Synchronization tolerance in microseconds
    #[arg(long)]
    tolerance_us: Option<u64>,

    /// Assemble and describe the item at this position
    #[arg(long)]
    sample: Option<usize>,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();
    app::init_logging(&args.log_level);

    if let Err(e) = app::run(args) {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}
