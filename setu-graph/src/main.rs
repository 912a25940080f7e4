//! SetuGraph replay binary
//!
//! Feeds a recorded JSON-lines trajectory through a pose graph session and
//! writes the optimized map.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release -- --config setu-graph.toml --trajectory run.jsonl
//!
//! # Write results somewhere other than [persistence].output_dir
//! cargo run --release -- -c setu-graph.toml -t run.jsonl --output results/run1
//! ```
//!
//! # Outputs
//!
//! - `{map_file}` / `{location_file}`: marker map and location log
//! - `maximum_likelihood.ply`: every keyframe scan at its solved pose
//! - `pose_graph.json`: nodes and edges of the final graph

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use clap::Parser;

use setu_graph::io::{TrajectoryReader, write_ply};
use setu_graph::{LogPublisher, PlyMapWriter, PoseGraphSession, SetuConfig};

const ML_CLOUD_FILE: &str = "maximum_likelihood.ply";
const POSE_GRAPH_FILE: &str = "pose_graph.json";

#[derive(Parser, Debug)]
#[command(name = "setu-graph")]
#[command(about = "Replay a trajectory through the pose graph backend")]
struct Args {
    /// Path to TOML configuration
    #[arg(short, long, default_value = "setu-graph.toml")]
    config: PathBuf,

    /// JSON-lines trajectory to replay
    #[arg(short, long)]
    trajectory: PathBuf,

    /// Output directory (overrides [persistence].output_dir)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Counters reported at the end of a run.
#[derive(Debug, Default)]
struct ReplayStats {
    records: usize,
    keyframes: usize,
    closures: usize,
}

fn run(args: &Args) -> Result<ReplayStats, Box<dyn std::error::Error>> {
    let mut config = SetuConfig::load(&args.config)?;
    if let Some(output) = &args.output {
        config.persistence.output_dir = output.to_string_lossy().into_owned();
    }
    let output_dir = PathBuf::from(&config.persistence.output_dir);
    let writer = PlyMapWriter::from_config(&config.persistence);

    let mut session = PoseGraphSession::from_config(config)?;
    session.add_publisher(Box::new(LogPublisher::new()));
    session.add_map_sink(Box::new(writer));

    let mut stats = ReplayStats::default();
    for record in TrajectoryReader::open(&args.trajectory)? {
        let record = record?;
        stats.records += 1;

        let Some(delta) = record.delta_pose() else {
            if let Some(scan) = record.scan() {
                session.add_key_scan_pair(0, scan)?;
                stats.keyframes += 1;
            }
            continue;
        };

        let (key, is_keyframe) =
            session.add_between_factor(&delta, &record.covariance(), record.timestamp_us)?;
        if !is_keyframe {
            continue;
        }
        let Some(scan) = record.scan() else {
            log::debug!("Keyframe {} has no scan", key);
            continue;
        };

        session.add_key_scan_pair(key, scan)?;
        stats.keyframes += 1;
        stats.closures += session.find_loop_closures(key)?.len();
    }

    session.publish_pose_graph()?;

    fs::create_dir_all(&output_dir)?;
    let cloud = session.get_maximum_likelihood_points()?;
    write_ply(&output_dir.join(ML_CLOUD_FILE), &cloud)?;

    let json = serde_json::to_string_pretty(&session.pose_graph_message())?;
    fs::write(output_dir.join(POSE_GRAPH_FILE), json)?;

    let last = session.get_last_pose()?.translation();
    log::info!(
        "Final pose ({:.3}, {:.3}, {:.3}), {} map points written to {}",
        last.x,
        last.y,
        last.z,
        cloud.len(),
        output_dir.display()
    );
    Ok(stats)
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let args = Args::parse();

    log::info!("setu-graph starting");
    log::info!("  Config: {}", args.config.display());
    log::info!("  Trajectory: {}", args.trajectory.display());

    match run(&args) {
        Ok(stats) => log::info!(
            "Replayed {} records: {} keyframes, {} loop closures",
            stats.records,
            stats.keyframes,
            stats.closures
        ),
        Err(e) => {
            log::error!("Replay failed: {}", e);
            std::process::exit(1);
        }
    }
}
