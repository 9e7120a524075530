//! Social-mobility visualizer
//!
//! Run with: cargo run -p mobility-viz --bin viz
//!
//! Examples:
//!   cargo run -p mobility-viz --bin viz -- --feed-dir output --auto-start
//!   cargo run -p mobility-viz --bin viz -- --config viz.toml --view risk-behavior --layout scatter

use bevy::prelude::*;
use clap::Parser;
use mobility_viz::{LaunchOptions, LayoutMode, MobilityVizPlugin, ViewKey, VizConfig};
use std::path::PathBuf;
use std::process::ExitCode;

/// Social-mobility visualizer
#[derive(Parser, Debug)]
#[command(name = "viz")]
#[command(about = "3D visualization of a simulated population's social mobility")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory the simulation backend writes its feed into
    #[arg(long)]
    feed_dir: Option<PathBuf>,

    /// Initial view (e.g. self-knowledge, risk-behavior)
    #[arg(long, default_value = "self-knowledge")]
    view: ViewKey,

    /// Initial layout mode (spiral or scatter)
    #[arg(long, default_value = "spiral")]
    layout: LayoutMode,

    /// Population for the start command
    #[arg(long, default_value_t = 100)]
    agents: u32,

    /// Rounds for the start command
    #[arg(long, default_value_t = 50)]
    rounds: u32,

    /// Send a start command on launch
    #[arg(long)]
    auto_start: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match args.config.as_deref() {
        Some(path) => match VizConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => VizConfig::default(),
    };
    if let Some(dir) = args.feed_dir {
        config.feed.dir = dir;
    }

    let launch = LaunchOptions {
        view: args.view,
        layout: args.layout,
        agents: args.agents,
        rounds: args.rounds,
        auto_start: args.auto_start,
    };

    App::new()
        .add_plugins(MobilityVizPlugin { config, launch })
        .run();
    ExitCode::SUCCESS
}
