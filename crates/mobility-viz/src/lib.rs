//! Social-mobility visualizer: a Bevy-hosted 3D view of a simulated
//! population.
//!
//! The core (views, projection, render objects, labels, camera, picking,
//! trajectory, narrative and the context that ties them together) is plain
//! Rust and testable without a GPU. The plugin modules adapt it to Bevy.

pub mod camera;
pub mod config;
pub mod context;
pub mod controls;
pub mod feed;
pub mod hud;
pub mod labels;
pub mod narrative;
pub mod picking;
pub mod plugin;
pub mod projection;
pub mod render_objects;
pub mod scene;
pub mod trajectory;
pub mod views;

pub use config::VizConfig;
pub use context::{Lifecycle, PointerOutcome, VisualizationContext};
pub use plugin::{LaunchOptions, MobilityVizPlugin, VizContext};
pub use projection::LayoutMode;
pub use views::{ViewConfig, ViewKey, ViewRegistry};
