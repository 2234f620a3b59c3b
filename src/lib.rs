//! A looping hourglass of falling sand.
//!
//! [`sand_simulator::Simulator`] owns the cells and runs the settle/refill
//! cycle, [`visual::Visual`] mounts one of them onto a [`surface::Surface`]
//! and drives it from the host's frame callback.

pub mod assets;
pub mod config;
pub mod grid;
pub mod mask;
pub mod sand_simulator;
pub mod surface;
pub mod vec;
pub mod visual;

pub use assets::{AssetError, Assets};
pub use config::{ConfigError, HourglassConfig};
pub use grid::{ChamberCounts, SandGrid};
pub use sand_simulator::{Phase, Simulator};
pub use surface::{PixelSurface, Rect, RenderError, Surface};
pub use vec::Vec2;
pub use visual::{AssetSource, Visual, VisualState};
