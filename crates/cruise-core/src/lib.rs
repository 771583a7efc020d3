//! Engine-agnostic core of the cruise driving sim.
//!
//! A car drives through a procedurally decorated world under an arcade motion
//! model, followed by a smoothed chase camera and a top-down minimap. Nothing
//! here depends on a renderer: the scene lives in an arena-backed graph whose
//! changes are handed to a [`RenderBackend`] as events, so the whole loop runs
//! headless in tests.
//!
//! # Example
//!
//! ```
//! use cruise_core::{
//!     ControlFlag, HostSurfaces, NullBackend, Simulation, SimulationConfig, SurfaceSize,
//! };
//!
//! let mut sim = Simulation::new(
//!     NullBackend,
//!     SimulationConfig {
//!         seed: Some(1),
//!         ..Default::default()
//!     },
//! );
//! sim.mount(&HostSurfaces {
//!     main: Some(SurfaceSize::new(1280, 720)),
//!     minimap: Some(SurfaceSize::new(150, 150)),
//! })?;
//!
//! sim.set_control_intent(ControlFlag::Accelerate, true);
//! sim.tick(1.0 / 60.0);
//! assert!(sim.telemetry().is_some());
//! # Ok::<(), cruise_core::Error>(())
//! ```

pub mod camera;
pub mod decorations;
mod error;
pub mod minimap;
pub mod render;
pub mod scene;
pub mod simulation;
pub mod telemetry;
pub mod theme;
pub mod vehicle;
pub mod world;

pub use error::{Error, Result};
pub use render::{HostSurfaces, NullBackend, RenderBackend, SurfaceRole, SurfaceSize, View};
pub use simulation::{Simulation, SimulationConfig, TickOutcome};
pub use telemetry::TelemetrySnapshot;
pub use theme::{Theme, ThemeId};
pub use vehicle::{ControlFlag, ControlIntent, VehicleState};
