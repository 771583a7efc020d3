//! Third-person driving sim hosted in Bevy.
//!
//! The simulation itself lives in `cruise-core`; this application feeds it
//! keyboard input, mirrors its scene into Bevy entities, and renders the chase
//! view with a top-down minimap overlay and an egui dashboard.

mod backend;
mod host;
mod input;
mod launch_params;
mod mirror;
mod ui;

use bevy::prelude::*;
use host::SimulationHostPlugin;
use input::InputPlugin;
use mirror::SceneMirrorPlugin;
use ui::DashboardPlugin;

/// Per-frame ordering: intents are written, the simulation ticks, then Bevy
/// catches up with whatever the tick changed.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriveSet {
    Input,
    Tick,
    Mirror,
}

/// Plugin for the main application.
pub struct AppPlugin;

impl Plugin for AppPlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            Update,
            (DriveSet::Input, DriveSet::Tick, DriveSet::Mirror).chain(),
        )
        .add_plugins((
            SimulationHostPlugin,
            SceneMirrorPlugin,
            InputPlugin,
            DashboardPlugin,
        ));
    }
}

fn main() {
    // Initialize tracing for native platforms.
    #[cfg(not(target_family = "wasm"))]
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    // Initialize tracing for WASM (logs to browser console).
    #[cfg(target_family = "wasm")]
    {
        console_error_panic_hook::set_once();
        tracing_wasm::set_as_global_default();
    }

    let params = launch_params::parse();
    tracing::info!(theme = %params.theme, seed = ?params.seed, "Starting cruise");

    let mut app = App::new();

    #[allow(unused_mut)]
    let mut window = Window {
        title: "cruise".to_string(),
        resolution: (1280, 720).into(),
        position: WindowPosition::Centered(MonitorSelection::Primary),
        ..Default::default()
    };

    // WASM: Fit canvas to parent element and prevent browser event handling.
    #[cfg(target_family = "wasm")]
    {
        window.fit_canvas_to_parent = true;
        window.prevent_default_event_handling = true;
    }

    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(window),
        ..Default::default()
    }));

    // Launch parameters must exist before the host plugin reads them.
    app.insert_resource(params);
    app.add_plugins(AppPlugin).run();
}
