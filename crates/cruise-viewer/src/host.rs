//! Owns the simulation and drives it from Bevy's schedule.
//!
//! The simulation is mounted at startup against the primary window, ticked once
//! per `Update` pass with the frame delta, resized when the window changes and
//! torn down when the app exits.

use std::{
    fs::File,
    io::{self, BufWriter},
    path::Path,
};

use bevy::{
    ecs::message::MessageReader,
    prelude::*,
    window::{PrimaryWindow, WindowResized},
};
use cruise_core::{
    HostSurfaces, Simulation, SimulationConfig, SurfaceRole, SurfaceSize, TickOutcome,
    telemetry::{TelemetryFrame, TelemetryRecorder},
};

use crate::{DriveSet, backend::BevyBackend, launch_params::LaunchParams, mirror};

/// The running simulation.
#[derive(Resource)]
pub struct SimulationHost {
    pub sim: Simulation<BevyBackend>,
}

impl SimulationHost {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            sim: Simulation::new(BevyBackend::default(), config),
        }
    }
}

/// Per-tick CSV log, present when `--telemetry-csv` was given.
#[derive(Resource)]
pub struct TelemetryLog {
    recorder: TelemetryRecorder<BufWriter<File>>,
}

impl TelemetryLog {
    fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            recorder: TelemetryRecorder::new(BufWriter::new(file))?,
        })
    }
}

// ============================================================================
// Plugin
// ============================================================================

/// Plugin that mounts, ticks and tears down the simulation.
pub struct SimulationHostPlugin;

impl Plugin for SimulationHostPlugin {
    fn build(&self, app: &mut App) {
        let config = app
            .world()
            .get_resource::<LaunchParams>()
            .map(LaunchParams::simulation_config)
            .unwrap_or_default();

        app.insert_resource(SimulationHost::new(config))
            .add_systems(Startup, (mount_simulation, open_telemetry_log))
            .add_systems(
                Update,
                (
                    resize_surfaces.in_set(DriveSet::Input),
                    tick_simulation.in_set(DriveSet::Tick),
                ),
            )
            .add_systems(Last, teardown_on_exit.before(mirror::apply_mirror_ops));
    }
}

// ============================================================================
// Systems
// ============================================================================

fn mount_simulation(
    mut host: ResMut<SimulationHost>,
    window: Single<&Window, With<PrimaryWindow>>,
) {
    let main = SurfaceSize::new(window.physical_width(), window.physical_height());
    let minimap = host.sim.minimap().surface();
    let surfaces = HostSurfaces {
        main: Some(main),
        minimap: Some(minimap),
    };

    if let Err(error) = host.sim.mount(&surfaces) {
        // The simulation stays unmounted and every tick is skipped.
        tracing::error!(%error, "Failed to start the simulation");
    }
}

fn open_telemetry_log(mut commands: Commands, params: Res<LaunchParams>) {
    let Some(path) = params.telemetry_csv.as_deref() else {
        return;
    };

    match TelemetryLog::create(path) {
        Ok(log) => {
            tracing::info!(path = %path.display(), "Recording telemetry");
            commands.insert_resource(log);
        }
        Err(error) => {
            tracing::error!(%error, path = %path.display(), "Failed to open telemetry log");
        }
    }
}

fn resize_surfaces(
    mut resized: MessageReader<WindowResized>,
    mut host: ResMut<SimulationHost>,
    window: Single<(Entity, &Window), With<PrimaryWindow>>,
) {
    let (primary, window) = *window;
    if resized.read().any(|event| event.window == primary) {
        host.sim.resize(
            SurfaceRole::Main,
            window.physical_width(),
            window.physical_height(),
        );
    }
}

fn tick_simulation(
    time: Res<Time>,
    mut host: ResMut<SimulationHost>,
    log: Option<ResMut<TelemetryLog>>,
) {
    let dt = time.delta_secs();
    if host.sim.tick(dt) == TickOutcome::Skipped {
        return;
    }

    let Some(mut log) = log else {
        return;
    };
    let frame = TelemetryFrame {
        tick: host.sim.ticks(),
        elapsed: host.sim.elapsed(),
        dt,
        state: host.sim.vehicle_state(),
    };
    if let Err(error) = log.recorder.record(&frame) {
        tracing::warn!(%error, "Telemetry row dropped");
    }
}

fn teardown_on_exit(
    mut exits: MessageReader<AppExit>,
    mut host: ResMut<SimulationHost>,
    log: Option<ResMut<TelemetryLog>>,
) {
    if exits.read().next().is_none() {
        return;
    }

    host.sim.unmount();
    tracing::debug!(
        surfaces_released = host.sim.backend().is_released(),
        "Viewer shutting down"
    );
    if let Some(mut log) = log {
        if let Err(error) = log.recorder.flush() {
            tracing::warn!(%error, "Failed to flush telemetry log");
        }
        tracing::info!(rows = log.recorder.rows(), "Telemetry log closed");
    }
}
