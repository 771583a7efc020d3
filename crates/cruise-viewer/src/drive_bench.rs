//! Headless drive bench.
//!
//! Runs the simulation against a null renderer through a scripted drive
//! (launch, sweeping turn, coast, hard stop) at a fixed frame rate and streams
//! per-tick telemetry as CSV on stdout. Summary lines go to stderr prefixed with
//! `#` so the CSV stays clean.
//!
//! Run with: cargo run -p cruise-viewer --bin drive-bench -- --theme desert --seed 7

#[cfg(target_family = "wasm")]
fn main() {
    eprintln!("ERROR: drive-bench is a native-only tool");
}

#[cfg(not(target_family = "wasm"))]
mod bench {
    use std::io::{self, BufWriter};

    use clap::Parser;
    use cruise_core::{
        ControlFlag, HostSurfaces, NullBackend, Simulation, SimulationConfig, SurfaceSize,
        ThemeId,
        telemetry::{TelemetryFrame, TelemetryRecorder},
    };

    /// One leg of the scripted drive.
    struct Phase {
        name: &'static str,
        ticks: u64,
        held: &'static [ControlFlag],
    }

    const SCRIPT: &[Phase] = &[
        Phase {
            name: "launch",
            ticks: 240,
            held: &[ControlFlag::Accelerate],
        },
        Phase {
            name: "sweep",
            ticks: 180,
            held: &[ControlFlag::Accelerate, ControlFlag::SteerLeft],
        },
        Phase {
            name: "coast",
            ticks: 120,
            held: &[],
        },
        Phase {
            name: "stop",
            ticks: 180,
            held: &[ControlFlag::Brake],
        },
    ];

    #[derive(Parser)]
    #[command(about = "Scripted headless drive that prints CSV telemetry")]
    struct CliArgs {
        /// Track to drive on.
        #[arg(long, default_value_t = ThemeId::default())]
        theme: ThemeId,

        /// Decoration seed.
        #[arg(long, default_value_t = 1)]
        seed: u64,

        /// Frames per simulated second.
        #[arg(long, default_value_t = 60.0)]
        fps: f32,

        /// Repeat the script this many times.
        #[arg(long, default_value_t = 1)]
        laps: u32,
    }

    pub fn run() -> Result<(), Box<dyn std::error::Error>> {
        let args = CliArgs::parse();
        let dt = 1.0 / args.fps.max(1.0);

        let mut sim = Simulation::new(
            NullBackend,
            SimulationConfig {
                initial_theme: args.theme,
                seed: Some(args.seed),
                ..Default::default()
            },
        );
        sim.mount(&HostSurfaces {
            main: Some(SurfaceSize::new(1280, 720)),
            minimap: Some(SurfaceSize::new(150, 150)),
        })?;
        eprintln!("# theme={} seed={} dt={dt:.5}", args.theme, args.seed);

        let stdout = io::stdout();
        let mut recorder = TelemetryRecorder::new(BufWriter::new(stdout.lock()))?;
        let mut top_speed = 0.0_f32;

        for _ in 0..args.laps {
            for phase in SCRIPT {
                for flag in ControlFlag::ALL {
                    sim.set_control_intent(flag, phase.held.contains(&flag));
                }
                for _ in 0..phase.ticks {
                    sim.tick(dt);
                    top_speed = top_speed.max(sim.vehicle_state().speed);
                    recorder.record(&TelemetryFrame {
                        tick: sim.ticks(),
                        elapsed: sim.elapsed(),
                        dt,
                        state: sim.vehicle_state(),
                    })?;
                }

                let state = sim.vehicle_state();
                eprintln!(
                    "# {:>6}: speed={:.1} boost={:.1} heading={:.0}° at ({:.1}, {:.1})",
                    phase.name,
                    state.speed,
                    state.boost_reserve,
                    cruise_core::vehicle::heading_degrees(state.heading),
                    state.position.x,
                    state.position.z,
                );
            }
        }
        recorder.flush()?;

        let disposal = sim.unmount();
        eprintln!(
            "# {} rows, top speed {top_speed:.1}, released {disposal:?}",
            recorder.rows()
        );
        Ok(())
    }
}

#[cfg(not(target_family = "wasm"))]
fn main() {
    if let Err(error) = bench::run() {
        eprintln!("ERROR: {error}");
        std::process::exit(1);
    }
}
