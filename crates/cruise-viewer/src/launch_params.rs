//! Launch parameter parsing for the viewer.
//!
//! On native, parameters are parsed from command-line arguments using clap.
//! On WASM, defaults are used (CLI argument parsing is not available).

use std::path::PathBuf;

use bevy::prelude::*;
use cruise_core::{SimulationConfig, ThemeId};

/// Launch parameters for the viewer.
#[derive(Resource, Debug, Default)]
pub struct LaunchParams {
    /// Theme applied when the world is first built.
    pub theme: ThemeId,
    /// Decoration seed. `None` draws one from the OS.
    pub seed: Option<u64>,
    /// Append one CSV telemetry row per tick to this file.
    pub telemetry_csv: Option<PathBuf>,
}

impl LaunchParams {
    /// Simulation settings implied by the launch parameters.
    pub fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            initial_theme: self.theme,
            seed: self.seed,
            ..Default::default()
        }
    }
}

#[cfg(not(target_family = "wasm"))]
mod native {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    #[command(about = "Third-person driving through procedurally decorated tracks")]
    struct CliArgs {
        /// Starting theme (city, mountain or desert).
        #[arg(long, default_value_t = ThemeId::default())]
        theme: ThemeId,

        /// Seed for decoration placement.
        #[arg(long)]
        seed: Option<u64>,

        /// Write per-tick telemetry as CSV to this path.
        #[arg(long)]
        telemetry_csv: Option<PathBuf>,
    }

    pub fn parse() -> LaunchParams {
        let args = CliArgs::parse();
        LaunchParams {
            theme: args.theme,
            seed: args.seed,
            telemetry_csv: args.telemetry_csv,
        }
    }
}

/// Parse launch parameters from CLI args (native) or use defaults (WASM).
pub fn parse() -> LaunchParams {
    #[cfg(not(target_family = "wasm"))]
    {
        native::parse()
    }
    #[cfg(target_family = "wasm")]
    {
        LaunchParams::default()
    }
}
