//! Error types for the simulation core.

use std::fmt;

use crate::render::SurfaceRole;

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the simulation's external interface.
///
/// The per-tick update has no failure modes; everything here is raised either
/// at mount time or when rejecting invalid input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A theme identifier that is not one of the known themes.
    UnknownTheme {
        /// The identifier that was rejected.
        id: String,
    },
    /// A host rendering surface was not provided at mount time.
    MissingSurface {
        /// Which surface was missing.
        role: SurfaceRole,
    },
    /// `mount` was called on a simulation that is already running.
    AlreadyMounted,
    /// The simulation has been unmounted and cannot acquire resources again.
    TornDown,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownTheme { id } => {
                write!(f, "unknown theme '{id}' (expected city, mountain or desert)")
            }
            Error::MissingSurface { role } => {
                write!(f, "missing host surface for the {role} view")
            }
            Error::AlreadyMounted => write!(f, "simulation is already mounted"),
            Error::TornDown => write!(f, "simulation has been torn down"),
        }
    }
}

impl std::error::Error for Error {}
