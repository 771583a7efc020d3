//! The frame loop and its external interface.
//!
//! [`Simulation`] is the single context object a host talks to: it owns the
//! vehicle, both cameras, the scene resources and the render backend. It goes
//! through three states:
//!
//! ```text
//! Unmounted --mount--> Mounted --unmount--> TornDown
//! ```
//!
//! Ticks are no-ops outside `Mounted`, and a torn-down simulation never
//! acquires resources again.

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    camera::{CameraState, ChaseCamera, ChaseCameraConfig},
    decorations::DecorationGenerator,
    error::{Error, Result},
    minimap::{MinimapConfig, MinimapView},
    render::{HostSurfaces, RenderBackend, SurfaceRole, SurfaceSize},
    scene::{Disposal, SceneEvent},
    telemetry::TelemetrySnapshot,
    theme::ThemeId,
    vehicle::{
        ControlFlag, ControlIntent, DriveParams, INITIAL_BOOST_RESERVE, REFERENCE_TICK_RATE,
        VehicleModel, VehicleState, reference_ticks,
    },
    world::SceneResources,
};

/// Startup configuration.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// Theme applied at mount.
    pub initial_theme: ThemeId,
    /// Seed for decoration placement. `None` draws one from the OS.
    pub seed: Option<u64>,
    /// Boost gauge at the start of the drive.
    pub initial_boost: f32,
    pub drive: DriveParams,
    pub camera: ChaseCameraConfig,
    pub minimap: MinimapConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_theme: ThemeId::default(),
            seed: None,
            initial_boost: INITIAL_BOOST_RESERVE,
            drive: DriveParams::default(),
            camera: ChaseCameraConfig::default(),
            minimap: MinimapConfig::default(),
        }
    }
}

/// Whether a call to [`Simulation::tick`] did anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not mounted; nothing changed.
    Skipped,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Unmounted,
    Mounted,
    TornDown,
}

/// The simulation context.
pub struct Simulation<B: RenderBackend, R: Rng = StdRng> {
    backend: B,
    lifecycle: Lifecycle,
    /// Handed to the decoration generator at mount.
    rng: Option<R>,
    resources: Option<SceneResources<R>>,
    vehicle: VehicleModel,
    camera: ChaseCamera,
    minimap: MinimapView,
    intent: ControlIntent,
    theme: ThemeId,
    telemetry: Option<TelemetrySnapshot>,
    ticks: u64,
    elapsed: f32,
}

impl<B: RenderBackend> Simulation<B, StdRng> {
    /// Create an unmounted simulation seeded from `config`.
    pub fn new(backend: B, config: SimulationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(backend, config, rng)
    }
}

impl<B: RenderBackend, R: Rng> Simulation<B, R> {
    /// Create an unmounted simulation with an explicit random source.
    pub fn with_rng(backend: B, config: SimulationConfig, rng: R) -> Self {
        let state = VehicleState {
            boost_reserve: config.initial_boost.clamp(0.0, 100.0),
            ..VehicleState::default()
        };
        Self {
            backend,
            lifecycle: Lifecycle::Unmounted,
            rng: Some(rng),
            resources: None,
            vehicle: VehicleModel::new(config.drive, state),
            camera: ChaseCamera::new(config.camera),
            minimap: MinimapView::new(config.minimap),
            intent: ControlIntent::default(),
            theme: config.initial_theme,
            telemetry: None,
            ticks: 0,
            elapsed: 0.0,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Acquire the host surfaces and build the scene.
    ///
    /// On error the simulation stays unmounted and may be mounted again.
    pub fn mount(&mut self, surfaces: &HostSurfaces) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Mounted => return Err(Error::AlreadyMounted),
            Lifecycle::TornDown => return Err(Error::TornDown),
            Lifecycle::Unmounted => {}
        }

        let main = require_surface(surfaces.main, SurfaceRole::Main)?;
        let minimap = require_surface(surfaces.minimap, SurfaceRole::Minimap)?;
        let Some(rng) = self.rng.take() else {
            return Err(Error::TornDown);
        };

        self.camera.resize(main);
        self.minimap.resize(minimap);
        self.backend.resize(SurfaceRole::Main, main);
        self.backend.resize(SurfaceRole::Minimap, minimap);

        let mut resources = SceneResources::build(DecorationGenerator::new(rng), self.theme);
        resources.sync_vehicle(self.vehicle.state(), &self.vehicle.visuals());
        flush_events(&mut self.backend, &mut resources);
        self.resources = Some(resources);
        self.lifecycle = Lifecycle::Mounted;

        tracing::info!(theme = %self.theme, ?main, ?minimap, "Simulation mounted");
        Ok(())
    }

    /// Stop ticking and release every scene resource and host surface.
    ///
    /// Returns what was released the first time; later calls return `None`.
    pub fn unmount(&mut self) -> Option<Disposal> {
        let previous = std::mem::replace(&mut self.lifecycle, Lifecycle::TornDown);
        if previous != Lifecycle::Mounted {
            return None;
        }

        let mut resources = self.resources.take()?;
        let disposal = resources.dispose();
        flush_events(&mut self.backend, &mut resources);
        self.backend.release_surfaces();

        tracing::info!(?disposal, ticks = self.ticks, "Simulation torn down");
        Some(disposal)
    }

    pub fn is_mounted(&self) -> bool {
        self.lifecycle == Lifecycle::Mounted
    }

    pub fn is_torn_down(&self) -> bool {
        self.lifecycle == Lifecycle::TornDown
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Record one input flag; read at the start of the next tick.
    pub fn set_control_intent(&mut self, flag: ControlFlag, pressed: bool) {
        self.intent.set(flag, pressed);
    }

    pub fn intent(&self) -> ControlIntent {
        self.intent
    }

    /// Switch themes by identifier. Unknown identifiers change nothing.
    pub fn switch_theme(&mut self, id: &str) -> Result<ThemeId> {
        let theme = id.parse::<ThemeId>().inspect_err(|error| {
            tracing::warn!(%error, "Rejected theme switch");
        })?;
        self.select_theme(theme);
        Ok(theme)
    }

    /// Switch themes, rebuilding decorations immediately when mounted.
    ///
    /// Before mount the choice is remembered and applied at mount.
    pub fn select_theme(&mut self, theme: ThemeId) {
        self.theme = theme;
        let Some(resources) = self.resources.as_mut() else {
            tracing::debug!(%theme, "Theme recorded for mount");
            return;
        };
        if let Some(set) = resources.apply_theme(theme) {
            tracing::info!(%theme, props = set.stats.node_count() - 1, "Theme switched");
        }
        flush_events(&mut self.backend, resources);
    }

    pub fn theme(&self) -> ThemeId {
        self.theme
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Advance one frame and render both views.
    pub fn tick(&mut self, dt: f32) -> TickOutcome {
        if self.lifecycle != Lifecycle::Mounted {
            return TickOutcome::Skipped;
        }
        let Some(resources) = self.resources.as_mut() else {
            return TickOutcome::Skipped;
        };

        let intent = self.intent;
        let visuals = self.vehicle.update(&intent, dt);
        let state = self.vehicle.state();

        resources.sync_vehicle(state, &visuals);
        self.camera.update(state, dt);
        flush_events(&mut self.backend, resources);

        let scene = resources.scene();
        self.backend
            .render(SurfaceRole::Main, scene, &self.camera.view());
        self.minimap.recenter(state.position);
        self.backend
            .render(SurfaceRole::Minimap, scene, &self.minimap.view());

        self.telemetry = Some(TelemetrySnapshot::from_state(state));
        self.ticks += 1;
        self.elapsed += reference_ticks(dt) / REFERENCE_TICK_RATE;
        TickOutcome::Advanced
    }

    /// A host surface changed size.
    pub fn resize(&mut self, role: SurfaceRole, width: u32, height: u32) {
        let size = SurfaceSize::new(width, height);
        match role {
            SurfaceRole::Main => self.camera.resize(size),
            SurfaceRole::Minimap => self.minimap.resize(size),
        }
        if self.is_mounted() {
            self.backend.resize(role, size);
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Latest dashboard values; `None` until the first tick.
    pub fn telemetry(&self) -> Option<&TelemetrySnapshot> {
        self.telemetry.as_ref()
    }

    pub fn vehicle_state(&self) -> &VehicleState {
        self.vehicle.state()
    }

    pub fn camera_state(&self) -> CameraState {
        self.camera.state()
    }

    pub fn minimap(&self) -> &MinimapView {
        &self.minimap
    }

    pub fn resources(&self) -> Option<&SceneResources<R>> {
        self.resources.as_ref()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Simulated seconds, after per-frame clamping.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }
}

impl<B: RenderBackend, R: Rng> Drop for Simulation<B, R> {
    fn drop(&mut self) {
        self.unmount();
    }
}

fn require_surface(size: Option<SurfaceSize>, role: SurfaceRole) -> Result<SurfaceSize> {
    size.ok_or_else(|| {
        let error = Error::MissingSurface { role };
        tracing::error!(%error, "Mount failed");
        error
    })
}

/// Hand queued scene events to the backend.
///
/// With a lost context there is nothing left to free, so release events are
/// dropped instead of forwarded.
fn flush_events<B: RenderBackend, R: Rng>(backend: &mut B, resources: &mut SceneResources<R>) {
    let mut events = resources.scene_mut().drain_events();
    if backend.is_context_lost() {
        let before = events.len();
        events.retain(|event| {
            !matches!(
                event,
                SceneEvent::GeometryReleased(_)
                    | SceneEvent::MaterialReleased(_)
                    | SceneEvent::NodeDespawned(_)
            )
        });
        tracing::debug!(dropped = before - events.len(), "Graphics context lost");
    }
    if !events.is_empty() {
        backend.apply_events(&events, resources.scene());
    }
}
