//! Dashboard overlay: gauges, compass, track selection and a speed plot.

use std::collections::VecDeque;

use bevy::{
    diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin},
    prelude::*,
};
use bevy_egui::{EguiContexts, EguiPlugin, EguiPrimaryContextPass, egui};
use cruise_core::{TelemetrySnapshot, ThemeId, vehicle::GAUGE_MAX};
use egui_plot::{Line, Plot, PlotPoints};
use leafwing_input_manager::prelude::*;

use crate::{DriveSet, host::SimulationHost, input::DriveAction, mirror::SceneMirror};

/// Number of samples to keep in the speed history.
const SPEED_HISTORY_SIZE: usize = 120;

/// Resource controlling whether the dashboard is visible.
#[derive(Resource)]
pub struct UiVisible(pub bool);

impl Default for UiVisible {
    fn default() -> Self {
        Self(true)
    }
}

/// Recent speed samples for the plot.
#[derive(Resource, Default)]
struct SpeedHistory {
    speed: VecDeque<f32>,
}

impl SpeedHistory {
    fn push_sample(&mut self, speed: f32) {
        self.speed.push_back(speed);
        if self.speed.len() > SPEED_HISTORY_SIZE {
            self.speed.pop_front();
        }
    }

    fn clear(&mut self) {
        self.speed.clear();
    }
}

/// Which tab is currently selected in the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum DashboardTab {
    #[default]
    Drive,
    Diagnostics,
}

#[derive(Resource, Default)]
struct DashboardState {
    selected_tab: DashboardTab,
}

/// Plugin for the dashboard overlay.
pub struct DashboardPlugin;

impl Plugin for DashboardPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(EguiPlugin::default())
            .add_plugins(FrameTimeDiagnosticsPlugin::default())
            .init_resource::<UiVisible>()
            .init_resource::<SpeedHistory>()
            .init_resource::<DashboardState>()
            .add_systems(
                Update,
                (
                    toggle_ui_visible,
                    record_speed_history.after(DriveSet::Tick),
                ),
            )
            .add_systems(
                EguiPrimaryContextPass,
                dashboard_system.run_if(|visible: Res<UiVisible>| visible.0),
            );
    }
}

/// Toggle dashboard visibility with Q.
fn toggle_ui_visible(
    action_query: Query<&ActionState<DriveAction>>,
    mut visible: ResMut<UiVisible>,
) {
    let Ok(action_state) = action_query.single() else {
        return;
    };

    if action_state.just_pressed(&DriveAction::ToggleUi) {
        visible.0 = !visible.0;
    }
}

fn record_speed_history(host: Res<SimulationHost>, mut history: ResMut<SpeedHistory>) {
    if host.sim.is_mounted() {
        history.push_sample(host.sim.vehicle_state().speed);
    }
}

fn dashboard_system(
    mut contexts: EguiContexts,
    diagnostics: Res<DiagnosticsStore>,
    mut host: ResMut<SimulationHost>,
    mut history: ResMut<SpeedHistory>,
    mut state: ResMut<DashboardState>,
    mirror: Res<SceneMirror>,
) -> Result {
    let ctx = contexts.ctx_mut()?;

    let mut selected_theme = None;

    egui::Window::new("Dashboard")
        .default_pos([10.0, 10.0])
        .resizable(false)
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                for (tab, label) in [
                    (DashboardTab::Drive, "Drive"),
                    (DashboardTab::Diagnostics, "Diagnostics"),
                ] {
                    if ui
                        .selectable_label(state.selected_tab == tab, label)
                        .clicked()
                    {
                        state.selected_tab = tab;
                    }
                }
            });
            ui.separator();

            match state.selected_tab {
                DashboardTab::Drive => {
                    render_gauges(ui, host.sim.telemetry());
                    ui.separator();

                    ui.label("Track:");
                    ui.horizontal(|ui| {
                        let current = host.sim.theme();
                        for theme in ThemeId::ALL {
                            if ui
                                .selectable_label(current == theme, theme.as_str())
                                .clicked()
                            {
                                selected_theme = Some(theme);
                            }
                        }
                    });
                    ui.label("WASD / arrows to drive, 1-3 to switch track, Q to hide.");
                }
                DashboardTab::Diagnostics => {
                    let fps = diagnostics
                        .get(&FrameTimeDiagnosticsPlugin::FPS)
                        .and_then(bevy::diagnostic::Diagnostic::smoothed)
                        .unwrap_or(0.0);
                    ui.label(format!("FPS: {fps:.0}"));
                    ui.label(format!(
                        "Ticks: {} ({:.1} s simulated)",
                        host.sim.ticks(),
                        host.sim.elapsed()
                    ));
                    let position = host.sim.vehicle_state().position;
                    ui.label(format!("Position: ({:.1}, {:.1})", position.x, position.z));
                    ui.label(format!(
                        "Scene: {} entities, {} meshes, {} materials",
                        mirror.entity_count(),
                        mirror.mesh_count(),
                        mirror.material_count()
                    ));
                    ui.separator();

                    ui.label("Speed history:");
                    let speed_points: PlotPoints = history
                        .speed
                        .iter()
                        .enumerate()
                        .map(|(i, &v)| [i as f64, f64::from(v)])
                        .collect();
                    Plot::new("speed_plot")
                        .height(60.0)
                        .show_axes(false)
                        .allow_drag(false)
                        .allow_zoom(false)
                        .allow_scroll(false)
                        .include_y(0.0)
                        .include_y(f64::from(GAUGE_MAX))
                        .show(ui, |plot_ui| {
                            plot_ui.line(
                                Line::new("speed", speed_points).color(egui::Color32::LIGHT_BLUE),
                            );
                        });
                    if ui.button("Clear history").clicked() {
                        history.clear();
                    }
                }
            }
        });

    if let Some(theme) = selected_theme {
        host.sim.select_theme(theme);
    }

    Ok(())
}

fn render_gauges(ui: &mut egui::Ui, telemetry: Option<&TelemetrySnapshot>) {
    let Some(telemetry) = telemetry else {
        ui.label("Waiting for the first frame...");
        return;
    };

    for (label, value) in [
        ("Speed", telemetry.speed),
        ("Throttle", telemetry.throttle),
        ("Brake", telemetry.brake),
        ("Boost", telemetry.boost_reserve),
    ] {
        ui.horizontal(|ui| {
            ui.label(format!("{label}:"));
            ui.add(
                egui::ProgressBar::new(value as f32 / GAUGE_MAX)
                    .desired_width(160.0)
                    .text(value.to_string()),
            );
        });
    }
    ui.label(format!(
        "Heading: {} ({}°)",
        telemetry.heading_label, telemetry.heading_degrees
    ));
}
