//! Keyboard input mapped to driving intents.
//!
//! Actions are declared with `leafwing-input-manager` so bindings stay
//! rebindable. Each frame the held state of the four driving actions is
//! written into the simulation's control intent before the tick runs.

use bevy::prelude::*;
use bevy_egui::EguiContexts;
use cruise_core::{ControlFlag, ThemeId};
use leafwing_input_manager::{plugin::InputManagerSystem, prelude::*};

use crate::{DriveSet, host::SimulationHost};

// ============================================================================
// Action enum
// ============================================================================

/// Actions for driving and track selection.
#[derive(Actionlike, PartialEq, Eq, Hash, Clone, Copy, Debug, Reflect)]
pub enum DriveAction {
    /// Throttle (W / Up).
    Accelerate,
    /// Brake (S / Down).
    Brake,
    /// Turn left (A / Left).
    SteerLeft,
    /// Turn right (D / Right).
    SteerRight,
    /// Switch to the city track (1).
    CityTheme,
    /// Switch to the mountain track (2).
    MountainTheme,
    /// Switch to the desert track (3).
    DesertTheme,
    /// Toggle dashboard visibility (Q).
    ToggleUi,
}

impl DriveAction {
    /// Every action, in declaration order.
    pub const ALL: [DriveAction; 8] = [
        DriveAction::Accelerate,
        DriveAction::Brake,
        DriveAction::SteerLeft,
        DriveAction::SteerRight,
        DriveAction::CityTheme,
        DriveAction::MountainTheme,
        DriveAction::DesertTheme,
        DriveAction::ToggleUi,
    ];

    /// The control flag this action holds, if it is a driving action.
    fn control_flag(self) -> Option<ControlFlag> {
        match self {
            DriveAction::Accelerate => Some(ControlFlag::Accelerate),
            DriveAction::Brake => Some(ControlFlag::Brake),
            DriveAction::SteerLeft => Some(ControlFlag::SteerLeft),
            DriveAction::SteerRight => Some(ControlFlag::SteerRight),
            _ => None,
        }
    }

    /// The theme this action selects, if it is a track action.
    fn theme(self) -> Option<ThemeId> {
        match self {
            DriveAction::CityTheme => Some(ThemeId::City),
            DriveAction::MountainTheme => Some(ThemeId::Mountain),
            DriveAction::DesertTheme => Some(ThemeId::Desert),
            _ => None,
        }
    }
}

/// Keyboard-bound actions disabled while egui has keyboard focus.
const KEYBOARD_ACTIONS: &[DriveAction] = &[
    DriveAction::Accelerate,
    DriveAction::Brake,
    DriveAction::SteerLeft,
    DriveAction::SteerRight,
    DriveAction::CityTheme,
    DriveAction::MountainTheme,
    DriveAction::DesertTheme,
];

// ============================================================================
// Input map
// ============================================================================

/// Create the default input map for driving actions.
pub fn default_drive_input_map() -> InputMap<DriveAction> {
    InputMap::default()
        .with(DriveAction::Accelerate, KeyCode::KeyW)
        .with(DriveAction::Accelerate, KeyCode::ArrowUp)
        .with(DriveAction::Brake, KeyCode::KeyS)
        .with(DriveAction::Brake, KeyCode::ArrowDown)
        .with(DriveAction::SteerLeft, KeyCode::KeyA)
        .with(DriveAction::SteerLeft, KeyCode::ArrowLeft)
        .with(DriveAction::SteerRight, KeyCode::KeyD)
        .with(DriveAction::SteerRight, KeyCode::ArrowRight)
        .with(DriveAction::CityTheme, KeyCode::Digit1)
        .with(DriveAction::MountainTheme, KeyCode::Digit2)
        .with(DriveAction::DesertTheme, KeyCode::Digit3)
        .with(DriveAction::ToggleUi, KeyCode::KeyQ)
}

// ============================================================================
// Plugin
// ============================================================================

/// Plugin that registers the drive actions and feeds them to the simulation.
pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(InputManagerPlugin::<DriveAction>::default())
            .add_systems(Startup, spawn_driver)
            .add_systems(
                PreUpdate,
                manage_input_focus.after(InputManagerSystem::Update),
            )
            .add_systems(Update, apply_drive_input.in_set(DriveSet::Input));
    }
}

fn spawn_driver(mut commands: Commands) {
    commands.spawn((Name::new("Driver"), default_drive_input_map()));
}

/// Disable driving keys while a text field has focus. `ToggleUi` stays live.
fn manage_input_focus(
    mut action_query: Query<&mut ActionState<DriveAction>>,
    mut contexts: EguiContexts,
) {
    let egui_wants_kb = contexts
        .ctx_mut()
        .ok()
        .is_some_and(|ctx| ctx.wants_keyboard_input());

    for mut action_state in &mut action_query {
        for action in KEYBOARD_ACTIONS {
            if egui_wants_kb {
                action_state.disable_action(action);
            } else {
                action_state.enable_action(action);
            }
        }
    }
}

/// Write held driving keys into the control intent and apply track hotkeys.
fn apply_drive_input(
    action_query: Query<&ActionState<DriveAction>>,
    mut host: ResMut<SimulationHost>,
) {
    let Ok(action_state) = action_query.single() else {
        return;
    };

    for action in DriveAction::ALL {
        if let Some(flag) = action.control_flag() {
            host.sim.set_control_intent(flag, action_state.pressed(&action));
        }
    }

    // Reselecting the current track rolls a fresh layout.
    let selected = DriveAction::ALL
        .into_iter()
        .filter(|action| action_state.just_pressed(action))
        .find_map(DriveAction::theme);
    if let Some(theme) = selected {
        host.sim.select_theme(theme);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_driving_flag_has_an_action() {
        let flags: Vec<_> = DriveAction::ALL
            .into_iter()
            .filter_map(DriveAction::control_flag)
            .collect();
        assert_eq!(flags, ControlFlag::ALL);
    }

    #[test]
    fn test_every_theme_has_a_hotkey() {
        let themes: Vec<_> = DriveAction::ALL
            .into_iter()
            .filter_map(DriveAction::theme)
            .collect();
        assert_eq!(themes, ThemeId::ALL);
    }

    #[test]
    fn test_toggle_ui_survives_focus_loss() {
        assert!(!KEYBOARD_ACTIONS.contains(&DriveAction::ToggleUi));
    }
}
