//! Arcade vehicle kinematics.
//!
//! Pure functions over [`VehicleState`] that can be tested without a renderer.
//! Every coefficient is expressed per reference tick (60 Hz) and scaled by the
//! real frame time, so a 120 Hz display integrates the same curve in twice as
//! many, half-sized steps.

use glam::Vec3;
use serde::Serialize;

/// Tick rate the per-tick coefficients were tuned at.
pub const REFERENCE_TICK_RATE: f32 = 60.0;

/// Longest frame the integrator accepts; longer stalls are truncated.
pub const MAX_FRAME_DT: f32 = 0.1;

/// Upper bound of every gauge (speed, throttle, brake, boost reserve).
pub const GAUGE_MAX: f32 = 100.0;

/// Boost reserve a fresh vehicle starts with.
pub const INITIAL_BOOST_RESERVE: f32 = 75.0;

/// Pose and drivetrain state of the car.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VehicleState {
    /// World position; the car drives on the XZ plane.
    pub position: Vec3,
    /// Yaw in radians. 0 faces -Z, positive turns left.
    pub heading: f32,
    /// Scalar speed, km/h-equivalent.
    pub speed: f32,
    /// Throttle percentage.
    pub throttle: f32,
    /// Brake percentage.
    pub brake: f32,
    /// Boost gauge percentage.
    pub boost_reserve: f32,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            heading: 0.0,
            speed: 0.0,
            throttle: 0.0,
            brake: 0.0,
            boost_reserve: INITIAL_BOOST_RESERVE,
        }
    }
}

impl VehicleState {
    /// Unit vector the car travels along.
    pub fn forward(&self) -> Vec3 {
        Vec3::new(-self.heading.sin(), 0.0, -self.heading.cos())
    }
}

/// One driving input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControlFlag {
    Accelerate,
    Brake,
    SteerLeft,
    SteerRight,
}

impl ControlFlag {
    pub const ALL: [ControlFlag; 4] = [
        ControlFlag::Accelerate,
        ControlFlag::Brake,
        ControlFlag::SteerLeft,
        ControlFlag::SteerRight,
    ];
}

/// Momentary state of each driving input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlIntent {
    pub accelerate: bool,
    pub brake: bool,
    pub steer_left: bool,
    pub steer_right: bool,
}

impl ControlIntent {
    /// Set one flag. Last write wins.
    pub fn set(&mut self, flag: ControlFlag, pressed: bool) {
        match flag {
            ControlFlag::Accelerate => self.accelerate = pressed,
            ControlFlag::Brake => self.brake = pressed,
            ControlFlag::SteerLeft => self.steer_left = pressed,
            ControlFlag::SteerRight => self.steer_right = pressed,
        }
    }

    pub fn is_set(&self, flag: ControlFlag) -> bool {
        match flag {
            ControlFlag::Accelerate => self.accelerate,
            ControlFlag::Brake => self.brake,
            ControlFlag::SteerLeft => self.steer_left,
            ControlFlag::SteerRight => self.steer_right,
        }
    }
}

/// Tuning constants, all per reference tick.
#[derive(Clone, Debug)]
pub struct DriveParams {
    /// Constant part of the throttle ramp while accelerating.
    pub throttle_ramp: f32,
    /// Throttle divisor for the progressive part of the ramp.
    pub throttle_progression: f32,
    /// Brake applied per tick while braking.
    pub brake_rate: f32,
    /// Brake released per tick while accelerating.
    pub brake_release_rate: f32,
    /// Throttle released per tick while braking.
    pub throttle_release_braking: f32,
    /// Throttle released per tick while coasting.
    pub throttle_release_coasting: f32,
    /// Base yaw change per tick (radians).
    pub turn_rate: f32,
    /// Speed at which the turn rate reaches 1.5x the base.
    pub turn_reference_speed: f32,
    /// Turn factor at standstill.
    pub turn_floor: f32,
    /// Speed gained per tick at zero throttle and zero speed.
    pub acceleration_base: f32,
    /// Additional acceleration at full throttle.
    pub acceleration_throttle_gain: f32,
    /// Speed divisor for the speed-proportional acceleration term.
    pub acceleration_speed_divisor: f32,
    /// Speed lost per tick while the brake is above the threshold.
    pub deceleration_braking: f32,
    /// Speed lost per tick otherwise.
    pub deceleration_coasting: f32,
    /// Brake fraction above which braking deceleration applies.
    pub brake_deceleration_threshold: f32,
    /// World units travelled per tick per unit of speed.
    pub distance_per_speed: f32,
    /// Wheel rotation (radians) per tick per unit of speed.
    pub wheel_spin_per_speed: f32,
    /// Taillight intensity with the brake released.
    pub taillight_base: f32,
    /// Extra taillight intensity at full brake.
    pub taillight_gain: f32,
    /// Boost drains above this speed.
    pub boost_drain_speed: f32,
    /// Boost regenerates below this speed.
    pub boost_regen_speed: f32,
    /// Boost drained per tick.
    pub boost_drain_rate: f32,
    /// Boost regenerated per tick.
    pub boost_regen_rate: f32,
}

impl Default for DriveParams {
    fn default() -> Self {
        Self {
            throttle_ramp: 2.0,
            throttle_progression: 25.0,
            brake_rate: 5.0,
            brake_release_rate: 5.0,
            throttle_release_braking: 2.0,
            throttle_release_coasting: 1.0,
            turn_rate: 0.03,
            turn_reference_speed: 50.0,
            turn_floor: 0.5,
            acceleration_base: 0.5,
            acceleration_throttle_gain: 0.5,
            acceleration_speed_divisor: 200.0,
            deceleration_braking: 2.0,
            deceleration_coasting: 1.0,
            brake_deceleration_threshold: 0.1,
            distance_per_speed: 0.01,
            wheel_spin_per_speed: 0.01,
            taillight_base: 1.0,
            taillight_gain: 5.0,
            boost_drain_speed: 80.0,
            boost_regen_speed: 50.0,
            boost_drain_rate: 0.2,
            boost_regen_rate: 0.1,
        }
    }
}

/// Visual side effects of a tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepOutput {
    /// Distance travelled this tick.
    pub distance: f32,
    /// Wheel rotation added this tick (radians).
    pub wheel_spin: f32,
    /// Taillight emissive intensity.
    pub taillight_intensity: f32,
}

/// Convert a frame time into reference ticks.
///
/// Non-finite and negative frame times count as zero.
#[must_use]
pub fn reference_ticks(dt: f32) -> f32 {
    if dt.is_finite() {
        dt.clamp(0.0, MAX_FRAME_DT) * REFERENCE_TICK_RATE
    } else {
        0.0
    }
}

/// Advance the vehicle by one frame of `dt` seconds.
///
/// Total over its input domain: gauges stay within `[0, GAUGE_MAX]`.
pub fn step(
    params: &DriveParams,
    state: &mut VehicleState,
    intent: &ControlIntent,
    dt: f32,
) -> StepOutput {
    let k = reference_ticks(dt);

    // Pedals.
    if intent.accelerate {
        let ramp = params.throttle_ramp + state.throttle / params.throttle_progression;
        state.throttle = (state.throttle + ramp * k).min(GAUGE_MAX);
        state.brake = (state.brake - params.brake_release_rate * k).max(0.0);
    } else if intent.brake {
        state.brake = (state.brake + params.brake_rate * k).min(GAUGE_MAX);
        state.throttle = (state.throttle - params.throttle_release_braking * k).max(0.0);
    } else {
        state.throttle = (state.throttle - params.throttle_release_coasting * k).max(0.0);
    }

    // Steering scales with the speed from before this tick's update.
    let turn = params.turn_rate * (state.speed / params.turn_reference_speed + params.turn_floor);
    if intent.steer_left {
        state.heading += turn * k;
    }
    if intent.steer_right {
        state.heading -= turn * k;
    }

    // Speed chases the pedal target.
    let throttle_factor = state.throttle / GAUGE_MAX;
    let brake_factor = state.brake / GAUGE_MAX;
    let target = throttle_factor * GAUGE_MAX * (1.0 - brake_factor);
    let braking = intent.brake && !intent.accelerate;
    if state.speed < target && !braking {
        let rate = params.acceleration_base
            + params.acceleration_throttle_gain * throttle_factor
            + state.speed / params.acceleration_speed_divisor;
        state.speed += rate * k;
    } else if state.speed > target {
        let rate = if brake_factor > params.brake_deceleration_threshold {
            params.deceleration_braking
        } else {
            params.deceleration_coasting
        };
        state.speed -= rate * k;
    }
    state.speed = state.speed.clamp(0.0, GAUGE_MAX);

    let distance = state.speed * params.distance_per_speed * k;
    state.position += state.forward() * distance;

    state.boost_reserve = boost_step(params, state.boost_reserve, state.speed, k);

    StepOutput {
        distance,
        wheel_spin: state.speed * params.wheel_spin_per_speed * k,
        taillight_intensity: params.taillight_base + params.taillight_gain * brake_factor,
    }
}

/// Drain the boost gauge at high speed, refill it at low speed.
pub fn boost_step(params: &DriveParams, reserve: f32, speed: f32, k: f32) -> f32 {
    let next = if speed > params.boost_drain_speed && reserve > 0.0 {
        reserve - params.boost_drain_rate * k
    } else if speed < params.boost_regen_speed && reserve < GAUGE_MAX {
        reserve + params.boost_regen_rate * k
    } else {
        reserve
    };
    next.clamp(0.0, GAUGE_MAX)
}

// ============================================================================
// Heading
// ============================================================================

/// Eight-way compass label, counter-clockwise from forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CompassPoint {
    N,
    NW,
    W,
    SW,
    S,
    SE,
    E,
    NE,
}

impl CompassPoint {
    const ORDER: [CompassPoint; 8] = [
        CompassPoint::N,
        CompassPoint::NW,
        CompassPoint::W,
        CompassPoint::SW,
        CompassPoint::S,
        CompassPoint::SE,
        CompassPoint::E,
        CompassPoint::NE,
    ];

    /// Bucket normalized degrees into 45° sectors centred on each point.
    pub fn from_degrees(degrees: f32) -> Self {
        let sector = ((normalize_degrees(degrees) + 22.5) / 45.0).floor() as usize % 8;
        Self::ORDER[sector]
    }

    pub fn label(self) -> &'static str {
        match self {
            CompassPoint::N => "N",
            CompassPoint::NW => "NW",
            CompassPoint::W => "W",
            CompassPoint::SW => "SW",
            CompassPoint::S => "S",
            CompassPoint::SE => "SE",
            CompassPoint::E => "E",
            CompassPoint::NE => "NE",
        }
    }
}

/// Wrap any angle in degrees into `[0, 360)`.
#[must_use]
pub fn normalize_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Heading in degrees, normalized into `[0, 360)`.
#[must_use]
pub fn heading_degrees(heading: f32) -> f32 {
    normalize_degrees(heading.to_degrees())
}

// ============================================================================
// Model
// ============================================================================

/// Visual state derived from the drivetrain, applied to the rig each tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VehicleVisuals {
    /// Accumulated wheel rotation (radians), wrapped to one turn.
    pub wheel_angle: f32,
    pub taillight_intensity: f32,
}

impl Default for VehicleVisuals {
    fn default() -> Self {
        Self {
            wheel_angle: 0.0,
            taillight_intensity: DriveParams::default().taillight_base,
        }
    }
}

/// Owner of the vehicle state.
#[derive(Clone, Debug, Default)]
pub struct VehicleModel {
    params: DriveParams,
    state: VehicleState,
    visuals: VehicleVisuals,
}

impl VehicleModel {
    #[must_use]
    pub fn new(params: DriveParams, state: VehicleState) -> Self {
        Self {
            params,
            state,
            visuals: VehicleVisuals::default(),
        }
    }

    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    pub fn visuals(&self) -> VehicleVisuals {
        self.visuals
    }

    pub fn params(&self) -> &DriveParams {
        &self.params
    }

    /// Advance one frame and return the resulting visuals.
    pub fn update(&mut self, intent: &ControlIntent, dt: f32) -> VehicleVisuals {
        let out = step(&self.params, &mut self.state, intent, dt);
        self.visuals.wheel_angle =
            (self.visuals.wheel_angle + out.wheel_spin).rem_euclid(std::f32::consts::TAU);
        self.visuals.taillight_intensity = out.taillight_intensity;
        self.visuals
    }

    /// Direct state access for scripted scenarios and tests.
    pub fn state_mut(&mut self) -> &mut VehicleState {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn accelerate() -> ControlIntent {
        ControlIntent {
            accelerate: true,
            ..Default::default()
        }
    }

    fn brake() -> ControlIntent {
        ControlIntent {
            brake: true,
            ..Default::default()
        }
    }

    fn at_rest() -> VehicleModel {
        VehicleModel::new(DriveParams::default(), VehicleState::default())
    }

    #[test]
    fn test_reference_tick_matches_constants() {
        let params = DriveParams::default();
        let mut state = VehicleState::default();
        step(&params, &mut state, &accelerate(), DT);
        assert!((state.throttle - 2.0).abs() < 1e-5);
        // 0.5 + 0.5 * 0.02 + 0 / 200
        assert!((state.speed - 0.51).abs() < 1e-5);
    }

    #[test]
    fn test_accelerate_from_rest_is_monotonic() {
        let mut model = at_rest();
        let mut previous = model.state().clone();
        for _ in 0..600 {
            model.update(&accelerate(), DT);
            let state = model.state();
            assert!(state.throttle >= previous.throttle);
            assert!(state.speed >= previous.speed);
            let target = state.throttle * (1.0 - state.brake / GAUGE_MAX);
            // Never overshoot by more than one tick's acceleration.
            assert!(state.speed <= target + 1.5 + 1e-4);
            previous = state.clone();
        }
        assert!((model.state().throttle - GAUGE_MAX).abs() < f32::EPSILON);
        assert!((model.state().speed - GAUGE_MAX).abs() < f32::EPSILON);
    }

    #[test]
    fn test_brake_stops_without_speeding_up() {
        // Lagging state: throttle high, speed still low.
        for warmup in [30, 120, 600] {
            let mut model = at_rest();
            for _ in 0..warmup {
                model.update(&accelerate(), DT);
            }
            assert!(model.state().speed > 0.0);

            let mut previous = model.state().speed;
            let mut stopped_after = None;
            for tick in 0..200 {
                model.update(&brake(), DT);
                let speed = model.state().speed;
                assert!(speed <= previous, "speed rose while braking");
                previous = speed;
                if speed == 0.0 {
                    stopped_after = Some(tick);
                    break;
                }
            }
            assert!(stopped_after.is_some(), "did not stop after {warmup} warmup ticks");
        }
    }

    #[test]
    fn test_accelerate_wins_over_brake() {
        let both = ControlIntent {
            accelerate: true,
            brake: true,
            ..Default::default()
        };
        let mut model = at_rest();
        for _ in 0..300 {
            model.update(&both, DT);
        }
        let state = model.state();
        assert!((state.throttle - GAUGE_MAX).abs() < f32::EPSILON);
        assert!(state.brake.abs() < f32::EPSILON);
        assert!(state.speed > 50.0, "speed stuck at {}", state.speed);
    }

    #[test]
    fn test_coasting_keeps_brake() {
        let mut model = at_rest();
        for _ in 0..10 {
            model.update(&brake(), DT);
        }
        let brake_level = model.state().brake;
        model.update(&ControlIntent::default(), DT);
        assert!((model.state().brake - brake_level).abs() < f32::EPSILON);
    }

    #[test]
    fn test_turn_rate_uses_speed_before_update() {
        let params = DriveParams::default();
        let mut state = VehicleState {
            speed: 50.0,
            ..Default::default()
        };
        let intent = ControlIntent {
            steer_left: true,
            ..Default::default()
        };
        step(&params, &mut state, &intent, DT);
        // 0.03 * (50 / 50 + 0.5), even though speed dropped this tick.
        assert!((state.heading - 0.045).abs() < 1e-6);
        assert!(state.speed < 50.0);
    }

    #[test]
    fn test_opposite_steering_cancels() {
        let params = DriveParams::default();
        let mut state = VehicleState {
            speed: 40.0,
            ..Default::default()
        };
        let intent = ControlIntent {
            steer_left: true,
            steer_right: true,
            ..Default::default()
        };
        step(&params, &mut state, &intent, DT);
        assert!(state.heading.abs() < 1e-6);
    }

    #[test]
    fn test_drives_along_negative_z_at_zero_heading() {
        let mut model = at_rest();
        for _ in 0..120 {
            model.update(&accelerate(), DT);
        }
        let position = model.state().position;
        assert!(position.x.abs() < 1e-4);
        assert!(position.z < -1.0);
    }

    #[test]
    fn test_frame_rate_independence() {
        let mut slow = at_rest();
        let mut fast = at_rest();
        for _ in 0..60 {
            slow.update(&accelerate(), 1.0 / 60.0);
        }
        for _ in 0..120 {
            fast.update(&accelerate(), 1.0 / 120.0);
        }
        assert!((slow.state().speed - fast.state().speed).abs() < 2.0);
        assert!((slow.state().throttle - fast.state().throttle).abs() < 2.0);
        let travelled = slow.state().position.length();
        assert!((travelled - fast.state().position.length()).abs() < travelled * 0.05);
    }

    #[test]
    fn test_taillights_follow_brake() {
        let mut model = at_rest();
        assert!((model.update(&ControlIntent::default(), DT).taillight_intensity - 1.0).abs() < 1e-6);
        for _ in 0..40 {
            model.update(&brake(), DT);
        }
        assert!((model.visuals().taillight_intensity - 6.0).abs() < 1e-4);
    }

    #[test]
    fn test_boost_drains_at_high_speed() {
        let mut model = at_rest();
        let mut previous = model.state().boost_reserve;
        for _ in 0..600 {
            model.state_mut().speed = GAUGE_MAX;
            model.update(&ControlIntent::default(), DT);
            let reserve = model.state().boost_reserve;
            if previous > 0.0 {
                assert!(reserve < previous);
            } else {
                assert!(reserve.abs() < f32::EPSILON);
            }
            previous = reserve;
        }
        assert!(previous.abs() < f32::EPSILON);
    }

    #[test]
    fn test_boost_regenerates_at_low_speed() {
        let mut model = VehicleModel::new(
            DriveParams::default(),
            VehicleState {
                boost_reserve: 0.0,
                ..Default::default()
            },
        );
        let mut previous = model.state().boost_reserve;
        for _ in 0..1200 {
            model.state_mut().speed = 0.0;
            model.update(&ControlIntent::default(), DT);
            let reserve = model.state().boost_reserve;
            if previous < GAUGE_MAX {
                assert!(reserve > previous);
            } else {
                assert!((reserve - GAUGE_MAX).abs() < f32::EPSILON);
            }
            previous = reserve;
        }
        assert!((previous - GAUGE_MAX).abs() < f32::EPSILON);
    }

    #[test]
    fn test_boost_holds_between_thresholds() {
        let params = DriveParams::default();
        assert!((boost_step(&params, 42.0, 65.0, 1.0) - 42.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_compass_buckets() {
        assert_eq!(CompassPoint::from_degrees(0.0), CompassPoint::N);
        assert_eq!(CompassPoint::from_degrees(22.4), CompassPoint::N);
        assert_eq!(CompassPoint::from_degrees(22.5), CompassPoint::NW);
        assert_eq!(CompassPoint::from_degrees(45.0), CompassPoint::NW);
        assert_eq!(CompassPoint::from_degrees(90.0), CompassPoint::W);
        assert_eq!(CompassPoint::from_degrees(180.0), CompassPoint::S);
        assert_eq!(CompassPoint::from_degrees(270.0), CompassPoint::E);
        assert_eq!(CompassPoint::from_degrees(337.5), CompassPoint::N);
        assert_eq!(
            CompassPoint::from_degrees(360.0),
            CompassPoint::from_degrees(0.0)
        );
        assert_eq!(CompassPoint::from_degrees(-45.0), CompassPoint::NE);
    }

    #[test]
    fn test_heading_degrees_wraps() {
        let full_turn = heading_degrees(std::f32::consts::TAU);
        assert!(full_turn < 1e-3 || full_turn > 360.0 - 1e-3);
        assert_eq!(
            CompassPoint::from_degrees(full_turn),
            CompassPoint::from_degrees(0.0)
        );
        assert!((heading_degrees(-std::f32::consts::FRAC_PI_2) - 270.0).abs() < 1e-3);
        assert!(heading_degrees(-1e-9) < 360.0);
    }

    #[test]
    fn test_bad_frame_times_are_ignored() {
        let mut model = at_rest();
        let before = model.state().clone();
        model.update(&accelerate(), f32::NAN);
        model.update(&accelerate(), -1.0);
        assert_eq!(model.state(), &before);
    }

    fn intent_strategy() -> impl Strategy<Value = ControlIntent> {
        (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
            |(accelerate, brake, steer_left, steer_right)| ControlIntent {
                accelerate,
                brake,
                steer_left,
                steer_right,
            },
        )
    }

    fn dt_strategy() -> impl Strategy<Value = f32> {
        prop_oneof![
            8 => 0.0f32..0.05,
            1 => any::<f32>(),
        ]
    }

    proptest! {
        #[test]
        fn prop_gauges_stay_in_range(
            ticks in proptest::collection::vec((intent_strategy(), dt_strategy()), 1..400)
        ) {
            let mut model = at_rest();
            for (intent, dt) in ticks {
                model.update(&intent, dt);
                let s = model.state();
                for gauge in [s.speed, s.throttle, s.brake, s.boost_reserve] {
                    prop_assert!((0.0..=GAUGE_MAX).contains(&gauge));
                }
            }
        }
    }
}
