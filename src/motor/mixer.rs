//! # Joystick Mixer Module
//!
//! Maps a two-axis joystick sample onto the three actuators of the robot:
//! the left and right drive motors and the lift.
//!
//! ## Modes
//!
//! | Condition | Command |
//! |-----------|---------|
//! | `\|x\| < deadzone` and `\|y\| < deadzone` | Stop everything |
//! | `\|x\| > lift_threshold` | Lift up (x > 0) or down, drive stopped |
//! | otherwise | Differential drive, lift off |
//!
//! The dead zone needs *both* axes near center, while the lift override only
//! looks at `x`. Pushing the stick hard sideways therefore always moves the
//! lift, whatever `y` says.
//!
//! ## Differential Drive
//!
//! ```text
//! turn  = x * turn_gain
//! power = -y              (stick forward is negative y)
//! left  = clamp(power + turn, -1, 1) * max_speed
//! right = clamp(power - turn, -1, 1) * max_speed
//! ```
//!
//! ## Usage
//!
//! ```
//! use joydrive::motor::mixer::{AxisSample, DriveCommand, Mixer};
//!
//! let mixer = Mixer::default();
//! let cmd = mixer.mix(AxisSample::new(0.0, -1.0));
//! assert_eq!(cmd, DriveCommand::Drive { left: 2000.0, right: 2000.0 });
//! ```

use crate::config::MotorConfig;

/// Duty cycles are expressed in millionths of the PWM period.
pub const DUTY_SCALE: u32 = 1_000_000;

/// One joystick reading. Both axes are nominally in -1.0..=1.0 but are not
/// range-checked here.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisSample {
    /// Horizontal axis: turn, or lift when pushed past the lift threshold.
    pub x: f64,
    /// Vertical axis: negative is forward.
    pub y: f64,
}

impl AxisSample {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Direction of travel for the lift actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiftDirection {
    Up,
    Down,
}

impl LiftDirection {
    /// Level written to the lift direction pin.
    #[must_use]
    pub fn is_high(self) -> bool {
        matches!(self, LiftDirection::Up)
    }
}

/// Actuator targets derived from one [`AxisSample`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriveCommand {
    /// Both drive motors and the lift off.
    Stop,
    /// Lift on at full power, both drive motors off.
    Lift(LiftDirection),
    /// Lift off, drive motors at signed speeds in `-max_speed..=max_speed`.
    Drive { left: f64, right: f64 },
}

/// Pure joystick-to-actuator mapping.
#[derive(Debug, Clone, Copy)]
pub struct Mixer {
    max_speed: f64,
    turn_gain: f64,
    deadzone: f64,
    lift_threshold: f64,
}

impl Default for Mixer {
    fn default() -> Self {
        Self::from_config(&MotorConfig::default())
    }
}

impl Mixer {
    /// Creates a mixer from the `[motor]` configuration section.
    #[must_use]
    pub fn from_config(config: &MotorConfig) -> Self {
        Self {
            max_speed: config.max_speed,
            turn_gain: config.turn_gain,
            deadzone: config.deadzone,
            lift_threshold: config.lift_threshold,
        }
    }

    /// Returns the speed magnitude that maps to a 100% duty cycle.
    #[must_use]
    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    /// Returns true when both axes are strictly inside the dead zone.
    #[must_use]
    pub fn in_deadzone(&self, sample: AxisSample) -> bool {
        sample.x.abs() < self.deadzone && sample.y.abs() < self.deadzone
    }

    /// Returns true when `|x|` is strictly above the lift threshold.
    #[must_use]
    pub fn is_lift_override(&self, sample: AxisSample) -> bool {
        sample.x.abs() > self.lift_threshold
    }

    /// Computes actuator targets for a joystick sample.
    ///
    /// # Examples
    ///
    /// ```
    /// use joydrive::motor::mixer::{AxisSample, DriveCommand, LiftDirection, Mixer};
    ///
    /// let mixer = Mixer::default();
    ///
    /// assert_eq!(mixer.mix(AxisSample::new(0.03, 0.02)), DriveCommand::Stop);
    /// assert_eq!(
    ///     mixer.mix(AxisSample::new(1.0, 0.0)),
    ///     DriveCommand::Lift(LiftDirection::Up)
    /// );
    /// ```
    #[must_use]
    pub fn mix(&self, sample: AxisSample) -> DriveCommand {
        if self.in_deadzone(sample) {
            return DriveCommand::Stop;
        }

        if self.is_lift_override(sample) {
            let direction = if sample.x > 0.0 {
                LiftDirection::Up
            } else {
                LiftDirection::Down
            };
            return DriveCommand::Lift(direction);
        }

        let turn = sample.x * self.turn_gain;
        let power = -sample.y;

        DriveCommand::Drive {
            left: (power + turn).clamp(-1.0, 1.0) * self.max_speed,
            right: (power - turn).clamp(-1.0, 1.0) * self.max_speed,
        }
    }

    /// Converts a signed speed into a duty cycle in millionths.
    ///
    /// # Examples
    ///
    /// ```
    /// use joydrive::motor::mixer::{Mixer, DUTY_SCALE};
    ///
    /// let mixer = Mixer::default();
    /// assert_eq!(mixer.duty_cycle(-1000.0), DUTY_SCALE / 2);
    /// assert_eq!(mixer.duty_cycle(5000.0), DUTY_SCALE);
    /// ```
    #[must_use]
    pub fn duty_cycle(&self, speed: f64) -> u32 {
        let fraction = (speed.abs() / self.max_speed).clamp(0.0, 1.0);
        (fraction * f64::from(DUTY_SCALE)).round() as u32
    }
}
