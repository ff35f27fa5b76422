//! # GPIO Hardware Module
//!
//! Trait abstraction over the six motor-driver outputs, plus the Raspberry Pi
//! implementation built on `rppal`.
//!
//! ## Outputs
//!
//! | Output | Default BCM pin | Kind |
//! |--------|-----------------|------|
//! | Left drive PWM | 17 | software PWM |
//! | Left drive direction | 27 | digital |
//! | Right drive PWM | 18 | software PWM |
//! | Right drive direction | 22 | digital |
//! | Lift enable | 23 | digital (on/off) |
//! | Lift direction | 24 | digital |

use rppal::gpio::{Gpio, OutputPin};
use tracing::{debug, info};

use super::mixer::DUTY_SCALE;
use crate::config::PinConfig;
use crate::error::Result;

/// Logical motor-driver outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Output {
    LeftPwm,
    LeftDir,
    RightPwm,
    RightDir,
    LiftEnable,
    LiftDir,
}

/// The two PWM-driven drive motors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveChannel {
    Left,
    Right,
}

impl DriveChannel {
    /// Output carrying the PWM signal for this motor.
    #[must_use]
    pub fn pwm(self) -> Output {
        match self {
            DriveChannel::Left => Output::LeftPwm,
            DriveChannel::Right => Output::RightPwm,
        }
    }

    /// Output selecting the rotation direction of this motor.
    #[must_use]
    pub fn dir(self) -> Output {
        match self {
            DriveChannel::Left => Output::LeftDir,
            DriveChannel::Right => Output::RightDir,
        }
    }
}

/// Trait for motor-driver pin operations.
///
/// Writes are synchronous and expected to return quickly.
#[cfg_attr(test, mockall::automock)]
pub trait GpioBackend: Send {
    /// Drive a digital output high or low.
    fn write(&mut self, output: Output, high: bool) -> Result<()>;

    /// Run a PWM carrier on an output. `duty_cycle` is in millionths.
    fn set_pwm(&mut self, output: Output, frequency_hz: f64, duty_cycle: u32) -> Result<()>;
}

/// Raspberry Pi GPIO via `rppal` software PWM.
pub struct RppalGpio {
    left_pwm: OutputPin,
    left_dir: OutputPin,
    right_pwm: OutputPin,
    right_dir: OutputPin,
    lift_enable: OutputPin,
    lift_dir: OutputPin,
}

impl std::fmt::Debug for RppalGpio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RppalGpio")
            .field("left_pwm", &self.left_pwm.pin())
            .field("right_pwm", &self.right_pwm.pin())
            .field("lift_enable", &self.lift_enable.pin())
            .finish_non_exhaustive()
    }
}

impl RppalGpio {
    /// Open the GPIO chip and claim all six pins as outputs driven low.
    ///
    /// Both drive PWM carriers are started at `frequency_hz` with a zero duty
    /// cycle.
    ///
    /// # Errors
    ///
    /// Returns `Gpio` if the chip cannot be opened (not a Raspberry Pi, missing
    /// permissions) or a pin is already in use.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use joydrive::config::PinConfig;
    /// use joydrive::motor::hardware::RppalGpio;
    ///
    /// let gpio = RppalGpio::open(&PinConfig::default(), 1000.0)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(pins: &PinConfig, frequency_hz: f64) -> Result<Self> {
        let gpio = Gpio::new()?;
        let claim = |pin: u8| -> Result<OutputPin> {
            debug!("Claiming GPIO {} as output", pin);
            Ok(gpio.get(pin)?.into_output_low())
        };

        let mut hw = Self {
            left_pwm: claim(pins.pwm_left)?,
            left_dir: claim(pins.dir_left)?,
            right_pwm: claim(pins.pwm_right)?,
            right_dir: claim(pins.dir_right)?,
            lift_enable: claim(pins.pwm_lift)?,
            lift_dir: claim(pins.dir_lift)?,
        };

        hw.set_pwm(Output::LeftPwm, frequency_hz, 0)?;
        hw.set_pwm(Output::RightPwm, frequency_hz, 0)?;

        info!("GPIO initialized, PWM running at {} Hz", frequency_hz);
        Ok(hw)
    }

    fn pin(&mut self, output: Output) -> &mut OutputPin {
        match output {
            Output::LeftPwm => &mut self.left_pwm,
            Output::LeftDir => &mut self.left_dir,
            Output::RightPwm => &mut self.right_pwm,
            Output::RightDir => &mut self.right_dir,
            Output::LiftEnable => &mut self.lift_enable,
            Output::LiftDir => &mut self.lift_dir,
        }
    }
}

impl GpioBackend for RppalGpio {
    fn write(&mut self, output: Output, high: bool) -> Result<()> {
        let pin = self.pin(output);
        if high {
            pin.set_high();
        } else {
            pin.set_low();
        }
        Ok(())
    }

    fn set_pwm(&mut self, output: Output, frequency_hz: f64, duty_cycle: u32) -> Result<()> {
        let fraction = f64::from(duty_cycle.min(DUTY_SCALE)) / f64::from(DUTY_SCALE);
        self.pin(output).set_pwm_frequency(frequency_hz, fraction)?;
        Ok(())
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::error::JoydriveError;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Last value written to each output plus a call log.
    #[derive(Debug, Default)]
    pub struct GpioState {
        pub levels: HashMap<Output, bool>,
        pub duty: HashMap<Output, u32>,
        pub frequency: HashMap<Output, f64>,
        pub calls: usize,
        pub fail: bool,
        pub fail_next: usize,
    }

    impl GpioState {
        fn should_fail(&mut self) -> bool {
            if self.fail_next > 0 {
                self.fail_next -= 1;
                return true;
            }
            self.fail
        }
    }

    /// Recording GPIO backend for testing
    #[derive(Clone, Default)]
    pub struct RecordingGpio {
        pub state: Arc<Mutex<GpioState>>,
    }

    impl RecordingGpio {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn level(&self, output: Output) -> bool {
            self.state.lock().unwrap().levels.get(&output).copied().unwrap_or(false)
        }

        pub fn duty(&self, output: Output) -> u32 {
            self.state.lock().unwrap().duty.get(&output).copied().unwrap_or(0)
        }

        pub fn frequency(&self, output: Output) -> Option<f64> {
            self.state.lock().unwrap().frequency.get(&output).copied()
        }

        pub fn calls(&self) -> usize {
            self.state.lock().unwrap().calls
        }

        pub fn set_fail(&self, fail: bool) {
            self.state.lock().unwrap().fail = fail;
        }

        /// Fail only the next `count` operations.
        pub fn fail_next(&self, count: usize) {
            self.state.lock().unwrap().fail_next = count;
        }

        /// Pretend a previous session left everything running.
        pub fn set_all_running(&self) {
            let mut state = self.state.lock().unwrap();
            state.duty.insert(Output::LeftPwm, DUTY_SCALE);
            state.duty.insert(Output::RightPwm, DUTY_SCALE);
            state.levels.insert(Output::LiftEnable, true);
        }
    }

    impl GpioBackend for RecordingGpio {
        fn write(&mut self, output: Output, high: bool) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            if state.should_fail() {
                return Err(JoydriveError::Gpio("Mock write error".to_string()));
            }
            state.calls += 1;
            state.levels.insert(output, high);
            Ok(())
        }

        fn set_pwm(&mut self, output: Output, frequency_hz: f64, duty_cycle: u32) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            if state.should_fail() {
                return Err(JoydriveError::Gpio("Mock PWM error".to_string()));
            }
            state.calls += 1;
            state.duty.insert(output, duty_cycle);
            state.frequency.insert(output, frequency_hz);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::RecordingGpio;
    use super::*;

    #[test]
    fn test_drive_channel_outputs() {
        assert_eq!(DriveChannel::Left.pwm(), Output::LeftPwm);
        assert_eq!(DriveChannel::Left.dir(), Output::LeftDir);
        assert_eq!(DriveChannel::Right.pwm(), Output::RightPwm);
        assert_eq!(DriveChannel::Right.dir(), Output::RightDir);
    }

    #[test]
    fn test_recording_gpio_tracks_state() {
        let gpio = RecordingGpio::new();
        let mut backend = gpio.clone();

        backend.write(Output::LiftDir, true).unwrap();
        backend.set_pwm(Output::LeftPwm, 1000.0, 250_000).unwrap();

        assert!(gpio.level(Output::LiftDir));
        assert_eq!(gpio.duty(Output::LeftPwm), 250_000);
        assert_eq!(gpio.frequency(Output::LeftPwm), Some(1000.0));
        assert_eq!(gpio.calls(), 2);
    }

    #[test]
    fn test_recording_gpio_failure() {
        let gpio = RecordingGpio::new();
        gpio.set_fail(true);
        let mut backend = gpio.clone();

        assert!(backend.write(Output::LiftEnable, true).is_err());
        assert!(backend.set_pwm(Output::RightPwm, 1000.0, 1).is_err());
        assert_eq!(gpio.calls(), 0);
    }

    #[test]
    fn test_recording_gpio_fail_next() {
        let gpio = RecordingGpio::new();
        gpio.fail_next(1);
        let mut backend = gpio.clone();

        assert!(backend.write(Output::LiftEnable, true).is_err());
        assert!(backend.write(Output::LiftEnable, true).is_ok());
        assert!(gpio.level(Output::LiftEnable));
    }

    #[test]
    fn test_open_with_invalid_pin_returns_error() {
        // Pin 99 does not exist on any Pi; on other machines Gpio::new fails first
        let pins = PinConfig {
            pwm_left: 99,
            ..PinConfig::default()
        };
        assert!(RppalGpio::open(&pins, 1000.0).is_err());
    }

    // Hardware test - only runs on a Raspberry Pi with the motor driver wired up
    #[test]
    #[ignore] // Run with: cargo test -- --ignored
    fn test_open_with_real_hardware() {
        match RppalGpio::open(&PinConfig::default(), 1000.0) {
            Ok(mut gpio) => {
                assert!(gpio.set_pwm(Output::LeftPwm, 1000.0, 0).is_ok());
                assert!(gpio.write(Output::LiftEnable, false).is_ok());
            }
            Err(e) => println!("No GPIO available (this is OK off-target): {}", e),
        }
    }
}
