//! # Motor Controller Module
//!
//! Applies [`DriveCommand`]s from the mixer to the GPIO backend.
//!
//! A controller without a backend runs in degraded mode: every operation
//! succeeds and touches nothing. This is what the server falls back to when
//! the GPIO chip cannot be opened.
//!
//! Client-facing log lines (`drive L:.. R:..`, `all motors stopped`) go to the
//! subscribed [`LogSink`] when there is one, otherwise to `tracing`.

use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use super::hardware::{DriveChannel, GpioBackend, Output};
use super::mixer::{AxisSample, DriveCommand, Mixer};
use crate::config::MotorConfig;
use crate::error::Result;

/// Bounded, non-blocking destination for client-facing log lines.
#[derive(Debug, Clone)]
pub struct LogSink {
    tx: mpsc::Sender<String>,
}

impl LogSink {
    #[must_use]
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }

    /// Queues a line. Returns false if the queue is full or closed, in which
    /// case the line is dropped.
    pub fn send(&self, line: String) -> bool {
        self.tx.try_send(line).is_ok()
    }
}

/// Differential-drive and lift controller.
pub struct MotorController {
    hardware: Option<Box<dyn GpioBackend>>,
    mixer: Mixer,
    frequency_hz: f64,
    sink: Option<LogSink>,
}

impl std::fmt::Debug for MotorController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotorController")
            .field("degraded", &self.is_degraded())
            .field("mixer", &self.mixer)
            .field("frequency_hz", &self.frequency_hz)
            .field("subscribed", &self.sink.is_some())
            .finish()
    }
}

impl MotorController {
    /// Creates a controller driving real outputs.
    #[must_use]
    pub fn new(hardware: Box<dyn GpioBackend>, config: &MotorConfig) -> Self {
        Self {
            hardware: Some(hardware),
            mixer: Mixer::from_config(config),
            frequency_hz: config.pwm_frequency_hz,
            sink: None,
        }
    }

    /// Creates a controller with no hardware. All operations are no-ops.
    #[must_use]
    pub fn degraded(config: &MotorConfig) -> Self {
        Self {
            hardware: None,
            mixer: Mixer::from_config(config),
            frequency_hz: config.pwm_frequency_hz,
            sink: None,
        }
    }

    /// Returns true when running without a hardware handle.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.hardware.is_none()
    }

    /// Routes client-facing log lines to `sink`, replacing any previous one.
    pub fn subscribe(&mut self, sink: LogSink) {
        self.sink = Some(sink);
    }

    /// Drops the current sink. Lines go back to `tracing`.
    pub fn unsubscribe(&mut self) {
        self.sink = None;
    }

    fn emit(&self, line: String) {
        match &self.sink {
            Some(sink) => {
                debug!("{}", line);
                if !sink.send(line) {
                    trace!("Client log queue full or closed, line dropped");
                }
            }
            None => info!("{}", line),
        }
    }

    fn write(&mut self, output: Output, high: bool) -> Result<()> {
        match self.hardware.as_mut() {
            Some(hw) => hw.write(output, high),
            None => Ok(()),
        }
    }

    fn pwm(&mut self, output: Output, duty_cycle: u32) -> Result<()> {
        let frequency_hz = self.frequency_hz;
        match self.hardware.as_mut() {
            Some(hw) => hw.set_pwm(output, frequency_hz, duty_cycle),
            None => Ok(()),
        }
    }

    /// Drives the motors from one joystick sample.
    ///
    /// # Errors
    ///
    /// Returns `Gpio` if a pin write fails. Outputs written before the
    /// failure keep their new values.
    pub fn drive(&mut self, sample: AxisSample) -> Result<()> {
        if self.is_degraded() {
            return Ok(());
        }

        match self.mixer.mix(sample) {
            DriveCommand::Stop => self.stop(),
            DriveCommand::Lift(direction) => {
                debug!("Lift {:?}", direction);
                self.write(Output::LiftDir, direction.is_high())?;
                self.write(Output::LiftEnable, true)?;
                self.stop_drive()
            }
            DriveCommand::Drive { left, right } => {
                self.write(Output::LiftEnable, false)?;
                self.set_motor_speed(DriveChannel::Left, left)?;
                self.set_motor_speed(DriveChannel::Right, right)?;
                self.emit(format!("drive L:{} R:{}", left as i64, right as i64));
                Ok(())
            }
        }
    }

    /// Sets direction and duty cycle for one drive motor.
    ///
    /// Non-negative speeds run forward. The magnitude is scaled against the
    /// configured max speed and clamped to a 100% duty cycle.
    pub fn set_motor_speed(&mut self, channel: DriveChannel, speed: f64) -> Result<()> {
        if self.is_degraded() {
            return Ok(());
        }

        let duty_cycle = self.mixer.duty_cycle(speed);
        self.write(channel.dir(), speed >= 0.0)?;
        self.pwm(channel.pwm(), duty_cycle)
    }

    /// Zeroes both drive motors. The lift is left as it is.
    ///
    /// # Errors
    ///
    /// Both outputs are written even if the first fails. The first failure
    /// is returned.
    pub fn stop_drive(&mut self) -> Result<()> {
        if self.is_degraded() {
            return Ok(());
        }

        let left = self.pwm(Output::LeftPwm, 0);
        let right = self.pwm(Output::RightPwm, 0);
        left.and(right)
    }

    /// Zeroes both drive motors and switches the lift off.
    ///
    /// # Errors
    ///
    /// Every output is written even if an earlier one fails. The first
    /// failure is returned.
    pub fn stop(&mut self) -> Result<()> {
        if self.is_degraded() {
            return Ok(());
        }

        let drive = self.stop_drive();
        let lift = self.write(Output::LiftEnable, false);
        drive.and(lift)?;
        self.emit("all motors stopped".to_string());
        Ok(())
    }
}
