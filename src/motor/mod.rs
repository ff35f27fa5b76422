//! # Motor Module
//!
//! Differential-drive and lift control.
//!
//! This module handles:
//! - Mapping joystick axes to drive and lift targets (dead zone, lift override, mixing)
//! - Claiming the motor-driver GPIO pins and running the PWM carriers
//! - Applying targets to the pins, with a no-op fallback when GPIO is unavailable

pub mod controller;
pub mod hardware;
pub mod mixer;

pub use controller::{LogSink, MotorController};
pub use mixer::{AxisSample, DriveCommand, LiftDirection, Mixer};
