//! # Joydrive Library
//!
//! Drive a differential-drive robot with a lift from a browser joystick.
//!
//! A browser streams `{"x": .., "y": ..}` joystick samples over a WebSocket.
//! Each sample is mapped to left/right drive speeds or a lift command and
//! written to the motor driver through Raspberry Pi GPIO and software PWM.

pub mod config;
pub mod error;
pub mod motor;
pub mod server;
pub mod session;
