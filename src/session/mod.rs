//! # Session Module
//!
//! One remote-control connection driving the motors.
//!
//! This module handles:
//! - Claiming exclusive use of the motor controller (a second client is turned away)
//! - Decoding joystick messages and forwarding them to the controller
//! - Delivering client-facing log lines through a bounded queue
//! - Stopping the motors on every way out: close, broken connection,
//!   hardware fault, server shutdown, panic
//!
//! ## Lifecycle
//!
//! ```text
//! Connecting --activate--> Active --terminate--> Terminated
//!      \__________________________terminate______/
//! ```
//!
//! Dropping a [`Session`] that has not been terminated terminates it, so the
//! motors stop even if the owning task unwinds.

pub mod message;
pub mod socket;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex, OwnedMutexGuard};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::{JoydriveError, Result};
use crate::motor::controller::{LogSink, MotorController};
use message::parse_sample;
use socket::{ClientSocket, Inbound};

/// Motor controller shared between the server and the current session.
pub type SharedController = Arc<Mutex<MotorController>>;

/// First line sent to a client once it owns the motors.
pub const CONNECTED_NOTICE: &str = "connected";

/// Line sent to a client turned away because another session is driving.
pub const BUSY_NOTICE: &str = "busy: another session is already driving";

/// Longest one outbound line may take before the client counts as gone.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Terminated,
}

/// Exclusive claim on the motor controller for one client.
pub struct Session {
    id: u64,
    controller: OwnedMutexGuard<MotorController>,
    state: SessionState,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Claims the controller without waiting.
    ///
    /// # Errors
    ///
    /// Returns `SessionBusy` if another session holds the controller.
    pub fn acquire(shared: &SharedController, id: u64) -> Result<Self> {
        let controller = Arc::clone(shared)
            .try_lock_owned()
            .map_err(|_| JoydriveError::SessionBusy)?;

        debug!("Session {} acquired motor controller", id);
        Ok(Self {
            id,
            controller,
            state: SessionState::Connecting,
        })
    }

    /// Session identifier, unique per process.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Subscribes the session's log queue and starts accepting samples.
    pub fn activate(&mut self, sink: LogSink) {
        if self.state != SessionState::Connecting {
            return;
        }

        self.controller.subscribe(sink);
        self.state = SessionState::Active;

        if self.controller.is_degraded() {
            warn!("Session {} active, GPIO unavailable: motor commands are ignored", self.id);
        } else {
            info!("Session {} active", self.id);
        }
    }

    /// Decodes one text message and drives the motors with it.
    ///
    /// # Errors
    ///
    /// - `Session` if the session is not active.
    /// - `Message` if the text is not a valid joystick message. The session
    ///   stays active.
    /// - `Gpio` if the hardware write failed. The caller should terminate.
    pub fn handle_text(&mut self, text: &str) -> Result<()> {
        if self.state != SessionState::Active {
            return Err(JoydriveError::Session(format!(
                "session {} is {:?}, not active",
                self.id, self.state
            )));
        }

        let sample = parse_sample(text)?;
        debug!("x={:.2} y={:.2}", sample.x, sample.y);
        self.controller.drive(sample)
    }

    /// Stops all motors and detaches the log queue.
    ///
    /// Only the first call has an effect.
    pub fn terminate(&mut self) -> Result<()> {
        if self.state == SessionState::Terminated {
            return Ok(());
        }
        self.state = SessionState::Terminated;

        let stopped = self.controller.stop();
        self.controller.unsubscribe();
        info!("Session {} terminated", self.id);
        stopped
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state != SessionState::Terminated {
            warn!("Session {} dropped while {:?}, stopping motors", self.id, self.state);
            if let Err(e) = self.terminate() {
                error!("Failed to stop motors for session {}: {}", self.id, e);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Sent,
    Failed,
    Stalled,
}

/// Sends one line, giving up after [`SEND_TIMEOUT`].
async fn deliver<S: ClientSocket + ?Sized>(socket: &mut S, line: String) -> Delivery {
    match timeout(SEND_TIMEOUT, socket.send_text(line)).await {
        Ok(true) => Delivery::Sent,
        Ok(false) => Delivery::Failed,
        Err(_) => Delivery::Stalled,
    }
}

enum Event {
    Inbound(Inbound),
    Outbound(String),
    Shutdown,
}

/// Runs one client connection to completion.
///
/// Inbound text frames drive the motors. Client-facing log lines are drained
/// from a queue of `queue_capacity` lines by this same loop, so a slow client
/// never blocks the drive path. A line that takes longer than
/// [`SEND_TIMEOUT`] to send ends the session. When the loop ends for any
/// reason the motors are stopped.
///
/// # Errors
///
/// - `SessionBusy` if another session is driving. The client gets
///   [`BUSY_NOTICE`] and nothing is touched.
/// - `Gpio` if a hardware write failed. The motors are stopped before
///   returning.
pub async fn run_session<S: ClientSocket + ?Sized>(
    socket: &mut S,
    controller: &SharedController,
    id: u64,
    queue_capacity: usize,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut session = match Session::acquire(controller, id) {
        Ok(session) => session,
        Err(e) => {
            warn!("Rejecting session {}: {}", id, e);
            if deliver(socket, BUSY_NOTICE.to_string()).await != Delivery::Sent {
                debug!("Failed to notify session {} it was rejected", id);
            }
            return Err(e);
        }
    };

    let (tx, mut log_rx) = mpsc::channel(queue_capacity.max(1));
    let notices = LogSink::new(tx);
    session.activate(notices.clone());
    notices.send(CONNECTED_NOTICE.to_string());

    let mut outcome = Ok(());
    let mut stalled = false;
    let mut stopping = *shutdown.borrow();

    while !stopping {
        let event = tokio::select! {
            inbound = socket.recv() => Event::Inbound(inbound),
            Some(line) = log_rx.recv() => Event::Outbound(line),
            _ = shutdown.changed() => Event::Shutdown,
        };

        match event {
            Event::Inbound(Inbound::Text(text)) => match session.handle_text(&text) {
                Ok(()) => {}
                Err(JoydriveError::Message(reason)) => {
                    warn!("Session {} rejected message: {}", id, reason);
                    notices.send(format!("rejected message: {}", reason));
                }
                Err(e) => {
                    error!("Session {} fault: {}", id, e);
                    notices.send(format!("error: {}", e));
                    outcome = Err(e);
                    stopping = true;
                }
            },
            Event::Inbound(Inbound::Other) => {}
            Event::Inbound(Inbound::Closed) => {
                info!("Session {} closed by client", id);
                stopping = true;
            }
            Event::Inbound(Inbound::Error(reason)) => {
                warn!("Session {} connection lost: {}", id, reason);
                stopping = true;
            }
            Event::Outbound(line) => match deliver(socket, line).await {
                Delivery::Sent => {}
                Delivery::Failed => debug!("Session {} log line not delivered", id),
                Delivery::Stalled => {
                    warn!("Session {} client stopped reading after {:?}", id, SEND_TIMEOUT);
                    stalled = true;
                    stopping = true;
                }
            },
            Event::Shutdown => {
                info!("Session {} ending for server shutdown", id);
                stopping = true;
            }
        }
    }

    if let Err(e) = session.terminate() {
        error!("Failed to stop motors for session {}: {}", id, e);
        if outcome.is_ok() {
            outcome = Err(e);
        }
    }
    drop(session);

    // Best effort: the client may already be gone
    if !stalled {
        while let Ok(line) = log_rx.try_recv() {
            if deliver(socket, line).await != Delivery::Sent {
                break;
            }
        }
    }

    outcome
}
