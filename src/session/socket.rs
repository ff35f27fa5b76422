//! Trait abstraction for the client connection to enable testing

use async_trait::async_trait;

/// One event read from the client connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame.
    Text(String),
    /// Binary, ping or pong frames. Not used by the joystick protocol.
    Other,
    /// The client closed the connection.
    Closed,
    /// The connection broke.
    Error(String),
}

/// Trait for a bidirectional text connection to the joystick client
#[async_trait]
pub trait ClientSocket: Send {
    /// Wait for the next inbound event.
    async fn recv(&mut self) -> Inbound;

    /// Send a text line. Returns false if the line could not be delivered.
    async fn send_text(&mut self, text: String) -> bool;
}
