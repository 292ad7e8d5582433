//! Session-level error types.

use thiserror::Error;

/// Errors surfaced by a [`Session`](crate::session::Session).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// Opening the socket (or the TLS handshake) failed.
    #[error("failed to connect: {0}")]
    Connect(#[source] std::io::Error),

    /// The configured server name is not a valid TLS server name.
    #[error("invalid TLS server name: {0}")]
    ServerName(String),

    /// I/O failure on the live socket.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire protocol failure (framing, encoding).
    #[error("protocol error: {0}")]
    Protocol(#[from] canopy_proto::ProtocolError),

    /// Outbound command construction failed; see
    /// [`CommandError`](canopy_proto::CommandError).
    #[error("command error: {0}")]
    Command(#[from] canopy_proto::CommandError),

    /// A send was attempted while the socket was closed.
    #[error("not connected")]
    NotConnected,

    /// `run` was called a second time; sessions are single-use.
    #[error("session already ran; build a new session to reconnect")]
    AlreadyRan,
}

/// Convenience alias for session results.
pub type Result<T, E = SessionError> = std::result::Result<T, E>;
