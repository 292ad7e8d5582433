//! # canopy
//!
//! An IRC bot framework engine: one [`Session`] per server connection,
//! with dialect-aware message parsing, ordered and unordered event
//! delivery to registered [`Listener`]s, channel roster tracking, and
//! outbound flood control.
//!
//! ```no_run
//! use std::sync::Arc;
//! use canopy::{DaemonRegistry, Interest, Listener, Session, SessionConfig};
//! use canopy::{EventKey, Payload, Verb};
//! use async_trait::async_trait;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Listener for Echo {
//!     fn interest(&self) -> Interest {
//!         Interest::events([EventKey::Command(Verb::Privmsg)])
//!     }
//!
//!     async fn on_event(
//!         &self,
//!         session: Arc<Session>,
//!         _key: &EventKey,
//!         payload: Arc<Payload>,
//!     ) -> anyhow::Result<()> {
//!         if let (Some(channel), Some(message)) = (&payload.channel, &payload.message) {
//!             session.privmsg(channel, message).await?;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SessionConfig::new("irc.libera.chat", "leafbot").channel("#canopy");
//!     let session = Session::new(config, Arc::new(DaemonRegistry::builtin()));
//!     session.register(Echo).await;
//!     session.run().await?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod bus;
pub mod config;
pub mod error;
pub mod session;
mod throttle;
pub mod transport;

pub use self::bus::{Interest, Listener};
pub use self::config::{ChannelEntry, ConfigError, SessionConfig, ThrottleConfig};
pub use self::error::SessionError;
pub use self::session::{
    AppendUnderscore, NickStrategy, PrivilegeSet, Roster, Session, SessionState,
};
pub use self::transport::Transport;

// Re-export the protocol layer leaves interact with.
pub use canopy_proto::command::{Arg, Verb};
pub use canopy_proto::daemon::{
    classify_mode_string, Category, DaemonRegistry, Detection, Dialect, DialectView,
};
pub use canopy_proto::event::{Delivery, EventKey, Payload};
pub use canopy_proto::origin::Origin;
