//! # canopy-proto
//!
//! Wire-protocol support for the canopy IRC bot framework: dialect
//! profiles for server-software variations, parsing of raw lines into
//! dispatchable events, and validated construction of outbound commands.
//!
//! ## Parsing
//!
//! ```rust
//! use canopy_proto::codec::{parse_line, NormalizePolicy};
//! use canopy_proto::daemon::DaemonRegistry;
//! use canopy_proto::event::EventKey;
//! use canopy_proto::command::Verb;
//!
//! let registry = DaemonRegistry::builtin();
//! let deliveries = parse_line(
//!     ":Alice!a@host.com PRIVMSG #room :hello",
//!     &registry.default_view(),
//!     &NormalizePolicy::default(),
//! )
//! .unwrap();
//! assert_eq!(deliveries[0].key, EventKey::Command(Verb::Privmsg));
//! assert_eq!(deliveries[0].payload.channel.as_deref(), Some("#room"));
//! ```
//!
//! ## Outbound commands
//!
//! ```rust
//! use canopy_proto::command::{render, Arg, Verb};
//!
//! let line = render(Verb::Privmsg, &[Arg::one("#room"), Arg::one("hi")]).unwrap();
//! assert_eq!(line, "PRIVMSG #room :hi");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod codec;
pub mod command;
pub mod daemon;
pub mod error;
pub mod event;
pub mod line;
pub mod origin;

pub use self::codec::{normalize_channel_name, parse_line, NormalizePolicy};
pub use self::command::{render, Arg, Verb};
pub use self::daemon::{
    classify_mode_string, Category, DaemonRegistry, Detection, Dialect, DialectView,
};
pub use self::error::{CommandError, MessageParseError, ModeParseError, ProtocolError};
pub use self::event::{Delivery, EventKey, Payload};
pub use self::line::{LineCodec, MAX_LINE_LEN};
pub use self::origin::Origin;
