//! Parsed events and their dispatch keys.

use std::sync::Arc;

use crate::command::Verb;
use crate::origin::Origin;

/// Identifies one named event a listener can subscribe to.
///
/// A single wire line fans out to several keys: a textual command delivers
/// under its [`Verb`] and under [`EventKey::AnyCommand`]; a numeric reply
/// delivers under its code, under its dialect-resolved symbolic name (when
/// the dialect knows one), and under [`EventKey::AnyReply`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKey {
    /// A known textual command (PRIVMSG, JOIN, ...).
    Command(Verb),
    /// Every textual command, regardless of verb.
    AnyCommand,
    /// A numeric server reply, by code.
    Numeric(u16),
    /// A numeric server reply, by its dialect-resolved symbolic name.
    Reply(String),
    /// Every numeric reply, regardless of code.
    AnyReply,
    /// A NOTICE from the server itself (no user prefix).
    ServerNotice,
    /// A fatal server ERROR line.
    ServerError,
    /// Registration and initial channel joins completed (or timed out).
    Ready,
    /// The session's socket closed.
    Disconnected,
}

/// The named fields carried by one parsed event.
///
/// Which fields are populated depends on the command kind; numeric replies
/// carry the popped `recipient` plus the remaining `args` and `trailing`
/// free text. Payloads are ephemeral: built per incoming line, shared by
/// that line's deliveries, then discarded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Payload {
    /// Who sent the line, when a sender prefix was present.
    pub sender: Option<Origin>,
    /// The textual command, for command events.
    pub verb: Option<Verb>,
    /// The numeric code, for reply events.
    pub code: Option<u16>,
    /// Channel the event concerns (normalized).
    pub channel: Option<String>,
    /// Non-channel target (a nickname), where the command addresses one.
    pub recipient: Option<String>,
    /// Free-text message body.
    pub message: Option<String>,
    /// New topic text (TOPIC).
    pub topic: Option<String>,
    /// Nickname argument (NICK).
    pub nick: Option<String>,
    /// Mode string (MODE).
    pub mode: Option<String>,
    /// Mode parameter (MODE), when present.
    pub parameter: Option<String>,
    /// Server token (PING/PONG).
    pub server: Option<String>,
    /// Remaining positional arguments (numeric replies).
    pub args: Vec<String>,
    /// Trailing free text (numeric replies).
    pub trailing: Option<String>,
}

/// One (event key, payload) pair ready for dispatch.
#[derive(Clone, Debug)]
pub struct Delivery {
    /// The event name this delivery fires under.
    pub key: EventKey,
    /// The shared payload.
    pub payload: Arc<Payload>,
}

impl Delivery {
    /// Pair a key with a payload.
    pub fn new(key: EventKey, payload: Arc<Payload>) -> Self {
        Delivery { key, payload }
    }
}
