//! Connection session: socket ownership, registration, channel state, and
//! the dispatch pipeline.
//!
//! One session is one live connection to one server under one nickname.
//! A dedicated task runs the blocking read loop; every parsed line is
//! pushed onto the ordered-delivery queue (consumed FIFO by a single
//! worker task that first applies the session's own state handlers, then
//! external ordered listeners) and simultaneously fanned out to unordered
//! listeners on freshly spawned tasks.
//!
//! Shared mutable state is guarded by exactly three locks: the channel
//! state mutex, the readiness mutex, and the socket-write mutex. Nothing
//! else in the session is mutated after startup.

mod apply;
mod roster;

pub use roster::{PrivilegeSet, Roster};

use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, OnceLock};

use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, trace, warn};

use canopy_proto::codec::{normalize_channel_name, parse_line, NormalizePolicy};
use canopy_proto::command::{render, Arg, Verb};
use canopy_proto::daemon::DaemonRegistry;
use canopy_proto::error::ProtocolError;
use canopy_proto::event::{Delivery, EventKey, Payload};
use canopy_proto::line::LineCodec;

use crate::bus::{Bus, Listener};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::session::roster::ChannelState;
use crate::throttle::Throttle;
use crate::transport::Transport;

/// How long to wait for channel-join confirmations before declaring the
/// session ready anyway.
pub(crate) const READY_GRACE: std::time::Duration = std::time::Duration::from_secs(10);

/// Where the session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No socket (initial, or terminal after close).
    Disconnected,
    /// Socket being opened.
    Connecting,
    /// PASS/USER/NICK sent, awaiting end of MOTD.
    Registering,
    /// Channel JOINs issued, awaiting confirmations.
    Joining,
    /// Registration and initial joins complete (or timed out).
    Ready,
}

/// Pluggable nickname-collision fallback.
///
/// Consulted when the server reports the requested nickname in use and
/// ghosting is unavailable. Returning `None` stalls registration.
pub trait NickStrategy: Send + Sync + 'static {
    /// The next nickname to try after `taken` was rejected.
    fn next_nick(&self, taken: &str) -> Option<String>;
}

/// The default collision fallback: append an underscore.
pub struct AppendUnderscore;

impl NickStrategy for AppendUnderscore {
    fn next_nick(&self, taken: &str) -> Option<String> {
        Some(format!("{}_", taken))
    }
}

/// Guards the one-shot readiness transition and the set of channels still
/// awaiting their initial JOIN confirmation.
#[derive(Debug, Default)]
struct Readiness {
    pending: HashSet<String>,
    joins_issued: bool,
    claimed: bool,
}

type Writer = FramedWrite<WriteHalf<Transport>, LineCodec>;
type Reader = FramedRead<ReadHalf<Transport>, LineCodec>;

/// One live connection to one IRC server.
pub struct Session {
    config: SessionConfig,
    registry: Arc<DaemonRegistry>,
    nick_strategy: Box<dyn NickStrategy>,
    /// Resolved dialect profile name; reassigned at most once, by startup
    /// auto-detection.
    dialect: RwLock<Option<String>>,
    nick: RwLock<String>,
    state: RwLock<SessionState>,
    ghost_attempted: AtomicBool,
    /// Channel-state lock: joined set, rosters, passwords, NAMES scratch.
    channels: Mutex<ChannelState>,
    /// Readiness lock: the join-confirmation/grace-timer race.
    readiness: Mutex<Readiness>,
    /// Socket-write lock: transmissions never interleave mid-line.
    writer: tokio::sync::Mutex<Option<Writer>>,
    bus: Bus,
    throttle: OnceLock<Throttle>,
    ordered_tx: OnceLock<mpsc::UnboundedSender<Vec<Delivery>>>,
}

impl Session {
    /// Build a session with the default nick-collision strategy.
    pub fn new(config: SessionConfig, registry: Arc<DaemonRegistry>) -> Arc<Session> {
        Session::with_nick_strategy(config, registry, AppendUnderscore)
    }

    /// Build a session with a custom nick-collision strategy.
    pub fn with_nick_strategy(
        config: SessionConfig,
        registry: Arc<DaemonRegistry>,
        strategy: impl NickStrategy,
    ) -> Arc<Session> {
        let nick = config.nick.clone();
        let dialect = config.dialect.clone();
        Arc::new(Session {
            config,
            registry,
            nick_strategy: Box::new(strategy),
            dialect: RwLock::new(dialect),
            nick: RwLock::new(nick),
            state: RwLock::new(SessionState::Disconnected),
            ghost_attempted: AtomicBool::new(false),
            channels: Mutex::new(ChannelState::default()),
            readiness: Mutex::new(Readiness::default()),
            writer: tokio::sync::Mutex::new(None),
            bus: Bus::default(),
            throttle: OnceLock::new(),
            ordered_tx: OnceLock::new(),
        })
    }

    /// Register a listener; its `attached` hook runs before any delivery.
    pub async fn register(self: &Arc<Self>, listener: impl Listener) {
        let listener: Arc<dyn Listener> = Arc::new(listener);
        listener.attached(self).await;
        self.bus.register(listener);
    }

    /// Connect, register, and drive the read loop until the socket closes.
    ///
    /// Returns `Ok(())` on an orderly end-of-stream (explicit quit or the
    /// server closing the link) and an error for socket-level failures. A
    /// session runs once; it is inert afterwards.
    pub async fn run(self: &Arc<Self>) -> Result<(), SessionError> {
        let (ordered_tx, ordered_rx) = mpsc::unbounded_channel::<Vec<Delivery>>();
        if self.ordered_tx.set(ordered_tx.clone()).is_err() {
            return Err(SessionError::AlreadyRan);
        }

        if let Some(name) = self.config.dialect.as_deref() {
            if self.registry.lookup(name).is_none() {
                warn!(dialect = %name, "configured dialect unknown; using default");
            }
        }

        *self.state.write() = SessionState::Connecting;
        let transport = match Transport::connect(&self.config).await {
            Ok(transport) => transport,
            Err(e) => {
                *self.state.write() = SessionState::Disconnected;
                return Err(e);
            }
        };
        let (read_half, write_half) = tokio::io::split(transport);
        let mut reader: Reader = FramedRead::new(read_half, LineCodec::new());
        {
            let mut writer = self.writer.lock().await;
            *writer = Some(FramedWrite::new(write_half, LineCodec::new()));
        }

        if let Some(throttle_cfg) = &self.config.throttle {
            let _ = self.throttle.set(Throttle::start(
                Arc::downgrade(self),
                throttle_cfg.interval(),
                throttle_cfg.threshold,
            ));
        }

        let worker = tokio::spawn(ordered_worker(Arc::clone(self), ordered_rx));

        *self.state.write() = SessionState::Registering;
        info!(
            server = %self.config.server,
            port = self.config.port,
            nick = %self.config.nick,
            "registering"
        );
        let result = match self.send_registration().await {
            Ok(()) => self.read_loop(&mut reader, &ordered_tx).await,
            Err(e) => Err(e),
        };

        *self.state.write() = SessionState::Disconnected;
        info!("session disconnected");
        let payload = Arc::new(Payload::default());
        let _ = ordered_tx.send(vec![Delivery::new(
            EventKey::Disconnected,
            Arc::clone(&payload),
        )]);
        self.bus.deliver(self, &EventKey::Disconnected, &payload);
        let _ = worker.await;
        *self.writer.lock().await = None;
        result
    }

    async fn send_registration(&self) -> Result<(), SessionError> {
        if let Some(password) = &self.config.server_password {
            self.command(Verb::Pass, &[Arg::one(password.as_str())])
                .await?;
        }
        let username = self
            .config
            .username
            .clone()
            .unwrap_or_else(|| self.config.nick.clone());
        let realname = self
            .config
            .realname
            .clone()
            .unwrap_or_else(|| self.config.nick.clone());
        self.command(
            Verb::User,
            &[
                Arg::one(username),
                Arg::one("0"),
                Arg::one("*"),
                Arg::one(realname),
            ],
        )
        .await?;
        self.command(Verb::Nick, &[Arg::one(self.config.nick.as_str())])
            .await
    }

    /// The read loop: block on the socket, parse, dispatch. Never blocks on
    /// handler completion; only on the socket and the (unbounded) ordered
    /// queue push.
    async fn read_loop(
        self: &Arc<Self>,
        reader: &mut Reader,
        ordered_tx: &mpsc::UnboundedSender<Vec<Delivery>>,
    ) -> Result<(), SessionError> {
        while let Some(item) = reader.next().await {
            match item {
                Ok(line) => {
                    if line.is_empty() {
                        continue;
                    }
                    trace!(raw = %line, "recv");
                    let dialect = self.dialect_name();
                    let view = self.registry.view(dialect.as_deref());
                    match parse_line(&line, &view, &self.normalize_policy()) {
                        Ok(deliveries) => {
                            if deliveries.is_empty() {
                                continue;
                            }
                            let _ = ordered_tx.send(deliveries.clone());
                            for delivery in &deliveries {
                                self.bus.deliver(self, &delivery.key, &delivery.payload);
                            }
                        }
                        Err(e) => {
                            error!(raw = %line, error = %e, "unparseable line");
                        }
                    }
                }
                Err(ProtocolError::Io(e)) => return Err(SessionError::Io(e)),
                Err(e @ ProtocolError::LineTooLong { .. }) => {
                    return Err(SessionError::Protocol(e))
                }
                Err(e) => {
                    error!(error = %e, "dropping undecodable line");
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------

    /// Transmit one raw line, holding the write lock for the duration so
    /// concurrent senders never interleave mid-line.
    pub async fn send_raw(&self, line: &str) -> Result<(), SessionError> {
        debug!(raw = %line, "send");
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SessionError::NotConnected)?;
        writer.send(line.to_owned()).await?;
        Ok(())
    }

    /// Render a command against its declared parameter shape and transmit
    /// it. Arity violations fail synchronously, before anything is sent.
    pub async fn command(&self, verb: Verb, args: &[Arg]) -> Result<(), SessionError> {
        let line = render(verb, args)?;
        self.send_raw(&line).await
    }

    /// Direct PRIVMSG to one target; never throttled.
    pub async fn privmsg(&self, target: &str, text: &str) -> Result<(), SessionError> {
        self.command(Verb::Privmsg, &[Arg::one(target), Arg::one(text)])
            .await
    }

    /// Direct NOTICE to one target; never throttled.
    pub async fn notice(&self, target: &str, text: &str) -> Result<(), SessionError> {
        self.command(Verb::Notice, &[Arg::one(target), Arg::one(text)])
            .await
    }

    /// Broadcast a message to many targets.
    ///
    /// With throttling enabled the pairs go through the flood-control
    /// queue (and may be dropped at capacity); otherwise a single
    /// multi-target PRIVMSG is sent directly.
    pub async fn send_to_targets(
        &self,
        message: &str,
        targets: &[&str],
    ) -> Result<(), SessionError> {
        if targets.is_empty() {
            return Ok(());
        }
        if let Some(throttle) = self.throttle.get() {
            for target in targets {
                throttle.enqueue(target, message);
            }
            Ok(())
        } else {
            self.command(
                Verb::Privmsg,
                &[Arg::many(targets.iter().copied()), Arg::one(message)],
            )
            .await
        }
    }

    /// Set a channel's topic.
    pub async fn set_topic(&self, channel: &str, topic: &str) -> Result<(), SessionError> {
        let channel = self.normalize(channel);
        self.command(Verb::Topic, &[Arg::one(channel), Arg::one(topic)])
            .await
    }

    /// Join a channel, remembering its key for later rejoins.
    pub async fn join_channel(&self, name: &str, key: Option<&str>) -> Result<(), SessionError> {
        let channel = self.normalize(name);
        match key {
            Some(k) => {
                self.channels.lock().record_password(&channel, k);
                self.command(Verb::Join, &[Arg::one(channel), Arg::one(k)])
                    .await
            }
            None => self.command(Verb::Join, &[Arg::one(channel)]).await,
        }
    }

    /// Leave a channel. Local bookkeeping is updated when the server echoes
    /// the PART back.
    pub async fn leave_channel(&self, name: &str) -> Result<(), SessionError> {
        let channel = self.normalize(name);
        self.command(Verb::Part, &[Arg::one(channel)]).await
    }

    /// Request a nickname change. The current-nickname field updates when
    /// the server confirms with a NICK event.
    pub async fn rename_self(&self, new_nick: &str) -> Result<(), SessionError> {
        self.command(Verb::Nick, &[Arg::one(new_nick)]).await
    }

    /// Send QUIT and close the write half; the read loop then observes
    /// end-of-stream and the session becomes inert.
    pub async fn quit(&self, message: Option<&str>) -> Result<(), SessionError> {
        let line = match message {
            Some(m) => render(Verb::Quit, &[Arg::one(m)])?,
            None => render(Verb::Quit, &[])?,
        };
        let mut guard = self.writer.lock().await;
        if let Some(mut writer) = guard.take() {
            writer.send(line).await?;
            writer.close().await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The nickname this session currently holds.
    pub fn current_nick(&self) -> String {
        self.nick.read().clone()
    }

    /// Lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Has the one-shot readiness transition fired?
    pub fn is_ready(&self) -> bool {
        self.readiness.lock().claimed
    }

    /// Snapshot of joined channel names (sorted).
    pub fn joined_channels(&self) -> Vec<String> {
        self.channels.lock().joined_channels()
    }

    /// Snapshot of one channel's roster.
    ///
    /// The snapshot is already stale by the next ordered event; handlers
    /// that need a consistent view must register as ordered.
    pub fn channel_members(&self, channel: &str) -> Option<Roster> {
        let channel = self.normalize(channel);
        self.channels.lock().roster(&channel)
    }

    /// The resolved dialect profile name, if any.
    pub fn dialect_name(&self) -> Option<String> {
        self.dialect.read().clone()
    }

    /// The session's configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The dialect registry this session consults.
    pub fn registry(&self) -> &Arc<DaemonRegistry> {
        &self.registry
    }

    /// Normalize a channel name under the session's dialect and policy.
    pub fn normalize(&self, name: &str) -> String {
        let dialect = self.dialect_name();
        let view = self.registry.view(dialect.as_deref());
        normalize_channel_name(name, &view, &self.normalize_policy())
    }

    fn normalize_policy(&self) -> NormalizePolicy {
        NormalizePolicy {
            lowercase: !self.config.case_sensitive,
            autoprefix: !self.config.raw_channel_names,
        }
    }

    /// Claim the one-shot readiness transition. Exactly one caller wins
    /// the race between the join-confirmation path and the grace timer;
    /// only the winner broadcasts the ready notification.
    pub(crate) fn try_claim_ready(self: &Arc<Self>, cause: &'static str) -> bool {
        {
            let mut readiness = self.readiness.lock();
            if readiness.claimed {
                return false;
            }
            readiness.claimed = true;
        }
        *self.state.write() = SessionState::Ready;
        info!(cause, "session ready");
        let payload = Arc::new(Payload::default());
        self.push_ordered(vec![Delivery::new(EventKey::Ready, Arc::clone(&payload))]);
        self.bus.deliver(self, &EventKey::Ready, &payload);
        true
    }

    pub(crate) fn push_ordered(&self, batch: Vec<Delivery>) {
        if let Some(tx) = self.ordered_tx.get() {
            let _ = tx.send(batch);
        }
    }

    /// Fan a synthetic event out to unordered listeners, exactly as the
    /// read loop does for wire events.
    pub fn deliver(self: &Arc<Self>, key: &EventKey, payload: Arc<Payload>) {
        self.bus.deliver(self, key, &payload);
    }

    /// Queue a synthetic event for ordered delivery; it takes its place in
    /// the arrival-order queue behind wire events already enqueued.
    pub fn deliver_ordered(&self, key: EventKey, payload: Arc<Payload>) {
        self.push_ordered(vec![Delivery::new(key, payload)]);
    }
}

/// The single per-session worker that consumes the ordered queue FIFO.
///
/// Every batch is one wire line's deliveries: the session's own state
/// handlers run first, then external ordered listeners in registration
/// order. Failures are contained here; anything escaping this loop would
/// stall all subsequent ordered delivery.
async fn ordered_worker(session: Arc<Session>, mut rx: mpsc::UnboundedReceiver<Vec<Delivery>>) {
    while let Some(batch) = rx.recv().await {
        for delivery in batch {
            if let Err(e) = session.apply(&delivery.key, &delivery.payload).await {
                error!(event = ?delivery.key, error = %e, "internal handler failed");
            }
            session
                .bus
                .deliver_ordered(&session, &delivery.key, &delivery.payload)
                .await;
            if delivery.key == EventKey::Disconnected {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session() -> Arc<Session> {
        Session::new(
            SessionConfig::new("irc.invalid", "bot"),
            Arc::new(DaemonRegistry::builtin()),
        )
    }

    #[tokio::test]
    async fn test_readiness_claimed_exactly_once() {
        let session = test_session();
        let mut claims = Vec::new();
        for _ in 0..32 {
            let session = Arc::clone(&session);
            claims.push(tokio::spawn(async move {
                session.try_claim_ready("test") as usize
            }));
        }
        let mut won = 0;
        for claim in claims {
            won += claim.await.unwrap();
        }
        assert_eq!(won, 1);
        assert!(session.is_ready());
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_timer_claims_readiness() {
        let session = test_session();
        session.arm_ready_timer();
        assert!(!session.is_ready());
        tokio::time::sleep(READY_GRACE + std::time::Duration::from_millis(10)).await;
        assert!(session.is_ready());
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_send_while_disconnected() {
        let session = test_session();
        let err = session.privmsg("#room", "hi").await.unwrap_err();
        assert!(matches!(err, SessionError::NotConnected));
    }

    #[test]
    fn test_normalize_uses_config_policy() {
        let session = test_session();
        assert_eq!(session.normalize("Room"), "#room");
        assert_eq!(session.normalize("#Room"), "#room");

        let sensitive = Session::new(
            {
                let mut c = SessionConfig::new("irc.invalid", "bot");
                c.case_sensitive = true;
                c
            },
            Arc::new(DaemonRegistry::builtin()),
        );
        assert_eq!(sensitive.normalize("Room"), "#Room");
    }

    #[test]
    fn test_append_underscore_strategy() {
        assert_eq!(
            AppendUnderscore.next_nick("bot").as_deref(),
            Some("bot_")
        );
    }
}
