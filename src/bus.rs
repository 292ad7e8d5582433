//! The listener broadcast bus.
//!
//! Listeners declare their interest at registration time: which event keys
//! they handle, and which of those must run in strict wire-arrival order.
//! Unordered deliveries each run on a freshly spawned task and are isolated
//! from one another's failures; ordered deliveries are invoked sequentially,
//! in listener-registration order, by the session's single ordered worker.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use parking_lot::RwLock;
use tracing::{debug, error};

use canopy_proto::event::{EventKey, Payload};

use crate::session::Session;

/// A listener's declared subscriptions.
///
/// An event key present in the ordered set runs on the session's ordered
/// worker; any other handled key runs unordered. [`Interest::all`]
/// subscribes to every event, unordered.
#[derive(Clone, Debug, Default)]
pub struct Interest {
    all_unordered: bool,
    events: HashSet<EventKey>,
    ordered: HashSet<EventKey>,
}

impl Interest {
    /// Handle every event, with no ordering guarantee.
    pub fn all() -> Self {
        Interest {
            all_unordered: true,
            ..Interest::default()
        }
    }

    /// Handle exactly the given events, unordered.
    pub fn events<I: IntoIterator<Item = EventKey>>(keys: I) -> Self {
        Interest {
            events: keys.into_iter().collect(),
            ..Interest::default()
        }
    }

    /// Handle exactly the given events, in wire-arrival order.
    pub fn ordered<I: IntoIterator<Item = EventKey>>(keys: I) -> Self {
        Interest {
            ordered: keys.into_iter().collect(),
            ..Interest::default()
        }
    }

    /// Additionally handle `key`, unordered.
    pub fn with_event(mut self, key: EventKey) -> Self {
        self.events.insert(key);
        self
    }

    /// Additionally handle `key`, in wire-arrival order.
    pub fn with_ordered(mut self, key: EventKey) -> Self {
        self.ordered.insert(key);
        self
    }

    fn handles(&self, key: &EventKey) -> bool {
        self.all_unordered || self.events.contains(key) || self.ordered.contains(key)
    }

    fn is_ordered(&self, key: &EventKey) -> bool {
        self.ordered.contains(key)
    }
}

/// An external collaborator reacting to session events.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// Which events this listener handles, and which of those are ordered.
    ///
    /// Consulted on every delivery; implementations should return a stable
    /// value.
    fn interest(&self) -> Interest {
        Interest::all()
    }

    /// Invoked synchronously at registration time, before any delivery.
    async fn attached(&self, _session: &Arc<Session>) {}

    /// Handle one event.
    ///
    /// Failures (and panics) are caught at the dispatch boundary, logged,
    /// and reported best-effort into the channel the event concerned; they
    /// never abort delivery to other listeners.
    async fn on_event(
        &self,
        session: Arc<Session>,
        key: &EventKey,
        payload: Arc<Payload>,
    ) -> anyhow::Result<()>;
}

/// The per-session registry of listeners.
#[derive(Default)]
pub(crate) struct Bus {
    listeners: RwLock<Vec<Arc<dyn Listener>>>,
}

impl Bus {
    /// Append a listener; registration order is delivery order for ordered
    /// handlers.
    pub(crate) fn register(&self, listener: Arc<dyn Listener>) {
        self.listeners.write().push(listener);
    }

    /// Fan an event out to every interested unordered listener, one task
    /// each.
    pub(crate) fn deliver(&self, session: &Arc<Session>, key: &EventKey, payload: &Arc<Payload>) {
        let listeners: Vec<Arc<dyn Listener>> = self.listeners.read().clone();
        for listener in listeners {
            let interest = listener.interest();
            if !interest.handles(key) || interest.is_ordered(key) {
                continue;
            }
            let session = Arc::clone(session);
            let key = key.clone();
            let payload = Arc::clone(payload);
            tokio::spawn(async move {
                invoke_guarded(listener, session, key, payload).await;
            });
        }
    }

    /// Invoke every interested ordered listener sequentially, in
    /// registration order. Only ever called from the session's ordered
    /// worker, which is what serializes ordered handlers against each other.
    pub(crate) async fn deliver_ordered(
        &self,
        session: &Arc<Session>,
        key: &EventKey,
        payload: &Arc<Payload>,
    ) {
        let listeners: Vec<Arc<dyn Listener>> = self.listeners.read().clone();
        for listener in listeners {
            let interest = listener.interest();
            if !interest.handles(key) || !interest.is_ordered(key) {
                continue;
            }
            invoke_guarded(
                Arc::clone(&listener),
                Arc::clone(session),
                key.clone(),
                Arc::clone(payload),
            )
            .await;
        }
    }
}

/// Run one handler with the failure boundary around it: catch panics and
/// `Err` returns, log them, and attempt a notice into the event's channel.
async fn invoke_guarded(
    listener: Arc<dyn Listener>,
    session: Arc<Session>,
    key: EventKey,
    payload: Arc<Payload>,
) {
    let fut = listener.on_event(Arc::clone(&session), &key, Arc::clone(&payload));
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            error!(event = ?key, error = %err, "listener handler failed");
            report_failure(&session, &payload, &err.to_string()).await;
        }
        Err(panic) => {
            let detail = panic_message(&panic);
            error!(event = ?key, panic = %detail, "listener handler panicked");
            report_failure(&session, &payload, &detail).await;
        }
    }
}

async fn report_failure(session: &Arc<Session>, payload: &Payload, detail: &str) {
    let Some(channel) = &payload.channel else {
        return;
    };
    let text = format!("a handler failed on that event: {}", detail);
    if session.notice(channel, &text).await.is_err() {
        debug!(channel = %channel, "could not report handler failure to channel");
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
