//! Outbound flood-control queue.
//!
//! A bounded FIFO of (recipient, message) pairs with a single paced
//! consumer. Enqueueing never blocks: at capacity the new item is dropped
//! rather than queued or retried. Only the broadcast send path goes through
//! here; direct single-target sends are never throttled.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::session::Session;

pub(crate) struct Throttle {
    tx: mpsc::Sender<(String, String)>,
}

impl Throttle {
    /// Spawn the consumer task and return the enqueue handle.
    ///
    /// The consumer holds only a weak session reference so a dropped
    /// session tears the queue down instead of leaking the task.
    pub(crate) fn start(session: Weak<Session>, interval: Duration, capacity: usize) -> Throttle {
        let (tx, mut rx) = mpsc::channel::<(String, String)>(capacity.max(1));
        tokio::spawn(async move {
            while let Some((recipient, text)) = rx.recv().await {
                let Some(session) = session.upgrade() else {
                    break;
                };
                if let Err(e) = session.privmsg(&recipient, &text).await {
                    warn!(recipient = %recipient, error = %e, "throttled send failed");
                }
                drop(session);
                tokio::time::sleep(interval).await;
            }
        });
        Throttle { tx }
    }

    /// Queue one message; silently drops when the queue is full.
    pub(crate) fn enqueue(&self, recipient: &str, text: &str) {
        match self.tx.try_send((recipient.to_owned(), text.to_owned())) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!(recipient = %recipient, "flood queue full, dropping message");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("flood queue consumer gone, dropping message");
            }
        }
    }
}
