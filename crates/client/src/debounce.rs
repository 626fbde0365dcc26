//! Trailing debounce for search input, and sequence numbers for discarding
//! superseded results.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::timeout;

/// Sending half of a debounced channel.
#[derive(Debug)]
pub struct DebounceInput<T> {
    sender: UnboundedSender<T>,
}

impl<T> Clone for DebounceInput<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> DebounceInput<T> {
    /// Push a new value. Returns `false` once the output side is gone.
    pub fn push(&self, value: T) -> bool {
        self.sender.send(value).is_ok()
    }
}

/// Create a debounced channel.
///
/// Every value pushed restarts the quiet window; only the last value of a
/// burst comes out, `window` after the burst ends. Dropping every
/// [`DebounceInput`] flushes a pending value and closes the output.
///
/// Must be called inside a tokio runtime.
pub fn debounced<T: Send + 'static>(window: Duration) -> (DebounceInput<T>, UnboundedReceiver<T>) {
    let (in_tx, mut in_rx) = mpsc::unbounded_channel::<T>();
    let (out_tx, out_rx) = mpsc::unbounded_channel::<T>();

    tokio::spawn(async move {
        while let Some(mut latest) = in_rx.recv().await {
            let closed = loop {
                match timeout(window, in_rx.recv()).await {
                    Ok(Some(next)) => latest = next,
                    Ok(None) => break true,
                    Err(_) => break false,
                }
            };
            if out_tx.send(latest).is_err() || closed {
                break;
            }
        }
        tracing::trace!("debounce task finished");
    });

    (DebounceInput { sender: in_tx }, out_rx)
}

/// Identifies one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Hands out increasing tickets; only the newest one is current.
///
/// A result is applied only if its ticket is still current when it arrives,
/// so an older, slower response never overwrites a newer one.
#[derive(Debug, Clone, Default)]
pub struct SequenceGate {
    latest: Arc<AtomicU64>,
}

impl SequenceGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }
}
