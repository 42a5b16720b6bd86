//! UI message dispatch boundary
//!
//! The consumer side of every sender hands each drained packet to a
//! [`Dispatch`] implementation as `(tag, kind, bytes)`. What the GUI does with
//! it is outside this crate; the bytes decode back with `Packet::decode`.

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::packet::Tag;

/// Kind of message delivered to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Fresh telemetry for a control, the only kind this pipeline emits
    Update,
}

/// Receiver of encoded packets on the UI thread
pub trait Dispatch {
    fn dispatch(&mut self, tag: Tag, kind: MessageKind, payload: &[u8]);
}

impl<F> Dispatch for F
where
    F: FnMut(Tag, MessageKind, &[u8]),
{
    fn dispatch(&mut self, tag: Tag, kind: MessageKind, payload: &[u8]) {
        self(tag, kind, payload)
    }
}

/// Owned copy of one dispatched message
#[derive(Debug, Clone, PartialEq)]
pub struct UiMessage {
    pub tag: Tag,
    pub kind: MessageKind,
    pub payload: Bytes,
}

/// Dispatcher forwarding messages over a bounded channel
///
/// Useful when the widget layer runs its own event loop. When the receiving
/// side falls behind, messages are dropped and counted.
pub struct ChannelDispatcher {
    tx: Sender<UiMessage>,
    dropped: Arc<AtomicUsize>,
}

impl ChannelDispatcher {
    /// Create a dispatcher and the receiver the GUI reads from
    pub fn new(capacity: usize) -> (Self, Receiver<UiMessage>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                dropped: Arc::new(AtomicUsize::new(0)),
            },
            rx,
        )
    }

    /// Messages dropped because the channel was full
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Dispatch for ChannelDispatcher {
    fn dispatch(&mut self, tag: Tag, kind: MessageKind, payload: &[u8]) {
        let message = UiMessage {
            tag,
            kind,
            payload: Bytes::copy_from_slice(payload),
        };

        match self.tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped.is_power_of_two() {
                    tracing::warn!("UI channel full, {} messages dropped so far", dropped);
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!("UI receiver gone, dropping message for {}", tag);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_dispatch() {
        let mut seen = Vec::new();
        let mut dispatcher = |tag: Tag, kind: MessageKind, payload: &[u8]| {
            seen.push((tag, kind, payload.len()));
        };

        dispatcher.dispatch(Tag(3), MessageKind::Update, &[1, 2, 3]);
        assert_eq!(seen, vec![(Tag(3), MessageKind::Update, 3)]);
    }

    #[test]
    fn test_channel_dispatcher_drops_when_full() {
        let (mut dispatcher, rx) = ChannelDispatcher::new(2);

        for i in 0..5u8 {
            dispatcher.dispatch(Tag(1), MessageKind::Update, &[i]);
        }

        assert_eq!(dispatcher.dropped(), 3);
        let first = rx.try_recv().unwrap();
        assert_eq!(first.payload.as_ref(), &[0]);
        assert_eq!(rx.try_recv().unwrap().payload.as_ref(), &[1]);
        assert!(rx.try_recv().is_err());
    }
}
