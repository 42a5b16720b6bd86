//! Transmitter registry
//!
//! Owned by the UI thread. Holds the consumer half of every live sender,
//! keyed by tag, and drains them all on one idle tick.

use std::collections::BTreeMap;

use crate::dispatch::Dispatch;
use crate::packet::Tag;
use crate::sender::Transmit;

/// Consumer halves of all registered senders
#[derive(Default)]
pub struct TransmitterRegistry {
    transmitters: BTreeMap<Tag, Box<dyn Transmit + Send>>,
}

impl TransmitterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transmitter under its own tag
    ///
    /// Returns the transmitter previously registered under that tag, if any.
    pub fn register<T>(&mut self, transmitter: T) -> Option<Box<dyn Transmit + Send>>
    where
        T: Transmit + Send + 'static,
    {
        let tag = transmitter.tag();
        let replaced = self.transmitters.insert(tag, Box::new(transmitter));

        if replaced.is_some() {
            tracing::warn!("Transmitter {} replaced", tag);
        } else {
            tracing::info!("Transmitter {} registered", tag);
        }
        replaced
    }

    pub fn unregister(&mut self, tag: Tag) -> Option<Box<dyn Transmit + Send>> {
        let removed = self.transmitters.remove(&tag);
        if removed.is_some() {
            tracing::info!("Transmitter {} unregistered", tag);
        }
        removed
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.transmitters.contains_key(&tag)
    }

    pub fn len(&self) -> usize {
        self.transmitters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transmitters.is_empty()
    }

    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.transmitters.keys().copied()
    }

    /// Drain every transmitter once, in tag order
    ///
    /// Returns the total number of packets dispatched.
    pub fn transmit_all(&mut self, dispatcher: &mut dyn Dispatch) -> usize {
        self.transmitters
            .values_mut()
            .map(|t| t.transmit(dispatcher))
            .sum()
    }

    /// Packets waiting across all transmitters
    pub fn pending(&self) -> usize {
        self.transmitters.values().map(|t| t.pending()).sum()
    }

    /// Packets dropped across all senders
    pub fn overflow_total(&self) -> usize {
        self.transmitters.values().map(|t| t.overflow_count()).sum()
    }
}
