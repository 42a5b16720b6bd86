//! Silence gate shared by all senders

/// Decides whether a completed window is worth a packet
///
/// A window is emitted when its level is above the threshold, or when the
/// previous window's was. The second rule produces exactly one trailing
/// packet after the signal goes quiet, so the UI sees the drop instead of
/// freezing on the last loud value. A threshold of zero or below disables
/// gating.
#[derive(Debug, Clone)]
pub struct Gate {
    threshold: f32,
    was_open: bool,
}

impl Gate {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            was_open: false,
        }
    }

    /// Feed one window's level, returns true if it should be pushed
    #[inline]
    pub fn admit(&mut self, level: f32) -> bool {
        self.admit_held(level, false)
    }

    /// Like [`admit`](Self::admit), but `held` keeps the gate open whatever
    /// the level
    #[inline]
    pub fn admit_held(&mut self, level: f32, held: bool) -> bool {
        if self.threshold <= 0.0 {
            return true;
        }

        let open = held || level > self.threshold;
        let emit = open || self.was_open;
        self.was_open = open;
        emit
    }

    pub fn reset(&mut self) {
        self.was_open = false;
    }
}
