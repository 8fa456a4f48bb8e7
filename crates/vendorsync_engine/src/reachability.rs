//! Network reachability tracking.

use std::sync::atomic::{AtomicBool, Ordering};

/// Current network reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    /// The remote store can be reached.
    Online,
    /// The network is unavailable.
    Offline,
}

/// Edge raised by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReachabilityEdge {
    /// The network came back; updates may have been missed.
    BecameOnline,
}

/// Turns level-triggered reachability callbacks into edges.
///
/// The platform monitor may report the same value repeatedly; only the
/// `Offline → Online` transition produces an edge. Starts `Online` until the
/// first callback arrives.
#[derive(Debug)]
pub struct ReachabilityTracker {
    online: AtomicBool,
}

impl ReachabilityTracker {
    /// Creates a tracker in the `Online` state.
    pub fn new() -> Self {
        Self {
            online: AtomicBool::new(true),
        }
    }

    /// Returns true while online.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Returns the current state.
    pub fn state(&self) -> Reachability {
        if self.is_online() {
            Reachability::Online
        } else {
            Reachability::Offline
        }
    }

    /// Records a reachability callback.
    pub fn observe(&self, reachable: bool) -> Option<ReachabilityEdge> {
        let was_online = self.online.swap(reachable, Ordering::SeqCst);
        (!was_online && reachable).then_some(ReachabilityEdge::BecameOnline)
    }
}

impl Default for ReachabilityTracker {
    fn default() -> Self {
        Self::new()
    }
}
