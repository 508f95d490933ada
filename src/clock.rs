//! Cluster-wide logical clock.
//!
//! Every command dispatched through the harness advances the clock, and every
//! response (success or failure) is stamped with the operation time first
//! and the cluster time second. The clock may advance between the two stamps,
//! which is why `operation_time <= cluster_time` holds within one response
//! while equality is not guaranteed.

use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use parking_lot::Mutex;
use serde::Deserialize;
use serde::Serialize;

/// A hybrid logical timestamp: wall-clock seconds plus an increment that
/// orders events within the same second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterTime {
    pub secs: u64,
    pub increment: u32,
}

impl ClusterTime {
    pub fn new(
        secs: u64,
        increment: u32,
    ) -> Self {
        Self { secs, increment }
    }
}

impl fmt::Display for ClusterTime {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}.{}", self.secs, self.increment)
    }
}

/// Lamport-style clock shared by all nodes of one simulated cluster.
#[derive(Debug, Default)]
pub struct LogicalClock {
    current: Mutex<ClusterTime>,
}

impl LogicalClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time without advancing the clock.
    pub fn now(&self) -> ClusterTime {
        *self.current.lock()
    }

    /// Advance the clock by one event and return the new time.
    pub fn tick(&self) -> ClusterTime {
        let wall_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let mut current = self.current.lock();
        if wall_secs > current.secs {
            *current = ClusterTime::new(wall_secs, 1);
        } else {
            current.increment += 1;
        }
        *current
    }

    /// Merge an externally observed time (gossiped cluster time never moves
    /// the clock backwards).
    pub fn observe(
        &self,
        observed: ClusterTime,
    ) {
        let mut current = self.current.lock();
        if observed > *current {
            *current = observed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_is_strictly_monotonic() {
        let clock = LogicalClock::new();
        let mut previous = clock.tick();
        for _ in 0..100 {
            let next = clock.tick();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn test_observe_advances_to_future_time() {
        let clock = LogicalClock::new();
        let ahead = ClusterTime::new(u64::MAX - 1, 7);
        clock.observe(ahead);
        assert_eq!(clock.now(), ahead);
    }

    #[test]
    fn test_observe_never_regresses() {
        let clock = LogicalClock::new();
        let current = clock.tick();
        clock.observe(ClusterTime::new(0, 0));
        assert_eq!(clock.now(), current);
    }

    #[test]
    fn test_ordering_compares_secs_before_increment() {
        assert!(ClusterTime::new(2, 0) > ClusterTime::new(1, 99));
        assert!(ClusterTime::new(1, 2) > ClusterTime::new(1, 1));
    }
}
