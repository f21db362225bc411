//! # Logical Clock
//!
//! Lamport clock used to stamp blocks and envelopes. Values are monotonically
//! increasing per conversation and are the only timestamps that cross the wire.

/// Logical timestamp (Lamport clock value).
pub type LogicalTimestamp = u64;

/// Lamport clock.
///
/// `tick` before every local event, `observe` every remote timestamp so local
/// stamps always sort after what this node has already seen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LamportClock {
    current: LogicalTimestamp,
}

impl LamportClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock for a local event and returns the new value.
    pub fn tick(&mut self) -> LogicalTimestamp {
        self.current = self.current.saturating_add(1);
        self.current
    }

    /// Merges a remote timestamp.
    pub fn observe(&mut self, remote: LogicalTimestamp) -> LogicalTimestamp {
        self.current = self.current.max(remote);
        self.current
    }

    /// Last value handed out or observed.
    pub fn current(&self) -> LogicalTimestamp {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_is_strictly_increasing() {
        let mut clock = LamportClock::new();
        let a = clock.tick();
        let b = clock.tick();
        assert!(b > a);
    }

    #[test]
    fn test_observe_jumps_forward() {
        let mut clock = LamportClock::new();
        clock.tick();
        clock.observe(41);
        assert_eq!(clock.tick(), 42);
    }

    #[test]
    fn test_observe_never_goes_back() {
        let mut clock = LamportClock::new();
        clock.observe(10);
        clock.observe(3);
        assert_eq!(clock.current(), 10);
    }
}
