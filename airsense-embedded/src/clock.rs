use embassy_time::Instant;

/// Monotonic millisecond counter.
///
/// The counter wraps at `u32::MAX`; compare readings with `wrapping_sub`.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

/// Elapsed milliseconds between two readings of a wrapping counter
pub const fn elapsed_ms(since: u32, now: u32) -> u32 {
    now.wrapping_sub(since)
}

#[derive(Debug, Clone)]
pub struct MonotonicClock {
    boot_instant: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            boot_instant: Instant::now(),
        }
    }

    /// Milliseconds since construction, without wraparound
    pub fn uptime_ms(&self) -> u64 {
        self.boot_instant.elapsed().as_millis()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u32 {
        // Truncation is the wraparound
        self.uptime_ms() as u32
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Clock for &C {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use core::cell::Cell;

    use super::Clock;

    /// Manually advanced clock
    #[derive(Debug, Default)]
    pub struct MockClock {
        now: Cell<u32>,
    }

    impl MockClock {
        pub fn starting_at(now: u32) -> Self {
            Self {
                now: Cell::new(now),
            }
        }

        pub fn advance(&self, ms: u32) {
            self.now.set(self.now.get().wrapping_add(ms));
        }
    }

    impl Clock for MockClock {
        fn now_ms(&self) -> u32 {
            self.now.get()
        }
    }
}
