use parking_lot::Mutex;

/// Active/idle CPU tick counters.
///
/// Workers add one active tick per executed instruction; the idle sampler
/// adds one idle tick per free core per sample. Both counters only grow.
pub struct TickClock {
    counts: Mutex<TickCounts>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickCounts {
    pub active: u64,
    pub idle: u64,
}

impl TickCounts {
    pub fn total(&self) -> u64 {
        self.active + self.idle
    }
}

impl TickClock {
    pub fn new() -> Self {
        TickClock {
            counts: Mutex::new(TickCounts::default()),
        }
    }

    pub fn increment_active(&self, n: u64) {
        self.counts.lock().active += n;
    }

    pub fn increment_idle(&self, n: u64) {
        self.counts.lock().idle += n;
    }

    pub fn read(&self) -> TickCounts {
        *self.counts.lock()
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently() {
        let clock = TickClock::new();
        clock.increment_active(3);
        clock.increment_idle(2);
        clock.increment_active(1);

        let counts = clock.read();
        assert_eq!(counts.active, 4);
        assert_eq!(counts.idle, 2);
        assert_eq!(counts.total(), 6);
    }
}
