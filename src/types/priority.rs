// ABOUTME: Router priority values and their monotonic time-based generator.
// ABOUTME: A fresh priority always beats every priority issued before it.

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;

/// Tie-breaking integer the router uses to prefer one enabled stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Priority(i64);

impl Priority {
    /// Priority carried by a stack with traffic disabled.
    pub const DISABLED: Priority = Priority(0);

    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Clock = Box<dyn Fn() -> i64 + Send + Sync>;

/// Issues strictly increasing priorities derived from wall-clock milliseconds.
///
/// Values from separate invocations increase with time; within one process a
/// floor guarantees strict monotonicity even if the clock stalls or steps back.
pub struct PriorityGenerator {
    clock: Clock,
    last: Mutex<i64>,
}

impl PriorityGenerator {
    pub fn new() -> Self {
        Self::with_clock(|| Utc::now().timestamp_millis())
    }

    /// Use a custom millisecond clock.
    pub fn with_clock(clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        Self {
            clock: Box::new(clock),
            last: Mutex::new(0),
        }
    }

    pub fn next(&self) -> Priority {
        let mut last = self.last.lock();
        let candidate = (self.clock)().max(*last + 1);
        *last = candidate;
        Priority(candidate)
    }
}

impl Default for PriorityGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PriorityGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityGenerator")
            .field("last", &*self.last.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn issued_priorities_beat_disabled() {
        let generator = PriorityGenerator::new();
        assert!(generator.next() > Priority::DISABLED);
    }

    #[test]
    fn stalled_clock_still_increases() {
        let generator = PriorityGenerator::with_clock(|| 1_000);
        let a = generator.next();
        let b = generator.next();
        let c = generator.next();
        assert_eq!(a.value(), 1_000);
        assert!(b > a);
        assert!(c > b);
    }

    proptest! {
        #[test]
        fn strictly_increasing_for_any_clock(readings in proptest::collection::vec(-5_000i64..5_000, 1..64)) {
            let readings = std::sync::Arc::new(readings);
            let cursor = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
            let clock_readings = readings.clone();
            let clock_cursor = cursor.clone();
            let generator = PriorityGenerator::with_clock(move || {
                let i = clock_cursor.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                clock_readings[i % clock_readings.len()]
            });

            let mut previous = Priority::DISABLED;
            for _ in 0..readings.len() {
                let next = generator.next();
                prop_assert!(next > previous);
                previous = next;
            }
        }
    }
}
