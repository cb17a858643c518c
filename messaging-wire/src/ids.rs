//! Process-unique, monotonic id generation for the three packet kinds that
//! carry one (§3 "ID generation").
//!
//! Each counter only needs to be unique within the lifetime of the process;
//! there is no requirement (and no attempt) to survive a restart.

use std::sync::atomic::{AtomicU64, Ordering};

/// A single monotonic counter, starting at 1 so that `0` stays available as
/// a caller-visible "no id" sentinel.
#[derive(Debug, Default)]
pub struct IdGenerator(AtomicU64);

impl IdGenerator {
    pub const fn new() -> Self {
        IdGenerator(AtomicU64::new(1))
    }

    /// Returns the next id, incrementing the counter.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// The three independent id generators an adapter owns: request, notice and
/// log ids never share a counter (§3).
#[derive(Debug, Default)]
pub struct IdGenerators {
    pub request: IdGenerator,
    pub notice: IdGenerator,
    pub log: IdGenerator,
}

impl IdGenerators {
    pub const fn new() -> Self {
        IdGenerators {
            request: IdGenerator::new(),
            notice: IdGenerator::new(),
            log: IdGenerator::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_distinct_per_kind() {
        let gens = IdGenerators::new();

        let r1 = gens.request.next();
        let r2 = gens.request.next();
        assert!(r2 > r1);

        let n1 = gens.notice.next();
        assert_eq!(n1, r1, "independent counters start from the same seed");
    }
}
