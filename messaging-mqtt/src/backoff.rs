//! Bounded exponential backoff for MQTT reconnects (§4.E, §C.2 of
//! SPEC_FULL.md: base 200ms, cap 30s). The original implementation reconnects
//! on a fixed short interval; this supplements it with backoff so a broker
//! outage doesn't turn into a hot retry loop.

use std::time::Duration;

use rand::Rng;

const BASE: Duration = Duration::from_millis(200);
const CAP: Duration = Duration::from_secs(30);

pub struct Backoff {
    attempt: u32,
}

impl Backoff {
    pub fn new() -> Self {
        Backoff { attempt: 0 }
    }

    /// The delay before the next reconnect attempt, with up to 25% jitter
    /// subtracted so many engines backing off at once don't retry in
    /// lockstep.
    pub fn next_delay(&mut self) -> Duration {
        let factor: u64 = 1 << self.attempt.min(16);
        let exp = (BASE.as_millis() as u64).saturating_mul(factor);
        let capped = exp.min(CAP.as_millis() as u64).max(BASE.as_millis() as u64);
        self.attempt += 1;

        let jitter_range = capped / 4;
        let jitter = if jitter_range == 0 { 0 } else { rand::thread_rng().gen_range(0..=jitter_range) };
        Duration::from_millis(capped.saturating_sub(jitter))
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_and_saturates_at_the_cap() {
        let mut backoff = Backoff::new();
        let first = backoff.next_delay();
        assert!(first >= Duration::from_millis(150) && first <= BASE);

        let mut last = first;
        for _ in 0..20 {
            last = backoff.next_delay();
        }
        assert!(last <= CAP);
    }

    #[test]
    fn reset_returns_to_the_base_delay() {
        let mut backoff = Backoff::new();
        for _ in 0..10 {
            backoff.next_delay();
        }
        backoff.reset();
        let delay = backoff.next_delay();
        assert!(delay <= BASE);
    }
}
