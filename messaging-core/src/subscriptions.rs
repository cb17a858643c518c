//! The set of notice routes an adapter has asked to receive (§3
//! "Subscription set", §4.D.4 `SubscribeNotice`). Replayed against the
//! engine on every `Linked` transition so a reconnect never loses a
//! subscription the caller registered earlier.

use std::collections::HashSet;
use std::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NoticeSubscription {
    pub route: String,
    pub retain: bool,
}

#[derive(Default)]
pub struct NoticeSubscriptions {
    inner: RwLock<HashSet<NoticeSubscription>>,
}

impl NoticeSubscriptions {
    pub fn new() -> Self {
        NoticeSubscriptions::default()
    }

    /// Registers interest, returning `true` if this is a new registration
    /// (the caller should subscribe through the engine immediately if
    /// currently linked).
    pub fn add(&self, route: impl Into<String>, retain: bool) -> bool {
        self.inner.write().unwrap().insert(NoticeSubscription {
            route: route.into(),
            retain,
        })
    }

    pub fn iter_snapshot(&self) -> Vec<NoticeSubscription> {
        self.inner.read().unwrap().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_the_same_route_twice_is_idempotent() {
        let subs = NoticeSubscriptions::new();
        assert!(subs.add("alerts", false));
        assert!(!subs.add("alerts", false));
        assert_eq!(subs.iter_snapshot().len(), 1);
    }
}
