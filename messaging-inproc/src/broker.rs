//! The shared in-process broker (§4.F): every [`crate::InprocEngine`]
//! attached to the same `Broker` publishes into and subscribes from one
//! table, so modules wired to the same broker behave exactly as they would
//! over a real pub/sub transport, minus the network.
//!
//! Grounded in the teacher's `Subscription<T>` table
//! (`mqtt-proto/src/server/subscription.rs`), which keeps subscribers in a
//! `Slab` behind a lock and walks a topic tree to find matches. Our topic
//! grammar never has wildcards anywhere but a subscription's tail, so the
//! tree collapses to a flat scan through [`messaging_wire::topic::topic_matches`]
//! rather than the teacher's per-level trie — same data structure choice
//! (`Slab` of subscribers under a lock), simpler match rule.

use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;
use messaging_wire::{topic, Packet};
use slab::Slab;
use tokio::sync::mpsc;

struct Subscriber {
    filter: String,
    sender: mpsc::Sender<Bytes>,
}

/// The handle a subscriber holds to unregister itself and receive frames.
pub struct Subscription {
    pub id: usize,
    pub receiver: mpsc::Receiver<Bytes>,
}

/// A single shared publish/subscribe table. Construct one `Broker` per
/// independent in-process bus; every [`crate::InprocEngine`] built from
/// `Arc<Broker>::clone()` of the same instance shares traffic.
#[derive(Default)]
pub struct Broker {
    prefix: String,
    subscribers: RwLock<Slab<Subscriber>>,
    retained: RwLock<HashMap<String, Bytes>>,
}

impl Broker {
    pub fn new(prefix: impl Into<String>) -> Self {
        Broker { prefix: prefix.into(), subscribers: RwLock::new(Slab::new()), retained: RwLock::new(HashMap::new()) }
    }

    /// Registers a new subscriber for `filter` (may end in `/#` or be the
    /// bare `#`), replaying any retained messages matching it immediately.
    pub fn subscribe(&self, filter: &str, buffer: usize) -> Subscription {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let id = self.subscribers.write().unwrap().insert(Subscriber { filter: filter.to_string(), sender: sender.clone() });

        let retained = self.retained.read().unwrap();
        for (retained_topic, frame) in retained.iter() {
            if topic::topic_matches(filter, retained_topic) {
                let _ = sender.try_send(frame.clone());
            }
        }

        Subscription { id, receiver }
    }

    pub fn unsubscribe(&self, id: usize) {
        self.subscribers.write().unwrap().try_remove(id);
    }

    /// Encodes `packet` and fans it out to every subscriber whose filter
    /// matches the topic *derived from the packet itself* — the topic
    /// argument an `Engine::publish` caller passes is never trusted; the
    /// broker reconstructs it from the decoded header so a buggy or
    /// malicious caller can't publish under an identity it doesn't own.
    pub fn publish(&self, packet: &Packet, retain: bool) -> Result<(), messaging_wire::CodecError> {
        let topic = self.derive_topic(packet, retain);
        let frame = messaging_wire::encode(packet)?;

        if retain {
            let mut retained = self.retained.write().unwrap();
            if frame_content_is_empty(packet) {
                retained.remove(&topic);
            } else {
                retained.insert(topic.clone(), frame.clone());
            }
        }

        let subscribers = self.subscribers.read().unwrap();
        let mut matched = 0;
        for (_, sub) in subscribers.iter() {
            if topic::topic_matches(&sub.filter, &topic) {
                matched += 1;
                if sub.sender.try_send(frame.clone()).is_err() {
                    log::trace!("dropping frame for a full or closed in-process subscriber on {topic}");
                }
            }
        }
        if matched == 0 {
            log::trace!("publish on {topic} matched no subscribers");
        }
        Ok(())
    }

    fn derive_topic(&self, packet: &Packet, retain: bool) -> String {
        match packet {
            Packet::Request { header, .. } => topic::req_topic(&self.prefix, &header.to),
            Packet::Response { header, .. } => topic::resp_topic(&self.prefix, &header.to),
            Packet::Notice { header, .. } if retain || header.retain => topic::retain_notice_topic(&self.prefix, &header.route),
            Packet::Notice { header, .. } => topic::notice_topic(&self.prefix, &header.route),
            Packet::Log { .. } => topic::log_topic(&self.prefix),
        }
    }
}

fn frame_content_is_empty(packet: &Packet) -> bool {
    match packet {
        Packet::Notice { content, .. } => content.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use messaging_wire::{NoticeHeader, RequestHeader};

    fn req(to: &str) -> Packet {
        Packet::Request {
            header: RequestHeader { id: 1, from: "A".into(), to: to.into(), route: "Ping".into(), req_time: "t".into() },
            content: Bytes::new(),
        }
    }

    fn notice(route: &str, retain: bool) -> Packet {
        Packet::Notice { header: NoticeHeader { id: 1, from: "A".into(), route: route.into(), retain }, content: Bytes::from_static(b"v") }
    }

    #[tokio::test]
    async fn delivers_only_to_matching_subscribers() {
        let broker = Broker::new("");
        let mut matching = broker.subscribe("Request/B", 8);
        let mut other = broker.subscribe("Request/C", 8);

        broker.publish(&req("B"), false).unwrap();

        assert!(matching.receiver.try_recv().is_ok());
        assert!(other.receiver.try_recv().is_err());
        broker.unsubscribe(matching.id);
        broker.unsubscribe(other.id);
    }

    #[tokio::test]
    async fn replays_retained_notices_to_late_subscribers() {
        let broker = Broker::new("");
        broker.publish(&notice("state", true), true).unwrap();

        let mut sub = broker.subscribe("RetainNotice/state", 8);
        assert!(sub.receiver.try_recv().is_ok(), "late subscriber should see the retained value");
        broker.unsubscribe(sub.id);
    }

    #[tokio::test]
    async fn empty_content_retained_notice_clears_the_retained_value() {
        let broker = Broker::new("");
        broker.publish(&notice("state", true), true).unwrap();
        let empty = Packet::Notice { header: NoticeHeader { id: 2, from: "A".into(), route: "state".into(), retain: true }, content: Bytes::new() };
        broker.publish(&empty, true).unwrap();

        let mut sub = broker.subscribe("RetainNotice/state", 8);
        assert!(sub.receiver.try_recv().is_err(), "cleared retained value should not replay");
        broker.unsubscribe(sub.id);
    }
}
