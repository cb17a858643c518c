//! The in-process [`Engine`] implementation (§4.F): wires an adapter
//! directly into a shared [`Broker`] instead of a network transport. Link
//! state goes straight to `Linked` since there is no connection to
//! establish, and publish/subscribe are direct calls into the broker rather
//! than a round trip.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use messaging_core::{Engine, EngineError, EngineHooks, LinkState};
use messaging_wire::Packet;
use tokio::sync::Mutex;

use crate::broker::Broker;

struct ReaderTask {
    subscriber_id: usize,
    join: tokio::task::JoinHandle<()>,
}

/// One module's connection to a [`Broker`]. Cheap to construct; the real
/// shared state lives in the `Broker` itself.
pub struct InprocEngine {
    broker: Arc<Broker>,
    subscription_buffer: usize,
    /// Shared with every reader task spawned by `subscribe`, so a `reset`
    /// that hands this engine a fresh set of hooks updates deliveries in
    /// place instead of leaving old readers stuck pushing into a dispatch
    /// loop that already shut down.
    hooks: Arc<RwLock<Option<EngineHooks>>>,
    readers: Mutex<HashMap<String, ReaderTask>>,
}

impl InprocEngine {
    pub fn new(broker: Arc<Broker>) -> Self {
        InprocEngine { broker, subscription_buffer: 256, hooks: Arc::new(RwLock::new(None)), readers: Mutex::new(HashMap::new()) }
    }
}

#[async_trait]
impl Engine for InprocEngine {
    async fn on_link(&self, hooks: EngineHooks) -> Result<(), EngineError> {
        *self.hooks.write().unwrap() = Some(hooks.clone());
        // Nothing to connect to: the broker is already there, so report
        // Linked immediately. Subscriptions arrive afterward through
        // `subscribe`, driven by the adapter's own resubscribe-on-Linked
        // logic.
        hooks.report(LinkState::Linked).await;
        Ok(())
    }

    async fn on_stop(&self) -> Result<(), EngineError> {
        let mut readers = self.readers.lock().await;
        for (_, reader) in readers.drain() {
            self.broker.unsubscribe(reader.subscriber_id);
            reader.join.abort();
        }
        *self.hooks.write().unwrap() = None;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), EngineError> {
        if self.readers.lock().await.contains_key(topic) {
            return Ok(());
        }
        if self.hooks.read().unwrap().is_none() {
            return Err(EngineError::NotLinked);
        }

        let subscription = self.broker.subscribe(topic, self.subscription_buffer);
        let subscriber_id = subscription.id;
        let mut receiver = subscription.receiver;
        let hooks_cell = Arc::clone(&self.hooks);

        let join = tokio::spawn(async move {
            while let Some(frame) = receiver.recv().await {
                let hooks = hooks_cell.read().unwrap().clone();
                let Some(hooks) = hooks else { continue };
                match messaging_wire::decode(&frame) {
                    Ok(packet) => hooks.deliver(packet).await,
                    Err(e) => log::warn!("dropping malformed in-process frame: {e}"),
                }
            }
        });

        self.readers.lock().await.insert(topic.to_string(), ReaderTask { subscriber_id, join });
        Ok(())
    }

    async fn publish(&self, _topic: &str, retain: bool, packet: &Packet) -> Result<(), EngineError> {
        self.broker.publish(packet, retain).map_err(|e| EngineError::Transport(e.to_string()))
    }

    async fn publish_raw(&self, _topic: &str, _retain: bool, _bytes: Bytes) -> Result<(), EngineError> {
        Err(EngineError::Transport(
            "InprocEngine has no raw-publish path: the broker derives topics from a decoded packet".into(),
        ))
    }
}
