//! The MQTT [`Engine`] (§4.E): QoS 0 everywhere (fire-and-forget, matching
//! the spec's explicit choice not to build QoS 1/2 acknowledgement tracking
//! into the adapter layer — the correlation table already gives us
//! at-least-logically-once delivery for requests) and a bounded exponential
//! reconnect (§C.2 of SPEC_FULL.md) driven by [`crate::backoff::Backoff`].
//!
//! Grounded in the teacher's `mqtt::Client`/`Builder` shape
//! (`mqtt/src/client.rs`) for the public surface, but the wire protocol
//! itself is handed off to `rumqttc` rather than reimplemented — the
//! teacher's own newer-generation crates (`mqtt-proto`, `mqtt-sync-client`)
//! show the same preference for a maintained protocol implementation over
//! hand-rolled packet code where one exists.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use messaging_core::{Engine, EngineError, EngineHooks, LinkState};
use messaging_wire::Packet;
use rumqttc::{AsyncClient, Event, MqttOptions, QoS};
use tokio::sync::Mutex;

use crate::backoff::Backoff;
use crate::settings::MqttSettings;

pub struct MqttEngine {
    settings: MqttSettings,
    client: Mutex<Option<AsyncClient>>,
    event_loop_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl MqttEngine {
    pub fn new(settings: MqttSettings) -> Self {
        MqttEngine { settings, client: Mutex::new(None), event_loop_task: Mutex::new(None) }
    }

    fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(self.settings.client_id.clone(), self.settings.host.clone(), self.settings.port);
        options.set_keep_alive(self.settings.keep_alive);
        options.set_clean_session(self.settings.clean_session);
        if let Some((user, pass)) = &self.settings.credentials {
            options.set_credentials(user.clone(), pass.clone());
        }
        options
    }

    async fn drive_event_loop(mut event_loop: rumqttc::EventLoop, hooks: EngineHooks) {
        let mut backoff = Backoff::new();
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(rumqttc::Packet::ConnAck(_))) => {
                    backoff.reset();
                    hooks.report(LinkState::Linked).await;
                }
                Ok(Event::Incoming(rumqttc::Packet::Publish(publish))) => {
                    match messaging_wire::decode(&publish.payload) {
                        Ok(packet) => hooks.deliver(packet).await,
                        Err(e) => log::warn!("dropping malformed MQTT payload on {}: {e}", publish.topic),
                    }
                }
                Ok(Event::Incoming(rumqttc::Packet::Disconnect)) => {
                    hooks.report(LinkState::LinkLost).await;
                }
                Ok(_) => {}
                Err(e) => {
                    hooks.report(LinkState::LinkLost).await;
                    let delay = backoff.next_delay();
                    log::warn!("MQTT connection error: {e}; retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl Engine for MqttEngine {
    async fn on_link(&self, hooks: EngineHooks) -> Result<(), EngineError> {
        hooks.report(LinkState::Connecting).await;
        let (client, event_loop) = AsyncClient::new(self.mqtt_options(), self.settings.request_channel_capacity);
        *self.client.lock().await = Some(client);
        let join = tokio::spawn(Self::drive_event_loop(event_loop, hooks));
        *self.event_loop_task.lock().await = Some(join);
        Ok(())
    }

    async fn on_stop(&self) -> Result<(), EngineError> {
        if let Some(client) = self.client.lock().await.take() {
            if let Err(e) = client.disconnect().await {
                log::warn!("MQTT disconnect failed: {e}");
            }
        }
        if let Some(task) = self.event_loop_task.lock().await.take() {
            task.abort();
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), EngineError> {
        let client = self.client.lock().await.clone().ok_or(EngineError::NotLinked)?;
        client.subscribe(topic, QoS::AtMostOnce).await.map_err(|e| EngineError::Transport(e.to_string()))
    }

    async fn publish(&self, topic: &str, retain: bool, packet: &Packet) -> Result<(), EngineError> {
        let frame = messaging_wire::encode(packet).map_err(|e| EngineError::Transport(e.to_string()))?;
        self.publish_raw(topic, retain, frame).await
    }

    async fn publish_raw(&self, topic: &str, retain: bool, bytes: Bytes) -> Result<(), EngineError> {
        let client = self.client.lock().await.clone().ok_or(EngineError::NotLinked)?;
        client
            .publish(topic, QoS::AtMostOnce, retain, bytes.to_vec())
            .await
            .map_err(|e| EngineError::Transport(e.to_string()))
    }
}

/// Cloning an `Arc<MqttEngine>` rather than the engine itself is the normal
/// way to share one connection across adapters; `AsyncClient` is already
/// cheap to clone (it's a handle over an internal channel), which is why
/// `client.lock().await.clone()` above is fine to do on every call.
pub type SharedMqttEngine = Arc<MqttEngine>;
