//! The MQTT transport (§4.E): an [`Engine`](messaging_core::Engine)
//! implementation backed by `rumqttc`.

pub mod backoff;
pub mod engine;
pub mod settings;

pub use engine::MqttEngine;
pub use settings::{MqttSettings, MqttSettingsBuilder};
