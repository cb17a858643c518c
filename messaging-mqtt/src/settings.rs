//! MQTT connection settings, built with the same chained `Builder` pattern
//! the teacher uses for its own client (`mqtt/src/client.rs::Builder`).

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    pub clean_session: bool,
    pub credentials: Option<(String, String)>,
    /// Channel capacity between the MQTT event loop and rumqttc's internal
    /// request queue.
    pub request_channel_capacity: usize,
}

pub struct MqttSettingsBuilder {
    settings: MqttSettings,
}

impl MqttSettingsBuilder {
    pub fn new(host: impl Into<String>, port: u16, client_id: impl Into<String>) -> Self {
        MqttSettingsBuilder {
            settings: MqttSettings {
                host: host.into(),
                port,
                client_id: client_id.into(),
                keep_alive: Duration::from_secs(30),
                clean_session: true,
                credentials: None,
                request_channel_capacity: 64,
            },
        }
    }

    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.settings.keep_alive = keep_alive;
        self
    }

    pub fn clean_session(mut self, clean_session: bool) -> Self {
        self.settings.clean_session = clean_session;
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.settings.credentials = Some((username.into(), password.into()));
        self
    }

    pub fn request_channel_capacity(mut self, capacity: usize) -> Self {
        self.settings.request_channel_capacity = capacity;
        self
    }

    pub fn build(self) -> MqttSettings {
        self.settings
    }
}
