//! Per-adapter configuration (§6.4), built with a chained `Builder`, the
//! pattern the teacher uses for its MQTT client (`mqtt/src/client.rs`'s
//! `Builder`).

use std::time::Duration;

/// How the adapter's own `Debug`/`Warn`/`Err` log packets are delivered
/// (§4.D.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// Print locally only, never publish.
    Console,
    /// Publish on the log topic only, never print locally.
    Upload,
    /// Both print and publish.
    All,
    /// Discard.
    None,
}

#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub module: String,
    pub prefix: String,
    pub timeout: Duration,
    pub retry: u32,
    pub channel_buffer_size: usize,
    pub log_mode: LogMode,
    /// `IsSync` in the source material: synchronous handlers run inline on
    /// the dispatch loop; concurrent handlers are spawned (§4.D.5).
    pub sync: bool,
    /// `IsWaitLink`: whether callers should block on `wait_linked()` before
    /// issuing requests.
    pub wait_for_link: bool,
    /// Grace period between an inbound `Exit` request's response and the
    /// adapter actually stopping (§4.D.3, §C.2 of SPEC_FULL.md).
    pub exit_grace: Duration,
    /// Extra version strings appended after the library's own for
    /// `GetVersion` (§6.3).
    pub extra_versions: Vec<String>,
}

pub struct AdapterSettingsBuilder {
    settings: AdapterSettings,
}

impl AdapterSettingsBuilder {
    pub fn new(module: impl Into<String>) -> Self {
        AdapterSettingsBuilder {
            settings: AdapterSettings {
                module: module.into(),
                prefix: String::new(),
                timeout: Duration::from_secs(5),
                retry: 0,
                channel_buffer_size: 100,
                log_mode: LogMode::Console,
                sync: false,
                wait_for_link: false,
                exit_grace: Duration::from_millis(100),
                extra_versions: Vec::new(),
            },
        }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.settings.prefix = prefix.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = timeout;
        self
    }

    pub fn retry(mut self, retry: u32) -> Self {
        self.settings.retry = retry;
        self
    }

    pub fn channel_buffer_size(mut self, size: usize) -> Self {
        self.settings.channel_buffer_size = size;
        self
    }

    pub fn log_mode(mut self, mode: LogMode) -> Self {
        self.settings.log_mode = mode;
        self
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.settings.sync = sync;
        self
    }

    pub fn wait_for_link(mut self, wait: bool) -> Self {
        self.settings.wait_for_link = wait;
        self
    }

    pub fn exit_grace(mut self, grace: Duration) -> Self {
        self.settings.exit_grace = grace;
        self
    }

    pub fn extra_version(mut self, version: impl Into<String>) -> Self {
        self.settings.extra_versions.push(version.into());
        self
    }

    pub fn build(self) -> AdapterSettings {
        self.settings
    }
}
