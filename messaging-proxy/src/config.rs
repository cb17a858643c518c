//! Per-direction forwarding policy (§4.G(3), §6.4): whether notices,
//! retained notices and logs cross the proxy at all, plus a level filter on
//! logs. Grounded on the toggles (`proxyNotice`, `proxyRetainNotice`,
//! `proxyLog`) carried by the Go original's own `proxy` struct
//! (`proxy.go:23-25`).

/// How logs are filtered once `proxy_log` lets any through at all (§4.G.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogForwardMode {
    /// Discard every log.
    None,
    /// Forward only `LogLevel::Error`.
    ErrorOnly,
    /// Forward everything.
    All,
}

impl Default for LogForwardMode {
    fn default() -> Self {
        LogForwardMode::All
    }
}

/// Forwarding policy a [`crate::proxy::Proxy`] is built with (§6.4: "per-
/// proxy: ... log-forward mode, notice/retain-notice/log forwarding
/// toggles").
#[derive(Debug, Clone, Copy)]
pub struct ProxyConfig {
    pub proxy_notice: bool,
    pub proxy_retain_notice: bool,
    pub proxy_log: bool,
    pub log_forward: LogForwardMode,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig { proxy_notice: true, proxy_retain_notice: true, proxy_log: true, log_forward: LogForwardMode::All }
    }
}
