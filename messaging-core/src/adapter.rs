//! The core adapter (§4.D): lifecycle/link-state machine, correlated
//! request/response with retry, notice and log emission, and the dispatch
//! loop that demultiplexes inbound traffic to user handlers.
//!
//! Grounded in the teacher's `mqtt::Client` (`mqtt/src/client.rs`): a single
//! struct wrapping a transport, driven by one background task reading from a
//! handful of channels, with connect/publish/subscribe surfaced as async
//! methods on an `Arc`-shared handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use messaging_wire::{
    now_iso8601_millis, LogHeader, LogLevel, NoticeHeader, Packet, RequestHeader, RespCode,
    ResponseHeader,
};
use tokio::sync::{mpsc, oneshot, watch, Mutex as AsyncMutex, Notify};

use crate::correlation::CorrelationTable;
use crate::engine::{Engine, EngineHooks, LinkState};
use crate::error::{AdapterError, EngineError};
use crate::handlers::Handlers;
use crate::settings::{AdapterSettings, LogMode};
use crate::subscriptions::NoticeSubscriptions;

/// Reserved routes every adapter answers without involving the user's
/// request handler (§4.D.3).
const ROUTE_GET_VERSION: &str = "GetVersion";
const ROUTE_EXIT: &str = "Exit";

/// Status an adapter reports to observers, adding `Stopped` to the engine's
/// own [`LinkState`] (§6.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterStatus {
    Connecting,
    Linked,
    LinkLost,
    Stopped,
}

struct DispatchLoopHandle {
    stop: oneshot::Sender<()>,
    join: tokio::task::JoinHandle<()>,
}

/// A running module-to-module messaging endpoint, parameterized over its
/// transport [`Engine`]. Constructed once per module, `link`ed to start
/// moving traffic, and `stop`ped when the module shuts down.
pub struct Adapter<E: Engine> {
    settings: AdapterSettings,
    engine: Arc<E>,
    handlers: Handlers,
    ids: messaging_wire::IdGenerators,
    correlations: CorrelationTable,
    notice_subs: NoticeSubscriptions,
    is_linked: AtomicBool,
    linked_once: Notify,
    status_tx: watch::Sender<AdapterStatus>,
    /// Whether this adapter subscribes to every module's traffic under its
    /// prefix instead of only its own (§4.H, the monitor specialization).
    wildcard: bool,
    running: AsyncMutex<Option<DispatchLoopHandle>>,
}

impl<E: Engine> Adapter<E> {
    pub fn new(settings: AdapterSettings, engine: E, handlers: Handlers) -> Arc<Self> {
        Adapter::new_inner(settings, engine, handlers, false)
    }

    /// Constructs a passive observer: subscribes to every request, response,
    /// notice, retained notice and log under the prefix, and never answers a
    /// request with anything but [`RespCode::Bypass`] (§4.H). `handlers`
    /// supplies the observation callbacks (`on_notice`, `on_log`,
    /// `on_response_observed`); its `request` callback, if any, is
    /// overridden — a monitor always bypasses.
    pub fn new_monitor(module: impl Into<String>, prefix: impl Into<String>, engine: E, handlers: Handlers) -> Arc<Self> {
        let settings = crate::settings::AdapterSettingsBuilder::new(module)
            .prefix(prefix)
            .build();
        let handlers = handlers.on_request(|_header, _content| (RespCode::Bypass, Bytes::new()));
        Adapter::new_inner(settings, engine, handlers, true)
    }

    fn new_inner(settings: AdapterSettings, engine: E, handlers: Handlers, wildcard: bool) -> Arc<Self> {
        let (status_tx, _status_rx) = watch::channel(AdapterStatus::Stopped);
        Arc::new(Adapter {
            settings,
            engine: Arc::new(engine),
            handlers,
            ids: messaging_wire::IdGenerators::new(),
            correlations: CorrelationTable::new(),
            notice_subs: NoticeSubscriptions::new(),
            is_linked: AtomicBool::new(false),
            linked_once: Notify::new(),
            status_tx,
            wildcard,
            running: AsyncMutex::new(None),
        })
    }

    pub fn settings(&self) -> &AdapterSettings {
        &self.settings
    }

    pub fn is_linked(&self) -> bool {
        self.is_linked.load(Ordering::Acquire)
    }

    pub fn status(&self) -> watch::Receiver<AdapterStatus> {
        self.status_tx.subscribe()
    }

    /// Blocks until the first `Linked` transition. A no-op if already
    /// linked.
    pub async fn wait_linked(&self) {
        if self.is_linked() {
            return;
        }
        self.linked_once.notified().await;
    }

    /// Starts the dispatch loop and hands the engine its hooks (§4.D.1).
    /// Calling `link` on an adapter that is already running restarts the
    /// dispatch loop first (the same path `reset` takes) so repeated calls
    /// are harmless.
    pub async fn link(self: &Arc<Self>) -> Result<(), AdapterError> {
        self.reset().await
    }

    /// Tears down the current dispatch loop (if any) and starts a fresh one,
    /// then calls the engine's `on_link` again. Subscriptions are replayed
    /// from scratch once the engine reports `Linked` (§6.6 "Reset").
    pub async fn reset(self: &Arc<Self>) -> Result<(), AdapterError> {
        self.teardown_running().await;

        let buf = self.settings.channel_buffer_size;
        let (req_tx, req_rx) = mpsc::channel(buf);
        let (resp_tx, resp_rx) = mpsc::channel(buf);
        let (notice_tx, notice_rx) = mpsc::channel(buf);
        let (log_tx, log_rx) = mpsc::channel(buf);
        let (status_tx, status_rx) = mpsc::channel(buf.max(16));
        let (stop_tx, stop_rx) = oneshot::channel();

        let hooks = EngineHooks {
            request: req_tx,
            response: resp_tx,
            notice: notice_tx,
            log: log_tx,
            status: status_tx,
        };

        let this = Arc::clone(self);
        let join = tokio::spawn(this.dispatch_loop(req_rx, resp_rx, notice_rx, log_rx, status_rx, stop_rx));
        *self.running.lock().await = Some(DispatchLoopHandle { stop: stop_tx, join });

        self.status_tx.send_replace(AdapterStatus::Connecting);
        if let Some(cb) = &self.handlers.status {
            cb(LinkState::Connecting);
        }
        self.engine.on_link(hooks).await?;
        Ok(())
    }

    /// Disconnects and stops the dispatch loop. Idempotent.
    pub async fn stop(self: &Arc<Self>) -> Result<(), AdapterError> {
        self.is_linked.store(false, Ordering::Release);
        self.correlations.cancel_all();
        self.engine.on_stop().await?;
        self.teardown_running().await;
        self.status_tx.send_replace(AdapterStatus::Stopped);
        if let Some(cb) = &self.handlers.status {
            cb(LinkState::LinkLost);
        }
        Ok(())
    }

    async fn teardown_running(&self) {
        if let Some(handle) = self.running.lock().await.take() {
            let _ = handle.stop.send(());
            let _ = handle.join.await;
        }
    }

    /// Issues a request and retries up to `settings.retry` additional times
    /// on timeout, for `settings.retry + 1` attempts total (§4.D.2, the
    /// spec's own recommended reading of "retry count").
    pub async fn req(&self, to: &str, route: &str, content: impl Into<Bytes>) -> Packet {
        self.req_with_timeout(to, route, content, self.settings.timeout).await
    }

    pub async fn req_with_timeout(
        &self,
        to: &str,
        route: &str,
        content: impl Into<Bytes>,
        timeout: Duration,
    ) -> Packet {
        let content = content.into();
        let attempts = self.settings.retry + 1;

        for attempt in 0..attempts {
            if !self.is_linked() {
                return unlinked_response(to, route);
            }

            let id = self.ids.request.next();
            let header = RequestHeader {
                id,
                from: self.settings.module.clone(),
                to: to.to_string(),
                route: route.to_string(),
                req_time: now_iso8601_millis(),
            };
            let packet = Packet::Request { header: header.clone(), content: content.clone() };

            // Insert before publish: a response racing the publish must
            // always find an entry waiting for it.
            let rx = self.correlations.insert(id);
            let topic = messaging_wire::topic::req_topic(&self.settings.prefix, to);
            if let Err(e) = self.engine.publish(&topic, false, &packet).await {
                self.correlations.remove(id);
                log::warn!("publish failed for request {id} to {to}/{route}: {e}");
                return transport_error_response(&header, e);
            }

            match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(response)) => return response,
                Ok(Err(_)) => {
                    // Sender dropped without delivering — the dispatch loop
                    // stopped out from under us (adapter is stopping).
                    return unlinked_response(to, route);
                }
                Err(_elapsed) => {
                    self.correlations.remove(id);
                    log::debug!(
                        "request {id} to {to}/{route} timed out (attempt {}/{attempts})",
                        attempt + 1
                    );
                }
            }
        }

        timeout_response(to, route)
    }

    pub async fn send_notice(&self, route: &str, content: impl Into<Bytes>) -> Result<(), AdapterError> {
        self.publish_notice(route, content.into(), false).await
    }

    pub async fn send_retain_notice(&self, route: &str, content: impl Into<Bytes>) -> Result<(), AdapterError> {
        self.publish_notice(route, content.into(), true).await
    }

    /// Publishes an empty-content retained notice, which brokers and
    /// subscribers alike treat as "clear the retained value" (§4.B).
    pub async fn clear_retain_notice(&self, route: &str) -> Result<(), AdapterError> {
        self.publish_notice(route, Bytes::new(), true).await
    }

    async fn publish_notice(&self, route: &str, content: Bytes, retain: bool) -> Result<(), AdapterError> {
        let header = NoticeHeader { id: self.ids.notice.next(), from: self.settings.module.clone(), route: route.to_string(), retain };
        let packet = Packet::Notice { header, content };
        let topic = if retain {
            messaging_wire::topic::retain_notice_topic(&self.settings.prefix, route)
        } else {
            messaging_wire::topic::notice_topic(&self.settings.prefix, route)
        };
        self.engine.publish(&topic, retain, &packet).await?;
        Ok(())
    }

    /// Registers interest in a notice route, subscribing immediately if
    /// already linked; otherwise replayed on the next `Linked` transition
    /// (§4.D.4).
    pub async fn subscribe_notice(&self, route: &str, retain: bool) {
        let is_new = self.notice_subs.add(route, retain);
        if is_new && self.is_linked() {
            let topic = notice_subscription_topic(&self.settings.prefix, route, retain);
            if let Err(e) = self.engine.subscribe(&topic).await {
                log::warn!("failed to subscribe to {topic}: {e}");
            }
        }
    }

    pub async fn debug(&self, content: impl Into<String>) {
        self.emit_log(LogLevel::Debug, content.into()).await;
    }

    pub async fn warn(&self, content: impl Into<String>) {
        self.emit_log(LogLevel::Warning, content.into()).await;
    }

    pub async fn err(&self, content: impl Into<String>) {
        self.emit_log(LogLevel::Error, content.into()).await;
    }

    async fn emit_log(&self, level: LogLevel, content: String) {
        let should_print = matches!(self.settings.log_mode, LogMode::Console | LogMode::All);
        let should_upload = matches!(self.settings.log_mode, LogMode::Upload | LogMode::All);

        if should_print {
            match level {
                LogLevel::Debug => log::debug!("[{}] {content}", self.settings.module),
                LogLevel::Warning => log::warn!("[{}] {content}", self.settings.module),
                LogLevel::Error => log::error!("[{}] {content}", self.settings.module),
            }
        }

        if !should_upload || !self.is_linked() {
            return;
        }

        let header = LogHeader { id: self.ids.log.next(), from: self.settings.module.clone(), level, log_time: now_iso8601_millis() };
        let packet = Packet::Log { header, content };
        let topic = messaging_wire::topic::log_topic(&self.settings.prefix);
        if let Err(e) = self.engine.publish(&topic, false, &packet).await {
            log::warn!("failed to upload log packet: {e}");
        }
    }

    /// The version strings this adapter answers `GetVersion` with: its own
    /// crate version followed by any caller-supplied extras (§6.3).
    fn version_payload(&self) -> Bytes {
        let mut versions = vec![format!("messaging-core/{}", env!("CARGO_PKG_VERSION"))];
        versions.extend(self.settings.extra_versions.iter().cloned());
        Bytes::from(serde_json::to_vec(&versions).unwrap_or_default())
    }

    async fn handle_inbound_request(self: Arc<Self>, header: RequestHeader, content: Bytes) {
        let (resp_code, resp_content) = match header.route.as_str() {
            ROUTE_GET_VERSION => (RespCode::Success, self.version_payload()),
            ROUTE_EXIT => {
                if let Some(hook) = &self.handlers.exit {
                    hook();
                }
                let grace = self.settings.exit_grace;
                let this = Arc::clone(&self);
                tokio::spawn(async move {
                    tokio::time::sleep(grace).await;
                    if let Err(e) = this.stop().await {
                        log::warn!("stop after Exit request failed: {e}");
                    }
                });
                (RespCode::Success, Bytes::new())
            }
            _ => match &self.handlers.request {
                Some(handler) => handler(&header, content),
                None => (RespCode::NotFound, Bytes::new()),
            },
        };

        if matches!(resp_code, RespCode::Bypass) {
            return;
        }

        let resp_header = ResponseHeader::for_request(&header, resp_code, None);
        let packet = Packet::Response { header: resp_header, content: resp_content };
        let topic = messaging_wire::topic::resp_topic(&self.settings.prefix, &header.from);
        if let Err(e) = self.engine.publish(&topic, false, &packet).await {
            log::warn!("failed to publish response to request {}: {e}", header.id);
        }
    }

    async fn handle_status_change(self: &Arc<Self>, state: LinkState) {
        match state {
            LinkState::Connecting => {
                self.status_tx.send_replace(AdapterStatus::Connecting);
            }
            LinkState::Linked => {
                self.resubscribe_all().await;
                self.is_linked.store(true, Ordering::Release);
                self.status_tx.send_replace(AdapterStatus::Linked);
                self.linked_once.notify_waiters();
                if let Err(e) = self.publish_notice("Linked", Bytes::from_static(b"I am online"), false).await {
                    log::warn!("failed to publish Linked notice: {e}");
                }
            }
            LinkState::LinkLost => {
                self.is_linked.store(false, Ordering::Release);
                self.status_tx.send_replace(AdapterStatus::LinkLost);
            }
        }
        if let Some(cb) = &self.handlers.status {
            cb(state);
        }
    }

    /// Replays every registered notice subscription (and the request/
    /// response/log topics this adapter cares about) against the engine —
    /// run on every `Linked` transition so a reconnect never silently drops
    /// a subscription a caller registered earlier (§4.D.1, §6.6).
    async fn resubscribe_all(&self) {
        let prefix = &self.settings.prefix;

        let req_topic = if self.wildcard {
            format!("{}Request/#", messaging_wire::topic::normalize_prefix(prefix))
        } else {
            messaging_wire::topic::req_topic(prefix, &self.settings.module)
        };
        if self.wildcard || self.handlers.request.is_some() {
            self.try_subscribe(&req_topic).await;
        }

        let resp_topic = if self.wildcard {
            format!("{}Response/#", messaging_wire::topic::normalize_prefix(prefix))
        } else {
            messaging_wire::topic::resp_topic(prefix, &self.settings.module)
        };
        self.try_subscribe(&resp_topic).await;

        if self.wildcard {
            self.try_subscribe(&format!("{}Notice/#", messaging_wire::topic::normalize_prefix(prefix))).await;
            self.try_subscribe(&format!("{}RetainNotice/#", messaging_wire::topic::normalize_prefix(prefix))).await;
        } else {
            for sub in self.notice_subs.iter_snapshot() {
                let topic = notice_subscription_topic(prefix, &sub.route, sub.retain);
                self.try_subscribe(&topic).await;
            }
        }

        if self.wildcard || self.handlers.log.is_some() {
            self.try_subscribe(&messaging_wire::topic::log_topic(prefix)).await;
        }
    }

    async fn try_subscribe(&self, topic: &str) {
        if let Err(e) = self.engine.subscribe(topic).await {
            log::warn!("failed to subscribe to {topic}: {e}");
        }
    }

    async fn dispatch_loop(
        self: Arc<Self>,
        mut req_rx: mpsc::Receiver<Packet>,
        mut resp_rx: mpsc::Receiver<Packet>,
        mut notice_rx: mpsc::Receiver<Packet>,
        mut log_rx: mpsc::Receiver<Packet>,
        mut status_rx: mpsc::Receiver<LinkState>,
        mut stop_rx: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = &mut stop_rx => {
                    return;
                }
                Some(state) = status_rx.recv() => {
                    self.handle_status_change(state).await;
                }
                Some(packet) = req_rx.recv() => {
                    if packet.from() == self.settings.module {
                        continue;
                    }
                    let Packet::Request { header, content } = packet else { unreachable!() };
                    if self.settings.sync {
                        Arc::clone(&self).handle_inbound_request(header, content).await;
                    } else {
                        tokio::spawn(Arc::clone(&self).handle_inbound_request(header, content));
                    }
                }
                Some(packet) = resp_rx.recv() => {
                    if packet.from() == self.settings.module {
                        continue;
                    }
                    let Packet::Response { header, content } = packet else { unreachable!() };
                    let observer = self.handlers.response_observer.clone();
                    let correlations_hit = self.correlations.deliver(header.id, Packet::Response { header: header.clone(), content: content.clone() });
                    if !correlations_hit {
                        if let Some(observer) = observer {
                            tokio::spawn(async move { observer(&header, content); });
                        }
                    }
                }
                Some(packet) = notice_rx.recv() => {
                    if packet.from() == self.settings.module {
                        continue;
                    }
                    let Packet::Notice { header, content } = packet else { unreachable!() };
                    if let Some(handler) = self.handlers.notice.clone() {
                        if self.settings.sync {
                            handler(&header, content);
                        } else {
                            tokio::spawn(async move { handler(&header, content); });
                        }
                    }
                }
                Some(packet) = log_rx.recv() => {
                    if packet.from() == self.settings.module {
                        continue;
                    }
                    let Packet::Log { header, content } = packet else { unreachable!() };
                    if let Some(handler) = self.handlers.log.clone() {
                        if self.settings.sync {
                            handler(&header, &content);
                        } else {
                            tokio::spawn(async move { handler(&header, &content); });
                        }
                    }
                }
                else => {
                    return;
                }
            }
        }
    }
}

fn notice_subscription_topic(prefix: &str, route: &str, retain: bool) -> String {
    if retain {
        messaging_wire::topic::retain_notice_topic(prefix, route)
    } else {
        messaging_wire::topic::notice_topic(prefix, route)
    }
}

fn unlinked_response(to: &str, route: &str) -> Packet {
    Packet::Response {
        header: ResponseHeader {
            id: 0,
            from: to.to_string(),
            to: String::new(),
            route: route.to_string(),
            req_time: now_iso8601_millis(),
            resp_time: now_iso8601_millis(),
            resp_code: RespCode::UnLinked,
            error: None,
        },
        content: Bytes::new(),
    }
}

fn timeout_response(to: &str, route: &str) -> Packet {
    Packet::Response {
        header: ResponseHeader {
            id: 0,
            from: to.to_string(),
            to: String::new(),
            route: route.to_string(),
            req_time: now_iso8601_millis(),
            resp_time: now_iso8601_millis(),
            resp_code: RespCode::Timeout,
            error: None,
        },
        content: Bytes::new(),
    }
}

fn transport_error_response(req: &RequestHeader, e: EngineError) -> Packet {
    Packet::Response {
        header: ResponseHeader::for_request(req, RespCode::Error, Some(e.to_string())),
        content: Bytes::new(),
    }
}
