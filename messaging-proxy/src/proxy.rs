//! Bi-transport proxy (§4.G): bridges two [`Engine`]s, rewriting module
//! namespaces so both sides can address each other without their local
//! module names colliding, and relaying requests, responses, notices,
//! retained notices and logs between them.
//!
//! # Namespace rewriting
//!
//! Each side is given a short tag (e.g. `"A"`, `"B"`). A caller on side A
//! addresses a module living on side B by prefixing the target with B's
//! tag: `to = "B/EchoService"`. The proxy, watching every request on A's
//! bus, recognizes this prefix, strips it, tags `from` with A's own tag,
//! and republishes the request — now addressed to the bare module name —
//! onto B's bus. The responder on B replies the ordinary way; its response
//! carries `to = "A/<original requester>"` (because [`messaging_wire::ResponseHeader::for_request`]
//! copies `from` into `to` unchanged), which the proxy running on B's side
//! recognizes and relays back to A, stripped of the tag again.
//!
//! Notices and logs have no per-message destination, so their *route* (or,
//! for logs, `from`) gets the origin side's tag prepended instead — a
//! subscriber on the other side opts in by subscribing to the tagged route.
//! Whether any of this mirroring happens at all is gated per-direction by
//! [`crate::config::ProxyConfig`] (§4.G(3), §6.4); logs additionally never
//! cross in the B→A direction (§4.G.5).
//!
//! # Reverse requests
//!
//! A [`Proxy`] can be built with an optional *A-side request callback*
//! (§4.G.4). When set, a request arriving on B addressed to A's tag is
//! answered by that callback directly instead of being forwarded across to
//! A's engine — the proxy itself is the synchronous responder, publishing
//! the reply straight back onto B.
//!
//! # Loop prevention
//!
//! A side only relays a request/response whose `to` names the *other*
//! side's tag, and only relays a notice/log whose route/from is not
//! *already* tagged with either side's tag — which is always true for
//! genuinely local traffic and never true for anything the proxy itself
//! just published (self-echo suppression, §4.D.5's principle applied at
//! the proxy). A bounded [`crate::dedup::RecentIds`] cache is kept as a
//! backstop against a response id being relayed twice.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use messaging_core::correlation::CorrelationTable;
use messaging_core::{Engine, EngineHooks, LinkState};
use messaging_wire::{
    now_iso8601_millis, topic, IdGenerator, LogHeader, LogLevel, NoticeHeader, Packet, RequestHeader, RespCode, ResponseHeader,
};
use tokio::sync::{mpsc, Mutex};

use crate::config::{LogForwardMode, ProxyConfig};
use crate::dedup::RecentIds;

/// The optional synchronous responder for requests aimed at A (§4.G.4).
pub type AcceptRequestFn = dyn Fn(&RequestHeader, Bytes) -> (RespCode, Bytes) + Send + Sync;

/// One side of a bridged pair.
pub struct Side<E: Engine> {
    pub tag: String,
    pub prefix: String,
    pub engine: Arc<E>,
}

impl<E: Engine> Side<E> {
    pub fn new(tag: impl Into<String>, prefix: impl Into<String>, engine: E) -> Self {
        Side { tag: tag.into(), prefix: prefix.into(), engine: Arc::new(engine) }
    }
}

pub struct Proxy<EA: Engine, EB: Engine> {
    a: Side<EA>,
    b: Side<EB>,
    config: ProxyConfig,
    /// The optional A-side request callback (§4.G.4) — when set, intercepts
    /// requests that would otherwise be forwarded B→A and answers them
    /// directly instead.
    a_side_handler: Option<Arc<AcceptRequestFn>>,
    recent_a_to_b: Mutex<RecentIds>,
    recent_b_to_a: Mutex<RecentIds>,
    /// Pending calls the proxy itself originated via [`Proxy::call_through`]
    /// (the "reverse synchronous call-in" of §4.G) — checked before a
    /// response is relayed onward, so a reply meant for the proxy's own
    /// health check isn't also forwarded as if it were bridged traffic.
    pending: CorrelationTable,
    pending_ids: IdGenerator,
}

const DEDUP_CAPACITY: usize = 4096;

impl<EA: Engine, EB: Engine> Proxy<EA, EB> {
    pub fn new(a: Side<EA>, b: Side<EB>, config: ProxyConfig, a_side_handler: Option<Arc<AcceptRequestFn>>) -> Arc<Self> {
        Arc::new(Proxy {
            a,
            b,
            config,
            a_side_handler,
            recent_a_to_b: Mutex::new(RecentIds::new(DEDUP_CAPACITY)),
            recent_b_to_a: Mutex::new(RecentIds::new(DEDUP_CAPACITY)),
            pending: CorrelationTable::new(),
            pending_ids: IdGenerator::new(),
        })
    }

    /// Links both sides and starts the two forwarding loops. Returns once
    /// both engines have reported their first `Linked` transition.
    pub async fn run(self: &Arc<Self>) {
        let (hooks_a, status_a) = self.link_side(&self.a).await;
        let (hooks_b, status_b) = self.link_side(&self.b).await;

        tokio::spawn(Self::subscribe_wildcards(Arc::clone(&self.a.engine), status_a));
        tokio::spawn(Self::subscribe_wildcards(Arc::clone(&self.b.engine), status_b));

        let this_ab = Arc::clone(self);
        tokio::spawn(async move { this_ab.forward_loop(Forward::AtoB, hooks_a).await });

        let this_ba = Arc::clone(self);
        tokio::spawn(async move { this_ba.forward_loop(Forward::BtoA, hooks_b).await });
    }

    async fn link_side<E: Engine>(&self, side: &Side<E>) -> (Hooks, mpsc::Receiver<LinkState>) {
        let (req_tx, req_rx) = mpsc::channel(256);
        let (resp_tx, resp_rx) = mpsc::channel(256);
        let (notice_tx, notice_rx) = mpsc::channel(256);
        let (log_tx, log_rx) = mpsc::channel(256);
        let (status_tx, status_rx) = mpsc::channel(16);

        let hooks = EngineHooks { request: req_tx, response: resp_tx, notice: notice_tx, log: log_tx, status: status_tx };
        if let Err(e) = side.engine.on_link(hooks).await {
            log::error!("proxy side {} failed to link: {e}", side.tag);
        }

        (Hooks { req_rx, resp_rx, notice_rx, log_rx }, status_rx)
    }

    async fn subscribe_wildcards<E: Engine>(engine: Arc<E>, mut status_rx: mpsc::Receiver<LinkState>) {
        while let Some(state) = status_rx.recv().await {
            if state != LinkState::Linked {
                continue;
            }
            for topic in ["Request/#", "Response/#", "Notice/#", "RetainNotice/#", "Log"] {
                if let Err(e) = engine.subscribe(topic).await {
                    log::warn!("proxy failed to subscribe to {topic}: {e}");
                }
            }
        }
    }

    async fn forward_loop(self: Arc<Self>, direction: Forward, mut hooks: Hooks) {
        loop {
            tokio::select! {
                Some(packet) = hooks.req_rx.recv() => self.forward_request(direction, packet).await,
                Some(packet) = hooks.resp_rx.recv() => self.forward_response(direction, packet).await,
                Some(packet) = hooks.notice_rx.recv() => self.forward_notice(direction, packet).await,
                Some(packet) = hooks.log_rx.recv() => self.forward_log(direction, packet).await,
                else => return,
            }
        }
    }

    fn sides(&self, direction: Forward) -> (&str, &str, &str, &str) {
        // Returns (from_tag, from_prefix, to_tag, to_prefix) for the
        // direction: from_tag is the tag identifying where traffic
        // originates, to_tag is the tag a caller must have used to aim at
        // the destination side.
        match direction {
            Forward::AtoB => (&self.a.tag, &self.a.prefix, &self.b.tag, &self.b.prefix),
            Forward::BtoA => (&self.b.tag, &self.b.prefix, &self.a.tag, &self.a.prefix),
        }
    }

    async fn publish_on_destination(&self, direction: Forward, prefix: &str, topic: &str, retain: bool, packet: &Packet) {
        let result = match direction {
            Forward::AtoB => self.b.engine.publish(topic, retain, packet).await,
            Forward::BtoA => self.a.engine.publish(topic, retain, packet).await,
        };
        if let Err(e) = result {
            log::warn!("proxy failed to relay onto {prefix}{topic}: {e}");
        }
    }

    async fn forward_request(&self, direction: Forward, packet: Packet) {
        let Packet::Request { header, content } = packet else { return };
        let (from_tag, _, to_tag, to_prefix) = self.sides(direction);

        let Some(stripped_to) = strip_tag(&header.to, to_tag) else { return };
        if already_tagged(&header.from, &self.a.tag, &self.b.tag) {
            return; // this request already crossed the proxy once
        }

        if direction == Forward::BtoA {
            if let Some(handler) = self.a_side_handler.clone() {
                self.answer_a_side_request(header, content, handler.as_ref()).await;
                return;
            }
        }

        let forwarded = RequestHeader { to: stripped_to.clone(), from: format!("{from_tag}/{}", header.from), ..header };
        let dest_topic = topic::req_topic(to_prefix, &forwarded.to);
        let packet = Packet::Request { header: forwarded, content };
        self.publish_on_destination(direction, to_prefix, &dest_topic, false, &packet).await;
    }

    /// Answers a request aimed at A directly, without forwarding it across
    /// to A's engine (§4.G.4). The reply is published straight back onto B,
    /// addressed to the original (untagged) requester.
    async fn answer_a_side_request(&self, header: RequestHeader, content: Bytes, handler: &AcceptRequestFn) {
        let (resp_code, resp_content) = handler(&header, content);
        let resp_header = ResponseHeader::for_request(&header, resp_code, None);
        let dest_topic = topic::resp_topic(&self.b.prefix, &header.from);
        let packet = Packet::Response { header: resp_header, content: resp_content };
        if let Err(e) = self.b.engine.publish(&dest_topic, false, &packet).await {
            log::warn!("proxy A-side responder failed to publish reply to {}: {e}", header.from);
        }
    }

    async fn forward_response(&self, direction: Forward, packet: Packet) {
        let Packet::Response { header, content } = packet else { return };
        let (_, _, to_tag, to_prefix) = self.sides(direction);

        let Some(stripped_to) = strip_tag(&header.to, to_tag) else { return };

        let dedup = match direction {
            Forward::AtoB => &self.recent_a_to_b,
            Forward::BtoA => &self.recent_b_to_a,
        };
        if !dedup.lock().await.insert_if_new(header.id) {
            return;
        }

        // A response meant for one of this proxy's own `call_through`
        // invocations is delivered there instead of being relayed onward.
        if self.pending.deliver(header.id, Packet::Response { header: header.clone(), content: content.clone() }) {
            return;
        }

        let forwarded = ResponseHeader { to: stripped_to, ..header };
        let dest_topic = topic::resp_topic(to_prefix, &forwarded.to);
        let packet = Packet::Response { header: forwarded, content };
        self.publish_on_destination(direction, to_prefix, &dest_topic, false, &packet).await;
    }

    async fn forward_notice(&self, direction: Forward, packet: Packet) {
        let Packet::Notice { header, content } = packet else { return };
        let (from_tag, _, _, to_prefix) = self.sides(direction);

        if already_tagged(&header.route, &self.a.tag, &self.b.tag) {
            return;
        }
        if header.retain {
            if !self.config.proxy_retain_notice {
                return;
            }
        } else if !self.config.proxy_notice {
            return;
        }

        let forwarded_route = format!("{from_tag}/{}", header.route);
        let retain = header.retain;
        let dest_topic = if retain {
            topic::retain_notice_topic(to_prefix, &forwarded_route)
        } else {
            topic::notice_topic(to_prefix, &forwarded_route)
        };
        let forwarded = NoticeHeader { route: forwarded_route, ..header };
        let packet = Packet::Notice { header: forwarded, content };
        self.publish_on_destination(direction, to_prefix, &dest_topic, retain, &packet).await;
    }

    async fn forward_log(&self, direction: Forward, packet: Packet) {
        // §4.G.5: logs in the B->A direction are never forwarded.
        if direction != Forward::AtoB {
            return;
        }
        let Packet::Log { header, content } = packet else { return };
        let (from_tag, _, _, to_prefix) = self.sides(direction);

        if already_tagged(&header.from, &self.a.tag, &self.b.tag) {
            return;
        }
        if !self.config.proxy_log {
            return;
        }
        match self.config.log_forward {
            LogForwardMode::None => return,
            LogForwardMode::ErrorOnly if header.level != LogLevel::Error => return,
            _ => {}
        }

        let forwarded = LogHeader { from: format!("{from_tag}/{}", header.from), ..header };
        let dest_topic = topic::log_topic(to_prefix);
        let packet = Packet::Log { header: forwarded, content };
        self.publish_on_destination(direction, to_prefix, &dest_topic, false, &packet).await;
    }

    /// The "reverse synchronous call-in" (§4.G): issues a request directly
    /// against the named side's engine and blocks for its response, without
    /// going through either side's adapter. `forward_response` checks
    /// `pending` before relaying a response onward, so the reply lands here
    /// instead of being bridged as if it were ordinary cross-side traffic.
    /// Used for proxy-originated calls — a health check, a diagnostic route
    /// — rather than regular bridged requests, which are never issued by
    /// the proxy itself.
    pub async fn call_through(&self, side: CallSide, to: &str, route: &str, content: impl Into<Bytes>, timeout: Duration) -> Option<Packet> {
        let id = self.pending_ids.next();
        let header = RequestHeader { id, from: "$proxy".to_string(), to: to.to_string(), route: route.to_string(), req_time: now_iso8601_millis() };
        let packet = Packet::Request { header, content: content.into() };

        let rx = self.pending.insert(id);
        let (engine_prefix, publish_result) = match side {
            CallSide::A => (&self.a.prefix, self.a.engine.publish(&topic::req_topic(&self.a.prefix, to), false, &packet).await),
            CallSide::B => (&self.b.prefix, self.b.engine.publish(&topic::req_topic(&self.b.prefix, to), false, &packet).await),
        };
        if let Err(e) = publish_result {
            log::warn!("proxy call-through to {engine_prefix}{to}/{route} failed to publish: {e}");
            self.pending.remove(id);
            return None;
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Some(response),
            _ => {
                self.pending.remove(id);
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Forward {
    AtoB,
    BtoA,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallSide {
    A,
    B,
}

struct Hooks {
    req_rx: mpsc::Receiver<Packet>,
    resp_rx: mpsc::Receiver<Packet>,
    notice_rx: mpsc::Receiver<Packet>,
    log_rx: mpsc::Receiver<Packet>,
}

fn strip_tag<'a>(value: &'a str, tag: &str) -> Option<String> {
    value.strip_prefix(tag).and_then(|rest| rest.strip_prefix('/')).map(str::to_string)
}

fn already_tagged(value: &str, tag_a: &str, tag_b: &str) -> bool {
    value.starts_with(&format!("{tag_a}/")) || value.starts_with(&format!("{tag_b}/"))
}
