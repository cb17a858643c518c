//! The abstract transport contract (§4.C). An engine is a polymorphic
//! pub/sub transport: connect, publish, subscribe, disconnect, and link
//! state reporting. The adapter owns its engine exclusively; the engine
//! owns none of the adapter's state, only a thin [`EngineHooks`] handle it
//! uses to push decoded packets and status transitions back (see the
//! cyclic-reference design note in SPEC_FULL.md §9 of spec.md).

use async_trait::async_trait;
use bytes::Bytes;
use messaging_wire::Packet;
use tokio::sync::mpsc;

use crate::error::EngineError;

/// Link-state transitions an engine reports (§4.C, §6.5). `Stopped` is an
/// adapter-local state, not something an engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Linked,
    LinkLost,
}

/// The four inbound packet channels plus the status channel, handed to the
/// engine at `on_link` time. Cloning is cheap (it's just `mpsc::Sender`
/// clones) so an engine may fan this out to as many internal tasks as it
/// needs.
#[derive(Clone)]
pub struct EngineHooks {
    pub request: mpsc::Sender<Packet>,
    pub response: mpsc::Sender<Packet>,
    pub notice: mpsc::Sender<Packet>,
    pub log: mpsc::Sender<Packet>,
    pub status: mpsc::Sender<LinkState>,
}

impl EngineHooks {
    /// Routes a decoded inbound packet to the channel matching its kind.
    /// Channel-full backpressure is applied to the caller (§5): a full
    /// channel blocks here rather than dropping.
    pub async fn deliver(&self, packet: Packet) {
        let sender = match &packet {
            Packet::Request { .. } => &self.request,
            Packet::Response { .. } => &self.response,
            Packet::Notice { .. } => &self.notice,
            Packet::Log { .. } => &self.log,
        };

        if sender.send(packet).await.is_err() {
            log::trace!("dropping inbound packet: adapter dispatch loop has stopped");
        }
    }

    pub async fn report(&self, state: LinkState) {
        if self.status.send(state).await.is_err() {
            log::trace!("dropping link-state transition: adapter dispatch loop has stopped");
        }
    }
}

/// The abstract transport contract (§4.C).
#[async_trait]
pub trait Engine: Send + Sync + 'static {
    /// Perform connection. Invoked once per link attempt; reconnection
    /// after the initial link is the engine's own responsibility, reported
    /// through repeated `hooks.report(LinkState::Linked)` calls.
    async fn on_link(&self, hooks: EngineHooks) -> Result<(), EngineError>;

    /// Disconnect gracefully. Idempotent.
    async fn on_stop(&self) -> Result<(), EngineError>;

    /// Register interest in a topic (wildcard `#` permitted). Decoded
    /// packets matching it arrive through the hooks given to `on_link`.
    async fn subscribe(&self, topic: &str) -> Result<(), EngineError>;

    /// Encode and send `packet` to `topic`.
    async fn publish(&self, topic: &str, retain: bool, packet: &Packet) -> Result<(), EngineError>;

    /// Send a pre-encoded frame verbatim, without reserialization — the
    /// zero-copy path the proxy uses to relay packets it never decodes
    /// semantically.
    async fn publish_raw(&self, topic: &str, retain: bool, bytes: Bytes) -> Result<(), EngineError>;
}
