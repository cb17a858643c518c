//! Module-to-module messaging over a pub/sub transport.
//!
//! This crate is a thin facade: the real implementation lives in
//! `messaging-wire` (framing, topics, packet types), `messaging-core` (the
//! adapter, correlation, dispatch loop), `messaging-inproc` (the in-process
//! broker and engine) and, behind the `mqtt` feature, `messaging-mqtt`.
//! `messaging-proxy` bridges any two engines together.

pub use messaging_core::{
    adapter, correlation, engine, error, handlers, monitor, settings, subscriptions, Adapter,
    AdapterError, AdapterSettings, AdapterSettingsBuilder, AdapterStatus, CorrelationTable,
    Engine, EngineError, EngineHooks, Handlers, LinkState, LogMode, NoticeSubscription,
    NoticeSubscriptions,
};
pub use messaging_inproc::{Broker, InprocEngine};
pub use messaging_proxy::{AcceptRequestFn, CallSide, LogForwardMode, Proxy, ProxyConfig, Side};
pub use messaging_wire::{
    codec, ids, packet, topic, CodecError, IdGenerator, IdGenerators, KindTag, LogHeader,
    LogLevel, ModuleId, NoticeHeader, Packet, RequestHeader, RespCode, ResponseHeader,
};

#[cfg(feature = "mqtt")]
pub use messaging_mqtt::{MqttEngine, MqttSettings, MqttSettingsBuilder};

/// This crate's own version, the first entry `GetVersion` answers with
/// (§6.3).
pub const VERSION: &str = concat!("messaging/", env!("CARGO_PKG_VERSION"));
