//! A same-process pub/sub transport (§4.F): a shared [`Broker`] plus an
//! [`Engine`](messaging_core::Engine) implementation, [`InprocEngine`], that
//! wires an adapter straight into it. Useful both as a production transport
//! for modules sharing a process and as the deterministic transport the
//! rest of this workspace tests against.

pub mod broker;
pub mod engine;

pub use broker::{Broker, Subscription};
pub use engine::InprocEngine;
