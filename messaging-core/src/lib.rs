//! The hard core: a transport-agnostic module-to-module adapter (§4.D)
//! built over the [`Engine`] contract (§4.C). Pair this with
//! `messaging-mqtt` or `messaging-inproc` for a concrete transport.

pub mod adapter;
pub mod correlation;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod monitor;
pub mod settings;
pub mod subscriptions;

pub use adapter::{Adapter, AdapterStatus};
pub use correlation::CorrelationTable;
pub use engine::{Engine, EngineHooks, LinkState};
pub use error::{AdapterError, EngineError};
pub use handlers::Handlers;
pub use settings::{AdapterSettings, AdapterSettingsBuilder, LogMode};
pub use subscriptions::{NoticeSubscription, NoticeSubscriptions};
