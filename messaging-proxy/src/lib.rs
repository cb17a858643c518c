//! Bridges two transports so modules on either side can address each other
//! (§4.G).

pub mod config;
pub mod dedup;
pub mod proxy;

pub use config::{LogForwardMode, ProxyConfig};
pub use proxy::{AcceptRequestFn, CallSide, Proxy, Side};
