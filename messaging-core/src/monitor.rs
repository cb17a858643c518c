//! The passive-observation specialization of the adapter (§4.H): a module
//! that subscribes to every request, response, notice, retained notice and
//! log under a prefix instead of only its own, and never answers a request
//! with anything but [`RespCode::Bypass`](messaging_wire::RespCode::Bypass).
//!
//! There is no separate runtime type here — [`Adapter::new_monitor`]
//! configures a regular [`Adapter`] with wildcard subscriptions and a fixed
//! request handler. This module exists so callers have an obvious name to
//! reach for, mirroring how the teacher exposes distinct constructors for
//! its client variants rather than a parallel struct hierarchy.

use std::sync::Arc;

use crate::adapter::Adapter;
use crate::engine::Engine;
use crate::handlers::Handlers;

/// Builds a monitor. Attach `on_notice`/`on_log`/`on_response_observed` to
/// `handlers` beforehand to actually see traffic — the request handler is
/// always overridden to bypass.
pub fn monitor<E: Engine>(
    module: impl Into<String>,
    prefix: impl Into<String>,
    engine: E,
    handlers: Handlers,
) -> Arc<Adapter<E>> {
    Adapter::new_monitor(module, prefix, engine, handlers)
}
