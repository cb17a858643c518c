//! User-supplied callbacks the dispatch loop demultiplexes traffic into
//! (§2 row D, §4.D.3/§4.D.4).

use std::sync::Arc;

use bytes::Bytes;
use messaging_wire::{LogHeader, NoticeHeader, RequestHeader, RespCode, ResponseHeader};

use crate::engine::LinkState;

pub type RequestHandlerFn = dyn Fn(&RequestHeader, Bytes) -> (RespCode, Bytes) + Send + Sync;
pub type NoticeHandlerFn = dyn Fn(&NoticeHeader, Bytes) + Send + Sync;
pub type LogHandlerFn = dyn Fn(&LogHeader, &str) + Send + Sync;
/// Fires for responses that do not correlate to an outstanding local `Req`
/// — ordinarily nothing (every response an adapter sees back is for one of
/// its own in-flight requests), but this is how a [`crate::monitor`] or a
/// proxy observes response traffic passing through.
pub type ResponseObserverFn = dyn Fn(&ResponseHeader, Bytes) + Send + Sync;
pub type StatusHandlerFn = dyn Fn(LinkState) + Send + Sync;
pub type ExitHookFn = dyn Fn() + Send + Sync;

#[derive(Clone, Default)]
pub struct Handlers {
    pub request: Option<Arc<RequestHandlerFn>>,
    pub notice: Option<Arc<NoticeHandlerFn>>,
    pub log: Option<Arc<LogHandlerFn>>,
    pub response_observer: Option<Arc<ResponseObserverFn>>,
    pub status: Option<Arc<StatusHandlerFn>>,
    pub exit: Option<Arc<ExitHookFn>>,
}

impl Handlers {
    pub fn new() -> Self {
        Handlers::default()
    }

    pub fn on_request<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestHeader, Bytes) -> (RespCode, Bytes) + Send + Sync + 'static,
    {
        self.request = Some(Arc::new(f));
        self
    }

    pub fn on_notice<F>(mut self, f: F) -> Self
    where
        F: Fn(&NoticeHeader, Bytes) + Send + Sync + 'static,
    {
        self.notice = Some(Arc::new(f));
        self
    }

    pub fn on_log<F>(mut self, f: F) -> Self
    where
        F: Fn(&LogHeader, &str) + Send + Sync + 'static,
    {
        self.log = Some(Arc::new(f));
        self
    }

    pub fn on_response_observed<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResponseHeader, Bytes) + Send + Sync + 'static,
    {
        self.response_observer = Some(Arc::new(f));
        self
    }

    pub fn on_status<F>(mut self, f: F) -> Self
    where
        F: Fn(LinkState) + Send + Sync + 'static,
    {
        self.status = Some(Arc::new(f));
        self
    }

    pub fn on_exit<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.exit = Some(Arc::new(f));
        self
    }
}
