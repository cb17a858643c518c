//! End-to-end bridging scenario (§8 "proxy forward"): a request issued on
//! side A, addressed to a namespaced module on side B, answered by a real
//! adapter on side B, with the response relayed back across the proxy.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use messaging_core::{Adapter, AdapterSettingsBuilder, Handlers};
use messaging_inproc::{Broker, InprocEngine};
use messaging_proxy::{Proxy, ProxyConfig, Side};
use messaging_wire::{Packet, RespCode};

#[tokio::test]
async fn request_crosses_the_proxy_and_the_response_returns() {
    let _ = env_logger::builder().is_test(true).try_init();

    let broker_a = Arc::new(Broker::new(""));
    let broker_b = Arc::new(Broker::new(""));

    let proxy = Proxy::new(
        Side::new("A", "", InprocEngine::new(Arc::clone(&broker_a))),
        Side::new("B", "", InprocEngine::new(Arc::clone(&broker_b))),
        ProxyConfig::default(),
        None,
    );
    proxy.run().await;
    // Give the proxy's own link + wildcard subscriptions a moment to land.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let requester_settings = AdapterSettingsBuilder::new("Requester").timeout(Duration::from_millis(500)).build();
    let requester = Adapter::new(requester_settings, InprocEngine::new(Arc::clone(&broker_a)), Handlers::new());
    requester.link().await.unwrap();
    requester.wait_linked().await;

    let responder_handlers = Handlers::new().on_request(|header, content| {
        assert_eq!(header.route, "Echo");
        (RespCode::Success, content)
    });
    let responder_settings = AdapterSettingsBuilder::new("Responder").build();
    let responder = Adapter::new(responder_settings, InprocEngine::new(Arc::clone(&broker_b)), responder_handlers);
    responder.link().await.unwrap();
    responder.wait_linked().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let response = requester.req("B/Responder", "Echo", Bytes::from_static(b"ping")).await;
    match response {
        Packet::Response { header, content } => {
            assert_eq!(header.resp_code, RespCode::Success);
            assert_eq!(content, Bytes::from_static(b"ping"));
        }
        other => panic!("expected a relayed response, got {other:?}"),
    }
}
