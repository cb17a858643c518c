//! End-to-end scenarios over the in-process transport (§8): the cheapest
//! way to exercise the dispatch loop, retry logic and link-state machine
//! without a network.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use messaging_core::{Adapter, AdapterSettingsBuilder, Handlers};
use messaging_inproc::{Broker, InprocEngine};
use messaging_wire::{Packet, RespCode};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

async fn linked_pair(broker: &Arc<Broker>, module_a: &str, module_b: &str) -> (Arc<Adapter<InprocEngine>>, Arc<Adapter<InprocEngine>>) {
    let settings_a = AdapterSettingsBuilder::new(module_a).timeout(Duration::from_millis(500)).build();
    let settings_b = AdapterSettingsBuilder::new(module_b)
        .timeout(Duration::from_millis(500))
        .build();

    let handlers_b = Handlers::new().on_request(|header, content| {
        assert_eq!(header.route, "Echo");
        (RespCode::Success, content)
    });

    let a = Adapter::new(settings_a, InprocEngine::new(Arc::clone(broker)), Handlers::new());
    let b = Adapter::new(settings_b, InprocEngine::new(Arc::clone(broker)), handlers_b);

    a.link().await.unwrap();
    b.link().await.unwrap();
    a.wait_linked().await;
    b.wait_linked().await;

    (a, b)
}

#[tokio::test]
async fn happy_path_request_roundtrips_content() {
    init_logging();
    let broker = Arc::new(Broker::new(""));
    let (a, _b) = linked_pair(&broker, "A", "B").await;

    let response = a.req("B", "Echo", Bytes::from_static(b"hello")).await;
    match response {
        Packet::Response { header, content } => {
            assert_eq!(header.resp_code, RespCode::Success);
            assert_eq!(content, Bytes::from_static(b"hello"));
        }
        other => panic!("expected a response packet, got {other:?}"),
    }
}

#[tokio::test]
async fn request_to_unknown_route_gets_not_found() {
    init_logging();
    let broker = Arc::new(Broker::new(""));
    let (a, _b) = linked_pair(&broker, "A", "B").await;

    let response = a.req("B", "NoSuchRoute", Bytes::new()).await;
    match response {
        Packet::Response { header, .. } => assert_eq!(header.resp_code, RespCode::NotFound),
        other => panic!("expected a response packet, got {other:?}"),
    }
}

#[tokio::test]
async fn request_retries_until_timeout_when_nobody_answers() {
    init_logging();
    let broker = Arc::new(Broker::new(""));
    let settings = AdapterSettingsBuilder::new("A").timeout(Duration::from_millis(30)).retry(2).build();
    let a = Adapter::new(settings, InprocEngine::new(Arc::clone(&broker)), Handlers::new());
    a.link().await.unwrap();
    a.wait_linked().await;

    let started = tokio::time::Instant::now();
    let response = a.req("NoOneHome", "Ping", Bytes::new()).await;
    let elapsed = started.elapsed();

    match response {
        Packet::Response { header, .. } => assert_eq!(header.resp_code, RespCode::Timeout),
        other => panic!("expected a timeout response, got {other:?}"),
    }
    // 3 attempts (1 + 2 retries) at 30ms each; generous slack for scheduling.
    assert!(elapsed >= Duration::from_millis(80), "expected at least 3 timed-out attempts, took {elapsed:?}");
}

#[tokio::test]
async fn requests_fail_fast_with_unlinked_before_linking() {
    init_logging();
    let broker = Arc::new(Broker::new(""));
    let settings = AdapterSettingsBuilder::new("A").timeout(Duration::from_millis(50)).build();
    let a = Adapter::new(settings, InprocEngine::new(broker), Handlers::new());

    let response = a.req("B", "Ping", Bytes::new()).await;
    match response {
        Packet::Response { header, .. } => assert_eq!(header.resp_code, RespCode::UnLinked),
        other => panic!("expected an unlinked response, got {other:?}"),
    }
}

#[tokio::test]
async fn a_module_never_handles_its_own_published_notice() {
    init_logging();
    let broker = Arc::new(Broker::new(""));
    let seen = Arc::new(AtomicU32::new(0));
    let seen_clone = Arc::clone(&seen);

    let handlers = Handlers::new().on_notice(move |_header, _content| {
        seen_clone.fetch_add(1, Ordering::SeqCst);
    });
    let settings = AdapterSettingsBuilder::new("A").build();
    let a = Adapter::new(settings, InprocEngine::new(Arc::clone(&broker)), handlers);
    a.subscribe_notice("alerts", false).await;
    a.link().await.unwrap();
    a.wait_linked().await;

    a.send_notice("alerts", Bytes::from_static(b"x")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(seen.load(Ordering::SeqCst), 0, "a module must not receive its own notice back");
}

#[tokio::test]
async fn clearing_a_retained_notice_stops_it_from_replaying() {
    init_logging();
    let broker = Arc::new(Broker::new(""));
    let settings = AdapterSettingsBuilder::new("Publisher").build();
    let publisher = Adapter::new(settings, InprocEngine::new(Arc::clone(&broker)), Handlers::new());
    publisher.link().await.unwrap();
    publisher.wait_linked().await;

    publisher.send_retain_notice("state", Bytes::from_static(b"on")).await.unwrap();
    publisher.clear_retain_notice("state").await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let received = Arc::new(AtomicU32::new(0));
    let received_clone = Arc::clone(&received);
    let handlers = Handlers::new().on_notice(move |_header, _content| {
        received_clone.fetch_add(1, Ordering::SeqCst);
    });
    let settings = AdapterSettingsBuilder::new("LateJoiner").build();
    let late = Adapter::new(settings, InprocEngine::new(Arc::clone(&broker)), handlers);
    late.subscribe_notice("state", true).await;
    late.link().await.unwrap();
    late.wait_linked().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(received.load(Ordering::SeqCst), 0, "a cleared retained notice must not replay");
}

#[tokio::test]
async fn reset_restores_notice_subscriptions() {
    init_logging();
    let broker = Arc::new(Broker::new(""));
    let received = Arc::new(AtomicU32::new(0));
    let received_clone = Arc::clone(&received);
    let handlers = Handlers::new().on_notice(move |_header, _content| {
        received_clone.fetch_add(1, Ordering::SeqCst);
    });

    let settings = AdapterSettingsBuilder::new("Listener").build();
    let listener = Adapter::new(settings, InprocEngine::new(Arc::clone(&broker)), handlers);
    listener.subscribe_notice("alerts", false).await;
    listener.link().await.unwrap();
    listener.wait_linked().await;

    listener.reset().await.unwrap();
    listener.wait_linked().await;

    let settings = AdapterSettingsBuilder::new("Publisher").build();
    let publisher = Adapter::new(settings, InprocEngine::new(Arc::clone(&broker)), Handlers::new());
    publisher.link().await.unwrap();
    publisher.wait_linked().await;
    publisher.send_notice("alerts", Bytes::from_static(b"x")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(received.load(Ordering::SeqCst), 1, "subscription must survive a reset");
}

#[tokio::test]
async fn get_version_is_answered_without_a_user_handler() {
    init_logging();
    let broker = Arc::new(Broker::new(""));
    let (a, _b) = linked_pair(&broker, "A", "B").await;

    let response = a.req("B", "GetVersion", Bytes::new()).await;
    match response {
        Packet::Response { header, content } => {
            assert_eq!(header.resp_code, RespCode::Success);
            let versions: Vec<String> = serde_json::from_slice(&content).unwrap();
            assert!(versions.iter().any(|v| v.starts_with("messaging-core/")));
        }
        other => panic!("expected a response packet, got {other:?}"),
    }
}
