use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use event_relay::api::{create_api_server, InboundAuth};
use event_relay::metrics::{install_recorder, MetricsConfig};
use event_relay::relay::{
    DeliveryConfig, EngineConfig, HttpDeliveryClient, RelayEngine, RelayMode, RelayStats,
};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};

const CLIENT_UA: &str = "epi:logg API Client";

/// Collector whose answer can be flipped at runtime
struct Collector {
    status: AtomicU16,
    accepted: Mutex<Vec<(HeaderMap, Bytes)>>,
    attempts: AtomicU16,
}

impl Collector {
    fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    fn accepted_bodies(&self) -> Vec<String> {
        self.accepted
            .lock()
            .iter()
            .map(|(_, body)| String::from_utf8_lossy(body).into_owned())
            .collect()
    }
}

async fn collect(
    State(collector): State<Arc<Collector>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    collector.attempts.fetch_add(1, Ordering::SeqCst);
    let status = StatusCode::from_u16(collector.status.load(Ordering::SeqCst)).unwrap();
    if status == StatusCode::OK {
        collector.accepted.lock().push((headers, body));
    }
    status
}

async fn start_collector(status: u16) -> (SocketAddr, Arc<Collector>) {
    let collector = Arc::new(Collector {
        status: AtomicU16::new(status),
        accepted: Mutex::new(Vec::new()),
        attempts: AtomicU16::new(0),
    });

    let app = Router::new()
        .route("/api/", post(collect))
        .with_state(Arc::clone(&collector));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, collector)
}

struct RunningRelay {
    addr: SocketAddr,
    engine: Arc<RelayEngine>,
    retry_loop: tokio::task::JoinHandle<()>,
}

async fn start_relay(destination_url: String, metrics: MetricsConfig) -> RunningRelay {
    let client = HttpDeliveryClient::new(&DeliveryConfig {
        destination_url,
        connect_timeout: Duration::from_secs(2),
        request_timeout: Duration::from_secs(2),
    })
    .unwrap();

    let config = EngineConfig {
        idle_interval: Duration::from_millis(50),
        drain_delay: Duration::ZERO,
        ..Default::default()
    };
    let engine = Arc::new(RelayEngine::new(config, Arc::new(client)));
    let retry_loop = engine.spawn_retry_loop();

    let auth = InboundAuth::new("User-Agent", CLIENT_UA).unwrap();
    let app = create_api_server(engine.clone(), auth, &metrics);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    RunningRelay {
        addr,
        engine,
        retry_loop,
    }
}

async fn submit(addr: SocketAddr, user_agent: &str, body: &str) -> reqwest::StatusCode {
    reqwest::Client::new()
        .post(format!("http://{addr}/api/"))
        .header("User-Agent", user_agent)
        .header("Content-Type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .unwrap()
        .status()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !condition() {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Collector goes down, events pile up, collector comes back, backlog drains in order
#[tokio::test]
async fn test_outage_and_recovery() {
    println!("\n=== Testing Outage And Recovery ===\n");

    let (collector_addr, collector) = start_collector(503).await;
    let relay = start_relay(
        format!("http://{collector_addr}/api/"),
        MetricsConfig::default(),
    )
    .await;

    for body in ["{\"n\":1}", "{\"n\":2}", "{\"n\":3}"] {
        assert_eq!(submit(relay.addr, CLIENT_UA, body).await, reqwest::StatusCode::OK);
    }
    println!("✓ Submitted 3 events during outage");

    assert_eq!(relay.engine.mode(), RelayMode::Offline);
    assert_eq!(relay.engine.queue_len(), 3);
    assert!(collector.accepted_bodies().is_empty());

    collector.set_status(200);
    let engine = relay.engine.clone();
    wait_until(move || engine.queue_len() == 0).await;
    println!("✓ Backlog drained after recovery");

    assert_eq!(
        collector.accepted_bodies(),
        vec!["{\"n\":1}", "{\"n\":2}", "{\"n\":3}"]
    );
    assert_eq!(relay.engine.mode(), RelayMode::Online);

    // Forwarded requests carry the proxy marker
    let accepted = collector.accepted.lock();
    assert_eq!(accepted[0].0.get("x-proxy").unwrap(), "epi:logg Proxy");
    assert_eq!(accepted[0].0.get("user-agent").unwrap(), CLIENT_UA);
    drop(accepted);

    // Once online with an empty queue, new events go straight through
    assert_eq!(
        submit(relay.addr, CLIENT_UA, "{\"n\":4}").await,
        reqwest::StatusCode::OK
    );
    assert_eq!(collector.accepted_bodies().len(), 4);

    let stats_body = reqwest::get(format!("http://{}/stats", relay.addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let stats: RelayStats = serde_json::from_str(&stats_body).unwrap();
    println!("✓ {}", stats);
    assert_eq!(stats.mode, RelayMode::Online);
    assert_eq!(stats.items_received, 4);
    assert_eq!(stats.delivered_retry, 3);
    assert_eq!(stats.delivered_immediate, 1);
    assert!(stats.failed_attempts >= 1);

    relay.engine.terminate();
    relay.engine.wait_terminated().await;
    relay.retry_loop.await.unwrap();
}

/// Unreachable collector: every event is acknowledged and held
#[tokio::test]
async fn test_unreachable_destination_queues_events() {
    // Nothing listens on port 1
    let relay = start_relay("http://127.0.0.1:1/api/".into(), MetricsConfig::default()).await;

    assert_eq!(submit(relay.addr, CLIENT_UA, "a").await, reqwest::StatusCode::OK);
    assert_eq!(submit(relay.addr, CLIENT_UA, "b").await, reqwest::StatusCode::OK);

    assert_eq!(relay.engine.mode(), RelayMode::Offline);
    let pending: Vec<_> = relay
        .engine
        .pending()
        .iter()
        .map(|item| item.body().clone())
        .collect();
    assert_eq!(pending, vec![Bytes::from("a"), Bytes::from("b")]);

    relay.engine.terminate();
    timeout(Duration::from_secs(5), relay.engine.wait_terminated())
        .await
        .expect("retry loop did not stop");
    assert!(relay.engine.is_terminated());
}

#[tokio::test]
async fn test_unauthorized_submission_rejected() {
    let (collector_addr, collector) = start_collector(200).await;
    let relay = start_relay(
        format!("http://{collector_addr}/api/"),
        MetricsConfig::default(),
    )
    .await;

    let status = submit(relay.addr, "curl/8.0", "{}").await;
    assert_eq!(status, reqwest::StatusCode::FORBIDDEN);
    assert_eq!(collector.attempts.load(Ordering::SeqCst), 0);
    assert_eq!(relay.engine.stats().items_received, 0);

    let pong = reqwest::get(format!("http://{}/ping", relay.addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(pong, ">>> PONG!\n");

    relay.engine.terminate();
    relay.engine.wait_terminated().await;
}

#[tokio::test]
async fn test_metrics_endpoint() {
    install_recorder().unwrap();

    let (collector_addr, _collector) = start_collector(200).await;
    let metrics = MetricsConfig {
        enabled: true,
        ..Default::default()
    };
    let relay = start_relay(format!("http://{collector_addr}/api/"), metrics).await;

    assert_eq!(submit(relay.addr, CLIENT_UA, "{}").await, reqwest::StatusCode::OK);

    let body = reqwest::get(format!("http://{}/metrics", relay.addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("relay_items_received_total"));
    assert!(body.contains("relay_items_delivered_total"));

    relay.engine.terminate();
    relay.engine.wait_terminated().await;
}
