use iotscout::model::{DeviceType, NetworkDevice};
use iotscout::{DiscoveryEngine, SubnetPrefix};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use test_utils::{create_test_config, ipv4, SimulatedNetwork};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;


fn mixed_network() -> SimulatedNetwork {
    SimulatedNetwork::new()
        .with_latency()
        .host("10.0.0.1", &[80, 443])
        .host("10.0.0.10", &[1883])
        .host("10.0.0.20", &[22, 23])
        .host("10.0.0.30", &[554])
        .host("10.0.0.40", &[8123])
        .host("10.0.0.50", &[502])
        .host("10.0.0.60", &[])
        .host("10.0.0.254", &[23, 502])
}

fn by_address(devices: &[NetworkDevice]) -> BTreeMap<IpAddr, DeviceType> {
    devices.iter().map(|d| (d.ip, d.device_type)).collect()
}

/// Collects what the completion callback receives and how often it is called
#[derive(Clone, Default)]
struct CallbackProbe {
    calls: Arc<AtomicUsize>,
    devices: Arc<Mutex<Vec<NetworkDevice>>>,
}

impl CallbackProbe {
    fn callback(&self) -> impl FnOnce(Vec<NetworkDevice>) + Send + 'static {
        let probe = self.clone();
        move |devices| {
            probe.calls.fetch_add(1, Ordering::SeqCst);
            *probe.devices.lock().unwrap() = devices;
        }
    }
}

#[tokio::test]
async fn test_discovery_probes_every_candidate_once() {
    let network = Arc::new(mixed_network());
    let engine = DiscoveryEngine::with_prober(create_test_config("10.0.0."), network.clone());

    engine.discover(&CancellationToken::new()).await;

    let mut probed = network.probed();
    probed.sort();
    let expected: Vec<IpAddr> = SubnetPrefix::new(10, 0, 0)
        .hosts()
        .into_iter()
        .map(IpAddr::V4)
        .collect();
    assert_eq!(probed, expected);
    assert!(!probed.contains(&ipv4(10, 0, 0, 0)));
    assert!(!probed.contains(&ipv4(10, 0, 0, 255)));
}

#[tokio::test]
async fn test_discovery_classifies_every_live_host() {
    let engine = DiscoveryEngine::with_prober(create_test_config("10.0.0."), Arc::new(mixed_network()));

    let devices = engine.discover(&CancellationToken::new()).await;

    let expected = BTreeMap::from([
        (ipv4(10, 0, 0, 1), DeviceType::WebDevice),
        (ipv4(10, 0, 0, 10), DeviceType::MqttDevice),
        (ipv4(10, 0, 0, 20), DeviceType::LinuxDevice),
        (ipv4(10, 0, 0, 30), DeviceType::Camera),
        (ipv4(10, 0, 0, 40), DeviceType::HomeAssistant),
        (ipv4(10, 0, 0, 50), DeviceType::ModbusDevice),
        (ipv4(10, 0, 0, 60), DeviceType::Unknown),
        (ipv4(10, 0, 0, 254), DeviceType::TelnetDevice),
    ]);
    assert_eq!(by_address(&devices), expected);
    assert_eq!(devices.len(), expected.len());
    assert!(devices.iter().all(|d| d.is_online && d.response_time.is_some()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_repeated_scans_yield_the_same_classification() {
    let engine = DiscoveryEngine::with_prober(create_test_config("10.0.0."), Arc::new(mixed_network()));
    let first = by_address(&engine.discover(&CancellationToken::new()).await);

    for _ in 0..5 {
        let devices = engine.discover(&CancellationToken::new()).await;
        assert_eq!(by_address(&devices), first);
    }
}

#[tokio::test]
async fn test_empty_network_still_completes_once() {
    let engine = DiscoveryEngine::with_prober(
        create_test_config("10.9.8."),
        Arc::new(SimulatedNetwork::new()),
    );
    let probe = CallbackProbe::default();

    let handle = engine.spawn_discovery(probe.callback());
    handle.wait().await.unwrap();

    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    assert!(probe.devices.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_background_scan_reports_devices() {
    let engine = DiscoveryEngine::with_prober(create_test_config("10.0.0."), Arc::new(mixed_network()));
    let probe = CallbackProbe::default();

    let handle = engine.spawn_discovery(probe.callback());
    while !handle.is_finished() {
        tokio::task::yield_now().await;
    }

    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    assert_eq!(probe.devices.lock().unwrap().len(), 8);
    handle.wait().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_silent_subnet_is_bounded_by_probe_timeouts() {
    let network = SimulatedNetwork::new().unresponsive();
    let mut config = create_test_config("10.0.0.");
    config.probe_timeout_ms = 1000;
    config.max_concurrent_scans = 64;
    let engine = DiscoveryEngine::with_prober(config, Arc::new(network));

    let started = Instant::now();
    let devices = engine.discover(&CancellationToken::new()).await;
    let elapsed = started.elapsed();

    // 254 hosts in batches of 64 is four rounds of one timeout each
    assert!(devices.is_empty());
    assert!(elapsed >= Duration::from_secs(4));
    assert!(elapsed < Duration::from_secs(5), "scan took {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_override_shortens_a_silent_sweep() {
    let mut config = create_test_config("10.0.0.");
    config.probe_timeout_ms = 1000;
    config.max_concurrent_scans = 1;
    let mut engine = DiscoveryEngine::with_prober(config, Arc::new(SimulatedNetwork::new().unresponsive()));

    engine.set_concurrency(254);
    assert_eq!(engine.config().max_concurrent_scans, 254);

    let started = Instant::now();
    assert!(engine.discover(&CancellationToken::new()).await.is_empty());
    assert!(started.elapsed() < Duration::from_secs(2), "scan took {:?}", started.elapsed());
}

#[test]
fn test_zero_concurrency_is_clamped() {
    let mut engine = DiscoveryEngine::with_prober(
        create_test_config("10.0.0."),
        Arc::new(SimulatedNetwork::new()),
    );

    engine.set_concurrency(0);

    assert_eq!(engine.config().max_concurrent_scans, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_scan_completes_once_without_waiting() {
    let network = SimulatedNetwork::new().unresponsive();
    let mut config = create_test_config("10.0.0.");
    config.probe_timeout_ms = 60_000;
    let engine = DiscoveryEngine::with_prober(config, Arc::new(network));
    let probe = CallbackProbe::default();

    let started = Instant::now();
    let handle = engine.spawn_discovery(probe.callback());
    tokio::task::yield_now().await;
    handle.cancel();
    handle.wait().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    assert!(probe.devices.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_probe_host_skips_the_sweep() {
    let network = Arc::new(SimulatedNetwork::new().host("10.0.0.77", &[1883]));
    let engine = DiscoveryEngine::with_prober(create_test_config("10.0.0."), network.clone());

    let device = engine.probe_host(ipv4(10, 0, 0, 77)).await;

    assert!(device.is_online);
    assert_eq!(device.device_type, DeviceType::MqttDevice);
    assert_eq!(network.probed(), vec![ipv4(10, 0, 0, 77)]);
    assert_eq!(network.port_checks(), engine.config().ports.len());
}
