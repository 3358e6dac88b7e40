use iotscout::config::{LivenessMethod, ScanConfig};
use iotscout::detect::port::PortScanStrategy;
use iotscout::detect::DeviceDetectionStrategy;
use iotscout::model::{Capability, DeviceType};
use iotscout::net::probe::{HostProber, NetworkProber};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{create_test_config, create_test_device, SimulatedNetwork};
use tokio::net::TcpListener;
use tokio::time::Instant;


fn create_test_strategy(network: SimulatedNetwork, port_timeout_ms: u64) -> PortScanStrategy {
    let config = ScanConfig {
        port_timeout_ms,
        ..create_test_config("10.0.0.")
    };
    PortScanStrategy::new(&config, Arc::new(network))
}

#[tokio::test]
async fn test_port_strategy_name() {
    let strategy = create_test_strategy(SimulatedNetwork::new(), 100);
    assert_eq!(strategy.name(), "TCP connect scan with capability classification");
}

#[tokio::test]
async fn test_web_and_mqtt_host_is_a_web_device() {
    let network = SimulatedNetwork::new().host("10.0.0.5", &[80, 1883]);
    let strategy = create_test_strategy(network, 100);
    let mut device = create_test_device("10.0.0.5", &[]);

    strategy.detect(&mut device).await.unwrap();

    assert_eq!(device.device_type, DeviceType::WebDevice);
    assert_eq!(device.open_ports, BTreeSet::from([80, 1883]));
    assert_eq!(device.capabilities, BTreeSet::from([Capability::Http, Capability::Mqtt]));
}

#[tokio::test]
async fn test_host_without_open_ports_is_unknown() {
    let network = SimulatedNetwork::new().host("10.0.0.6", &[]);
    let strategy = create_test_strategy(network, 100);
    let mut device = create_test_device("10.0.0.6", &[]);

    strategy.detect(&mut device).await.unwrap();

    assert_eq!(device.device_type, DeviceType::Unknown);
    assert!(device.open_ports.is_empty());
    assert!(device.capabilities.is_empty());
}

#[tokio::test]
async fn test_home_assistant_port_maps_to_http() {
    let network = SimulatedNetwork::new().host("10.0.0.7", &[8123, 502]);
    let strategy = create_test_strategy(network, 100);
    let mut device = create_test_device("10.0.0.7", &[]);

    strategy.detect(&mut device).await.unwrap();

    assert_eq!(device.device_type, DeviceType::HomeAssistant);
    assert_eq!(device.capabilities, BTreeSet::from([Capability::Http, Capability::Modbus]));
}

#[tokio::test(start_paused = true)]
async fn test_hanging_port_only_costs_its_own_timeout() {
    let network = SimulatedNetwork::new()
        .with_latency()
        .host("10.0.0.8", &[22, 554])
        .hanging_port("10.0.0.8", 80);
    let strategy = create_test_strategy(network, 500);
    let mut device = create_test_device("10.0.0.8", &[]);

    let started = Instant::now();
    strategy.detect(&mut device).await.unwrap();
    let elapsed = started.elapsed();

    // All nine ports are tried at once, so the scan lasts one timeout rather than nine
    assert!(elapsed >= Duration::from_millis(500));
    assert!(elapsed < Duration::from_millis(1000), "scan took {:?}", elapsed);
    assert_eq!(device.open_ports, BTreeSet::from([22, 554]));
    assert_eq!(device.device_type, DeviceType::LinuxDevice);
}

#[tokio::test]
async fn test_port_scanning_on_localhost() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open_port = listener.local_addr().unwrap().port();
    let closed_port = {
        let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
        probe.local_addr().unwrap().port()
    };

    let config = ScanConfig {
        ports: vec![open_port, closed_port],
        port_timeout_ms: 500,
        liveness: LivenessMethod::Tcp,
        ..ScanConfig::default()
    };
    let prober: Arc<dyn HostProber> = Arc::new(NetworkProber::new(&config));
    let strategy = PortScanStrategy::new(&config, prober);
    let mut device = create_test_device("127.0.0.1", &[]);

    strategy.detect(&mut device).await.unwrap();

    assert_eq!(device.open_ports, BTreeSet::from([open_port]));
    // Ephemeral ports carry no known capability
    assert!(device.capabilities.is_empty());
    assert_eq!(device.device_type, DeviceType::Unknown);
}

#[tokio::test]
async fn test_tcp_liveness_on_localhost() {
    let config = ScanConfig {
        liveness: LivenessMethod::Tcp,
        ..ScanConfig::default()
    };
    let prober = NetworkProber::new(&config);

    // Port 7 is normally closed; the refusal still proves the host is up
    assert!(prober.is_alive("127.0.0.1".parse().unwrap()).await);
}
