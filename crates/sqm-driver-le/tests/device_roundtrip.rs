//! End-to-end driver tests against the loopback simulator.

use std::time::Duration;

use sqm_core::SkySensor;
use sqm_driver_le::sim::SimDevice;
use sqm_driver_le::{discover, DiscoveryConfig, SqmLeDriver};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

async fn connect(sim: &SimDevice) -> SqmLeDriver {
    SqmLeDriver::connect(sim.tcp_addr().ip(), sim.tcp_addr().port(), CONNECT_TIMEOUT)
        .await
        .unwrap()
}

#[tokio::test]
async fn discovery_finds_the_simulated_device() {
    let sim = SimDevice::spawn().await.unwrap();
    let config = DiscoveryConfig {
        broadcast_addr: sim.udp_addr().ip().to_string(),
        port: sim.udp_addr().port(),
        timeout_secs: 5,
    };
    let device = discover(&config).await.unwrap();
    assert_eq!(device.addr, sim.udp_addr().ip());
    assert_eq!(device.mac, sim.mac());
}

#[tokio::test]
async fn discovery_times_out_without_a_device() {
    // A bound socket that never answers.
    let silent = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let config = DiscoveryConfig {
        broadcast_addr: silent.local_addr().unwrap().ip().to_string(),
        port: silent.local_addr().unwrap().port(),
        timeout_secs: 2,
    };
    let err = discover(&config).await.unwrap_err();
    assert!(matches!(err, sqm_core::SqmError::NotFound { .. }));
}

#[tokio::test]
async fn identity_query_parses_the_reply() {
    let sim = SimDevice::spawn().await.unwrap();
    let driver = connect(&sim).await;
    let discovered = sqm_driver_le::DiscoveredDevice {
        addr: sim.tcp_addr().ip(),
        mac: sim.mac(),
    };
    let identity = driver.query_identity(&discovered).await.unwrap();
    assert_eq!(identity.protocol, "2");
    assert_eq!(identity.model, "3");
    assert_eq!(identity.feature, "1");
    assert_eq!(identity.serial, "413");
    assert_eq!(identity.mac, sim.mac());
    assert_eq!(identity.port, sim.tcp_addr().port());
}

/// The round-trip property: after any query the session has been reset and
/// the next query succeeds, twice in sequence.
#[tokio::test]
async fn query_reset_query_succeeds_twice() {
    let sim = SimDevice::spawn().await.unwrap();
    let driver = connect(&sim).await;

    let first = driver.query_measurement().await.unwrap();
    let second = driver.query_measurement().await.unwrap();
    assert!((first.magnitude - 19.50).abs() < 1e-9);
    assert!((first.temperature - 23.2).abs() < 1e-9);
    assert_eq!(first, second);

    // Initial connect plus one reset per transaction. The accept counter is
    // updated by the listener task, so give it a moment to settle.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(sim.accept_count(), 3);
}

/// Failed transactions reset the session too: one reset per failed attempt.
#[tokio::test]
async fn failed_attempts_reset_once_each() {
    let sim = SimDevice::spawn().await.unwrap();
    let driver = connect(&sim).await;
    sim.set_fail_measurements(true);

    for _ in 0..4 {
        assert!(driver.sample().await.is_err());
    }

    // Initial connect plus one reconnect per failed attempt.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(sim.accept_count(), 1 + 4);

    // The session is healthy again once the device recovers.
    sim.set_fail_measurements(false);
    let sample = driver.sample().await.unwrap();
    assert!((sample.magnitude - 19.50).abs() < 1e-9);
}
