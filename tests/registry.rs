mod common;

use arcadeport::arcade::{ArcadeRegistry, GroupState, LifecycleError, SetupError};
use arcadeport::config::{Config, ConfigError, PortMap};
use arcadeport::input::channel::ChannelBackend;
use arcadeport::port::simulated::SimulatedProvider;
use common::*;
use tokio_util::sync::CancellationToken;

fn map(port: u32, pads: &[i32]) -> PortMap {
    PortMap {
        port,
        pads: pads.to_vec(),
    }
}

#[tokio::test]
async fn configures_one_group_per_map() {
    let mut provider = SimulatedProvider::new();
    provider.add_port(0);
    provider.add_port(1);
    let (backend, mut rx) = ChannelBackend::new(64);

    let registry = ArcadeRegistry::configure(
        &[map(0, &[1, 2]), map(1, &[0, 3])],
        &provider,
        &backend,
        &fast_settings(),
    )
    .await
    .unwrap();

    assert_eq!(registry.groups().len(), 2);
    assert_eq!(registry.group(1).unwrap().port_name(), "sim1");
    assert!(registry.group(2).is_none());
    assert_eq!(registrations(&drain(&mut rx)), 3);

    registry.shutdown().await;
    assert_eq!(unregistrations(&drain(&mut rx)), 3);
}

#[tokio::test]
async fn later_failure_tears_down_earlier_groups() {
    let mut provider = SimulatedProvider::new();
    let first = provider.add_port(0);
    provider.add_port(1);
    let (backend, mut rx) = ChannelBackend::new(64);

    let result = ArcadeRegistry::configure(
        &[map(0, &[1]), map(1, &[9])],
        &provider,
        &backend,
        &fast_settings(),
    )
    .await;

    assert!(matches!(
        result,
        Err(SetupError::Config(ConfigError::UnknownControlType(9)))
    ));
    assert!(!first.is_registered());
    let events = drain(&mut rx);
    assert_eq!(registrations(&events), 1);
    assert_eq!(unregistrations(&events), 1);
}

#[tokio::test]
async fn duplicate_port_is_rejected() {
    let mut provider = SimulatedProvider::new();
    let panel = provider.add_port(0);
    let (backend, _rx) = ChannelBackend::new(64);

    let result = ArcadeRegistry::configure(
        &[map(0, &[1]), map(0, &[2])],
        &provider,
        &backend,
        &fast_settings(),
    )
    .await;

    assert!(matches!(
        result,
        Err(SetupError::Config(ConfigError::DuplicatePort(0)))
    ));
    assert!(!panel.is_registered());
}

#[tokio::test]
async fn no_maps_means_no_device() {
    let provider = SimulatedProvider::new();
    let (backend, _rx) = ChannelBackend::new(64);

    let result = ArcadeRegistry::configure(&[], &provider, &backend, &fast_settings()).await;
    assert!(matches!(result, Err(SetupError::NoDevice)));
}

#[tokio::test]
async fn open_all_and_close_all_balance() {
    let mut provider = SimulatedProvider::new();
    let first = provider.add_port(0);
    let second = provider.add_port(1);
    let (backend, _rx) = ChannelBackend::new(4096);
    let registry = ArcadeRegistry::configure(
        &[map(0, &[1, 2]), map(1, &[4])],
        &provider,
        &backend,
        &fast_settings(),
    )
    .await
    .unwrap();
    let cancel = CancellationToken::new();

    assert_eq!(registry.open_all(&cancel).await.unwrap(), 3);
    for group in registry.groups() {
        assert_eq!(group.state().await, GroupState::Active);
    }
    assert_eq!(first.claims(), 1);
    assert_eq!(second.claims(), 1);

    registry.close_all().await;
    for group in registry.groups() {
        assert_eq!(group.state().await, GroupState::Idle);
        assert_eq!(group.open_count().await, 0);
    }
    assert_eq!(first.releases(), 1);
    assert_eq!(second.releases(), 1);

    registry.shutdown().await;
}

#[tokio::test]
async fn failed_open_closes_what_was_opened() {
    let mut provider = SimulatedProvider::new();
    let first = provider.add_port(0);
    let second = provider.add_port(1);
    let (backend, _rx) = ChannelBackend::new(4096);
    let registry = ArcadeRegistry::configure(
        &[map(0, &[1]), map(1, &[2])],
        &provider,
        &backend,
        &fast_settings(),
    )
    .await
    .unwrap();

    second.refuse_claims(true);
    let result = registry.open_all(&CancellationToken::new()).await;

    assert!(matches!(result, Err(LifecycleError::BusUnavailable(_))));
    assert_eq!(first.claims(), 1);
    assert_eq!(first.releases(), 1);
    assert_eq!(registry.group(0).unwrap().state().await, GroupState::Idle);

    registry.shutdown().await;
}

#[tokio::test]
async fn cancelled_open_all_opens_nothing() {
    let mut provider = SimulatedProvider::new();
    let panel = provider.add_port(0);
    let (backend, _rx) = ChannelBackend::new(64);
    let registry =
        ArcadeRegistry::configure(&[map(0, &[1])], &provider, &backend, &fast_settings())
            .await
            .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    assert!(matches!(
        registry.open_all(&cancel).await,
        Err(LifecycleError::Aborted)
    ));
    assert_eq!(panel.claims(), 0);

    registry.shutdown().await;
}

#[tokio::test]
async fn configuration_file_drives_the_registry() {
    let config = Config::parse(
        r#"
        ports = ["0,1,0,2", "-1,1", "1,4"]

        [poll]
        settle_delay_us = 0
        "#,
    )
    .unwrap();
    let maps = config.port_maps().unwrap();

    let mut provider = SimulatedProvider::new();
    provider.add_port(0);
    provider.add_port(1);
    let (backend, mut rx) = ChannelBackend::new(64);

    let registry = ArcadeRegistry::configure(&maps, &provider, &backend, &config.poll)
        .await
        .unwrap();

    assert_eq!(registry.groups().len(), 2);
    assert_eq!(
        registry.group(0).unwrap().connectors().collect::<Vec<_>>(),
        vec![0, 2]
    );
    assert_eq!(registrations(&drain(&mut rx)), 3);

    registry.shutdown().await;
}
