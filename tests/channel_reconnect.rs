//! Reconnecting channel and registry behavior under paused time.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Dial, Fallback, FakeConnector};
use rig_console::address::{AddressSource, SchemePolicy, ServerAddress};
use rig_console::channel::{
    ChannelConfig, ChannelEvent, ChannelId, ChannelRegistry, ChannelStatus, Delivery,
};
use rig_console::ConsoleError;
use tokio::sync::mpsc;
use url::Url;

const MOTOR: &str = "/ws/motor/data";

fn config(max: u32) -> ChannelConfig {
    ChannelConfig {
        reconnect_interval: Duration::from_millis(1000),
        max_reconnect_attempts: max,
        ..Default::default()
    }
}

fn motor_url() -> Url {
    Url::parse("ws://rig.test:8800/ws/motor/data").unwrap()
}

fn address(input: &str) -> ServerAddress {
    ServerAddress::parse(input, AddressSource::UserInput, SchemePolicy::Plain).unwrap()
}

/// Receive accepted deliveries until `stop` returns true.
async fn collect_until(
    registry: &mut ChannelRegistry,
    events: &mut mpsc::Receiver<ChannelEvent>,
    mut stop: impl FnMut(&Delivery) -> bool,
) -> Vec<Delivery> {
    let mut seen = Vec::new();
    let result = tokio::time::timeout(Duration::from_secs(120), async {
        while let Some(event) = events.recv().await {
            if let Some(delivery) = registry.accept(event) {
                let done = stop(&delivery);
                seen.push(delivery);
                if done {
                    break;
                }
            }
        }
    })
    .await;
    assert!(result.is_ok(), "timed out; saw {seen:?}");
    seen
}

/// Drain whatever is queued right now.
fn drain_accepted(
    registry: &mut ChannelRegistry,
    events: &mut mpsc::Receiver<ChannelEvent>,
) -> Vec<Delivery> {
    let mut accepted = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Some(delivery) = registry.accept(event) {
            accepted.push(delivery);
        }
    }
    accepted
}

#[tokio::test(start_paused = true)]
async fn test_attempts_never_exceed_max_and_exhaustion_is_reported() {
    let connector = Arc::new(FakeConnector::new(Fallback::Refuse));
    let (mut registry, mut events) = ChannelRegistry::new(connector.clone(), config(3));
    registry.open(ChannelId::Telemetry, motor_url());

    let seen = collect_until(&mut registry, &mut events, |d| {
        matches!(d, Delivery::Exhausted { .. })
    })
    .await;

    for delivery in &seen {
        if let Delivery::StateChanged { state, .. } = delivery {
            assert!(state.reconnect_attempts <= 3, "{state:?}");
        }
    }
    match seen.last() {
        Some(Delivery::Exhausted {
            channel,
            error: ConsoleError::ChannelExhausted { attempts, .. },
        }) => {
            assert_eq!(*channel, ChannelId::Telemetry);
            assert_eq!(*attempts, 3);
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }

    // First dial plus three retries.
    assert_eq!(connector.dials(MOTOR), 4);
    let state = registry.state(ChannelId::Telemetry).unwrap();
    assert_eq!(state.status, ChannelStatus::Closed);
    assert!(state.is_exhausted(registry.config()));

    // Nothing more is dialed once exhausted.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(connector.dials(MOTOR), 4);
}

#[tokio::test(start_paused = true)]
async fn test_close_cancels_pending_reconnect() {
    let connector = Arc::new(FakeConnector::new(Fallback::Refuse));
    let (mut registry, mut events) = ChannelRegistry::new(connector.clone(), config(5));
    registry.open(ChannelId::Telemetry, motor_url());

    // Wait until the first retry is scheduled.
    collect_until(&mut registry, &mut events, |d| {
        matches!(d, Delivery::StateChanged { state, .. } if state.reconnect_attempts == 1)
    })
    .await;
    assert!(registry.close(ChannelId::Telemetry));
    assert!(!registry.close(ChannelId::Telemetry));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(drain_accepted(&mut registry, &mut events).is_empty());
    assert_eq!(connector.dials(MOTOR), 1);
    assert!(registry.state(ChannelId::Telemetry).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_no_frames_delivered_after_close() {
    let frames: Vec<String> = (0..5).map(|i| format!("frame {i}")).collect();
    let connector = Arc::new(
        FakeConnector::new(Fallback::Hold).script(MOTOR, vec![Dial::DeliverAndHold(frames)]),
    );
    let (mut registry, mut events) = ChannelRegistry::new(connector, config(5));
    registry.open(ChannelId::Telemetry, motor_url());

    // Let the task queue its frames without consuming them.
    tokio::time::sleep(Duration::from_millis(10)).await;
    registry.close(ChannelId::Telemetry);

    assert!(drain_accepted(&mut registry, &mut events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_replace_all_drops_stale_frames() {
    let connector = Arc::new(FakeConnector::new(Fallback::Echo));
    let (mut registry, mut events) = ChannelRegistry::new(connector.clone(), config(5));

    registry.replace_all(&address("10.0.0.1:8800")).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    registry.replace_all(&address("10.0.0.2:8800")).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let frames: Vec<String> = drain_accepted(&mut registry, &mut events)
        .into_iter()
        .filter_map(|d| match d {
            Delivery::Frame { payload, .. } => Some(payload),
            _ => None,
        })
        .collect();

    assert_eq!(frames.len(), 3, "{frames:?}");
    assert!(frames.iter().all(|f| f.contains("10.0.0.2")), "{frames:?}");
    assert_eq!(connector.dials(MOTOR), 2);
    assert_eq!(
        registry.url(ChannelId::Camera(2)).unwrap().as_str(),
        "ws://10.0.0.2:8800/ws/cam/2"
    );
}

#[tokio::test(start_paused = true)]
async fn test_bad_address_keeps_current_channels() {
    let connector = Arc::new(FakeConnector::new(Fallback::Hold));
    let (mut registry, _events) = ChannelRegistry::new(connector, config(5));
    registry.replace_all(&address("10.0.0.1:8800")).unwrap();

    assert!(ServerAddress::parse("   ", AddressSource::UserInput, SchemePolicy::Plain).is_err());
    assert_eq!(registry.channels().count(), 3);
    assert_eq!(
        registry.url(ChannelId::Telemetry).unwrap().host_str(),
        Some("10.0.0.1")
    );
}

#[tokio::test(start_paused = true)]
async fn test_successful_open_resets_attempts() {
    let connector = Arc::new(FakeConnector::new(Fallback::Refuse).script(
        MOTOR,
        vec![
            Dial::Refuse,
            Dial::Refuse,
            Dial::Deliver(vec![common::telemetry(10.0, 0)]),
        ],
    ));
    let (mut registry, mut events) = ChannelRegistry::new(connector, config(5));
    registry.open(ChannelId::Telemetry, motor_url());

    let seen = collect_until(&mut registry, &mut events, |d| {
        matches!(d, Delivery::Exhausted { .. })
    })
    .await;

    let attempts: Vec<(ChannelStatus, u32)> = seen
        .iter()
        .filter_map(|d| match d {
            Delivery::StateChanged { state, .. } => Some((state.status, state.reconnect_attempts)),
            _ => None,
        })
        .collect();

    assert_eq!(
        &attempts[..5],
        &[
            (ChannelStatus::Connecting, 0),
            (ChannelStatus::Connecting, 1),
            (ChannelStatus::Connecting, 2),
            (ChannelStatus::Open, 0),
            // Counter restarted after the successful open.
            (ChannelStatus::Connecting, 1),
        ]
    );
    assert!(seen.iter().any(|d| matches!(d, Delivery::Frame { .. })));
}
