//! End-to-end tests for the hwctld stack.
//!
//! Each test loads a configuration, builds the real simulated devices on an
//! in-process bus and drives them through parsed commands, exactly as the
//! daemon's stdin loop does.

use std::sync::atomic::{AtomicUsize, Ordering};

use hwctl_app::event_bus::InProcessEventBus;
use hwctl_domain::event::{Event, EventType};
use hwctld::config::Config;
use hwctld::controller::{Controller, Outcome};
use tokio::sync::broadcast::Receiver;

const RIG: &str = "
    [events]
    capacity = 64

    [[devices]]
    name = 'kiln'
    kind = 'heater'
    driver = 'dimmer'
    channels = 1

    [[devices.channel]]
    index = 0
    transform = { k = 1.0, b = 0.0 }
    limits = { low = 0.0, high = 100.0 }
    red = { low = 0.0, high = 100.0 }
    yellow = { low = 10.0, high = 90.0 }
    pulse_ms = 20
    pulse_level = 50.0

    [[devices]]
    name = 'valves'
    kind = 'relay'
    driver = 'relay'
    channels = 3
";

/// Load `content` through a scratch file, removed again once parsed.
fn load_config(name: &str, content: &str) -> Config {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!("hwctld-{}-{name}-{n}.toml", std::process::id()));
    std::fs::write(&path, content).unwrap();
    let config = Config::from_file(path.to_str().unwrap());
    std::fs::remove_file(&path).unwrap();
    assert!(!path.exists());
    config.unwrap()
}

fn rig() -> (Controller, Receiver<Event>) {
    let config = load_config("rig", RIG);
    config.validate().unwrap();
    let bus = InProcessEventBus::new(config.events.capacity);
    let rx = bus.subscribe();
    let controller = Controller::build(&config, &bus).unwrap();
    (controller, rx)
}

async fn run(controller: &Controller, line: &str) -> String {
    match controller.execute(line.parse().unwrap()).await.unwrap() {
        Outcome::Reply(text) => text,
        other => panic!("expected reply to {line:?}, got {other:?}"),
    }
}

fn drain(rx: &mut Receiver<Event>) -> Vec<Event> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn should_reject_config_with_misnested_zones() {
    let config = load_config(
        "bad",
        "
        [[devices]]
        name = 'kiln'
        kind = 'heater'
        driver = 'dimmer'
        channels = 1

        [[devices.channel]]
        index = 0
        red = { low = 20.0, high = 30.0 }
        yellow = { low = 10.0, high = 90.0 }
        ",
    );
    let err = config.validate().unwrap_err();
    assert_eq!(err.to_string(), "invalid settings for kiln:0");
}

// ---------------------------------------------------------------------------
// Control pipeline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_walk_through_every_zone() {
    let (controller, mut rx) = rig();
    drain(&mut rx);

    let mut zones = Vec::new();
    for value in ["50", "95", "100", "105", "50", "5", "-1", "0"] {
        run(&controller, &format!("on kiln 0 {value}")).await;
        zones.push(run(&controller, "zone kiln 0").await);
    }
    let zones: Vec<&str> = zones
        .iter()
        .map(|z| z.split_whitespace().nth(1).unwrap())
        .collect();

    // limits clamp 105 to 100 and -1 to 0, both boundaries of red
    assert_eq!(
        zones,
        vec![
            "zone=green",
            "zone=yellow_high",
            "zone=yellow_high",
            "zone=yellow_high",
            "zone=green",
            "zone=yellow_low",
            "zone=yellow_low",
            "zone=yellow_low",
        ]
    );

    let changes = drain(&mut rx)
        .into_iter()
        .filter(|e| e.event_type == EventType::ZoneChanged)
        .count();
    assert_eq!(changes, 3);
}

#[tokio::test]
async fn should_keep_relay_channels_independent() {
    let (controller, _rx) = rig();
    run(&controller, "on valves 2 1").await;
    run(&controller, "on valves 0 1").await;
    run(&controller, "off valves 0").await;

    assert_eq!(
        run(&controller, "status valves").await,
        "valves [relay] 0=off/green 1=off/green 2=on/green"
    );
    let state = controller.driver_state("valves").unwrap().snapshot();
    assert_eq!(
        state.iter().map(|c| c.on).collect::<Vec<_>>(),
        vec![false, false, true]
    );
}

#[tokio::test]
async fn should_reset_channel_to_power_on_state() {
    let (controller, mut rx) = rig();
    run(&controller, "on kiln 0 40").await;
    run(&controller, "reset kiln 0").await;

    let kiln = controller.driver_state("kiln").unwrap().channel(0).unwrap();
    assert!(!kiln.on);
    assert!(kiln.level.abs() < f64::EPSILON);
    let kinds: Vec<EventType> = drain(&mut rx).into_iter().map(|e| e.event_type).collect();
    assert_eq!(kinds.last(), Some(&EventType::ChannelReset));
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn should_run_pulse_with_configured_defaults() {
    let (controller, mut rx) = rig();

    let Outcome::Started(pulse) = controller
        .execute("pulse kiln 0".parse().unwrap())
        .await
        .unwrap()
    else {
        panic!("pulse should be admitted");
    };
    let outcome = pulse.await.unwrap();
    assert_eq!(outcome, serde_json::json!({"ms": 20, "value": 50.0}));

    let kinds: Vec<EventType> = drain(&mut rx).into_iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![
            EventType::TaskStarted,
            EventType::ChannelOn,
            EventType::ChannelOff,
            EventType::TaskSettled,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn should_allow_pulses_on_different_channels_concurrently() {
    let (controller, _rx) = rig();

    let mut pulses = Vec::new();
    for channel in 0..3 {
        match controller
            .execute(format!("pulse valves {channel} 30").parse().unwrap())
            .await
            .unwrap()
        {
            Outcome::Started(pulse) => pulses.push(pulse),
            other => panic!("expected pulse on channel {channel} to start, got {other:?}"),
        }
    }
    for pulse in pulses {
        assert!(pulse.await.is_ok());
    }
    assert_eq!(
        run(&controller, "status valves").await,
        "valves [relay] 0=off/green 1=off/green 2=off/green"
    );
}
