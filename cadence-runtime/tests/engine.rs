//! Engine integration tests
//!
//! A real polling thread runs against `SimBus`; the tests watch it through
//! a `ChannelObserver` and a controller that records what it saw.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use cadence_core::config::{EngineSettings, SetupPolicy};
use cadence_core::{BoxError, Fault, FaultKind, Key, KeyState, Sequential};
use cadence_hal::{BusError, GpioBus, PinId, PinMode, PullMode, SimBus};
use cadence_pins::{DigitalPin, Pin, PinDriver, SoftPwmPin};
use cadence_protocol::{KeyMessage, RemoteMessage};
use cadence_runtime::config;
use cadence_runtime::{
    ChannelObserver, Controller, Cycle, Engine, EngineEvent, Observer, PinSnapshot, Registry,
};

const TIMEOUT: Duration = Duration::from_secs(2);

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn next_matching(rx: &Receiver<EngineEvent>, pred: impl Fn(&EngineEvent) -> bool) -> EngineEvent {
    let deadline = Instant::now() + TIMEOUT;
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(left) {
            Ok(event) if pred(&event) => return event,
            Ok(_) => {}
            Err(e) => panic!("no matching event: {}", e),
        }
    }
}

fn fault_of(kind: FaultKind) -> impl Fn(&EngineEvent) -> bool {
    move |e| matches!(e, EngineEvent::Fault { fault, .. } if fault.kind() == kind)
}

fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached");
        thread::sleep(Duration::from_millis(1));
    }
}

/// (cycle, state, just_changed) of GPIO7 as seen from user logic
type Samples = Arc<Mutex<Vec<(u64, bool, bool)>>>;

struct OutputScenario {
    samples: Samples,
}

impl Controller for OutputScenario {
    fn setup(&mut self, registry: &mut Registry) -> Result<(), BoxError> {
        let pin = DigitalPin::output(registry.bus().clone(), 7, false)?;
        registry.add_with(pin, false);
        Ok(())
    }

    fn update(&mut self, cycle: &mut Cycle<'_>) -> Result<(), BoxError> {
        let number = cycle.number();
        if number > 3 {
            return Ok(());
        }
        if number == 2 {
            cycle.set_value(7, true);
        }
        let pin = cycle.try_pin::<Pin>(7)?;
        self.samples
            .lock()
            .unwrap()
            .push((number, pin.state(), pin.just_changed()));
        Ok(())
    }
}

#[test]
fn test_unpolled_output_keeps_written_state() {
    let bus = Arc::new(SimBus::new());
    let samples = Samples::default();
    let mut engine = Engine::new(
        bus.clone(),
        OutputScenario {
            samples: samples.clone(),
        },
    );
    engine.start().unwrap();
    wait_until(|| samples.lock().unwrap().len() == 3);
    engine.stop();

    let samples = samples.lock().unwrap();
    // Cycle 1: nothing happened to the pin
    assert_eq!(samples[0], (1, false, false));
    // Cycle 2: the write is an edge
    assert_eq!(samples[1], (2, true, true));
    // Cycle 3: not polled, so the cached state stands
    assert!(samples[2].1);
    assert!(bus.level(PinId(7)));
    assert!(!engine.registry().unwrap().get::<Pin>(7).unwrap().is_pollable());
}

struct KeyRecorder {
    seen: Arc<Mutex<Vec<(u64, bool, bool)>>>,
}

impl Controller for KeyRecorder {
    fn update(&mut self, cycle: &mut Cycle<'_>) -> Result<(), BoxError> {
        if let Some(key) = cycle.keys().get('A') {
            self.seen
                .lock()
                .unwrap()
                .push((cycle.number(), key.is_active(), key.just_changed()));
        }
        Ok(())
    }
}

#[test]
fn test_key_submitted_before_start() {
    let bus = Arc::new(SimBus::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut engine = Engine::new(bus, KeyRecorder { seen: seen.clone() })
        .with_name_generator(Sequential::new());

    engine.invoke(Key::active('A'));
    engine.start().unwrap();
    wait_until(|| seen.lock().unwrap().len() >= 2);
    engine.stop();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0], (1, true, true));
    // Retained without further submissions; the edge lasts one cycle
    assert_eq!(seen[1], (2, true, false));

    let keys = engine.keys().unwrap();
    assert_eq!(keys.get('A').unwrap().friendly_name(), Some("Key0"));
}

struct Blinker;

impl Controller for Blinker {
    fn setup(&mut self, registry: &mut Registry) -> Result<(), BoxError> {
        let bus = registry.bus().clone();
        registry.add(DigitalPin::input(bus.clone(), 4)?);
        registry.add_with(DigitalPin::output(bus, 7, false)?, false);
        Ok(())
    }

    fn update(&mut self, cycle: &mut Cycle<'_>) -> Result<(), BoxError> {
        if cycle.key_just_changed_to('B', KeyState::Active) {
            cycle.toggle(7);
        }
        if cycle.pin_just_changed_to(4, false) {
            cycle.set_value(7, false);
        }
        Ok(())
    }
}

#[test]
fn test_remote_key_toggles_output() {
    init_logging();
    let bus = Arc::new(SimBus::new());
    let mut engine = Engine::new(bus.clone(), Blinker);
    let (observer, rx) = ChannelObserver::new();
    engine.add_observer(observer);
    engine.start().unwrap();

    let invoker = engine.invoker();
    let frame = RemoteMessage::Key(KeyMessage::new('B' as u32, true))
        .to_frame()
        .unwrap();
    thread::spawn(move || invoker.invoke_frame(&frame).unwrap())
        .join()
        .unwrap();

    next_matching(&rx, |e| {
        matches!(e, EngineEvent::StateChanged(s) if s.id == PinId(7) && s.state)
    });
    assert!(bus.level(PinId(7)));

    // Falling input edge clears the output again
    bus.set_level(PinId(4), true);
    next_matching(&rx, |e| {
        matches!(e, EngineEvent::StateChanged(s) if s.id == PinId(4) && s.state)
    });
    bus.set_level(PinId(4), false);
    next_matching(&rx, |e| {
        matches!(e, EngineEvent::StateChanged(s) if s.id == PinId(7) && !s.state)
    });
    assert!(!bus.level(PinId(7)));

    engine.stop();
}

#[test]
fn test_poll_failure_reported_once() {
    let bus = Arc::new(SimBus::new());
    let mut engine = Engine::new(bus.clone(), Blinker);
    let (observer, rx) = ChannelObserver::new();
    engine.add_observer(observer);
    engine.start().unwrap();

    bus.fail_pin(PinId(4));
    next_matching(&rx, fault_of(FaultKind::Bus));
    thread::sleep(Duration::from_millis(20));
    assert!(rx.try_iter().all(|e| !fault_of(FaultKind::Bus)(&e)));
    assert!(engine.is_running());

    // A recovered pin that fails again is reported again
    bus.heal_pin(PinId(4));
    thread::sleep(Duration::from_millis(20));
    bus.fail_pin(PinId(4));
    next_matching(&rx, fault_of(FaultKind::Bus));

    engine.stop();
}

/// Observer that panics on every state change
struct Exploding;

impl Observer for Exploding {
    fn on_hardware_state_changed(&self, _pin: &PinSnapshot) {
        panic!("observer blew up");
    }
}

#[test]
fn test_observer_panic_is_not_fatal() {
    init_logging();
    let bus = Arc::new(SimBus::new());
    let mut engine = Engine::new(bus.clone(), Blinker);
    let (observer, rx) = ChannelObserver::new();
    engine.add_observer(Arc::new(Exploding));
    engine.add_observer(observer);
    engine.start().unwrap();

    bus.set_level(PinId(4), true);
    match next_matching(&rx, fault_of(FaultKind::UserCallback)) {
        EngineEvent::Fault { fault, fatal } => {
            assert!(!fatal);
            assert!(fault.detail().contains("observer blew up"));
        }
        _ => unreachable!(),
    }
    // The change still reaches the observers after the panicking one
    next_matching(&rx, |e| {
        matches!(e, EngineEvent::StateChanged(s) if s.id == PinId(4) && s.state)
    });

    // The loop keeps going and user logic still runs
    engine.invoke(Key::active('B'));
    wait_until(|| bus.level(PinId(7)));
    assert!(engine.is_running());
    assert!(rx.try_iter().all(|e| !fault_of(FaultKind::Loop)(&e)));
    engine.stop();
}

/// Bus whose reads of GPIO4 panic once armed
struct Tripwire {
    inner: SimBus,
    armed: AtomicBool,
}

impl GpioBus for Tripwire {
    fn init(&self) -> Result<(), BusError> {
        self.inner.init()
    }

    fn set_mode(&self, pin: PinId, mode: PinMode) -> Result<(), BusError> {
        self.inner.set_mode(pin, mode)
    }

    fn set_pull(&self, pin: PinId, pull: PullMode) -> Result<(), BusError> {
        self.inner.set_pull(pin, pull)
    }

    fn read(&self, pin: PinId) -> Result<bool, BusError> {
        if pin == PinId(4) && self.armed.load(Ordering::Acquire) {
            panic!("register map corrupted");
        }
        self.inner.read(pin)
    }

    fn write(&self, pin: PinId, high: bool) -> Result<(), BusError> {
        self.inner.write(pin, high)
    }

    fn release(&self, pin: PinId) -> Result<(), BusError> {
        self.inner.release(pin)
    }
}

#[test]
fn test_bookkeeping_panic_is_fatal() {
    init_logging();
    let bus = Arc::new(Tripwire {
        inner: SimBus::new(),
        armed: AtomicBool::new(false),
    });
    let mut engine = Engine::new(bus.clone(), Blinker);
    let (observer, rx) = ChannelObserver::new();
    engine.add_observer(observer);
    engine.start().unwrap();

    bus.armed.store(true, Ordering::Release);
    match next_matching(&rx, fault_of(FaultKind::Loop)) {
        EngineEvent::Fault { fault, fatal } => {
            assert!(fatal);
            assert!(fault.detail().contains("register map corrupted"));
        }
        _ => unreachable!(),
    }
    wait_until(|| !engine.is_running());

    // The engine can be started again and keeps its pins
    bus.armed.store(false, Ordering::Release);
    engine.start().unwrap();
    assert!(engine.is_running());
    engine.stop();
    assert_eq!(engine.registry().unwrap().len(), 2);
}

#[test]
fn test_setup_failure_policies() {
    let failing = |policy| {
        let settings = EngineSettings {
            setup_policy: policy,
            ..EngineSettings::default()
        };
        Engine::with_settings(Arc::new(SimBus::failing_init()), settings, Blinker)
    };

    let mut aborted = failing(SetupPolicy::Abort);
    let fault: Fault = aborted.start().unwrap_err();
    assert_eq!(fault.kind(), FaultKind::Setup);
    assert!(!aborted.is_running());
    assert!(aborted.registry().unwrap().is_empty());

    // Degraded runs anyway; user setup fails on the dead bus too
    let mut degraded = failing(SetupPolicy::Degraded);
    let (observer, rx) = ChannelObserver::new();
    degraded.add_observer(observer);
    degraded.start().unwrap();
    assert!(degraded.is_running());
    let setup_faults = rx
        .try_iter()
        .filter(|e| fault_of(FaultKind::Setup)(e))
        .count();
    assert_eq!(setup_faults, 2);
    degraded.stop();
}

#[test]
fn test_stop_is_bounded() {
    struct Sleepy;

    impl Controller for Sleepy {
        fn update(&mut self, _cycle: &mut Cycle<'_>) -> Result<(), BoxError> {
            thread::sleep(Duration::from_millis(200));
            Ok(())
        }
    }

    let settings = EngineSettings {
        stop_timeout_ms: 20,
        ..EngineSettings::default()
    };
    let mut engine = Engine::with_settings(Arc::new(SimBus::new()), settings, Sleepy);
    engine.start().unwrap();
    thread::sleep(Duration::from_millis(10));

    let started = Instant::now();
    engine.stop();
    assert!(started.elapsed() < Duration::from_millis(150));

    // The detached thread is reclaimed once it finishes its cycle
    wait_until(|| {
        engine.stop();
        engine.registry().is_some()
    });
    assert!(!engine.is_running());
}

#[test]
fn test_configured_engine() {
    init_logging();
    let text = r#"
        [engine]
        min_cycle_us = 500

        [[pin]]
        id = 17
        name = "lamp"
        direction = "output"

        [[soft_pwm]]
        id = 18
        name = "servo"
        frequency = 200.0
        width = 0.5
        autostart = true
    "#;
    let config = config::from_str(text).unwrap();
    let bus = Arc::new(SimBus::new());

    struct Lamp;

    impl Controller for Lamp {
        fn update(&mut self, cycle: &mut Cycle<'_>) -> Result<(), BoxError> {
            if cycle.number() == 1 {
                cycle.set_value("lamp", true);
            }
            Ok(())
        }
    }

    let mut engine = Engine::from_config(bus.clone(), config, Lamp).unwrap();
    assert_eq!(engine.settings().min_cycle_us, 500);
    engine.start().unwrap();
    wait_until(|| bus.level(PinId(17)));
    engine.stop();

    let registry = engine.registry().unwrap();
    assert!(registry.get::<SoftPwmPin>("servo").unwrap().is_running());

    engine.dispose();
    assert_eq!(bus.releases(PinId(17)), 1);
    assert_eq!(bus.releases(PinId(18)), 1);
    assert!(!bus.level(PinId(18)));
}

#[test]
fn test_dispose_releases_everything() {
    let bus = Arc::new(SimBus::new());
    {
        let mut engine = Engine::new(bus.clone(), Blinker);
        engine.start().unwrap();
        engine.invoke(Key::active('B'));
        // Dropping the engine stops and disposes it
    }
    assert_eq!(bus.releases(PinId(4)), 1);
    assert_eq!(bus.releases(PinId(7)), 1);
    assert!(!bus.level(PinId(7)));
}
