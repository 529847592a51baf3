//! Polling engine
//!
//! The engine owns the key table, the pin registry and the user's
//! [`Controller`]. While running, all three live on a dedicated polling
//! thread; callers only touch the shared key buffer.
//!
//! # Cycle
//!
//! ```text
//! drain buffer ─▶ merge keys ─▶ poll pins ─▶ notify ─▶ update ─▶ notify
//!      ▲                                                           │
//!      └───────────────────────── (min_cycle_us) ◀─────────────────┘
//! ```
//!
//! Errors and panics from `update` and from observers are reported and
//! the loop continues. A panic in the engine's own bookkeeping, such as a
//! bus implementation panicking during the poll, is reported as fatal and
//! ends the thread; the engine can be started again afterwards.

use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cadence_core::config::{EngineSettings, RuntimeConfig, SetupPolicy};
use cadence_core::fault::panic_message;
use cadence_core::{
    BoxError, EngineState, Fault, Key, KeyId, KeyState, Lifecycle, NameGenerator, RandomSuffix,
    WriteBuffer,
};
use cadence_hal::PinId;
use cadence_pins::{PinDriver, SharedBus};
use cadence_protocol::{Frame, MessageError, RemoteMessage};
use tracing::{error, info, trace, warn};

use crate::config::ConfigError;
use crate::cycle::Cycle;
use crate::keys::KeyTable;
use crate::observer::{Observer, Observers, PinSnapshot};
use crate::registry::Registry;

/// User logic driven by the engine
pub trait Controller: Send + 'static {
    /// Register pins; runs once, on the first successful start
    fn setup(&mut self, _registry: &mut Registry) -> Result<(), BoxError> {
        Ok(())
    }

    /// Per-cycle logic
    fn update(&mut self, cycle: &mut Cycle<'_>) -> Result<(), BoxError>;
}

impl<F> Controller for F
where
    F: FnMut(&mut Cycle<'_>) -> Result<(), BoxError> + Send + 'static,
{
    fn update(&mut self, cycle: &mut Cycle<'_>) -> Result<(), BoxError> {
        self(cycle)
    }
}

/// Thread-safe key submission handle
#[derive(Debug, Clone)]
pub struct Invoker {
    buffer: Arc<WriteBuffer<Key>>,
}

impl Invoker {
    /// Submit a key for the next cycle
    ///
    /// Never blocks beyond the buffer lock. Keys submitted while the
    /// engine is stopped wait for the next start.
    pub fn invoke(&self, mut key: Key) {
        key.item_mut().set_just_changed(true);
        self.buffer.add(key);
    }

    /// Decode a key frame and submit it
    pub fn invoke_frame(&self, frame: &Frame) -> Result<(), MessageError> {
        match RemoteMessage::from_frame(frame)? {
            RemoteMessage::Key(msg) => {
                let state = KeyState::from_bool(msg.is_active());
                let mut key = Key::new(KeyId(msg.id), state);
                if let Some(name) = msg.name.as_deref() {
                    key.item_mut().set_friendly_name(name);
                }
                self.invoke(key);
                Ok(())
            }
            other => Err(MessageError::Unsupported(other.code())),
        }
    }

    /// Keys waiting for the next cycle
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// State owned by the polling thread while running
struct Core {
    registry: Registry,
    keys: KeyTable,
    controller: Box<dyn Controller>,
    config: Option<RuntimeConfig>,
    initialized: bool,
    cycles: u64,
    /// Pins whose last poll failed; reported once per failure streak
    failing: BTreeSet<PinId>,
}

impl Core {
    fn run(mut self, shared: Shared) -> Self {
        info!("Polling loop started");
        while !shared.stop.load(Ordering::Acquire) {
            let started = Instant::now();
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| self.cycle(&shared))) {
                let fault = Fault::fatal(panic_message(payload.as_ref()));
                error!("{}", fault);
                shared.observers.fault(&fault);
                return self;
            }
            if let Some(rest) = shared.min_cycle.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }
        info!("Polling loop stopped after {} cycles", self.cycles);
        self
    }

    fn cycle(&mut self, shared: &Shared) {
        self.cycles += 1;

        let batch = shared.buffer.drain();
        self.keys.merge(batch);

        self.poll(&shared.observers);
        self.notify(&shared.observers);

        let mut cycle = Cycle::new(
            self.cycles,
            &self.keys,
            &mut self.registry,
            &shared.observers,
        );
        let controller = &mut self.controller;
        let fault = match catch_unwind(AssertUnwindSafe(|| controller.update(&mut cycle))) {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(Fault::user_callback(e)),
            Err(payload) => Some(Fault::user_callback(format!(
                "panicked: {}",
                panic_message(payload.as_ref())
            ))),
        };
        if let Some(fault) = fault {
            warn!("{}", fault);
            shared.observers.fault(&fault);
        }

        self.notify(&shared.observers);
    }

    fn poll(&mut self, observers: &Observers) {
        for pin in self.registry.iter_mut().filter(|p| p.is_pollable()) {
            let id = pin.physical_id();
            match pin.poll() {
                Ok(_) => {
                    if self.failing.remove(&id) {
                        info!("{} readable again", id);
                    }
                }
                Err(e) => {
                    if self.failing.insert(id) {
                        let fault = Fault::bus(format_args!("poll of {} failed: {}", id, e));
                        warn!("{}", fault);
                        observers.fault(&fault);
                    }
                }
            }
        }
    }

    fn notify(&mut self, observers: &Observers) {
        let cycle = self.cycles;
        for pin in self.registry.iter_mut() {
            if pin.item_mut().take_notice() {
                trace!("{} changed to {}", pin.physical_id(), pin.state());
                observers.state_changed(&PinSnapshot::capture(pin, cycle));
            }
        }
    }

    /// Bus init, configured pins and user setup
    ///
    /// Every failure is reported. Under [`SetupPolicy::Abort`] the first
    /// one is returned and the core stays uninitialized; under
    /// [`SetupPolicy::Degraded`] the remaining steps still run.
    fn setup(&mut self, bus: &SharedBus, policy: SetupPolicy, observers: &Observers) -> Result<(), Fault> {
        let abort = policy == SetupPolicy::Abort;
        let raise = |fault: Fault| -> Result<(), Fault> {
            error!("{}", fault);
            observers.fault(&fault);
            if abort {
                Err(fault)
            } else {
                Ok(())
            }
        };

        if let Err(e) = bus.init() {
            raise(Fault::setup(format_args!("bus init failed: {}", e)))?;
        }

        if let Some(config) = self.config.take() {
            if let Err(e) = self.registry.populate(&config) {
                let fault = Fault::setup(format_args!("configured pins: {}", e));
                if abort {
                    self.config = Some(config);
                }
                raise(fault)?;
            }
        }

        let registry = &mut self.registry;
        let controller = &mut self.controller;
        match catch_unwind(AssertUnwindSafe(|| controller.setup(registry))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => raise(Fault::setup(format_args!("user setup: {}", e)))?,
            Err(payload) => raise(Fault::setup(format_args!(
                "user setup panicked: {}",
                panic_message(payload.as_ref())
            )))?,
        }

        self.initialized = true;
        info!("Setup complete with {} pins", self.registry.len());
        Ok(())
    }
}

/// State shared between the engine handle and the polling thread
#[derive(Clone)]
struct Shared {
    buffer: Arc<WriteBuffer<Key>>,
    observers: Observers,
    stop: Arc<AtomicBool>,
    min_cycle: Duration,
}

/// Polling engine handle
pub struct Engine {
    bus: SharedBus,
    settings: EngineSettings,
    shared: Shared,
    state: EngineState,
    core: Option<Core>,
    worker: Option<JoinHandle<Core>>,
}

impl Engine {
    /// Engine with default settings
    pub fn new(bus: SharedBus, controller: impl Controller) -> Self {
        Self::with_settings(bus, EngineSettings::default(), controller)
    }

    /// Engine with explicit settings
    pub fn with_settings(bus: SharedBus, settings: EngineSettings, controller: impl Controller) -> Self {
        Self::build(bus, settings, Box::new(controller), RandomSuffix::new())
    }

    /// Engine that registers the configured pins on first start
    ///
    /// The configuration is validated here; pins are constructed after
    /// bus init.
    pub fn from_config(
        bus: SharedBus,
        config: RuntimeConfig,
        controller: impl Controller,
    ) -> Result<Self, ConfigError> {
        crate::config::validate(&config)?;
        let mut engine = Self::with_settings(bus, config.engine.clone(), controller);
        if let Some(core) = engine.core.as_mut() {
            core.config = Some(config);
        }
        Ok(engine)
    }

    fn build<G>(bus: SharedBus, settings: EngineSettings, controller: Box<dyn Controller>, names: G) -> Self
    where
        G: NameGenerator + Clone + 'static,
    {
        let shared = Shared {
            buffer: Arc::new(WriteBuffer::new()),
            observers: Observers::new(),
            stop: Arc::new(AtomicBool::new(false)),
            min_cycle: Duration::from_micros(u64::from(settings.min_cycle_us)),
        };
        let core = Core {
            registry: Registry::with_names(bus.clone(), Box::new(names.clone())),
            keys: KeyTable::new(Box::new(names)),
            controller,
            config: None,
            initialized: false,
            cycles: 0,
            failing: BTreeSet::new(),
        };
        Self {
            bus,
            settings,
            shared,
            state: EngineState::Stopped,
            core: Some(core),
            worker: None,
        }
    }

    /// Replace the friendly-name generator for pins and keys
    ///
    /// Only effective before the first start.
    pub fn with_name_generator<G>(mut self, names: G) -> Self
    where
        G: NameGenerator + Clone + 'static,
    {
        if let Some(core) = self.core.as_mut() {
            if !core.initialized && core.registry.is_empty() {
                core.registry = Registry::with_names(self.bus.clone(), Box::new(names.clone()));
                core.keys = KeyTable::new(Box::new(names));
            }
        }
        self
    }

    /// Register an observer
    pub fn add_observer(&self, observer: Arc<dyn Observer>) {
        self.shared.observers.add(observer);
    }

    /// Submission handle usable from any thread
    pub fn invoker(&self) -> Invoker {
        Invoker {
            buffer: self.shared.buffer.clone(),
        }
    }

    /// Submit a key for the next cycle
    pub fn invoke(&self, key: Key) {
        self.invoker().invoke(key);
    }

    /// Decode a key frame and submit it
    pub fn invoke_frame(&self, frame: &Frame) -> Result<(), MessageError> {
        self.invoker().invoke_frame(frame)
    }

    /// Engine settings
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Check if the polling thread is alive
    pub fn is_running(&self) -> bool {
        self.state.is_running() && self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Pin registry, available while stopped
    pub fn registry(&self) -> Option<&Registry> {
        self.core.as_ref().map(|c| &c.registry)
    }

    /// Mutable pin registry, available while stopped
    pub fn registry_mut(&mut self) -> Option<&mut Registry> {
        self.core.as_mut().map(|c| &mut c.registry)
    }

    /// Key table, available while stopped
    pub fn keys(&self) -> Option<&KeyTable> {
        self.core.as_ref().map(|c| &c.keys)
    }

    /// Completed cycles, available while stopped
    pub fn cycles(&self) -> Option<u64> {
        self.core.as_ref().map(|c| c.cycles)
    }

    /// Take back the core from a finished polling thread
    fn reap(&mut self) {
        let finished = self.worker.as_ref().is_some_and(|w| w.is_finished());
        if !finished {
            return;
        }
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(core) => self.core = Some(core),
                Err(_) => error!("Polling thread lost its state"),
            }
        }
        if self.state.is_running() {
            self.state = self.state.transition(Lifecycle::LoopExited);
        }
    }

    /// Start the polling thread
    ///
    /// The first successful start initializes the bus, registers the
    /// configured pins and runs the controller's setup. Setup faults are
    /// reported to observers; under [`SetupPolicy::Abort`] the engine
    /// stays stopped. Starting a running engine is a no-op.
    pub fn start(&mut self) -> Result<(), Fault> {
        self.reap();
        if self.is_running() {
            return Ok(());
        }

        let Some(mut core) = self.core.take() else {
            let fault = Fault::setup("previous polling thread has not exited");
            self.shared.observers.fault(&fault);
            return Err(fault);
        };

        if !core.initialized {
            if let Err(fault) = core.setup(&self.bus, self.settings.setup_policy, &self.shared.observers) {
                self.core = Some(core);
                self.state = self.state.transition(Lifecycle::SetupAborted);
                return Err(fault);
            }
        }

        self.shared.stop.store(false, Ordering::Release);
        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("cadence-engine".into())
            .spawn(move || core.run(shared));

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                self.state = self.state.transition(Lifecycle::Start);
                info!("Engine started");
                Ok(())
            }
            Err(e) => {
                let fault = Fault::setup(format_args!("could not spawn polling thread: {}", e));
                error!("{}", fault);
                self.shared.observers.fault(&fault);
                Err(fault)
            }
        }
    }

    /// Stop the polling thread
    ///
    /// Waits up to `stop_timeout_ms` for the current cycle to finish. A
    /// thread that does not exit in time is left to finish on its own and
    /// reclaimed by a later `start` or `stop`. Never fails.
    pub fn stop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);

        let timeout = Duration::from_millis(u64::from(self.settings.stop_timeout_ms));
        let deadline = Instant::now() + timeout;
        while self.worker.as_ref().is_some_and(|w| !w.is_finished()) {
            if Instant::now() >= deadline {
                warn!("Polling thread did not stop within {} ms", self.settings.stop_timeout_ms);
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }

        self.reap();
        if self.state.is_running() {
            self.state = self.state.transition(Lifecycle::Stop);
            info!("Engine stopped");
        }
    }

    /// Stop, then release every registered pin and drop pending keys
    pub fn dispose(&mut self) {
        self.stop();
        if let Some(core) = self.core.as_mut() {
            core.registry.dispose_all();
            core.keys.clear();
        }
        self.shared.buffer.force_clear();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl core::fmt::Debug for Engine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state)
            .field("settings", &self.settings)
            .field("observers", &self.shared.observers)
            .finish()
    }
}
