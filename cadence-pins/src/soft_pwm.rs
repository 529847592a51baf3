//! Bit-banged PWM pin
//!
//! An output pin toggled by a dedicated drive thread. Each period the
//! thread writes high for `period * width` and low for the remainder,
//! where `period = 1 / frequency`. Timing changes are picked up at the
//! next half-period.
//!
//! Ownership of the pin passes to the drive thread on [`SoftPwmPin::start`]
//! and back on [`SoftPwmPin::stop`]; manual writes in between are refused
//! with [`PinError::Driven`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cadence_core::{Edge, HardwareItem, Label};
use cadence_hal::PinId;
use tracing::{debug, warn};

use crate::digital::DigitalPin;
use crate::driver::{PinDriver, PinError, SharedBus};

/// How long [`SoftPwmPin::stop`] waits for the drive thread
const JOIN_TIMEOUT: Duration = Duration::from_millis(100);

/// Half-period durations shared with the drive thread (µs)
#[derive(Debug, Default)]
struct Timing {
    on_us: AtomicU64,
    off_us: AtomicU64,
}

impl Timing {
    fn update(&self, frequency: f32, width: f32) {
        let (on, off) = split_period(frequency, width);
        self.on_us.store(on, Ordering::Relaxed);
        self.off_us.store(off, Ordering::Relaxed);
    }
}

/// On and off durations in µs for one period
fn split_period(frequency: f32, width: f32) -> (u64, u64) {
    let period = (1_000_000.0 / f64::from(frequency)).max(1.0);
    let on = (period * f64::from(width)).round();
    (on as u64, (period - on).max(0.0) as u64)
}

/// Bit-banged PWM output
pub struct SoftPwmPin {
    pin: DigitalPin,
    frequency: f32,
    width: f32,
    timing: Arc<Timing>,
    running: Arc<AtomicBool>,
    drive: Option<JoinHandle<()>>,
}

impl SoftPwmPin {
    /// Configure the pin as an output at `initial`
    ///
    /// The drive thread is not started. Polling is disabled by default;
    /// the drive thread owns the level.
    pub fn new(
        bus: SharedBus,
        id: impl Into<PinId>,
        frequency: f32,
        width: f32,
        initial: bool,
    ) -> Result<Self, PinError> {
        validate_frequency(frequency)?;
        validate_width(width)?;

        let mut pin = DigitalPin::output(bus, id, initial)?;
        pin.set_pollable(false);

        let timing = Arc::new(Timing::default());
        timing.update(frequency, width);

        Ok(Self {
            pin,
            frequency,
            width,
            timing,
            running: Arc::new(AtomicBool::new(false)),
            drive: None,
        })
    }

    /// Attach a friendly name
    pub fn with_label(mut self, name: Label) -> Self {
        self.pin.item_mut().set_label(name);
        self
    }

    /// Pulse frequency in Hz
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// On fraction of each period
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Current (on, off) durations
    pub fn durations(&self) -> (Duration, Duration) {
        (
            Duration::from_micros(self.timing.on_us.load(Ordering::Relaxed)),
            Duration::from_micros(self.timing.off_us.load(Ordering::Relaxed)),
        )
    }

    /// Change the pulse frequency
    pub fn set_frequency(&mut self, frequency: f32) -> Result<(), PinError> {
        validate_frequency(frequency)?;
        self.frequency = frequency;
        self.timing.update(self.frequency, self.width);
        Ok(())
    }

    /// Change the on fraction
    pub fn set_width(&mut self, width: f32) -> Result<(), PinError> {
        validate_width(width)?;
        self.width = width;
        self.timing.update(self.frequency, self.width);
        Ok(())
    }

    /// Check if the drive thread is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Hand the pin to a new drive thread
    ///
    /// Calling this while already running is a no-op.
    pub fn start(&mut self) -> Result<(), PinError> {
        if self.pin.item().is_hardware_locked() {
            return Err(PinError::Locked);
        }
        if self.pin.is_disposed() {
            return Err(PinError::Bus(cadence_hal::BusError::Unavailable));
        }
        if self.is_running() {
            return Ok(());
        }

        // Each run owns its flag, so a detached thread never sees a restart
        self.running = Arc::new(AtomicBool::new(true));
        let bus = self.pin.bus().clone();
        let id = self.pin.physical_id();
        let timing = self.timing.clone();
        let running = self.running.clone();

        let spawned = thread::Builder::new()
            .name(format!("pwm-{}", id.number()))
            .spawn(move || drive(bus, id, timing, running));

        match spawned {
            Ok(handle) => {
                debug!("PWM drive started on {}", id);
                self.drive = Some(handle);
                Ok(())
            }
            Err(_) => {
                self.running.store(false, Ordering::Release);
                Err(PinError::Spawn)
            }
        }
    }

    /// Stop the drive thread and restore the initial level
    ///
    /// Waits a bounded time for the thread; a thread that does not exit
    /// in time is detached. Calling this while stopped only restores the
    /// level.
    pub fn stop(&mut self) -> Result<(), PinError> {
        self.halt();
        if self.pin.is_disposed() {
            return Ok(());
        }
        let initial = self.pin.initial();
        self.pin.restore(initial)
    }

    fn halt(&mut self) {
        self.running.store(false, Ordering::Release);
        let Some(handle) = self.drive.take() else {
            return;
        };
        handle.thread().unpark();
        debug!("PWM drive stopping on {}", self.pin.physical_id());

        let deadline = Instant::now() + JOIN_TIMEOUT;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                // Detached; it exits at its next wakeup
                warn!("PWM drive thread on {} detached", self.pin.physical_id());
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        let _ = handle.join();
    }
}

fn validate_frequency(frequency: f32) -> Result<(), PinError> {
    if frequency.is_finite() && frequency > 0.0 {
        Ok(())
    } else {
        Err(PinError::InvalidFrequency)
    }
}

fn validate_width(width: f32) -> Result<(), PinError> {
    if (0.0..=1.0).contains(&width) {
        Ok(())
    } else {
        Err(PinError::InvalidWidth)
    }
}

/// Drive thread body
fn drive(bus: SharedBus, id: PinId, timing: Arc<Timing>, running: Arc<AtomicBool>) {
    while running.load(Ordering::Acquire) {
        let on = timing.on_us.load(Ordering::Relaxed);
        if on > 0 {
            let _ = bus.write(id, true);
            if !hold(&running, Duration::from_micros(on)) {
                break;
            }
        }

        let off = timing.off_us.load(Ordering::Relaxed);
        if off > 0 {
            let _ = bus.write(id, false);
            if !hold(&running, Duration::from_micros(off)) {
                break;
            }
        }
    }
}

/// Sleep for `duration` unless stopped; returns false when stopped
fn hold(running: &AtomicBool, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if !running.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::park_timeout(deadline - now);
    }
}

impl PinDriver for SoftPwmPin {
    fn kind(&self) -> &'static str {
        "SoftPwmPin"
    }

    fn physical_id(&self) -> PinId {
        self.pin.physical_id()
    }

    fn item(&self) -> &HardwareItem {
        self.pin.item()
    }

    fn item_mut(&mut self) -> &mut HardwareItem {
        self.pin.item_mut()
    }

    fn state(&self) -> bool {
        self.pin.state()
    }

    fn is_pollable(&self) -> bool {
        self.pin.is_pollable()
    }

    fn set_pollable(&mut self, pollable: bool) {
        self.pin.set_pollable(pollable);
    }

    fn is_output(&self) -> bool {
        true
    }

    fn poll(&mut self) -> Result<Option<Edge>, PinError> {
        Ok(None)
    }

    fn read(&self) -> Result<bool, PinError> {
        Ok(self.pin.state())
    }

    fn write(&mut self, high: bool) -> Result<(), PinError> {
        if self.is_running() {
            return Err(PinError::Driven);
        }
        self.pin.write(high)
    }

    fn dispose(&mut self) {
        self.halt();
        self.pin.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.pin.is_disposed()
    }

    fn reclaim(&mut self) -> Result<(), PinError> {
        self.pin.reclaim()
    }
}

impl Drop for SoftPwmPin {
    fn drop(&mut self) {
        PinDriver::dispose(self);
    }
}

impl core::fmt::Debug for SoftPwmPin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SoftPwmPin")
            .field("pin", &self.pin)
            .field("frequency", &self.frequency)
            .field("width", &self.width)
            .field("running", &self.is_running())
            .finish()
    }
}
