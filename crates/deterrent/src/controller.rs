//! Deterrent controller and watchdog

use gpio::ToneOutput;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::{ActuatorFault, DeterrentConfig, Pattern};

struct Output {
    line: Box<dyn ToneOutput>,
    /// Bumped by every activation and shut-off; a watchdog only drives the
    /// line while its generation is current
    generation: u64,
}

struct Shared {
    output: Mutex<Output>,
    active: AtomicBool,
    enabled: bool,
    frequency_hz: u32,
    fault: Mutex<Option<ActuatorFault>>,
    fault_notify: Notify,
}

impl Shared {
    fn output(&self) -> MutexGuard<'_, Output> {
        self.output.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self, out: &mut Output, on: bool) -> Result<(), ActuatorFault> {
        if !self.enabled {
            return Ok(());
        }
        let tone = if on { Some(self.frequency_hz) } else { None };
        out.line.set_tone(tone).map_err(ActuatorFault::from)
    }

    fn raise(&self, fault: ActuatorFault) {
        error!("Deterrent fault: {}", fault);
        *self.fault.lock().unwrap_or_else(|e| e.into_inner()) = Some(fault);
        self.fault_notify.notify_one();
    }

    /// Toggle a pulse; false once the generation is superseded or the line failed
    fn pulse(&self, generation: u64, on: bool) -> bool {
        let mut out = self.output();
        if out.generation != generation {
            return false;
        }
        match self.write(&mut out, on) {
            Ok(()) => true,
            Err(fault) => {
                self.raise(fault);
                false
            }
        }
    }

    /// Deadline shut-off
    fn expire(&self, generation: u64) {
        let mut out = self.output();
        if out.generation != generation {
            return;
        }
        out.generation += 1;
        self.active.store(false, Ordering::SeqCst);
        match self.write(&mut out, false) {
            Ok(()) => info!("Deterrent deadline reached, buzzer silenced"),
            Err(fault) => self.raise(fault),
        }
    }
}

/// Buzzer controller.
///
/// Owns the tone line. Activation hands timing to a watchdog task; the
/// line is silent no later than the effective deadline.
pub struct DeterrentController {
    shared: Arc<Shared>,
    pattern: Pattern,
    ceiling: Duration,
    watchdog: Option<JoinHandle<()>>,
}

impl DeterrentController {
    pub fn new(line: Box<dyn ToneOutput>, config: &DeterrentConfig) -> Self {
        info!(
            "Creating deterrent controller: {} Hz, pattern={:?}, ceiling={}ms, enabled={}",
            config.frequency_hz, config.pattern, config.max_active_ms, config.enabled
        );
        if !config.enabled {
            warn!("Buzzer disabled in configuration, deterrent runs dry");
        }
        Self {
            shared: Arc::new(Shared {
                output: Mutex::new(Output {
                    line,
                    generation: 0,
                }),
                active: AtomicBool::new(false),
                enabled: config.enabled,
                frequency_hz: config.frequency_hz,
                fault: Mutex::new(None),
                fault_notify: Notify::new(),
            }),
            pattern: config.pattern,
            ceiling: config.ceiling(),
            watchdog: None,
        }
    }

    /// Configured drive pattern
    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    /// Longest activation the controller allows, whatever the caller asks for
    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// Start the buzzer for at most `max_duration` (capped by the configured ceiling).
    ///
    /// Activating while active restarts the deadline.
    pub fn activate(&mut self, pattern: Pattern, max_duration: Duration) -> Result<(), ActuatorFault> {
        let duration = max_duration.min(self.ceiling);
        self.stop_watchdog();

        let generation = {
            let mut out = self.shared.output();
            out.generation += 1;
            if let Err(fault) = self.shared.write(&mut out, true) {
                self.shared.active.store(false, Ordering::SeqCst);
                return Err(fault);
            }
            out.generation
        };
        self.shared.active.store(true, Ordering::SeqCst);

        info!(
            "Deterrent activated: {:?} for {}ms",
            pattern,
            duration.as_millis()
        );
        self.watchdog = Some(tokio::spawn(watchdog(
            self.shared.clone(),
            generation,
            pattern,
            duration,
        )));
        Ok(())
    }

    /// Silence the buzzer. No effect when already inactive.
    pub fn deactivate(&mut self) -> Result<(), ActuatorFault> {
        if !self.shared.active.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.stop_watchdog();

        let mut out = self.shared.output();
        out.generation += 1;
        self.shared.active.store(false, Ordering::SeqCst);
        self.shared.write(&mut out, false)?;
        info!("Deterrent deactivated");
        Ok(())
    }

    /// Silence the line unconditionally, active or not
    pub fn force_off(&mut self) -> Result<(), ActuatorFault> {
        self.stop_watchdog();

        let mut out = self.shared.output();
        out.generation += 1;
        self.shared.active.store(false, Ordering::SeqCst);
        self.shared.write(&mut out, false)?;
        debug!("Deterrent forced off");
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Wait for a fault raised by the watchdog
    pub async fn fault_raised(&self) -> ActuatorFault {
        loop {
            if let Some(fault) = self.take_fault() {
                return fault;
            }
            self.shared.fault_notify.notified().await;
        }
    }

    pub fn take_fault(&self) -> Option<ActuatorFault> {
        self.shared
            .fault
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    fn stop_watchdog(&mut self) {
        if let Some(handle) = self.watchdog.take() {
            handle.abort();
        }
    }
}

impl Drop for DeterrentController {
    fn drop(&mut self) {
        self.stop_watchdog();
        if self.is_active() {
            if let Err(e) = self.force_off() {
                error!("Failed to silence buzzer on drop: {}", e);
            }
        }
    }
}

async fn watchdog(shared: Arc<Shared>, generation: u64, pattern: Pattern, duration: Duration) {
    let start = Instant::now();
    let deadline = start + duration;

    if let Pattern::Pulsed { on_ms, off_ms } = pattern {
        let mut edge = start;
        let mut on = true;
        loop {
            let phase = if on { on_ms } else { off_ms };
            edge += Duration::from_millis(phase.max(1));
            if edge >= deadline {
                break;
            }
            sleep_until(edge).await;
            on = !on;
            if !shared.pulse(generation, on) {
                return;
            }
        }
    }

    sleep_until(deadline).await;
    shared.expire(generation);
}
