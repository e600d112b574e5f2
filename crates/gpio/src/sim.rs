//! Simulated lines
//!
//! Cloneable handles over shared state: the test keeps one clone to script
//! levels or inspect writes while the component under test owns another.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::{GpioError, InputLine, OutputLine, ToneOutput};

/// Simulated digital input with a settable level and scripted faults
#[derive(Clone, Default)]
pub struct SimulatedInput {
    level: Arc<AtomicBool>,
    faults: Arc<Mutex<VecDeque<bool>>>,
    broken: Arc<AtomicBool>,
}

impl SimulatedInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the level returned by subsequent reads
    pub fn set_level(&self, high: bool) {
        self.level.store(high, Ordering::SeqCst);
    }

    /// Fail the next `count` reads
    pub fn fail_next(&self, count: usize) {
        let mut faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        faults.extend(std::iter::repeat(true).take(count));
    }

    /// Fail every read until repaired
    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }
}

impl InputLine for SimulatedInput {
    fn read(&mut self) -> Result<bool, GpioError> {
        let scripted = self
            .faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(false);

        if scripted || self.broken.load(Ordering::SeqCst) {
            return Err(GpioError::Unavailable("simulated read fault".into()));
        }
        Ok(self.level.load(Ordering::SeqCst))
    }
}

/// Simulated digital output recording every write
#[derive(Clone, Default)]
pub struct SimulatedOutput {
    history: Arc<Mutex<Vec<bool>>>,
    broken: Arc<AtomicBool>,
}

impl SimulatedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last written level (`false` if never written)
    pub fn level(&self) -> bool {
        self.history().last().copied().unwrap_or(false)
    }

    /// All writes, oldest first
    pub fn history(&self) -> Vec<bool> {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }
}

impl OutputLine for SimulatedOutput {
    fn write(&mut self, high: bool) -> Result<(), GpioError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(GpioError::Unavailable("simulated write fault".into()));
        }
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(high);
        Ok(())
    }
}

/// Simulated buzzer recording every tone change
#[derive(Clone, Default)]
pub struct SimulatedTone {
    history: Arc<Mutex<Vec<Option<u32>>>>,
    broken: Arc<AtomicBool>,
}

impl SimulatedTone {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a tone is currently sounding
    pub fn is_sounding(&self) -> bool {
        matches!(self.history().last(), Some(Some(_)))
    }

    /// All tone changes, oldest first
    pub fn history(&self) -> Vec<Option<u32>> {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }
}

impl ToneOutput for SimulatedTone {
    fn set_tone(&mut self, frequency_hz: Option<u32>) -> Result<(), GpioError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(GpioError::Unavailable("simulated buzzer fault".into()));
        }
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(frequency_hz.filter(|&f| f > 0));
        Ok(())
    }
}
