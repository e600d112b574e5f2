//! GPIO Capabilities
//!
//! Hardware boundary for the garden monitor. The PIR input, buzzer output,
//! IR illuminator and status LED are all reached through the traits in this
//! crate so the control loop can run against simulated lines in tests.
//!
//! Backends:
//! - Linux sysfs GPIO (`/sys/class/gpio`) for digital lines
//! - Linux sysfs PWM (`/sys/class/pwm`) for buzzer tones
//! - In-memory simulated lines with fault injection

mod error;
pub mod sim;
mod sysfs;

pub use error::GpioError;
pub use sim::{SimulatedInput, SimulatedOutput, SimulatedTone};
pub use sysfs::{SysfsPin, SysfsPwm, GPIO_SYSFS_ROOT, PWM_SYSFS_ROOT};

/// A digital input line (e.g. the PIR sensor output)
pub trait InputLine: Send {
    /// Read the current logical level (`true` = active)
    fn read(&mut self) -> Result<bool, GpioError>;
}

/// A digital output line (e.g. an LED or an enable pin)
pub trait OutputLine: Send {
    /// Drive the line to the given logical level
    fn write(&mut self, high: bool) -> Result<(), GpioError>;
}

/// A tone generator driving the buzzer
pub trait ToneOutput: Send {
    /// Start a tone at `frequency_hz`, or silence the output with `None`
    fn set_tone(&mut self, frequency_hz: Option<u32>) -> Result<(), GpioError>;
}

impl<T: InputLine + ?Sized> InputLine for Box<T> {
    fn read(&mut self) -> Result<bool, GpioError> {
        (**self).read()
    }
}

impl<T: OutputLine + ?Sized> OutputLine for Box<T> {
    fn write(&mut self, high: bool) -> Result<(), GpioError> {
        (**self).write(high)
    }
}

impl<T: ToneOutput + ?Sized> ToneOutput for Box<T> {
    fn set_tone(&mut self, frequency_hz: Option<u32>) -> Result<(), GpioError> {
        (**self).set_tone(frequency_hz)
    }
}

/// Buzzer with its own oscillator, switched by a plain digital line.
///
/// The requested frequency is ignored; any tone turns the line on.
pub struct SwitchedTone<L: OutputLine> {
    line: L,
}

impl<L: OutputLine> SwitchedTone<L> {
    pub fn new(line: L) -> Self {
        Self { line }
    }
}

impl<L: OutputLine> ToneOutput for SwitchedTone<L> {
    fn set_tone(&mut self, frequency_hz: Option<u32>) -> Result<(), GpioError> {
        self.line.write(matches!(frequency_hz, Some(f) if f > 0))
    }
}
