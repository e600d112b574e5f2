//! Linux sysfs GPIO and PWM backends
//!
//! Lines are exported on open and addressed through their attribute files.
//! The sysfs root is configurable so the file protocol can be exercised
//! against a scratch directory.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{GpioError, InputLine, OutputLine, ToneOutput};

/// Default sysfs GPIO class directory
pub const GPIO_SYSFS_ROOT: &str = "/sys/class/gpio";
/// Default sysfs PWM class directory
pub const PWM_SYSFS_ROOT: &str = "/sys/class/pwm";

const NANOS_PER_SEC: u64 = 1_000_000_000;

fn write_attr(path: &Path, value: &str) -> Result<(), GpioError> {
    fs::write(path, value).map_err(|e| GpioError::io(path, e))
}

fn read_attr(path: &Path) -> Result<String, GpioError> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| GpioError::io(path, e))
}

/// A single sysfs GPIO pin (BCM numbering on the Raspberry Pi)
pub struct SysfsPin {
    pin: u32,
    value_path: PathBuf,
    active_low: bool,
}

impl SysfsPin {
    /// Open a pin as an input
    pub fn input(root: impl AsRef<Path>, pin: u32, active_low: bool) -> Result<Self, GpioError> {
        Self::open(root.as_ref(), pin, "in", active_low)
    }

    /// Open a pin as an output, starting at the inactive level
    pub fn output(root: impl AsRef<Path>, pin: u32, active_low: bool) -> Result<Self, GpioError> {
        let mut line = Self::open(root.as_ref(), pin, "out", active_low)?;
        line.write(false)?;
        Ok(line)
    }

    fn open(root: &Path, pin: u32, direction: &str, active_low: bool) -> Result<Self, GpioError> {
        let pin_dir = root.join(format!("gpio{}", pin));

        if !pin_dir.exists() {
            debug!("Exporting GPIO {}", pin);
            write_attr(&root.join("export"), &pin.to_string())?;
        }

        write_attr(&pin_dir.join("direction"), direction)?;
        info!("GPIO {} configured as {} (active_low={})", pin, direction, active_low);

        Ok(Self {
            pin,
            value_path: pin_dir.join("value"),
            active_low,
        })
    }

    /// BCM pin number
    pub fn pin(&self) -> u32 {
        self.pin
    }
}

impl InputLine for SysfsPin {
    fn read(&mut self) -> Result<bool, GpioError> {
        let raw = match read_attr(&self.value_path)?.as_str() {
            "0" => false,
            "1" => true,
            other => return Err(GpioError::Parse(format!("GPIO {} value '{}'", self.pin, other))),
        };
        Ok(raw != self.active_low)
    }
}

impl OutputLine for SysfsPin {
    fn write(&mut self, high: bool) -> Result<(), GpioError> {
        let raw = high != self.active_low;
        write_attr(&self.value_path, if raw { "1" } else { "0" })
    }
}

/// A sysfs PWM channel producing a square-wave tone
pub struct SysfsPwm {
    channel_dir: PathBuf,
    current_hz: Option<u32>,
}

impl SysfsPwm {
    /// Open `pwmchip{chip}/pwm{channel}`, exporting it if needed
    pub fn open(root: impl AsRef<Path>, chip: u32, channel: u32) -> Result<Self, GpioError> {
        let chip_dir = root.as_ref().join(format!("pwmchip{}", chip));
        let channel_dir = chip_dir.join(format!("pwm{}", channel));

        if !channel_dir.exists() {
            debug!("Exporting PWM channel {} on chip {}", channel, chip);
            write_attr(&chip_dir.join("export"), &channel.to_string())?;
        }

        write_attr(&channel_dir.join("enable"), "0")?;
        info!("PWM chip {} channel {} ready", chip, channel);

        Ok(Self {
            channel_dir,
            current_hz: None,
        })
    }
}

impl ToneOutput for SysfsPwm {
    fn set_tone(&mut self, frequency_hz: Option<u32>) -> Result<(), GpioError> {
        let frequency_hz = frequency_hz.filter(|&f| f > 0);
        if frequency_hz == self.current_hz {
            return Ok(());
        }

        match frequency_hz {
            Some(hz) => {
                let period = NANOS_PER_SEC / u64::from(hz);
                // Duty must never exceed the period, so clear it first
                write_attr(&self.channel_dir.join("duty_cycle"), "0")?;
                write_attr(&self.channel_dir.join("period"), &period.to_string())?;
                write_attr(&self.channel_dir.join("duty_cycle"), &(period / 2).to_string())?;
                write_attr(&self.channel_dir.join("enable"), "1")?;
            }
            None => {
                write_attr(&self.channel_dir.join("enable"), "0")?;
            }
        }

        self.current_hz = frequency_hz;
        Ok(())
    }
}
