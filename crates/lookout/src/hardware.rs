//! Hardware wiring
//!
//! Opens the lines the service needs from either sysfs or simulated
//! backends. Pin numbers are BCM GPIO numbers.

use gpio::{
    GpioError, InputLine, OutputLine, SimulatedInput, SimulatedOutput, SimulatedTone, SwitchedTone,
    SysfsPin, SysfsPwm, ToneOutput, GPIO_SYSFS_ROOT, PWM_SYSFS_ROOT,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Line backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Linux sysfs GPIO / PWM
    #[default]
    Sysfs,
    /// In-memory lines, no hardware required
    Simulated,
}

/// How the buzzer is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuzzerConfig {
    /// PWM channel producing the tone
    Pwm { chip: u32, channel: u32 },
    /// Self-oscillating buzzer on a digital pin
    Switched { pin: u32 },
}

impl Default for BuzzerConfig {
    fn default() -> Self {
        BuzzerConfig::Pwm { chip: 0, channel: 0 }
    }
}

/// Hardware configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub backend: Backend,
    pub gpio_root: PathBuf,
    pub pwm_root: PathBuf,
    /// PIR sensor output
    pub pir_pin: u32,
    pub pir_active_low: bool,
    /// Powers the PIR sensor while monitoring
    pub pir_enable_pin: Option<u32>,
    /// Power button; a press shuts the service down
    pub power_button_pin: Option<u32>,
    /// Button wired to ground with a pull-up
    pub power_button_active_low: bool,
    /// Power / status LED
    pub status_led_pin: Option<u32>,
    /// IR illuminator LEDs, lit during captures
    pub ir_led_pins: Vec<u32>,
    pub buzzer: BuzzerConfig,
    /// Simulated backend only: raise the PIR line for a few seconds every period (ms)
    pub simulated_motion_period_ms: Option<u64>,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sysfs,
            gpio_root: PathBuf::from(GPIO_SYSFS_ROOT),
            pwm_root: PathBuf::from(PWM_SYSFS_ROOT),
            pir_pin: 10,
            pir_active_low: false,
            pir_enable_pin: Some(9),
            power_button_pin: Some(3),
            power_button_active_low: true,
            status_led_pin: Some(22),
            ir_led_pins: vec![23, 24],
            buzzer: BuzzerConfig::default(),
            simulated_motion_period_ms: None,
        }
    }
}

/// Several output lines switched together
pub struct LineGroup {
    lines: Vec<Box<dyn OutputLine>>,
}

impl LineGroup {
    pub fn new(lines: Vec<Box<dyn OutputLine>>) -> Self {
        Self { lines }
    }
}

impl OutputLine for LineGroup {
    /// Drives every line, reporting the first failure
    fn write(&mut self, high: bool) -> Result<(), GpioError> {
        let mut first_error = None;
        for line in &mut self.lines {
            if let Err(e) = line.write(high) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Opened lines, ready to hand to the components
pub struct Hardware {
    pub pir: Box<dyn InputLine>,
    pub pir_enable: Option<Box<dyn OutputLine>>,
    pub power_button: Option<Box<dyn InputLine>>,
    pub buzzer: Box<dyn ToneOutput>,
    pub illuminator: Option<Box<dyn OutputLine>>,
    pub status_led: Option<Box<dyn OutputLine>>,
    /// Handle on the simulated PIR line, for scripted motion
    pub simulated_pir: Option<SimulatedInput>,
}

impl Hardware {
    pub fn open(config: &HardwareConfig) -> Result<Self, GpioError> {
        match config.backend {
            Backend::Sysfs => Self::open_sysfs(config),
            Backend::Simulated => Ok(Self::simulated(config)),
        }
    }

    fn open_sysfs(config: &HardwareConfig) -> Result<Self, GpioError> {
        let root = config.gpio_root.as_path();
        info!(
            "Opening sysfs hardware: gpio={}, pwm={}",
            root.display(),
            config.pwm_root.display()
        );

        let pir = Box::new(SysfsPin::input(root, config.pir_pin, config.pir_active_low)?);
        let pir_enable = config
            .pir_enable_pin
            .map(|pin| output(root, pin))
            .transpose()?;
        let status_led = config
            .status_led_pin
            .map(|pin| output(root, pin))
            .transpose()?;
        let power_button = config
            .power_button_pin
            .map(|pin| {
                SysfsPin::input(root, pin, config.power_button_active_low)
                    .map(|line| Box::new(line) as Box<dyn InputLine>)
            })
            .transpose()?;

        let illuminator: Option<Box<dyn OutputLine>> = if config.ir_led_pins.is_empty() {
            None
        } else {
            let lines = config
                .ir_led_pins
                .iter()
                .map(|&pin| output(root, pin))
                .collect::<Result<Vec<_>, _>>()?;
            Some(Box::new(LineGroup::new(lines)))
        };

        let buzzer: Box<dyn ToneOutput> = match config.buzzer {
            BuzzerConfig::Pwm { chip, channel } => {
                Box::new(SysfsPwm::open(&config.pwm_root, chip, channel)?)
            }
            BuzzerConfig::Switched { pin } => {
                Box::new(SwitchedTone::new(SysfsPin::output(root, pin, false)?))
            }
        };

        Ok(Self {
            pir,
            pir_enable,
            power_button,
            buzzer,
            illuminator,
            status_led,
            simulated_pir: None,
        })
    }

    fn simulated(config: &HardwareConfig) -> Self {
        warn!("Using simulated hardware, the buzzer will not sound");
        let pir = SimulatedInput::new();
        Self {
            pir: Box::new(pir.clone()),
            pir_enable: config
                .pir_enable_pin
                .map(|_| Box::new(SimulatedOutput::new()) as Box<dyn OutputLine>),
            power_button: config
                .power_button_pin
                .map(|_| Box::new(SimulatedInput::new()) as Box<dyn InputLine>),
            buzzer: Box::new(SimulatedTone::new()),
            illuminator: (!config.ir_led_pins.is_empty())
                .then(|| Box::new(SimulatedOutput::new()) as Box<dyn OutputLine>),
            status_led: config
                .status_led_pin
                .map(|_| Box::new(SimulatedOutput::new()) as Box<dyn OutputLine>),
            simulated_pir: Some(pir),
        }
    }
}

fn output(root: &Path, pin: u32) -> Result<Box<dyn OutputLine>, GpioError> {
    Ok(Box::new(SysfsPin::output(root, pin, false)?))
}

/// Raise the simulated PIR line for `hold` every `period`
pub async fn simulate_motion(pir: SimulatedInput, period: Duration, hold: Duration) {
    info!(
        "Simulating motion every {}ms for {}ms",
        period.as_millis(),
        hold.as_millis()
    );
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        debug!("Simulated motion start");
        pir.set_level(true);
        tokio::time::sleep(hold).await;
        debug!("Simulated motion end");
        pir.set_level(false);
    }
}
