//! Lookout Garden Monitor Service
//!
//! Wires the PIR sensor, camera, detector, policy and buzzer into the
//! monitor state machine and runs it until shutdown.

pub mod button;
pub mod config;
pub mod hardware;
pub mod status;

pub use config::{CameraConfig, LoggingConfig, LookoutConfig, SourceKind};
pub use hardware::{Backend, BuzzerConfig, Hardware, HardwareConfig};

use anyhow::{Context, Result};
use camera_capture::{CommandSource, DirectorySource, FrameCapture, FrameSource, SimulatedCamera};
use deterrent::DeterrentController;
use inference_engine::{Detector, InferenceEngine, MockDetector, OnnxDetector};
use monitor::{LogTelemetry, MonitorParts, MonitorStateMachine};
use sensor_monitor::{sensor_channel, SensorMonitor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Initialize logging; `RUST_LOG` overrides the configured level
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("Invalid log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))
}

fn frame_source(config: &CameraConfig) -> Result<Box<dyn FrameSource>> {
    let source: Box<dyn FrameSource> = match config.source {
        SourceKind::Command => {
            info!("Camera source: {} {:?}", config.program, config.args);
            Box::new(CommandSource::new(
                config.program.clone(),
                config.args.clone(),
                Duration::from_millis(config.timeout_ms),
            ))
        }
        SourceKind::Directory => Box::new(
            DirectorySource::open(&config.directory)
                .with_context(|| format!("Opening frame directory {}", config.directory.display()))?,
        ),
        SourceKind::Simulated => {
            warn!("Using simulated camera");
            Box::new(SimulatedCamera::new(config.width, config.height))
        }
    };
    Ok(source)
}

fn detector(config: &LookoutConfig) -> Result<Arc<dyn Detector>> {
    match &config.model {
        Some(model) => Ok(Arc::new(
            OnnxDetector::load(model).context("Failed to load detection model")?,
        )),
        None => {
            warn!("No model configured, running with a detector that never sees anything");
            Ok(Arc::new(MockDetector::new(Vec::new())))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Run the service until a shutdown signal arrives or the power button is pressed
pub async fn run(config: LookoutConfig) -> Result<()> {
    let hw = Hardware::open(&config.hardware).context("Failed to open hardware")?;

    let mut capture = FrameCapture::new(frame_source(&config.camera)?, &config.camera.capture());
    if let Some(illuminator) = hw.illuminator {
        capture = capture.with_illuminator(illuminator);
    }
    let engine = InferenceEngine::new(detector(&config)?, &config.inference);
    let deterrent = DeterrentController::new(hw.buzzer, &config.deterrent);

    let (inbox, events) = sensor_channel();
    let parts = MonitorParts {
        capture,
        engine,
        policy: config.policy.clone(),
        deterrent,
        telemetry: Box::new(LogTelemetry),
    };
    let mut machine = MonitorStateMachine::new(parts, events, &config.monitor)
        .context("Failed to build monitor")?;

    let mut sensor = SensorMonitor::new(hw.pir, config.sensor.clone(), config.policy.debounce_window());
    if let Some(enable) = hw.pir_enable {
        sensor = sensor.with_enable_line(enable);
    }
    sensor.attach(inbox);
    let mut sensor = sensor.spawn().context("Failed to start PIR sensor")?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let led = hw
        .status_led
        .map(|led| tokio::spawn(status::run_status_led(led, machine.subscribe(), stop_rx)));

    let power_button = hw.power_button;
    let button_pressed = async move {
        match power_button {
            Some(line) => {
                button::wait_for_press(line, button::POLL_INTERVAL, button::DEBOUNCE_WINDOW).await
            }
            None => std::future::pending().await,
        }
    };

    let motion = match (hw.simulated_pir, config.hardware.simulated_motion_period_ms) {
        (Some(pir), Some(period_ms)) => Some(tokio::spawn(hardware::simulate_motion(
            pir,
            Duration::from_millis(period_ms),
            Duration::from_secs(3),
        ))),
        _ => None,
    };

    info!("Lookout armed");
    tokio::select! {
        _ = machine.run() => warn!("Sensor stopped, shutting down"),
        _ = shutdown_signal() => info!("Shutdown requested"),
        _ = button_pressed => info!("Power button pressed, shutting down"),
    }

    machine.shutdown();
    sensor.stop();
    if let Some(motion) = motion {
        motion.abort();
    }
    let _ = stop_tx.send(true);
    if let Some(led) = led {
        if let Err(e) = led.await {
            error!("Status LED task failed: {}", e);
        }
    }

    info!(
        "Lookout stopped after {} cycles ({} coalesced motion events)",
        machine.state().cycles,
        machine.state().coalesced_events
    );
    Ok(())
}
