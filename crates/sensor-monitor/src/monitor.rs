//! PIR polling thread

use gpio::{InputLine, OutputLine};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::{
    Debouncer, MotionEvent, MotionKind, SensorError, SensorEvent, SensorFault, SensorInbox,
};

/// Sensor polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Interval between line reads (ms)
    pub poll_interval_ms: u64,
    /// Pause after a failed read before retrying (ms)
    pub fault_backoff_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            fault_backoff_ms: 1000,
        }
    }
}

type MotionCallback = Box<dyn Fn(MotionEvent) + Send>;
type FaultCallback = Box<dyn Fn(SensorFault) + Send>;
type RecoveredCallback = Box<dyn Fn() + Send>;

/// Debounced PIR watcher
pub struct SensorMonitor {
    line: Box<dyn InputLine>,
    enable: Option<Box<dyn OutputLine>>,
    config: SensorConfig,
    debounce: Duration,
    on_start: Vec<MotionCallback>,
    on_end: Vec<MotionCallback>,
    on_fault: Vec<FaultCallback>,
    on_recovered: Vec<RecoveredCallback>,
}

impl SensorMonitor {
    /// Create a monitor for `line` with the given stabilization window
    pub fn new(line: Box<dyn InputLine>, config: SensorConfig, debounce: Duration) -> Self {
        Self {
            line,
            enable: None,
            config,
            debounce,
            on_start: Vec::new(),
            on_end: Vec::new(),
            on_fault: Vec::new(),
            on_recovered: Vec::new(),
        }
    }

    /// Power the sensor through an enable line while the thread runs
    pub fn with_enable_line(mut self, line: Box<dyn OutputLine>) -> Self {
        self.enable = Some(line);
        self
    }

    pub fn on_motion_start(&mut self, callback: impl Fn(MotionEvent) + Send + 'static) {
        self.on_start.push(Box::new(callback));
    }

    pub fn on_motion_end(&mut self, callback: impl Fn(MotionEvent) + Send + 'static) {
        self.on_end.push(Box::new(callback));
    }

    pub fn on_fault(&mut self, callback: impl Fn(SensorFault) + Send + 'static) {
        self.on_fault.push(Box::new(callback));
    }

    pub fn on_recovered(&mut self, callback: impl Fn() + Send + 'static) {
        self.on_recovered.push(Box::new(callback));
    }

    /// Route every callback into an inbox for the control loop
    pub fn attach(&mut self, inbox: SensorInbox) {
        let start = inbox.clone();
        self.on_motion_start(move |event| {
            start.publish(SensorEvent::Motion(event));
        });
        let end = inbox.clone();
        self.on_motion_end(move |event| {
            end.publish(SensorEvent::Motion(event));
        });
        let fault = inbox.clone();
        self.on_fault(move |f| {
            fault.publish(SensorEvent::Fault(f));
        });
        self.on_recovered(move || {
            inbox.publish(SensorEvent::Recovered);
        });
    }

    /// Start the polling thread
    pub fn spawn(mut self) -> Result<SensorHandle, SensorError> {
        if let Some(enable) = self.enable.as_mut() {
            enable.write(true)?;
            info!("PIR sensor enabled");
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = shutdown.clone();

        let thread = std::thread::Builder::new()
            .name("pir-sensor".into())
            .spawn(move || self.poll_loop(&shutdown_flag))?;

        Ok(SensorHandle {
            shutdown,
            thread: Some(thread),
        })
    }

    fn poll_loop(mut self, shutdown: &AtomicBool) {
        info!(
            "PIR polling started: interval={}ms, debounce={}ms",
            self.config.poll_interval_ms,
            self.debounce.as_millis()
        );

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let backoff = Duration::from_millis(self.config.fault_backoff_ms);
        let mut debouncer: Option<Debouncer> = None;
        let mut faulted = false;

        while !shutdown.load(Ordering::SeqCst) {
            let level = match self.line.read() {
                Ok(level) => level,
                Err(e) => {
                    warn!("PIR read failed: {}", e);
                    faulted = true;
                    let fault = SensorFault::new(e.to_string());
                    for callback in &self.on_fault {
                        callback(fault.clone());
                    }
                    std::thread::sleep(backoff);
                    continue;
                }
            };

            if faulted {
                info!("PIR line readable again");
                faulted = false;
                for callback in &self.on_recovered {
                    callback();
                }
            }

            let now = Instant::now();
            match debouncer.as_mut() {
                None => {
                    debug!("PIR baseline level: {}", if level { "HIGH" } else { "LOW" });
                    debouncer = Some(Debouncer::new(self.debounce, level));
                }
                Some(d) => {
                    if let Some(kind) = d.update(level, now) {
                        let event = MotionEvent { kind, at: now };
                        debug!("PIR transition: {:?}", kind);
                        let callbacks = match kind {
                            MotionKind::Start => &self.on_start,
                            MotionKind::End => &self.on_end,
                        };
                        for callback in callbacks {
                            callback(event);
                        }
                    }
                }
            }

            std::thread::sleep(poll_interval);
        }

        if let Some(enable) = self.enable.as_mut() {
            if let Err(e) = enable.write(false) {
                error!("Failed to disable PIR sensor: {}", e);
            }
        }
        info!("PIR polling stopped");
    }
}

/// Running sensor thread; stops it when dropped
pub struct SensorHandle {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SensorHandle {
    /// Stop polling and wait for the thread to exit
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("PIR sensor thread panicked");
            }
        }
    }
}

impl Drop for SensorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
