//! Status LED heartbeat

use gpio::OutputLine;
use monitor::StateNode;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// LED output for a monitor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedPattern {
    Solid,
    Blink { on: Duration, off: Duration },
}

impl LedPattern {
    pub fn for_state(node: StateNode) -> Self {
        match node {
            // Armed: short blink every two seconds
            StateNode::Idle => LedPattern::Blink {
                on: Duration::from_millis(100),
                off: Duration::from_millis(1900),
            },
            StateNode::Disabled => LedPattern::Blink {
                on: Duration::from_millis(100),
                off: Duration::from_millis(100),
            },
            _ => LedPattern::Solid,
        }
    }
}

enum Wake {
    Elapsed,
    StateChanged,
    Stop,
}

async fn wait(
    hold: Option<Duration>,
    state: &mut watch::Receiver<StateNode>,
    stop: &mut watch::Receiver<bool>,
) -> Wake {
    let timer = async {
        match hold {
            Some(hold) => tokio::time::sleep(hold).await,
            None => std::future::pending().await,
        }
    };
    tokio::select! {
        _ = timer => Wake::Elapsed,
        changed = state.changed() => match changed {
            Ok(()) => Wake::StateChanged,
            Err(_) => Wake::Stop,
        },
        _ = stop.changed() => Wake::Stop,
    }
}

fn set(led: &mut dyn OutputLine, on: bool) {
    if let Err(e) = led.write(on) {
        warn!("Failed to drive status LED: {}", e);
    }
}

/// Drive the status LED from the monitor state until `stop` changes or the
/// monitor goes away. The LED is left off.
pub async fn run_status_led(
    mut led: Box<dyn OutputLine>,
    mut state: watch::Receiver<StateNode>,
    mut stop: watch::Receiver<bool>,
) {
    'outer: loop {
        let node = *state.borrow_and_update();
        debug!("Status LED following state {}", node);

        match LedPattern::for_state(node) {
            LedPattern::Solid => {
                set(led.as_mut(), true);
                match wait(None, &mut state, &mut stop).await {
                    Wake::Stop => break 'outer,
                    _ => continue 'outer,
                }
            }
            LedPattern::Blink { on, off } => loop {
                for (level, hold) in [(true, on), (false, off)] {
                    set(led.as_mut(), level);
                    match wait(Some(hold), &mut state, &mut stop).await {
                        Wake::Elapsed => {}
                        Wake::StateChanged => continue 'outer,
                        Wake::Stop => break 'outer,
                    }
                }
            },
        }
    }
    set(led.as_mut(), false);
}
