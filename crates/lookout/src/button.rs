//! Power button

use gpio::InputLine;
use sensor_monitor::{Debouncer, MotionKind};
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Button sampling period
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// How long a press must hold before it counts
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(50);

/// Resolve once the button has been held down for `debounce`.
///
/// A button already down when polling starts has to be released first.
/// Read failures are logged and sampling continues.
pub async fn wait_for_press(mut button: Box<dyn InputLine>, poll: Duration, debounce: Duration) {
    let mut ticker = interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut debouncer: Option<Debouncer> = None;
    let mut failing = false;

    loop {
        ticker.tick().await;
        let level = match button.read() {
            Ok(level) => level,
            Err(e) => {
                if !failing {
                    warn!("Failed to read power button: {}", e);
                    failing = true;
                }
                continue;
            }
        };
        if failing {
            info!("Power button readable again");
            failing = false;
        }

        let now = Instant::now().into_std();
        let debouncer = debouncer.get_or_insert_with(|| {
            debug!("Power button baseline: {}", if level { "down" } else { "up" });
            Debouncer::new(debounce, level)
        });
        if debouncer.update(level, now) == Some(MotionKind::Start) {
            info!("Power button pressed");
            return;
        }
    }
}
