//! Hand-off between the sensor thread and the control loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::{MotionKind, SensorEvent};

/// Motion presence shared by the sensor path and the control loop.
///
/// Set by the sensor side as events are published, ahead of the queue, so
/// the control loop sees a motion end while it is busy deterring.
#[derive(Debug, Default)]
pub struct MotionLatch {
    present: AtomicBool,
}

impl MotionLatch {
    pub fn new() -> Self {
        Self::default()
    }

    fn mark(&self, kind: MotionKind) {
        self.present
            .store(kind == MotionKind::Start, Ordering::SeqCst);
    }

    /// Whether the last debounced transition was a start
    pub fn is_present(&self) -> bool {
        self.present.load(Ordering::SeqCst)
    }
}

/// Sending half, held by the sensor thread callbacks
#[derive(Clone)]
pub struct SensorInbox {
    tx: mpsc::UnboundedSender<SensorEvent>,
    latch: Arc<MotionLatch>,
}

impl SensorInbox {
    /// Record and forward an event. Returns `false` once the control loop is gone.
    pub fn publish(&self, event: SensorEvent) -> bool {
        if let SensorEvent::Motion(motion) = &event {
            self.latch.mark(motion.kind);
        }
        self.tx.send(event).is_ok()
    }
}

/// Receiving half, owned by the control loop
pub struct SensorEvents {
    rx: mpsc::UnboundedReceiver<SensorEvent>,
    latch: Arc<MotionLatch>,
}

impl SensorEvents {
    /// Wait for the next event; `None` once every inbox has been dropped
    pub async fn recv(&mut self) -> Option<SensorEvent> {
        self.rx.recv().await
    }

    /// Take an already queued event without waiting
    pub fn try_recv(&mut self) -> Option<SensorEvent> {
        self.rx.try_recv().ok()
    }

    pub fn latch(&self) -> &MotionLatch {
        &self.latch
    }
}

/// Create a connected inbox / event stream pair
pub fn sensor_channel() -> (SensorInbox, SensorEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    let latch = Arc::new(MotionLatch::new());
    (
        SensorInbox {
            tx,
            latch: latch.clone(),
        },
        SensorEvents { rx, latch },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MotionEvent;

    #[tokio::test]
    async fn test_publish_updates_latch_in_order() {
        let (inbox, mut events) = sensor_channel();

        assert!(inbox.publish(SensorEvent::Motion(MotionEvent::start())));
        assert!(events.latch().is_present());
        assert!(inbox.publish(SensorEvent::Motion(MotionEvent::end())));
        assert!(!events.latch().is_present());


        match events.recv().await {
            Some(SensorEvent::Motion(m)) => assert_eq!(m.kind, MotionKind::Start),
            other => panic!("unexpected event: {:?}", other),
        }
        match events.try_recv() {
            Some(SensorEvent::Motion(m)) => assert_eq!(m.kind, MotionKind::End),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(events.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_publish_after_receiver_dropped() {
        let (inbox, events) = sensor_channel();
        drop(events);
        assert!(!inbox.publish(SensorEvent::Recovered));
    }
}
