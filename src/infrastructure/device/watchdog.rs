//! Connection Watchdog
//!
//! Two timers guard every connect or reconnect attempt: the catastrophic
//! timer covers the handshake after a device was chosen, the liveness timer
//! stands in for the radio ping check. Expiry is posted to the service queue
//! as [`DeviceEvent::TimedOut`]; the service decides what it means.

use crate::domain::models::DeviceKind;
use crate::domain::settings::ConnectionSettings;
use crate::infrastructure::device::service::DeviceEvent;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Catastrophic,
    Liveness,
}

pub struct Watchdog {
    events: mpsc::UnboundedSender<DeviceEvent>,
    settings: ConnectionSettings,
    timers: HashMap<TimerKind, JoinHandle<()>>,
    /// Bumped on every arm/clear so expiries already queued can be told apart
    generation: u64,
}

impl Watchdog {
    pub fn new(events: mpsc::UnboundedSender<DeviceEvent>, settings: ConnectionSettings) -> Self {
        Self {
            events,
            settings,
            timers: HashMap::new(),
            generation: 0,
        }
    }

    /// Arm the timers for a connection attempt on `device`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&mut self, device: DeviceKind) {
        self.clear();
        self.start(
            device,
            TimerKind::Catastrophic,
            Duration::from_millis(self.settings.catastrophic_timeout_ms),
        );
        if device != DeviceKind::Wireless {
            self.start(
                device,
                TimerKind::Liveness,
                Duration::from_millis(self.settings.liveness_timeout_ms),
            );
        }
    }

    pub fn clear(&mut self) {
        self.generation += 1;
        for (kind, handle) in self.timers.drain() {
            debug!("Clearing {:?} timer", kind);
            handle.abort();
        }
    }

    /// Whether an expiry from `generation` still belongs to the current attempt
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    fn start(&mut self, device: DeviceKind, timer: TimerKind, duration: Duration) {
        let events = self.events.clone();
        let generation = self.generation;
        debug!("Arming {:?} timer for {:?} ({:?})", timer, device, duration);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            warn!("{:?} timer expired for {:?}", timer, device);
            let _ = events.send(DeviceEvent::TimedOut {
                device,
                timer,
                generation,
            });
        });
        self.timers.insert(timer, handle);
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watchdog() -> (Watchdog, mpsc::UnboundedReceiver<DeviceEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Watchdog::new(tx, ConnectionSettings::default()), rx)
    }

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_radio_liveness_fires_first() {
        let (mut watchdog, mut rx) = watchdog();
        watchdog.arm(DeviceKind::RadioRemote);

        tokio::time::advance(Duration::from_millis(2999)).await;
        settle().await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        match rx.try_recv() {
            Ok(DeviceEvent::TimedOut {
                device,
                timer,
                generation,
            }) => {
                assert_eq!(device, DeviceKind::RadioRemote);
                assert_eq!(timer, TimerKind::Liveness);
                assert!(watchdog.is_current(generation));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wireless_has_no_liveness_timer() {
        let (mut watchdog, mut rx) = watchdog();
        watchdog.arm(DeviceKind::Wireless);

        tokio::time::advance(Duration::from_millis(4000)).await;
        settle().await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_millis(1000)).await;
        settle().await;
        assert!(matches!(
            rx.try_recv(),
            Ok(DeviceEvent::TimedOut {
                timer: TimerKind::Catastrophic,
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_stops_timers() {
        let (mut watchdog, mut rx) = watchdog();
        watchdog.arm(DeviceKind::RadioRemote);
        watchdog.clear();

        tokio::time::advance(Duration::from_millis(10_000)).await;
        settle().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_invalidates_queued_expiry() {
        let (mut watchdog, mut rx) = watchdog();
        watchdog.arm(DeviceKind::Wireless);
        tokio::time::advance(Duration::from_millis(5000)).await;
        settle().await;

        watchdog.arm(DeviceKind::Wireless);
        match rx.try_recv() {
            Ok(DeviceEvent::TimedOut { generation, .. }) => {
                assert!(!watchdog.is_current(generation))
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
