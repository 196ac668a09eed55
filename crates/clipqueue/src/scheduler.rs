use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ConfigError;
use crate::store::JobStore;

/// Owner of the periodic tick loop. The store starts it when it gains its
/// first job and stops it when the last job leaves; at most one loop is ever
/// alive per driver.
pub trait TickDriver: Send + Sync + 'static {
    fn start(&self, store: Arc<JobStore>);
    fn stop(&self);
    fn is_running(&self) -> bool;
}

struct DriverTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Tick driver on a tokio interval, stopped through a [`CancellationToken`].
pub struct IntervalDriver {
    interval: Duration,
    slot: Mutex<Option<DriverTask>>,
}

impl IntervalDriver {
    /// A zero interval cannot drive anything; that is a configuration error
    /// surfaced once, at construction.
    pub fn new(interval: Duration) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::ZeroTickInterval);
        }
        Ok(Self {
            interval,
            slot: Mutex::new(None),
        })
    }
}

impl TickDriver for IntervalDriver {
    fn start(&self, store: Arc<JobStore>) {
        let mut slot = self.slot.lock().unwrap();
        if slot.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            return;
        }

        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let interval = self.interval;
        let handle = tokio::spawn(async move {
            debug!("scheduler: started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = loop_cancel.cancelled() => break,
                    _ = ticker.tick() => store.tick_now().await,
                }
            }
            debug!("scheduler: stopped");
        });

        *slot = Some(DriverTask { cancel, handle });
    }

    fn stop(&self) {
        if let Some(task) = self.slot.lock().unwrap().take() {
            task.cancel.cancel();
        }
    }

    fn is_running(&self) -> bool {
        self.slot
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }
}
