//! Repeating background tasks with explicit shutdown.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Handle to a task that runs a closure on a fixed period.
///
/// The first run happens one full period after spawning. The task stops when
/// [`stop`](Self::stop) is called or the handle is dropped.
pub struct RepeatingTask {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RepeatingTask {
    /// Spawn `tick` every `period` on the current tokio runtime.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        // Err means the handle was dropped.
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => tick().await,
                }
            }

            debug!(task = name, "Repeating task stopped");
        });

        debug!(task = name, period = ?period, "Repeating task started");
        Self { name, shutdown, handle }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Signal the task to stop after its current run.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the task and wait for it to exit.
    pub async fn stop_and_wait(self) {
        self.stop();
        let _ = self.handle.await;
    }
}
