use rand::Rng;
use tokio::sync::watch;
use tokio::time::{self, Duration, Instant};
use tracing::{debug, info, info_span, Instrument};

use crate::driver::WorkloadDriver;
use crate::metrics::{GaugeGuard, ACTIVE_ACTORS};
use crate::task::TaskSelector;

/// Uniform random pause between two tasks of the same actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTime {
    pub min: Duration,
    pub max: Duration,
}

impl WaitTime {
    pub fn between(min: Duration, max: Duration) -> Result<Self, String> {
        if min > max {
            return Err(format!(
                "Minimum wait {:?} is greater than maximum wait {:?}",
                min, max
            ));
        }
        Ok(Self { min, max })
    }

    /// Draws one wait, uniformly in [min, max] at millisecond resolution.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;

        if min_ms >= max_ms {
            return self.min;
        }

        Duration::from_millis(rng.gen_range(min_ms..=max_ms))
    }
}

impl Default for WaitTime {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(15),
            max: Duration::from_secs(60),
        }
    }
}

/// Configuration for one simulated user.
pub struct ActorConfig {
    pub actor_id: usize,
    pub test_duration: Duration,
    pub wait_time: WaitTime,
}

/// Runs one simulated user until the test duration ends or `stop` fires.
///
/// Each iteration picks a task by weight, runs it to completion, then waits.
/// The wait is cut short by the deadline or the stop signal; a task that is
/// already running is always allowed to finish.
pub async fn run_actor(
    mut driver: WorkloadDriver,
    selector: TaskSelector,
    config: ActorConfig,
    start_time: Instant,
    mut stop: watch::Receiver<bool>,
) {
    let span = info_span!("actor", actor_id = config.actor_id);

    async move {
        let active = GaugeGuard::inc(&ACTIVE_ACTORS);
        debug!(wait_time = ?config.wait_time, "Actor starting");

        let deadline = start_time + config.test_duration;
        let mut iterations: u64 = 0;

        loop {
            let stopped = *stop.borrow();
            if stopped || Instant::now() >= deadline {
                break;
            }

            let task = selector.select(driver.rng());
            debug!(task = %task, "Running task");
            driver.run_task(task).await;
            iterations += 1;

            let wait = config.wait_time.sample(driver.rng());
            let wake_at = (Instant::now() + wait).min(deadline);

            tokio::select! {
                _ = time::sleep_until(wake_at) => {}
                changed = stop.changed() => {
                    // A closed channel means the owner is gone; stop as well.
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        drop(active);
        info!(
            iterations = iterations,
            elapsed_secs = start_time.elapsed().as_secs_f64(),
            "Actor stopping"
        );
    }
    .instrument(span)
    .await
}
