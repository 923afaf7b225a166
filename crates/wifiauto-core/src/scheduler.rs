//! In-process [`JobScheduler`] on top of the tokio timer.
//!
//! Each tag owns one task. A recurring job fires immediately and then every
//! interval, but skips a tick while the previous run has not reported
//! [`complete`](JobScheduler::complete), so a stalled run never piles up
//! behind itself. Cancelling aborts the timer task only; a run that has
//! already been dispatched finishes normally.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::dispatcher::{Event, EventSender};
use crate::ports::{JobScheduler, PortError, PortResult};

struct ScheduledJob {
    task: JoinHandle<()>,
    in_flight: Arc<AtomicBool>,
}

/// Timer-driven scheduler emitting [`Event::JobFired`].
pub struct TokioScheduler {
    runtime: Handle,
    events: EventSender,
    jobs: Mutex<HashMap<String, ScheduledJob>>,
}

impl TokioScheduler {
    /// Create a scheduler spawning its timers on `runtime`.
    #[must_use]
    pub fn new(runtime: Handle, events: EventSender) -> Self {
        Self {
            runtime,
            events,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `tag` has a live timer.
    #[must_use]
    pub fn is_scheduled(&self, tag: &str) -> bool {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.get(tag).is_some_and(|job| !job.task.is_finished())
    }

    fn replace(&self, tag: &str, job: ScheduledJob) {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = jobs.insert(tag.to_string(), job) {
            previous.task.abort();
        }
    }

    fn ensure_open(&self) -> PortResult<()> {
        if self.events.is_closed() {
            return Err(PortError::Unavailable(
                "event dispatcher is not running".to_string(),
            ));
        }
        Ok(())
    }
}

impl JobScheduler for TokioScheduler {
    fn schedule_recurring(&self, tag: &str, interval: Duration) -> PortResult<()> {
        self.ensure_open()?;
        if interval.is_zero() {
            return Err(PortError::Rejected {
                code: 0,
                reason: "interval must be positive".to_string(),
            });
        }

        let in_flight = Arc::new(AtomicBool::new(false));
        let events = self.events.clone();
        let job_tag = tag.to_string();
        let flag = Arc::clone(&in_flight);

        let task = self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if flag.swap(true, Ordering::AcqRel) {
                    debug!(tag = %job_tag, "Previous run still in flight, skipping tick");
                    continue;
                }
                if !events.send(Event::JobFired {
                    tag: job_tag.clone(),
                }) {
                    break;
                }
            }
        });

        info!(tag, interval_secs = interval.as_secs(), "Scheduled recurring job");
        self.replace(tag, ScheduledJob { task, in_flight });
        Ok(())
    }

    fn schedule_once(&self, tag: &str) -> PortResult<()> {
        self.ensure_open()?;

        let in_flight = Arc::new(AtomicBool::new(true));
        let events = self.events.clone();
        let job_tag = tag.to_string();

        let task = self.runtime.spawn(async move {
            events.send(Event::JobFired { tag: job_tag });
        });

        info!(tag, "Scheduled one-shot job");
        self.replace(tag, ScheduledJob { task, in_flight });
        Ok(())
    }

    fn cancel(&self, tag: &str) -> PortResult<()> {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(job) = jobs.remove(tag) {
            job.task.abort();
            info!(tag, "Cancelled job");
        }
        Ok(())
    }

    fn complete(&self, tag: &str) {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(job) = jobs.get(tag) {
            job.in_flight.store(false, Ordering::Release);
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        let jobs = self.jobs.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, job) in jobs.drain() {
            job.task.abort();
        }
    }
}

impl std::fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("TokioScheduler")
            .field("jobs", &jobs.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
