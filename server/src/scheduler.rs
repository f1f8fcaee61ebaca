//! Daily background jobs, one tokio task each, stopped through a watch channel.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::AppError;

#[async_trait]
pub trait RecurringTask: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self) -> Result<(), AppError>;
}

/// First occurrence of `at` (UTC) strictly after `now`.
pub fn next_run(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

pub struct Scheduler {
    at: NaiveTime,
    tasks: Vec<Arc<dyn RecurringTask>>,
}

impl Scheduler {
    pub fn daily_at(at: NaiveTime) -> Self {
        Scheduler {
            at,
            tasks: Vec::new(),
        }
    }

    pub fn register(mut self, task: Arc<dyn RecurringTask>) -> Self {
        self.tasks.push(task);
        self
    }

    /// Spawn every registered task. Each one exits when `shutdown` flips to
    /// true or its sender is dropped.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let at = self.at;
        self.tasks
            .into_iter()
            .map(|task| {
                let mut shutdown = shutdown.clone();
                tokio::spawn(async move {
                    info!(task = task.name(), at = %at.format("%H:%M"), "scheduled daily");
                    while !*shutdown.borrow() {
                        let now = Utc::now();
                        let wait = (next_run(now, at) - now).to_std().unwrap_or_default();
                        tokio::select! {
                            _ = tokio::time::sleep(wait) => {}
                            changed = shutdown.changed() => {
                                if changed.is_err() {
                                    break;
                                }
                                continue;
                            }
                        }
                        match task.run().await {
                            Ok(()) => info!(task = task.name(), "run finished"),
                            Err(e) => error!(task = task.name(), error = %e, "run failed"),
                        }
                    }
                    info!(task = task.name(), "stopped");
                })
            })
            .collect()
    }
}
