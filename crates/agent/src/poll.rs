// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task acquisition: a fixed worker pool drives a rate-limited fetch
//! loop and hands claimed tasks to the runner.
//!
//! Shutdown is two-phase. Cancelling the polling scope stops new
//! acquisition without touching in-flight tasks; only when the grace
//! period expires is the jobs scope cancelled, which unwinds running
//! executors while still letting every reporter publish its final
//! flush.

use crate::executor::WorkflowExecutor;
use crate::run::Runner;
use fr_client::{Client, FetchTaskRequest};
use fr_core::{Clock, Config, Task};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("shutdown grace period expired, running jobs were cancelled")]
    GraceExpired,
}

/// Wait returned early because polling was cancelled.
#[derive(Debug, Error)]
#[error("polling cancelled")]
pub struct WaitCancelled;

/// One token per interval, burst of one, shared by all workers.
pub struct RateLimiter {
    interval: Duration,
    next: tokio::sync::Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self { interval, next: tokio::sync::Mutex::new(Instant::now()) }
    }

    /// Reserve the next token and sleep until it matures. Cancelling
    /// the token aborts the wait (the reservation is forfeit).
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), WaitCancelled> {
        let at = {
            let mut next = tokio::select! {
                guard = self.next.lock() => guard,
                _ = cancel.cancelled() => return Err(WaitCancelled),
            };
            let at = *next;
            *next = at.max(Instant::now()) + self.interval;
            at
        };
        tokio::select! {
            _ = tokio::time::sleep_until(at) => Ok(()),
            _ = cancel.cancelled() => Err(WaitCancelled),
        }
    }
}

/// Drives `capacity` workers against the coordinator and coordinates
/// graceful shutdown.
pub struct Poller<E, C, K>
where
    E: WorkflowExecutor,
    C: Client,
    K: Clock,
{
    cfg: Config,
    client: Arc<C>,
    runner: Arc<Runner<E, C, K>>,
    /// Version of the last task list observed; lets the coordinator
    /// short-circuit fetches when nothing changed.
    tasks_version: AtomicI64,

    polling: CancellationToken,
    jobs: CancellationToken,
    /// Fired exactly once, when every worker has exited.
    done: CancellationToken,
}

impl<E, C, K> Poller<E, C, K>
where
    E: WorkflowExecutor,
    C: Client,
    K: Clock,
{
    pub fn new(cfg: &Config, client: Arc<C>, runner: Arc<Runner<E, C, K>>) -> Self {
        Self {
            cfg: cfg.clone(),
            client,
            runner,
            tasks_version: AtomicI64::new(0),
            polling: CancellationToken::new(),
            jobs: CancellationToken::new(),
            done: CancellationToken::new(),
        }
    }

    /// Run the worker pool; blocks until every worker has exited.
    pub async fn run(self: Arc<Self>) {
        let limiter = Arc::new(RateLimiter::new(self.cfg.fetch_interval()));
        let mut workers = Vec::with_capacity(self.cfg.runner.capacity);
        for _ in 0..self.cfg.runner.capacity {
            let poller = Arc::clone(&self);
            let limiter = Arc::clone(&limiter);
            workers.push(tokio::spawn(async move { poller.poll_worker(limiter).await }));
        }
        for worker in workers {
            let _ = worker.await;
        }

        // signal that we shut down
        self.done.cancel();
    }

    /// Stop accepting tasks and wait up to `timeout` for workers to
    /// drain. When the grace period expires, cancel in-flight jobs and
    /// wait for their final reporting before returning the error.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), ShutdownError> {
        self.polling.cancel();

        tokio::select! {
            // graceful drain completed
            _ = self.done.cancelled() => Ok(()),

            _ = tokio::time::sleep(timeout) => {
                // the drain may have completed while the timer fired;
                // recheck before declaring the grace period expired
                if self.done.is_cancelled() {
                    return Ok(());
                }

                // force running jobs down
                self.jobs.cancel();

                // wait for them to report their final status
                self.done.cancelled().await;

                Err(ShutdownError::GraceExpired)
            }
        }
    }

    async fn poll_worker(&self, limiter: Arc<RateLimiter>) {
        loop {
            if limiter.wait(&self.polling).await.is_err() {
                return;
            }
            let task = tokio::select! {
                _ = self.polling.cancelled() => return,
                task = self.fetch_task() => task,
            };
            let Some(task) = task else { continue };
            self.run_task_with_recover(task).await;
        }
    }

    /// Dispatch on a separate tokio task so a panic anywhere below is
    /// contained and the worker keeps polling.
    async fn run_task_with_recover(&self, task: Task) {
        let task_id = task.id;
        let runner = Arc::clone(&self.runner);
        let jobs = self.jobs.clone();
        let handle = tokio::spawn(async move { runner.run(&jobs, task).await });
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(task = task_id, error = %e, "failed to run task"),
            Err(e) if e.is_panic() => {
                tracing::error!(task = task_id, "panic while dispatching task");
            }
            Err(_) => {}
        }
    }

    async fn fetch_task(&self) -> Option<Task> {
        // version value that was current when the request went out
        let v = self.tasks_version.load(Ordering::SeqCst);

        let fetch = self.client.fetch_task(FetchTaskRequest { tasks_version: v });
        let resp = match tokio::time::timeout(self.cfg.fetch_timeout(), fetch).await {
            // a fetch that outlives its deadline is "no task", not an error
            Err(_) => return None,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "failed to fetch task");
                return None;
            }
            Ok(Ok(resp)) => resp,
        };

        if resp.tasks_version > v {
            // lost updates are tolerated; the CAS keeps the counter monotone
            let _ = self.tasks_version.compare_exchange(
                v,
                resp.tasks_version,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
        }

        let task = resp.task?;

        // got a task: force the next fetch to query authoritatively
        let _ = self.tasks_version.compare_exchange(
            resp.tasks_version,
            0,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );

        Some(task)
    }
}

#[cfg(test)]
#[path = "poll_tests.rs"]
mod tests;
