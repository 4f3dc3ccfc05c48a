// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Streaming reporter: one per task.
//!
//! Consumes the executor's structured log stream, interprets in-band
//! `::command::` directives, redacts secrets, tracks per-step timing and
//! results, and flushes log deltas plus task-state snapshots to the
//! coordinator on a 1 s heartbeat with strict acknowledgement handling.

use crate::executor::{LogEntry, LogHook, Stage};
use fr_client::{Client, ClientError, UpdateLogRequest, UpdateTaskRequest};
use fr_core::{Clock, LogRow, RunResult, StepState, Task, TaskState};
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// In-band command lines: `::<cmd>[ <params>]::<value>`.
fn command_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^::([^ :]+)( .*)?::(.*)$").unwrap_or_else(|_| unreachable!()))
}

/// Errors from reporter flushes.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Client(#[from] ClientError),
    /// The coordinator acknowledged less than it already had: rows we
    /// trimmed locally are gone on the other side.
    #[error("submitted logs are lost")]
    LogsLost,
    /// The final flush left rows unacknowledged.
    #[error("not all logs are submitted")]
    LogsIncomplete,
    /// Output values the coordinator has not durably taken yet.
    #[error("there are still outputs that have not been sent: {}", .0.join(", "))]
    OutputsPending(Vec<String>),
}

/// Local lifecycle of one output entry.
enum OutputValue {
    /// Not yet confirmed by the coordinator; the value is re-sent on
    /// every state flush.
    Pending(String),
    /// Confirmed; tombstone so the value is not re-sent.
    Sent,
}

/// Reporter knobs derived from the daemon configuration.
#[derive(Debug, Clone)]
pub struct ReporterOptions {
    /// Per-task deadline; bounds the close retry loop.
    pub task_timeout: Duration,
    /// Optional tighter bound on the total close time.
    pub close_timeout: Option<Duration>,
}

impl Default for ReporterOptions {
    fn default() -> Self {
        Self { task_timeout: Duration::from_secs(3 * 3600), close_timeout: None }
    }
}

/// Mutable reporter state, all under one lock.
struct Inner {
    task: TaskState,
    /// Buffered rows not yet acknowledged; the row at position 0 has
    /// absolute index `offset`.
    rows: Vec<LogRow>,
    /// Absolute index of the first buffered row; equals the largest
    /// acknowledged index.
    offset: i64,
    /// Ordered redaction pairs; replayed in order on every emitted row.
    masks: Vec<(String, String)>,
    /// Active `stop-commands` token, if any.
    stop_token: Option<String>,
}

impl Inner {
    /// True while step-attributed output is flowing: some step has
    /// started and the last one has not finished. Outside that window,
    /// unattributed chatter goes to the general transcript; inside it,
    /// it is suppressed to keep step-bounded views clean.
    fn during_steps(&self) -> bool {
        let Some(first) = self.task.steps.first() else {
            return false;
        };
        if first.result == RunResult::Unspecified && first.log_length == 0 {
            return false;
        }
        match self.task.steps.last() {
            Some(last) => last.result == RunResult::Unspecified,
            None => false,
        }
    }

    fn add_mask(&mut self, value: &str) {
        if !value.is_empty() {
            self.masks.push((value.to_string(), "***".to_string()));
        }
    }

    fn redact(&self, content: &str) -> String {
        let mut out = content.to_string();
        for (old, new) in &self.masks {
            out = out.replace(old, new);
        }
        out
    }
}

/// Per-task stateful sink for the structured log stream.
pub struct Reporter<C: Client, K: Clock> {
    client: Arc<C>,
    clock: K,
    /// Per-task cancellation scope; fired when the coordinator directs
    /// a cancel, which unwinds the executor.
    cancel: CancellationToken,
    closed: AtomicBool,
    debug_output_enabled: bool,
    /// Task deadline; the close retry loop never outlives it.
    deadline: Instant,
    close_timeout: Option<Duration>,

    inner: RwLock<Inner>,
    /// Output lifecycle map, deliberately outside the state lock so the
    /// executor's setters and the heartbeat never contend on it.
    outputs: Mutex<HashMap<String, OutputValue>>,

    /// Serialize log flushes against each other; state flushes have
    /// their own guard and may interleave with log flushes.
    log_guard: tokio::sync::Mutex<()>,
    state_guard: tokio::sync::Mutex<()>,
}

impl<C: Client, K: Clock> Reporter<C, K> {
    pub fn new(
        client: Arc<C>,
        clock: K,
        task: &Task,
        cancel: CancellationToken,
        opts: ReporterOptions,
    ) -> Self {
        let mut masks = Vec::new();
        for key in ["token", "runtime_token"] {
            let v = task.context.str_field(key);
            if !v.is_empty() {
                masks.push((v.to_string(), "***".to_string()));
            }
        }
        for v in task.secrets.values() {
            if !v.is_empty() {
                masks.push((v.clone(), "***".to_string()));
            }
        }

        let debug_output_enabled =
            task.secrets.get("ACTIONS_STEP_DEBUG").map(String::as_str) == Some("true");

        Self {
            client,
            clock,
            cancel,
            closed: AtomicBool::new(false),
            debug_output_enabled,
            deadline: Instant::now() + opts.task_timeout,
            close_timeout: opts.close_timeout,
            inner: RwLock::new(Inner {
                task: TaskState { id: task.id, ..Default::default() },
                rows: Vec::new(),
                offset: 0,
                masks,
                stop_token: None,
            }),
            outputs: Mutex::new(HashMap::new()),
            log_guard: tokio::sync::Mutex::new(()),
            state_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Fix the step vector once the workflow is parsed. Called exactly
    /// once per task, before the executor starts.
    pub fn reset_steps(&self, count: usize) {
        let mut inner = self.inner.write();
        for i in 0..count {
            inner.task.steps.push(StepState { id: i as i64, ..Default::default() });
        }
    }

    /// Append a runner-generated line to the general transcript.
    pub fn log_line(&self, content: impl Into<String>) {
        let mut inner = self.inner.write();
        let now = self.clock.now();
        if !inner.during_steps() {
            inner.rows.push(LogRow { time: now, content: content.into() });
        }
    }

    /// Record the job's declared outputs. Each key is set once; the
    /// next state flush carries pending values to the coordinator.
    pub fn set_outputs(&self, declared: &std::collections::BTreeMap<String, String>) {
        for (k, v) in declared {
            if k.len() > 255 {
                self.log_line(format!("ignore output because the key is too long: {:?}", k));
                continue;
            }
            if v.len() > 1024 * 1024 {
                self.log_line(format!(
                    "ignore output because the value {:?} is too long: {}",
                    k,
                    v.len()
                ));
                continue;
            }
            let mut outputs = self.outputs.lock();
            if outputs.contains_key(k) {
                continue;
            }
            outputs.insert(k.clone(), OutputValue::Pending(v.clone()));
        }
    }

    /// Clone of the current task state, as the next flush would send it.
    pub fn state_snapshot(&self) -> TaskState {
        self.inner.read().task.clone()
    }

    /// Handle one structured log entry from the executor.
    ///
    /// Routing, in order: first entry stamps `started_at`; non-main
    /// entries may carry the job result and otherwise feed the general
    /// transcript; main entries are attributed to their step, with
    /// `raw_output` rows counted into the step's log window.
    pub fn handle(&self, entry: LogEntry) {
        let mut inner = self.inner.write();
        let timestamp = entry.time;

        if inner.task.started_at.is_none() {
            inner.task.started_at = Some(timestamp);
        }

        if entry.stage != Stage::Main {
            if let Some(job_result) = entry.job_result.filter(|r| r.is_terminal()) {
                if !inner.task.result.is_terminal() {
                    inner.task.result = job_result;
                    inner.task.stopped_at = Some(timestamp);
                    let normalized = if job_result == RunResult::Skipped {
                        RunResult::Skipped
                    } else {
                        RunResult::Cancelled
                    };
                    for step in &mut inner.task.steps {
                        if step.result == RunResult::Unspecified {
                            step.result = normalized;
                        }
                    }
                }
            }
            if !inner.during_steps() {
                if let Some(row) = self.parse_log_row(&mut inner, &entry) {
                    inner.rows.push(row);
                }
            }
            return;
        }

        let step_idx = match entry.step_number {
            Some(i) if i < inner.task.steps.len() => i,
            // entries for unknown steps behave like setup/teardown chatter
            _ => {
                if !inner.during_steps() {
                    if let Some(row) = self.parse_log_row(&mut inner, &entry) {
                        inner.rows.push(row);
                    }
                }
                return;
            }
        };

        if inner.task.steps[step_idx].started_at.is_none() {
            inner.task.steps[step_idx].started_at = Some(timestamp);
        }

        if entry.raw_output {
            if let Some(row) = self.parse_log_row(&mut inner, &entry) {
                if inner.task.steps[step_idx].log_length == 0 {
                    inner.task.steps[step_idx].log_index = inner.offset + inner.rows.len() as i64;
                }
                inner.task.steps[step_idx].log_length += 1;
                inner.rows.push(row);
            }
        } else if !inner.during_steps() {
            if let Some(row) = self.parse_log_row(&mut inner, &entry) {
                inner.rows.push(row);
            }
        }

        if let Some(step_result) = entry.step_result.filter(|r| r.is_terminal()) {
            if !inner.task.steps[step_idx].result.is_terminal() {
                if inner.task.steps[step_idx].log_length == 0 {
                    // zero-output step: pin its window at the current tail
                    inner.task.steps[step_idx].log_index = inner.offset + inner.rows.len() as i64;
                }
                inner.task.steps[step_idx].result = step_result;
                inner.task.steps[step_idx].stopped_at = Some(timestamp);
            }
        }
    }

    /// Interpret one line: command handling first, then redaction.
    /// Returns `None` when the line is consumed by a directive.
    fn parse_log_row(&self, inner: &mut Inner, entry: &LogEntry) -> Option<LogRow> {
        let content = entry.message.trim_end_matches(['\r', '\n']);

        let content = match command_regex().captures(content) {
            Some(caps) => {
                let command = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                let value = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
                self.handle_command(inner, content, command, value)?
            }
            None => content.to_string(),
        };

        Some(LogRow { time: entry.time, content: inner.redact(&content) })
    }

    fn handle_command(
        &self,
        inner: &mut Inner,
        original: &str,
        command: &str,
        value: &str,
    ) -> Option<String> {
        if let Some(stop) = &inner.stop_token {
            if command != stop {
                // interpretation suspended: commands pass through as text
                return Some(original.to_string());
            }
            inner.stop_token = None;
            return None;
        }

        match command {
            "add-mask" => {
                inner.add_mask(value);
                None
            }
            "debug" => self.debug_output_enabled.then(|| value.to_string()),
            // forge-side annotations and grouping render downstream
            "notice" | "warning" | "error" | "group" | "endgroup" => Some(original.to_string()),
            "stop-commands" => {
                inner.stop_token = Some(value.to_string());
                None
            }
            _ => Some(original.to_string()),
        }
    }

    /// Flush buffered rows. `final_flush` requires the coordinator to
    /// take everything.
    pub async fn report_log(&self, final_flush: bool) -> Result<(), ReportError> {
        let _guard = self.log_guard.lock().await;

        let (task_id, index, rows) = {
            let inner = self.inner.read();
            (inner.task.id, inner.offset, inner.rows.clone())
        };
        let sent = rows.len() as i64;

        let resp = self
            .client
            .update_log(UpdateLogRequest { task_id, index, rows, no_more: final_flush })
            .await?;

        let ack = resp.ack_index;
        if ack < index {
            return Err(ReportError::LogsLost);
        }

        {
            let mut inner = self.inner.write();
            let drop_n = ((ack - inner.offset) as usize).min(inner.rows.len());
            inner.rows.drain(..drop_n);
            inner.offset = ack;
        }

        if final_flush && ack < index + sent {
            return Err(ReportError::LogsIncomplete);
        }

        Ok(())
    }

    /// Flush a state snapshot plus pending outputs. A `cancelled`
    /// result in the response fires the per-task cancel scope.
    pub async fn report_state(&self) -> Result<(), ReportError> {
        let _guard = self.state_guard.lock().await;

        let state = self.inner.read().task.clone();
        let outbound: HashMap<String, String> = self
            .outputs
            .lock()
            .iter()
            .filter_map(|(k, v)| match v {
                OutputValue::Pending(s) => Some((k.clone(), s.clone())),
                OutputValue::Sent => None,
            })
            .collect();

        let resp = self.client.update_task(UpdateTaskRequest { state, outputs: outbound }).await?;

        {
            let mut outputs = self.outputs.lock();
            for key in resp.sent_outputs {
                outputs.insert(key, OutputValue::Sent);
            }
        }

        if let Some(state) = resp.state {
            if state.result == RunResult::Cancelled {
                self.cancel.cancel();
            }
        }

        let pending: Vec<String> = {
            let outputs = self.outputs.lock();
            let mut keys: Vec<String> = outputs
                .iter()
                .filter_map(|(k, v)| matches!(v, OutputValue::Pending(_)).then(|| k.clone()))
                .collect();
            keys.sort();
            keys
        };
        if !pending.is_empty() {
            return Err(ReportError::OutputsPending(pending));
        }

        Ok(())
    }

    /// Start the 1 s heartbeat. Stops when the reporter is closed or
    /// the task scope is cancelled; flush errors are retried on the
    /// next tick.
    pub fn run_daemon(self: &Arc<Self>) {
        let reporter = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                if reporter.closed.load(Ordering::SeqCst) || reporter.cancel.is_cancelled() {
                    return;
                }
                if let Err(e) = reporter.report_log(false).await {
                    tracing::debug!(error = %e, "heartbeat log flush failed");
                }
                if let Err(e) = reporter.report_state().await {
                    tracing::debug!(error = %e, "heartbeat state flush failed");
                }
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    _ = reporter.cancel.cancelled() => return,
                }
            }
        });
    }

    /// Finalize and flush until everything is on the coordinator.
    ///
    /// With the result still unspecified this is an abnormal end: the
    /// task becomes `Failure`, unresolved steps become `Cancelled`, and
    /// `last_words` (default "Early termination") is appended as the
    /// closing row. Otherwise a non-empty `last_words` is appended as a
    /// trailing row. The flush retries every second, giving up at the
    /// task deadline, at the configured close bound, or once the task
    /// scope is cancelled.
    pub async fn close(&self, last_words: &str) -> Result<(), ReportError> {
        self.closed.store(true, Ordering::SeqCst);

        {
            let mut inner = self.inner.write();
            let now = self.clock.now();
            if !inner.task.result.is_terminal() {
                let words =
                    if last_words.is_empty() { "Early termination" } else { last_words };
                for step in &mut inner.task.steps {
                    if step.result == RunResult::Unspecified {
                        step.result = RunResult::Cancelled;
                    }
                }
                inner.task.result = RunResult::Failure;
                inner.rows.push(LogRow { time: now, content: words.to_string() });
                inner.task.stopped_at = Some(now);
            } else if !last_words.is_empty() {
                inner.rows.push(LogRow { time: now, content: last_words.to_string() });
            }
        }

        let started = Instant::now();
        loop {
            let result = match self.report_log(true).await {
                Ok(()) => self.report_state().await,
                Err(e) => Err(e),
            };
            let err = match result {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            let now = Instant::now();
            let over_close_budget =
                self.close_timeout.is_some_and(|limit| now - started >= limit);
            if now >= self.deadline || over_close_budget || self.cancel.is_cancelled() {
                return Err(err);
            }
            tracing::warn!(error = %err, "final report flush failed, retrying");
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
}

impl<C: Client, K: Clock> LogHook for Reporter<C, K> {
    fn fire(&self, entry: LogEntry) {
        self.handle(entry);
    }
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
