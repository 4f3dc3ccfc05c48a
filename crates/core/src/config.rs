// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration, loaded from a YAML file with defaults applied.

use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("open config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("read env file {path:?}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

/// Parse a duration string like "30s", "5m", "3h" into a Duration.
/// A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let (num_str, suffix) = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| (&s[..i], &s[i..]))
        .unwrap_or((s, ""));

    let num: u64 = num_str.parse().map_err(|_| format!("invalid number in duration: {}", s))?;

    let multiplier = match suffix.trim() {
        "ms" | "millis" | "milliseconds" => return Ok(Duration::from_millis(num)),
        "" | "s" | "sec" | "secs" | "seconds" => 1,
        "m" | "min" | "mins" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hours" => 3600,
        other => return Err(format!("unknown duration suffix: {}", other)),
    };

    Ok(Duration::from_secs(num * multiplier))
}

fn de_duration<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_duration(&s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Logging section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level filter: trace, debug, info, warn, error.
    pub level: String,
}

/// Runner section: polling, capacity, and task lifetime knobs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Path of the registration file.
    pub file: String,
    /// Number of tasks executed concurrently; also the poll worker count.
    pub capacity: usize,
    /// Extra environment passed to every job.
    pub envs: HashMap<String, String>,
    /// Optional dotenv file merged into `envs`.
    pub env_file: String,
    /// Per-task execution deadline.
    #[serde(deserialize_with = "de_duration")]
    pub timeout: Option<Duration>,
    /// Grace period for running jobs when the daemon shuts down.
    #[serde(deserialize_with = "de_duration")]
    pub shutdown_timeout: Option<Duration>,
    /// Upper bound on the final report flush after a task ends.
    /// Unset means the flush retries until the task deadline.
    #[serde(deserialize_with = "de_duration")]
    pub report_close_timeout: Option<Duration>,
    /// Skip TLS verification towards the coordinator.
    pub insecure: bool,
    /// Deadline for a single fetch request.
    #[serde(deserialize_with = "de_duration")]
    pub fetch_timeout: Option<Duration>,
    /// Minimum spacing between fetch requests (shared by all workers).
    #[serde(deserialize_with = "de_duration")]
    pub fetch_interval: Option<Duration>,
    /// Labels declared on startup; overrides the registered ones.
    pub labels: Vec<String>,
}

/// Cache sidecar section. The sidecar itself is a separate process; only
/// its URL is injected into job environments.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: String,
    pub host: String,
    pub port: u16,
    /// URL of an externally managed cache server.
    pub external_server: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: String::new(),
            host: String::new(),
            port: 0,
            external_server: String::new(),
        }
    }
}

/// Container section: options forwarded to the workflow executor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    pub network: String,
    pub privileged: bool,
    pub options: String,
    pub workdir_parent: String,
    pub valid_volumes: Vec<String>,
    /// Container daemon socket. Empty probes well-known paths; `-`
    /// disables mounting the socket into job containers.
    pub docker_host: String,
    pub force_pull: bool,
    pub force_rebuild: bool,
}

/// Host section: where host-mode jobs keep their working directories.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub workdir_parent: String,
}

/// The overall daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log: LogConfig,
    pub runner: RunnerConfig,
    pub cache: CacheConfig,
    pub container: ContainerConfig,
    pub host: HostConfig,
}

impl Config {
    /// Load configuration, falling back to defaults when `file` is `None`.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = match file {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => Self::default(),
        };
        cfg.compatible_with_old_envs(file.is_some());
        cfg.merge_env_file()?;
        cfg.apply_defaults();
        Ok(cfg)
    }

    /// Honor legacy environment variables when no config file is used.
    fn compatible_with_old_envs(&mut self, file_used: bool) {
        let handle = |key: &str| -> Option<String> {
            let v = std::env::var(key).ok()?;
            if file_used {
                tracing::warn!(env = key, "env ignored because a config file is used");
                return None;
            }
            tracing::warn!(env = key, "env is deprecated, use the config file instead");
            Some(v)
        };

        if let Some(v) = handle("FORGE_RUNNER_DEBUG") {
            if v.parse().unwrap_or(false) {
                self.log.level = "debug".to_string();
            }
        }
        if let Some(v) = handle("FORGE_RUNNER_CAPACITY") {
            if let Ok(n) = v.parse() {
                if n > 0 {
                    self.runner.capacity = n;
                }
            }
        }
        if let Some(v) = handle("FORGE_RUNNER_FILE") {
            self.runner.file = v;
        }
        if let Some(v) = handle("FORGE_RUNNER_ENVIRON") {
            for pair in v.split(',') {
                if let Some((k, val)) = pair.split_once(':') {
                    if !k.is_empty() {
                        self.runner.envs.insert(k.to_string(), val.to_string());
                    }
                }
            }
        }
        if let Some(v) = handle("FORGE_RUNNER_ENV_FILE") {
            self.runner.env_file = v;
        }
    }

    fn merge_env_file(&mut self) -> Result<(), ConfigError> {
        if self.runner.env_file.is_empty() {
            return Ok(());
        }
        let path = PathBuf::from(&self.runner.env_file);
        if !path.is_file() {
            return Ok(());
        }
        let iter = dotenvy::from_path_iter(&path)
            .map_err(|source| ConfigError::EnvFile { path: path.clone(), source })?;
        for item in iter {
            let (k, v) = item.map_err(|source| ConfigError::EnvFile { path: path.clone(), source })?;
            self.runner.envs.insert(k, v);
        }
        Ok(())
    }

    fn apply_defaults(&mut self) {
        if self.log.level.is_empty() {
            self.log.level = "info".to_string();
        }
        if self.runner.file.is_empty() {
            self.runner.file = ".runner".to_string();
        }
        if self.runner.capacity == 0 {
            self.runner.capacity = 1;
        }
        if self.runner.timeout.is_none() {
            self.runner.timeout = Some(Duration::from_secs(3 * 3600));
        }
        if self.runner.fetch_timeout.is_none() {
            self.runner.fetch_timeout = Some(Duration::from_secs(5));
        }
        if self.runner.fetch_interval.is_none() {
            self.runner.fetch_interval = Some(Duration::from_secs(2));
        }
        if self.runner.shutdown_timeout.is_none() {
            self.runner.shutdown_timeout = Some(Duration::ZERO);
        }
        if self.cache.enabled && self.cache.dir.is_empty() {
            let home = std::env::var("HOME").unwrap_or_default();
            self.cache.dir = format!("{}/.cache/forge-runner/cache", home);
        }
        if self.container.workdir_parent.is_empty() {
            self.container.workdir_parent = "workspace".to_string();
        }
        if self.host.workdir_parent.is_empty() {
            let home = std::env::var("HOME").unwrap_or_default();
            self.host.workdir_parent = format!("{}/.cache/forge-runner", home);
        }
    }

    pub fn task_timeout(&self) -> Duration {
        self.runner.timeout.unwrap_or(Duration::from_secs(3 * 3600))
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.runner.fetch_timeout.unwrap_or(Duration::from_secs(5))
    }

    pub fn fetch_interval(&self) -> Duration {
        self.runner.fetch_interval.unwrap_or(Duration::from_secs(2))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.runner.shutdown_timeout.unwrap_or(Duration::ZERO)
    }
}

/// Example configuration printed by `fr generate-config`.
pub const EXAMPLE: &str = r#"# Example configuration file; defaults apply for anything omitted.

log:
  # Log level of the daemon: trace, debug, info, warn, error.
  level: info

runner:
  # Where the registration record is kept.
  file: .runner
  # Execute up to this many tasks concurrently.
  capacity: 1
  # Extra environment variables passed to every job.
  envs:
    A_TEST_ENV_NAME_1: a_test_env_value_1
  # Dotenv file merged into envs (ignored when absent).
  env_file: .env
  # Abort a task after this long.
  timeout: 3h
  # Grace period for running jobs when the daemon shuts down.
  shutdown_timeout: 0s
  # Upper bound on the final report flush of a task. Unset retries
  # until the task deadline.
  # report_close_timeout: 1m
  # Skip TLS verification when talking to the coordinator.
  insecure: false
  # Deadline for a single fetch request.
  fetch_timeout: 5s
  # Minimum spacing between fetch requests.
  fetch_interval: 2s
  # Labels declared on startup; overrides the registered ones.
  labels:
    - "ubuntu-latest:docker://forge/runner-images:ubuntu-latest"

cache:
  # Enable the artifact cache sidecar.
  enabled: true
  dir: ""
  host: ""
  port: 0
  # Use an externally managed cache server instead.
  external_server: ""

container:
  # Network for job containers; empty creates one per job.
  network: ""
  privileged: false
  # Extra options passed to container creation.
  options: ""
  workdir_parent: workspace
  valid_volumes: []
  # Container daemon socket; empty probes well-known paths, "-" disables
  # mounting the socket into job containers.
  docker_host: ""
  force_pull: false
  force_rebuild: false

host:
  # Where host-mode jobs keep their working directories.
  workdir_parent: ""
"#;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
