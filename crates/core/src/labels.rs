// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner labels: `name[:scheme[:arg]]`.
//!
//! A label advertises a platform the runner can serve. The scheme decides
//! how a job asking for that platform is executed: directly on the host,
//! or inside a container whose image is carried in the arg.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Image used when a task asks for a platform none of our labels cover.
/// Happens when an operator edits the runner's labels in the forge UI.
const FALLBACK_IMAGE: &str = "forge/runner-images:ubuntu-latest";

#[derive(Debug, Error, PartialEq)]
pub enum LabelError {
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

/// Execution scheme of a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Host,
    Docker,
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Host => "host",
            Self::Docker => "docker",
        })
    }
}

/// One parsed runner label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub scheme: Scheme,
    pub arg: String,
}

impl Label {
    /// Parse `name[:scheme[:arg]]`; the scheme defaults to `host`.
    pub fn parse(s: &str) -> Result<Self, LabelError> {
        let mut splits = s.splitn(3, ':');
        let name = splits.next().unwrap_or_default().to_string();
        let scheme = match splits.next() {
            None | Some("host") => Scheme::Host,
            Some("docker") => Scheme::Docker,
            Some(other) => return Err(LabelError::UnsupportedScheme(other.to_string())),
        };
        let arg = splits.next().unwrap_or_default().to_string();
        Ok(Self { name, scheme, arg })
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.scheme)?;
        if !self.arg.is_empty() {
            write!(f, ":{}", self.arg)?;
        }
        Ok(())
    }
}

/// The full label set declared by this runner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Labels(pub Vec<Label>);

impl Labels {
    /// Parse a list of label strings, skipping invalid entries with a warning.
    pub fn parse_lenient(raw: &[String]) -> Self {
        let mut labels = Vec::with_capacity(raw.len());
        for s in raw {
            match Label::parse(s) {
                Ok(l) => labels.push(l),
                Err(e) => tracing::warn!(label = %s, error = %e, "ignored invalid label"),
            }
        }
        Self(labels)
    }

    /// True when any label needs a container runtime.
    pub fn require_docker(&self) -> bool {
        self.0.iter().any(|l| l.scheme == Scheme::Docker)
    }

    /// Resolve the platform image for a job's `runs-on` list.
    ///
    /// Docker labels map to their image (a `//` prefix from the
    /// `docker://image` URI form is stripped); host labels map to the
    /// `-self-hosted` sentinel. When the same name is declared twice,
    /// the last declaration wins. Unknown platforms fall back to a
    /// stock image rather than failing the task.
    pub fn pick_platform(&self, runs_on: &[String]) -> String {
        let mut platforms = std::collections::HashMap::with_capacity(self.0.len());
        for label in &self.0 {
            let platform = match label.scheme {
                Scheme::Docker => label.arg.strip_prefix("//").unwrap_or(&label.arg).to_string(),
                Scheme::Host => "-self-hosted".to_string(),
            };
            platforms.insert(label.name.as_str(), platform);
        }
        for wanted in runs_on {
            if let Some(platform) = platforms.get(wanted.as_str()) {
                return platform.clone();
            }
        }
        FALLBACK_IMAGE.to_string()
    }

    /// Bare label names, as declared to the coordinator.
    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|l| l.name.clone()).collect()
    }

    /// Canonical string forms, as persisted in the registration file.
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|l| l.to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
#[path = "labels_tests.rs"]
mod tests;
