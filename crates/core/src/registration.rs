// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persisted registration record: this runner's identity towards the
//! coordinator.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Identity exchanged at registration time and reused on every start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub uuid: String,
    pub name: String,
    pub token: String,
    /// Coordinator base address, e.g. `https://forge.example.com`.
    pub address: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl Registration {
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(std::io::Error::other)
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
#[path = "registration_tests.rs"]
mod tests;
