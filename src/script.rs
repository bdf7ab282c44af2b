// Copyright (C) 2025  Tom Waddington
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Script and profile files
//!
//! Scripts are exported as JSON documents carrying their action list.
//! Profiles reference scripts by path and are materialized into
//! [`ProfileStep`]s right before a chain runs.

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{Action, ProfileStep};

pub const SCRIPT_FORMAT_VERSION: &str = "1.0";

fn default_version() -> String {
    SCRIPT_FORMAT_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptFile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub actions: Vec<Action>,
    #[serde(default = "default_version")]
    pub version: String,
}

impl ScriptFile {
    pub fn new(name: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            actions,
            version: default_version(),
        }
    }

    pub fn from_json(input: &str) -> Result<Self> {
        let script: ScriptFile = serde_json::from_str(input).context("Invalid script format")?;
        ensure!(
            !script.name.trim().is_empty(),
            "Script name must not be empty"
        );
        Ok(script)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        let script = Self::from_json(&data)
            .with_context(|| format!("Failed to import script {}", path.display()))?;
        debug!(
            "Loaded script '{}' with {} actions",
            script.name,
            script.actions.len()
        );
        Ok(script)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Failed to serialize script")?;
        fs::write(path, data)
            .with_context(|| format!("Failed to write script {}", path.display()))?;
        info!("Exported script '{}' to {}", self.name, path.display());
        Ok(())
    }
}

fn default_speed() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileStepFile {
    // Relative paths resolve against the profile file's directory
    pub script: PathBuf,
    #[serde(default)]
    pub execution_order: i64,
    #[serde(default)]
    pub execution_time_ms: u64,
    #[serde(default = "default_speed")]
    pub speed_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileFile {
    pub name: String,
    // Activation hotkey, bound by the surrounding application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotkey: Option<String>,
    pub steps: Vec<ProfileStepFile>,
}

impl ProfileFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile {}", path.display()))?;
        let profile: ProfileFile = serde_json::from_str(&data)
            .with_context(|| format!("Invalid profile format in {}", path.display()))?;
        Ok(profile)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Failed to serialize profile")?;
        fs::write(path, data)
            .with_context(|| format!("Failed to write profile {}", path.display()))?;
        Ok(())
    }

    /// Loads every referenced script into a fresh step list.
    pub fn materialize(&self, base_dir: impl AsRef<Path>) -> Result<Vec<ProfileStep>> {
        let base_dir = base_dir.as_ref();
        self.steps
            .iter()
            .map(|step| -> Result<ProfileStep> {
                let path = if step.script.is_absolute() {
                    step.script.clone()
                } else {
                    base_dir.join(&step.script)
                };
                let script = ScriptFile::load(&path)?;
                Ok(ProfileStep {
                    actions: script.actions,
                    execution_order: step.execution_order,
                    execution_time_ms: step.execution_time_ms,
                    speed_factor: step.speed_factor,
                })
            })
            .collect()
    }
}
