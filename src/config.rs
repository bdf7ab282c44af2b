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

//! Settings file
//!
//! Playback defaults, the active role and recorder options, read from an
//! optional JSON file. Command line flags override these values.

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

use crate::chain::ChainConfig;
use crate::permissions::Role;
use crate::recording::RecorderConfig;
use crate::types::ScriptRunConfig;

pub const SPEED_RANGE: RangeInclusive<f64> = 0.1..=10.0;
pub const RANDOMIZE_FACTOR_RANGE: RangeInclusive<f64> = 0.01..=0.5;
pub const MOVEMENT_THRESHOLD_RANGE: RangeInclusive<u32> = 1..=50;
pub const MOVEMENT_INTERVAL_MS_RANGE: RangeInclusive<u64> = 10..=1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub speed_factor: f64,
    pub repeat_count: u32,
    pub randomize_enabled: bool,
    pub randomize_factor: f64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        let defaults = ScriptRunConfig::default();
        Self {
            speed_factor: defaults.speed_factor,
            repeat_count: defaults.repeat_count,
            randomize_enabled: defaults.randomize_enabled,
            randomize_factor: defaults.randomize_factor,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub role: Role,
    pub playback: PlaybackSettings,
    pub recorder: RecorderConfig,
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&data)
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let playback = &self.playback;
        ensure!(
            SPEED_RANGE.contains(&playback.speed_factor),
            "speed_factor must be between {} and {}",
            SPEED_RANGE.start(),
            SPEED_RANGE.end()
        );
        ensure!(
            playback.repeat_count >= 1,
            "repeat_count must be at least 1"
        );
        ensure!(
            RANDOMIZE_FACTOR_RANGE.contains(&playback.randomize_factor),
            "randomize_factor must be between {} and {}",
            RANDOMIZE_FACTOR_RANGE.start(),
            RANDOMIZE_FACTOR_RANGE.end()
        );

        let recorder = &self.recorder;
        ensure!(
            MOVEMENT_THRESHOLD_RANGE.contains(&recorder.movement_threshold_px),
            "movement_threshold_px must be between {} and {}",
            MOVEMENT_THRESHOLD_RANGE.start(),
            MOVEMENT_THRESHOLD_RANGE.end()
        );
        ensure!(
            MOVEMENT_INTERVAL_MS_RANGE.contains(&recorder.movement_interval_ms),
            "movement_interval_ms must be between {} and {}",
            MOVEMENT_INTERVAL_MS_RANGE.start(),
            MOVEMENT_INTERVAL_MS_RANGE.end()
        );
        Ok(())
    }

    pub fn run_config(&self) -> ScriptRunConfig {
        ScriptRunConfig {
            speed_factor: self.playback.speed_factor,
            repeat_count: self.playback.repeat_count,
            randomize_enabled: self.playback.randomize_enabled,
            randomize_factor: self.playback.randomize_factor,
        }
    }

    pub fn chain_config(&self) -> ChainConfig {
        ChainConfig {
            randomize_enabled: self.playback.randomize_enabled,
            randomize_factor: self.playback.randomize_factor,
        }
    }
}
