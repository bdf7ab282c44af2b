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

//! Macro recording and playback engine
//!
//! Replays recorded mouse and keyboard actions with their original relative
//! timing, scaled by a speed factor and optionally randomized, and chains
//! scripts into profiles.

pub mod chain;
pub mod config;
pub mod controller;
pub mod error;
pub mod executor;
pub mod permissions;
pub mod playback;
pub mod randomizer;
pub mod recording;
pub mod script;
pub mod template;
pub mod types;

pub use chain::{ChainConfig, ProfileChainExecutor};
pub use controller::{PlaybackController, PlaybackRun, RecordingSession};
pub use error::{Activity, PlaybackError};
pub use executor::{DryRunExecutor, ExecutorError, InputExecutor, ResolvedAction};
pub use playback::PlaybackScheduler;
pub use randomizer::Randomizer;
pub use types::{
    Action, ActionKind, KeyInput, MouseButton, PlaybackEvent, PlaybackState, ProfileStep,
    RunStatus, ScriptRunConfig,
};
