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

//! Error taxonomy for playback and recording

use std::fmt;
use thiserror::Error;

use crate::executor::ExecutorError;
use crate::permissions::Permission;

/// What currently holds the shared pointer and keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Playback,
    Recording,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::Playback => f.write_str("playback"),
            Activity::Recording => f.write_str("recording"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Cannot start: {0} already in progress")]
    ConcurrentPlayback(Activity),

    // Logged by the scheduler, never returned from a run
    #[error("Action {index} failed: {source}")]
    ActionExecution {
        index: usize,
        #[source]
        source: ExecutorError,
    },

    #[error("Permission denied: {0}")]
    PermissionDenied(Permission),

    #[error("No async runtime to run playback on")]
    NoRuntime,
}
