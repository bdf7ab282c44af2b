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

//! Input executor seam
//!
//! The scheduler resolves jitter and key templates, then hands a
//! [`ResolvedAction`] to an [`InputExecutor`] which performs the actual
//! pointer or keyboard operation.

use thiserror::Error;
use tracing::info;

use crate::types::{Action, ActionKind, MouseButton};

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Unsupported key '{0}'")]
    UnsupportedKey(String),

    #[error("Input backend error: {0}")]
    Backend(String),
}

/// An action with jitter applied and key templates expanded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAction {
    Move { x: i32, y: i32 },
    Click {
        x: i32,
        y: i32,
        button: MouseButton,
        duration_ms: u64,
    },
    KeyDown { key: String, duration_ms: u64 },
    KeyUp { key: String, duration_ms: u64 },
    KeyPress { key: String, duration_ms: u64 },
    Scroll { amount: i32 },
}

impl ResolvedAction {
    /// Builds the dispatched form of `action` from an already jittered
    /// position and an already expanded key.
    pub fn from_action(
        action: &Action,
        position: Option<(i32, i32)>,
        resolved_key: Option<String>,
    ) -> Self {
        let key = |recorded: &str| resolved_key.clone().unwrap_or_else(|| recorded.into());
        match &action.kind {
            ActionKind::Move { x, y } => {
                let (x, y) = position.unwrap_or((*x, *y));
                ResolvedAction::Move { x, y }
            }
            ActionKind::Click {
                x,
                y,
                button,
                duration_ms,
            } => {
                let (x, y) = position.unwrap_or((*x, *y));
                ResolvedAction::Click {
                    x,
                    y,
                    button: *button,
                    duration_ms: *duration_ms,
                }
            }
            ActionKind::KeyDown(k) => ResolvedAction::KeyDown {
                key: key(&k.key),
                duration_ms: k.duration_ms,
            },
            ActionKind::KeyUp(k) => ResolvedAction::KeyUp {
                key: key(&k.key),
                duration_ms: k.duration_ms,
            },
            ActionKind::KeyPress(k) => ResolvedAction::KeyPress {
                key: key(&k.key),
                duration_ms: k.duration_ms,
            },
            ActionKind::Scroll { amount } => ResolvedAction::Scroll { amount: *amount },
        }
    }
}

/// Performs one input operation. Called from the playback loop, one action
/// at a time; an action runs to completion once dispatched.
pub trait InputExecutor: Send {
    fn execute(&mut self, action: &ResolvedAction) -> Result<(), ExecutorError>;
}

impl<E: InputExecutor + ?Sized> InputExecutor for Box<E> {
    fn execute(&mut self, action: &ResolvedAction) -> Result<(), ExecutorError> {
        (**self).execute(action)
    }
}

/// Logs every action instead of injecting it
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    executed: usize,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executed(&self) -> usize {
        self.executed
    }
}

impl InputExecutor for DryRunExecutor {
    fn execute(&mut self, action: &ResolvedAction) -> Result<(), ExecutorError> {
        self.executed += 1;
        match action {
            ResolvedAction::Move { x, y } => info!("move to ({}, {})", x, y),
            ResolvedAction::Click { x, y, button, .. } => info!("{} click ({}, {})", button, x, y),
            ResolvedAction::KeyDown { key, .. } => info!("key down '{}'", key),
            ResolvedAction::KeyUp { key, .. } => info!("key up '{}'", key),
            ResolvedAction::KeyPress { key, .. } => info!("press key '{}'", key),
            ResolvedAction::Scroll { amount } => info!("scroll {}", amount),
        }
        Ok(())
    }
}


#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    /// Records what was dispatched and when; fails on selected call numbers.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingExecutor {
        pub(crate) log: Arc<Mutex<Vec<(Instant, ResolvedAction)>>>,
        fail_on: HashSet<usize>,
        calls: usize,
    }

    impl RecordingExecutor {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn failing_on(calls: &[usize]) -> Self {
            Self {
                fail_on: calls.iter().copied().collect(),
                ..Self::default()
            }
        }

        pub(crate) fn actions(&self) -> Vec<ResolvedAction> {
            self.log
                .lock()
                .unwrap()
                .iter()
                .map(|(_, a)| a.clone())
                .collect()
        }

        /// Offsets of each dispatch from `start`, in milliseconds.
        pub(crate) fn offsets_ms(&self, start: Instant) -> Vec<u128> {
            self.log
                .lock()
                .unwrap()
                .iter()
                .map(|(at, _)| at.duration_since(start).as_millis())
                .collect()
        }
    }

    impl InputExecutor for RecordingExecutor {
        fn execute(&mut self, action: &ResolvedAction) -> Result<(), ExecutorError> {
            let call = self.calls;
            self.calls += 1;
            self.log
                .lock()
                .unwrap()
                .push((Instant::now(), action.clone()));
            if self.fail_on.contains(&call) {
                let message = format!("injected failure {}", call);
                return Err(ExecutorError::Backend(message));
            }
            Ok(())
        }
    }
}
