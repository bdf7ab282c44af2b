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

//! Playback engine for recorded action lists
//!
//! Replays actions with their recorded relative timing, scaled by the speed
//! factor and perturbed by the configured jitter.

use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::PlaybackError;
use crate::executor::{InputExecutor, ResolvedAction};
use crate::randomizer::Randomizer;
use crate::template::resolve_key;
use crate::types::{Action, PlaybackEvent, PlaybackState, RunStatus, ScriptRunConfig};

/// Waits for `delay` unless `cancel` fires first. Returns false on cancellation.
pub(crate) async fn cancellable_sleep(cancel: &CancellationToken, delay: Duration) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = sleep(delay) => !cancel.is_cancelled(),
    }
}

pub struct PlaybackScheduler {
    config: ScriptRunConfig,
    randomizer: Randomizer,
    cancel: CancellationToken,
    events: Option<UnboundedSender<PlaybackEvent>>,
    state: PlaybackState,
}

impl PlaybackScheduler {
    pub fn new(config: ScriptRunConfig) -> Result<Self, PlaybackError> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    pub(crate) fn from_validated(config: ScriptRunConfig) -> Self {
        Self {
            config,
            randomizer: Randomizer::default(),
            cancel: CancellationToken::new(),
            events: None,
            state: PlaybackState::Idle,
        }
    }

    pub fn with_randomizer(mut self, randomizer: Randomizer) -> Self {
        self.randomizer = randomizer;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, events: UnboundedSender<PlaybackEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &ScriptRunConfig {
        &self.config
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Token that stops this scheduler when cancelled from another task.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    fn should_continue(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(events) = &self.events {
            // Nobody listening is fine
            let _ = events.send(event);
        }
    }

    fn calculate_delay(&self, action: &Action, last_time: u64) -> Duration {
        // Out-of-order timestamps collapse to no wait
        let elapsed_ms = action.time_ms.saturating_sub(last_time) as f64;
        let mut delay_ms = elapsed_ms / self.config.speed_factor;

        if action.random_time_ms > 0 {
            delay_ms = self
                .randomizer
                .jittered_delay_fixed(delay_ms, action.random_time_ms);
        }
        delay_ms = self.randomizer.jittered_delay(
            delay_ms,
            self.config.randomize_enabled,
            self.config.randomize_factor,
        );

        Duration::from_nanos((delay_ms.max(0.0) * 1_000_000.0).round() as u64)
    }

    async fn suspend(&self, delay: Duration) -> bool {
        cancellable_sleep(&self.cancel, delay).await
    }

    fn execute_action<E: InputExecutor + ?Sized>(
        &self,
        index: usize,
        action: &Action,
        repeat: u32,
        executor: &mut E,
    ) {
        let radius = action.random_radius_px;
        let position = action
            .kind
            .position()
            .map(|(x, y)| self.randomizer.jittered_position(x, y, radius));
        let key = action
            .kind
            .key_input()
            .map(|k| resolve_key(&k.key, k.auto_increment, repeat));
        let resolved = ResolvedAction::from_action(action, position, key);

        if let Err(source) = executor.execute(&resolved) {
            let err = PlaybackError::ActionExecution { index, source };
            warn!("{}; continuing playback", err);
        }
    }

    /// Replays `actions` under this scheduler's configuration and emits a
    /// single [`PlaybackEvent::Finished`] at the end.
    ///
    /// The list is owned for the duration of the run so edits made elsewhere
    /// cannot affect it.
    pub async fn run<E: InputExecutor + ?Sized>(
        &mut self,
        actions: Vec<Action>,
        executor: &mut E,
    ) -> RunStatus {
        let status = self.play(&actions, executor).await;
        self.emit(PlaybackEvent::Finished(status));
        status
    }

    /// The playback loop without the completion event, shared with profile
    /// chains which report their own.
    pub(crate) async fn play<E: InputExecutor + ?Sized>(
        &mut self,
        actions: &[Action],
        executor: &mut E,
    ) -> RunStatus {
        self.state = PlaybackState::Running;
        info!(
            "Playing {} actions (repeat {}, speed {}, randomize {})",
            actions.len(),
            self.config.repeat_count,
            self.config.speed_factor,
            self.config.randomize_enabled
        );

        let mut cancelled = false;
        'repeats: for repeat in 1..=self.config.repeat_count {
            if !self.should_continue() {
                cancelled = true;
                break;
            }

            let mut last_time = 0;
            for (index, action) in actions.iter().enumerate() {
                if !self.should_continue() {
                    cancelled = true;
                    break 'repeats;
                }

                if index > 0 {
                    let delay = self.calculate_delay(action, last_time);
                    debug!("Waiting {:?} before action {}", delay, index);
                    if !self.suspend(delay).await {
                        cancelled = true;
                        break 'repeats;
                    }
                }

                self.execute_action(index, action, repeat, executor);
                last_time = action.time_ms;
                self.emit(PlaybackEvent::ActionPlayed { index });
            }
        }

        let status = if cancelled {
            self.state = PlaybackState::Cancelled;
            RunStatus::Cancelled
        } else {
            self.state = PlaybackState::Finished;
            RunStatus::Completed
        };
        info!("Playback {}", status);
        status
    }
}
