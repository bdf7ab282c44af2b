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

//! Profile chains
//!
//! Runs the scripts of a profile back to back in execution order, waiting
//! each step's configured interval before starting the next.

use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::PlaybackError;
use crate::executor::InputExecutor;
use crate::playback::{PlaybackScheduler, cancellable_sleep};
use crate::randomizer::Randomizer;
use crate::types::{PlaybackEvent, ProfileStep, RunStatus, ScriptRunConfig, validate_speed};

/// Settings applied to every step of a chain
#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    pub randomize_enabled: bool,
    pub randomize_factor: f64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        let defaults = ScriptRunConfig::default();
        Self {
            randomize_enabled: defaults.randomize_enabled,
            randomize_factor: defaults.randomize_factor,
        }
    }
}

pub struct ProfileChainExecutor {
    steps: Vec<ProfileStep>,
    config: ChainConfig,
    randomizer: Randomizer,
    cancel: CancellationToken,
    events: Option<UnboundedSender<PlaybackEvent>>,
}

impl ProfileChainExecutor {
    /// Takes ownership of the materialized steps and orders them by
    /// `execution_order`, keeping insertion order on ties.
    pub fn new(mut steps: Vec<ProfileStep>, config: ChainConfig) -> Result<Self, PlaybackError> {
        for step in &steps {
            validate_speed(step.speed_factor)?;
        }
        // Probe the shared settings with a representative step config
        step_config(&config, 1.0).validate()?;

        steps.sort_by_key(|step| step.execution_order);

        Ok(Self {
            steps,
            config,
            randomizer: Randomizer::default(),
            cancel: CancellationToken::new(),
            events: None,
        })
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

    pub fn steps(&self) -> &[ProfileStep] {
        &self.steps
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn scheduler_for(&self, step: &ProfileStep) -> PlaybackScheduler {
        let config = step_config(&self.config, step.speed_factor);
        let mut scheduler = PlaybackScheduler::from_validated(config)
            .with_randomizer(self.randomizer.clone())
            .with_cancellation(self.cancel.child_token());
        if let Some(events) = &self.events {
            scheduler = scheduler.with_events(events.clone());
        }
        scheduler
    }

    async fn run_steps<E: InputExecutor + ?Sized>(&self, executor: &mut E) -> RunStatus {
        let last = self.steps.len().saturating_sub(1);

        for (k, step) in self.steps.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return RunStatus::Cancelled;
            }

            info!(
                "Starting step {} of {} (order {}, {} actions)",
                k + 1,
                self.steps.len(),
                step.execution_order,
                step.actions.len()
            );
            self.emit(PlaybackEvent::StepStarted { step: k });

            let mut scheduler = self.scheduler_for(step);
            if scheduler.play(&step.actions, executor).await == RunStatus::Cancelled {
                return RunStatus::Cancelled;
            }

            // Nothing follows the final step, so its wait is skipped
            if k < last && step.execution_time_ms > 0 {
                let wait = Duration::from_millis(step.execution_time_ms);
                debug!("Waiting {:?} after step {}", wait, k + 1);
                if !cancellable_sleep(&self.cancel, wait).await {
                    return RunStatus::Cancelled;
                }
            }
        }

        RunStatus::Completed
    }

    /// Runs every step once and emits a single [`PlaybackEvent::Finished`].
    pub async fn run<E: InputExecutor + ?Sized>(&mut self, executor: &mut E) -> RunStatus {
        let status = self.run_steps(executor).await;
        info!("Profile chain {}", status);
        self.emit(PlaybackEvent::Finished(status));
        status
    }
}

fn step_config(config: &ChainConfig, speed_factor: f64) -> ScriptRunConfig {
    ScriptRunConfig {
        speed_factor,
        // Steps always play once; repeating the whole chain is up to the caller
        repeat_count: 1,
        randomize_enabled: config.randomize_enabled,
        randomize_factor: config.randomize_factor,
    }
}
