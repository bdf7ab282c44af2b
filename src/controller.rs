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

//! Single active playback
//!
//! Scripts, profile chains and recording sessions all drive the same pointer
//! and keyboard, so at most one of them may hold the input devices at a time.
//! A second start is rejected up front instead of interleaving.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::chain::{ChainConfig, ProfileChainExecutor};
use crate::error::{Activity, PlaybackError};
use crate::executor::InputExecutor;
use crate::permissions::{CapabilitySet, Permission};
use crate::playback::PlaybackScheduler;
use crate::randomizer::Randomizer;
use crate::recording::{RawInputEvent, Recorder, RecorderConfig};
use crate::types::{Action, PlaybackEvent, ProfileStep, RunStatus, ScriptRunConfig};

struct ActiveSlot {
    activity: Activity,
    cancel: CancellationToken,
}

struct Inner {
    active: Mutex<Option<ActiveSlot>>,
    capabilities: CapabilitySet,
    randomizer: Randomizer,
}

impl Inner {
    fn active(&self) -> MutexGuard<'_, Option<ActiveSlot>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Releases the input devices when dropped
pub struct InputLease {
    inner: Arc<Inner>,
}

impl Drop for InputLease {
    fn drop(&mut self) {
        self.inner.active().take();
    }
}

/// A playback started by the controller
pub struct PlaybackRun {
    handle: JoinHandle<RunStatus>,
    events: UnboundedReceiver<PlaybackEvent>,
}

impl PlaybackRun {
    pub fn events(&mut self) -> &mut UnboundedReceiver<PlaybackEvent> {
        &mut self.events
    }

    pub async fn wait(self) -> Result<RunStatus, JoinError> {
        self.handle.await
    }
}

/// A recording that holds the input devices until finished
pub struct RecordingSession {
    recorder: Recorder,
    _lease: InputLease,
}

impl RecordingSession {
    pub fn record(&mut self, elapsed: Duration, event: RawInputEvent) -> Option<&Action> {
        self.recorder.record(elapsed, event)
    }

    pub fn finish(self) -> Vec<Action> {
        self.recorder.finish()
    }
}

#[derive(Clone)]
pub struct PlaybackController {
    inner: Arc<Inner>,
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new(CapabilitySet::all())
    }
}

impl PlaybackController {
    pub fn new(capabilities: CapabilitySet) -> Self {
        Self::with_randomizer(capabilities, Randomizer::default())
    }

    pub fn with_randomizer(capabilities: CapabilitySet, randomizer: Randomizer) -> Self {
        Self {
            inner: Arc::new(Inner {
                active: Mutex::new(None),
                capabilities,
                randomizer,
            }),
        }
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.inner.capabilities
    }

    /// What currently holds the input devices, if anything.
    pub fn busy(&self) -> Option<Activity> {
        self.inner.active().as_ref().map(|slot| slot.activity)
    }

    /// Requests the active playback to stop. Returns false if none is running.
    pub fn stop(&self) -> bool {
        match self.inner.active().as_ref() {
            Some(slot) if slot.activity == Activity::Playback => {
                info!("Stop requested");
                slot.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    fn acquire(
        &self,
        activity: Activity,
        permission: Permission,
    ) -> Result<(InputLease, CancellationToken), PlaybackError> {
        if !self.inner.capabilities.allows(permission) {
            return Err(PlaybackError::PermissionDenied(permission));
        }

        let mut active = self.inner.active();
        if let Some(slot) = active.as_ref() {
            return Err(PlaybackError::ConcurrentPlayback(slot.activity));
        }

        let cancel = CancellationToken::new();
        *active = Some(ActiveSlot {
            activity,
            cancel: cancel.clone(),
        });
        Ok((
            InputLease {
                inner: self.inner.clone(),
            },
            cancel,
        ))
    }

    /// Starts playing `actions` on a new task of the current tokio runtime.
    ///
    /// Invalid configuration, a missing permission, an already active
    /// playback or recording, and a call from outside any runtime are
    /// reported here, before anything runs.
    pub fn start_script<E>(
        &self,
        actions: Vec<Action>,
        config: ScriptRunConfig,
        mut executor: E,
    ) -> Result<PlaybackRun, PlaybackError>
    where
        E: InputExecutor + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| PlaybackError::NoRuntime)?;
        let scheduler = PlaybackScheduler::new(config)?;
        let (lease, cancel) = self.acquire(Activity::Playback, Permission::PlayMacros)?;
        let (tx, events) = unbounded_channel();

        let mut scheduler = scheduler
            .with_randomizer(self.inner.randomizer.clone())
            .with_cancellation(cancel)
            .with_events(tx);

        let handle = runtime.spawn(async move {
            let _lease = lease;
            scheduler.run(actions, &mut executor).await
        });

        Ok(PlaybackRun { handle, events })
    }

    /// Starts a profile chain on a new task, with the same up-front checks
    /// as [`PlaybackController::start_script`].
    pub fn start_profile<E>(
        &self,
        steps: Vec<ProfileStep>,
        config: ChainConfig,
        mut executor: E,
    ) -> Result<PlaybackRun, PlaybackError>
    where
        E: InputExecutor + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| PlaybackError::NoRuntime)?;
        let chain = ProfileChainExecutor::new(steps, config)?;
        let (lease, cancel) = self.acquire(Activity::Playback, Permission::PlayMacros)?;
        let (tx, events) = unbounded_channel();

        let mut chain = chain
            .with_randomizer(self.inner.randomizer.clone())
            .with_cancellation(cancel)
            .with_events(tx);

        let handle = runtime.spawn(async move {
            let _lease = lease;
            chain.run(&mut executor).await
        });

        Ok(PlaybackRun { handle, events })
    }

    pub fn begin_recording(
        &self,
        config: RecorderConfig,
        initial_position: (i32, i32),
    ) -> Result<RecordingSession, PlaybackError> {
        let (lease, _) = self.acquire(Activity::Recording, Permission::RecordMacros)?;
        info!("Recording started");
        Ok(RecordingSession {
            recorder: Recorder::new(config, initial_position),
            _lease: lease,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::RecordingExecutor;
    use crate::permissions::Role;
    use tokio::time::sleep;

    fn slow_script() -> Vec<Action> {
        vec![Action::move_to(0, 0, 0), Action::move_to(1000, 1, 1)]
    }

    fn start_slow(
        controller: &PlaybackController,
        executor: RecordingExecutor,
    ) -> Result<PlaybackRun, PlaybackError> {
        let config = ScriptRunConfig::default();
        controller.start_script(slow_script(), config, executor)
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_rejected() {
        let controller = PlaybackController::default();
        let run = start_slow(&controller, RecordingExecutor::new()).unwrap();

        let second = start_slow(&controller, RecordingExecutor::new());
        assert!(matches!(
            second,
            Err(PlaybackError::ConcurrentPlayback(Activity::Playback))
        ));

        // The first run is unaffected
        assert_eq!(run.wait().await.unwrap(), RunStatus::Completed);
        assert_eq!(controller.busy(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_released_after_run() {
        let controller = PlaybackController::default();
        let executor = RecordingExecutor::new();
        let run = start_slow(&controller, executor.clone()).unwrap();
        run.wait().await.unwrap();

        let again = start_slow(&controller, executor.clone()).unwrap();
        again.wait().await.unwrap();
        assert_eq!(executor.actions().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_active_run() {
        let controller = PlaybackController::default();
        let executor = RecordingExecutor::new();
        let mut run = start_slow(&controller, executor.clone()).unwrap();

        sleep(Duration::from_millis(100)).await;
        assert!(controller.stop());

        assert_eq!(
            run.events().recv().await,
            Some(PlaybackEvent::ActionPlayed { index: 0 })
        );
        assert_eq!(
            run.events().recv().await,
            Some(PlaybackEvent::Finished(RunStatus::Cancelled))
        );
        assert_eq!(run.wait().await.unwrap(), RunStatus::Cancelled);
        assert_eq!(executor.actions().len(), 1);
        assert!(!controller.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_config_leaves_slot_free() {
        let controller = PlaybackController::default();
        let config = ScriptRunConfig {
            repeat_count: 0,
            ..ScriptRunConfig::default()
        };
        let executor = RecordingExecutor::new();
        let result = controller.start_script(slow_script(), config, executor);
        assert!(matches!(
            result,
            Err(PlaybackError::InvalidConfiguration(_))
        ));
        assert_eq!(controller.busy(), None);
    }

    #[test]
    fn test_start_outside_runtime_rejected() {
        let controller = PlaybackController::default();
        let result = start_slow(&controller, RecordingExecutor::new());
        assert!(matches!(result, Err(PlaybackError::NoRuntime)));
        assert_eq!(controller.busy(), None);

        let steps = vec![ProfileStep::new(slow_script(), 1)];
        let executor = RecordingExecutor::new();
        let config = ChainConfig::default();
        let result = controller.start_profile(steps, config, executor);
        assert!(matches!(result, Err(PlaybackError::NoRuntime)));
        assert_eq!(controller.busy(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_profile_runs_through_controller() {
        let controller = PlaybackController::default();
        let executor = RecordingExecutor::new();
        let steps = vec![
            ProfileStep::new(vec![Action::key_press(0, "b")], 2),
            ProfileStep::new(vec![Action::key_press(0, "a")], 1),
        ];
        let run = controller
            .start_profile(steps, ChainConfig::default(), executor.clone())
            .unwrap();
        assert_eq!(run.wait().await.unwrap(), RunStatus::Completed);
        assert_eq!(executor.actions().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recording_and_playback_exclusive() {
        let controller = PlaybackController::default();
        let mut session = controller
            .begin_recording(RecorderConfig::default(), (0, 0))
            .unwrap();

        let result = start_slow(&controller, RecordingExecutor::new());
        assert!(matches!(
            result,
            Err(PlaybackError::ConcurrentPlayback(Activity::Recording))
        ));
        // Stop only applies to playback
        assert!(!controller.stop());

        session.record(
            Duration::from_millis(10),
            RawInputEvent::Key { name: "a".into() },
        );
        let actions = session.finish();
        assert_eq!(actions.len(), 1);
        assert_eq!(controller.busy(), None);

        let run = controller
            .start_script(actions, ScriptRunConfig::default(), RecordingExecutor::new())
            .unwrap();
        assert!(matches!(
            controller.begin_recording(RecorderConfig::default(), (0, 0)),
            Err(PlaybackError::ConcurrentPlayback(Activity::Playback))
        ));
        run.wait().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_permissions_checked() {
        let controller = PlaybackController::new(Role::Limited.default_permissions());
        assert!(matches!(
            controller.begin_recording(RecorderConfig::default(), (0, 0)),
            Err(PlaybackError::PermissionDenied(Permission::RecordMacros))
        ));

        let mut caps = CapabilitySet::all();
        caps.revoke(Permission::PlayMacros);
        let controller = PlaybackController::new(caps);
        let result = start_slow(&controller, RecordingExecutor::new());
        assert!(matches!(
            result,
            Err(PlaybackError::PermissionDenied(Permission::PlayMacros))
        ));
        assert_eq!(controller.busy(), None);
    }
}
