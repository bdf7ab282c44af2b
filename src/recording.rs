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

//! Recording-to-action normalization
//!
//! Raw input events from a capture backend arrive with the time elapsed since
//! recording started. Pointer samples are thinned by distance and interval,
//! button releases and unsupported keys are dropped.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::{Action, MouseButton};

/// Named keys kept in addition to single characters
pub const RECORDABLE_NAMED_KEYS: [&str; 5] = ["space", "enter", "tab", "backspace", "esc"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub record_movement: bool,
    // A move must exceed this on either axis
    pub movement_threshold_px: u32,
    pub movement_interval_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            record_movement: true,
            movement_threshold_px: 5,
            movement_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInputEvent {
    PointerMoved { x: i32, y: i32 },
    Button {
        x: i32,
        y: i32,
        // Backend specific name, e.g. `Button.left`
        button: String,
        pressed: bool,
    },
    Key { name: String },
    Scroll { amount: i32 },
}

pub struct Recorder {
    config: RecorderConfig,
    actions: Vec<Action>,
    last_position: (i32, i32),
    last_move_ms: u64,
}

impl Recorder {
    pub fn new(config: RecorderConfig, initial_position: (i32, i32)) -> Self {
        Self {
            config,
            actions: Vec::new(),
            last_position: initial_position,
            last_move_ms: 0,
        }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn finish(self) -> Vec<Action> {
        self.actions
    }

    fn is_significant_move(&self, x: i32, y: i32, time_ms: u64) -> bool {
        if !self.config.record_movement {
            return false;
        }
        if time_ms.saturating_sub(self.last_move_ms) < self.config.movement_interval_ms {
            return false;
        }
        let threshold = i64::from(self.config.movement_threshold_px);
        let dx = (i64::from(x) - i64::from(self.last_position.0)).abs();
        let dy = (i64::from(y) - i64::from(self.last_position.1)).abs();
        dx > threshold || dy > threshold
    }

    fn is_recordable_key(name: &str) -> bool {
        name.chars().count() == 1 || RECORDABLE_NAMED_KEYS.contains(&name)
    }

    /// Normalizes one raw event. Returns the recorded action, if any.
    pub fn record(&mut self, elapsed: Duration, event: RawInputEvent) -> Option<&Action> {
        let time_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

        let action = match event {
            RawInputEvent::PointerMoved { x, y } => {
                if !self.is_significant_move(x, y, time_ms) {
                    return None;
                }
                self.last_position = (x, y);
                self.last_move_ms = time_ms;
                Action::move_to(time_ms, x, y)
            }
            RawInputEvent::Button {
                x,
                y,
                button,
                pressed,
            } => {
                if !pressed {
                    return None;
                }
                match button.parse::<MouseButton>() {
                    Ok(button) => Action::click(time_ms, x, y, button),
                    Err(e) => {
                        warn!("Dropping click: {}", e);
                        return None;
                    }
                }
            }
            RawInputEvent::Key { name } => {
                if !Self::is_recordable_key(&name) {
                    debug!("Ignoring key '{}'", name);
                    return None;
                }
                Action::key_press(time_ms, name)
            }
            RawInputEvent::Scroll { amount } => Action::scroll(time_ms, amount),
        };

        self.actions.push(action);
        self.actions.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn moved(x: i32, y: i32) -> RawInputEvent {
        RawInputEvent::PointerMoved { x, y }
    }

    #[test]
    fn test_moves_are_thinned() {
        let mut recorder = Recorder::new(RecorderConfig::default(), (0, 0));

        // Too soon
        assert!(recorder.record(ms(50), moved(50, 50)).is_none());
        // Not far enough
        assert!(recorder.record(ms(150), moved(5, 0)).is_none());
        assert!(recorder.record(ms(200), moved(6, 0)).is_some());
        // Interval restarts from the last recorded move
        assert!(recorder.record(ms(250), moved(100, 100)).is_none());
        assert!(recorder.record(ms(300), moved(100, 100)).is_some());

        assert_eq!(
            recorder.finish(),
            vec![Action::move_to(200, 6, 0), Action::move_to(300, 100, 100)]
        );
    }

    #[test]
    fn test_movement_disabled() {
        let config = RecorderConfig {
            record_movement: false,
            ..RecorderConfig::default()
        };
        let mut recorder = Recorder::new(config, (0, 0));
        assert!(recorder.record(ms(1000), moved(500, 500)).is_none());
        assert!(recorder.actions().is_empty());
    }

    #[test]
    fn test_clicks_on_press_only() {
        let mut recorder = Recorder::new(RecorderConfig::default(), (0, 0));
        let press = RawInputEvent::Button {
            x: 10,
            y: 20,
            button: "Button.right".to_string(),
            pressed: true,
        };
        let release = RawInputEvent::Button {
            x: 10,
            y: 20,
            button: "Button.right".to_string(),
            pressed: false,
        };
        assert!(recorder.record(ms(1250), press).is_some());
        assert!(recorder.record(ms(1300), release).is_none());
        assert_eq!(
            recorder.actions(),
            &[Action::click(1250, 10, 20, MouseButton::Right)]
        );
    }

    #[test]
    fn test_unknown_button_dropped() {
        let mut recorder = Recorder::new(RecorderConfig::default(), (0, 0));
        let event = RawInputEvent::Button {
            x: 0,
            y: 0,
            button: "Button.x2".to_string(),
            pressed: true,
        };
        assert!(recorder.record(ms(10), event).is_none());
    }

    #[test]
    fn test_key_filter() {
        let mut recorder = Recorder::new(RecorderConfig::default(), (0, 0));
        let key = |name: &str| RawInputEvent::Key {
            name: name.to_string(),
        };
        assert!(recorder.record(ms(1), key("a")).is_some());
        assert!(recorder.record(ms(2), key("enter")).is_some());
        assert!(recorder.record(ms(3), key("shift")).is_none());
        assert!(recorder.record(ms(4), key("f5")).is_none());
        assert_eq!(recorder.actions().len(), 2);
    }

    #[test]
    fn test_scroll() {
        let mut recorder = Recorder::new(RecorderConfig::default(), (0, 0));
        let recorded = recorder.record(ms(3100), RawInputEvent::Scroll { amount: -3 });
        assert_eq!(recorded, Some(&Action::scroll(3100, -3)));
    }
}
