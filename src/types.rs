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

//! Core types for macro recording and playback

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::PlaybackError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn as_str(&self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MouseButton {
    type Err = String;

    /// Accepts bare names as well as listener-style names such as `Button.left`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.rsplit('.').next().unwrap_or(s).trim();
        match name.to_ascii_lowercase().as_str() {
            "left" => Ok(MouseButton::Left),
            "right" => Ok(MouseButton::Right),
            "middle" => Ok(MouseButton::Middle),
            _ => Err(format!("unknown mouse button '{}'", s)),
        }
    }
}

/// Key parameters shared by the keyboard action kinds
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyInput {
    // Literal character or named key
    pub key: String,
    pub duration_ms: u64,
    // Treat `key` as a template whose numeric run advances each repeat
    pub auto_increment: bool,
}

impl KeyInput {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Move { x: i32, y: i32 },
    Click {
        x: i32,
        y: i32,
        button: MouseButton,
        duration_ms: u64,
    },
    KeyDown(KeyInput),
    KeyUp(KeyInput),
    KeyPress(KeyInput),
    Scroll { amount: i32 },
}

impl ActionKind {
    pub fn action_type(&self) -> ActionType {
        match self {
            ActionKind::Move { .. } => ActionType::Move,
            ActionKind::Click { .. } => ActionType::Click,
            ActionKind::KeyDown(_) => ActionType::KeyDown,
            ActionKind::KeyUp(_) => ActionType::KeyUp,
            ActionKind::KeyPress(_) => ActionType::KeyPress,
            ActionKind::Scroll { .. } => ActionType::Scroll,
        }
    }

    pub fn position(&self) -> Option<(i32, i32)> {
        match self {
            ActionKind::Move { x, y } | ActionKind::Click { x, y, .. } => Some((*x, *y)),
            _ => None,
        }
    }

    pub fn key_input(&self) -> Option<&KeyInput> {
        match self {
            ActionKind::KeyDown(k) | ActionKind::KeyUp(k) | ActionKind::KeyPress(k) => Some(k),
            _ => None,
        }
    }
}

/// One recorded input event with its offset from the start of the recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ActionRecord", into = "ActionRecord")]
pub struct Action {
    pub time_ms: u64,
    pub random_radius_px: u32,
    pub random_time_ms: u64,
    pub kind: ActionKind,
}

impl Action {
    pub fn new(time_ms: u64, kind: ActionKind) -> Self {
        Self {
            time_ms,
            random_radius_px: 0,
            random_time_ms: 0,
            kind,
        }
    }

    pub fn move_to(time_ms: u64, x: i32, y: i32) -> Self {
        Self::new(time_ms, ActionKind::Move { x, y })
    }

    pub fn click(time_ms: u64, x: i32, y: i32, button: MouseButton) -> Self {
        Self::new(
            time_ms,
            ActionKind::Click {
                x,
                y,
                button,
                duration_ms: 0,
            },
        )
    }

    pub fn key_press(time_ms: u64, key: impl Into<String>) -> Self {
        Self::new(time_ms, ActionKind::KeyPress(KeyInput::new(key)))
    }

    pub fn scroll(time_ms: u64, amount: i32) -> Self {
        Self::new(time_ms, ActionKind::Scroll { amount })
    }

    pub fn with_random_radius(mut self, radius_px: u32) -> Self {
        self.random_radius_px = radius_px;
        self
    }

    pub fn with_random_time(mut self, radius_ms: u64) -> Self {
        self.random_time_ms = radius_ms;
        self
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.time_ms as f64 / 1000.0;
        match &self.kind {
            ActionKind::Click { x, y, .. } => write!(f, "[{:.2}s] Click at ({}, {})", secs, x, y),
            ActionKind::Move { x, y } => write!(f, "[{:.2}s] Move to ({}, {})", secs, x, y),
            ActionKind::KeyPress(k) => write!(f, "[{:.2}s] Press key '{}'", secs, k.key),
            ActionKind::Scroll { amount } => write!(f, "[{:.2}s] Scroll {}", secs, amount),
            other => write!(f, "[{:.2}s] {}", secs, other.action_type()),
        }
    }
}

/// Discriminant used in the persisted record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Move,
    Click,
    KeyDown,
    KeyUp,
    KeyPress,
    Scroll,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionType::Move => "move",
            ActionType::Click => "click",
            ActionType::KeyDown => "keydown",
            ActionType::KeyUp => "keyup",
            ActionType::KeyPress => "keypress",
            ActionType::Scroll => "scroll",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{kind} action is missing field `{field}`")]
pub struct MissingField {
    pub kind: ActionType,
    pub field: &'static str,
}

/// Flat key-value form of an [`Action`] as stored in script files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub kind: ActionType,
    pub time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<MouseButton>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i32>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub random_radius_px: u32,
    #[serde(default)]
    pub random_time_ms: u64,
    #[serde(default)]
    pub auto_increment: bool,
}

impl From<Action> for ActionRecord {
    fn from(action: Action) -> Self {
        let mut record = ActionRecord {
            kind: action.kind.action_type(),
            time_ms: action.time_ms,
            x: None,
            y: None,
            button: None,
            key: None,
            amount: None,
            duration_ms: 0,
            random_radius_px: action.random_radius_px,
            random_time_ms: action.random_time_ms,
            auto_increment: false,
        };

        match action.kind {
            ActionKind::Move { x, y } => {
                record.x = Some(x);
                record.y = Some(y);
            }
            ActionKind::Click {
                x,
                y,
                button,
                duration_ms,
            } => {
                record.x = Some(x);
                record.y = Some(y);
                record.button = Some(button);
                record.duration_ms = duration_ms;
            }
            ActionKind::KeyDown(k) | ActionKind::KeyUp(k) | ActionKind::KeyPress(k) => {
                record.key = Some(k.key);
                record.duration_ms = k.duration_ms;
                record.auto_increment = k.auto_increment;
            }
            ActionKind::Scroll { amount } => {
                record.amount = Some(amount);
            }
        }
        record
    }
}

impl TryFrom<ActionRecord> for Action {
    type Error = MissingField;

    fn try_from(record: ActionRecord) -> Result<Self, Self::Error> {
        let kind = record.kind;
        let missing = |field| MissingField { kind, field };

        let key_input = |record: &ActionRecord| -> Result<KeyInput, MissingField> {
            Ok(KeyInput {
                key: record.key.clone().ok_or_else(|| missing("key"))?,
                duration_ms: record.duration_ms,
                auto_increment: record.auto_increment,
            })
        };

        let action_kind = match kind {
            ActionType::Move => ActionKind::Move {
                x: record.x.ok_or_else(|| missing("x"))?,
                y: record.y.ok_or_else(|| missing("y"))?,
            },
            ActionType::Click => ActionKind::Click {
                x: record.x.ok_or_else(|| missing("x"))?,
                y: record.y.ok_or_else(|| missing("y"))?,
                button: record.button.unwrap_or_default(),
                duration_ms: record.duration_ms,
            },
            ActionType::KeyDown => ActionKind::KeyDown(key_input(&record)?),
            ActionType::KeyUp => ActionKind::KeyUp(key_input(&record)?),
            ActionType::KeyPress => ActionKind::KeyPress(key_input(&record)?),
            ActionType::Scroll => ActionKind::Scroll {
                amount: record.amount.ok_or_else(|| missing("amount"))?,
            },
        };

        Ok(Action {
            time_ms: record.time_ms,
            random_radius_px: record.random_radius_px,
            random_time_ms: record.random_time_ms,
            kind: action_kind,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptRunConfig {
    // Delays are divided by this
    pub speed_factor: f64,
    pub repeat_count: u32,
    pub randomize_enabled: bool,
    // Fractional timing jitter bound, 0.1 = +/-10%
    pub randomize_factor: f64,
}

impl Default for ScriptRunConfig {
    fn default() -> Self {
        Self {
            speed_factor: 1.0,
            repeat_count: 1,
            randomize_enabled: false,
            randomize_factor: 0.1,
        }
    }
}

impl ScriptRunConfig {
    pub fn validate(&self) -> Result<(), PlaybackError> {
        validate_speed(self.speed_factor)?;
        if self.repeat_count < 1 {
            return Err(PlaybackError::InvalidConfiguration(
                "repeat_count must be at least 1".to_string(),
            ));
        }
        if !self.randomize_factor.is_finite() || self.randomize_factor < 0.0 {
            return Err(PlaybackError::InvalidConfiguration(format!(
                "randomize_factor must be a non-negative number, got {}",
                self.randomize_factor
            )));
        }
        Ok(())
    }
}

pub(crate) fn validate_speed(speed_factor: f64) -> Result<(), PlaybackError> {
    if !speed_factor.is_finite() || speed_factor <= 0.0 {
        return Err(PlaybackError::InvalidConfiguration(format!(
            "speed_factor must be greater than 0, got {}",
            speed_factor
        )));
    }
    Ok(())
}

/// One script in a profile chain
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileStep {
    pub actions: Vec<Action>,
    pub execution_order: i64,
    // Wait after this step completes, before the next begins
    pub execution_time_ms: u64,
    pub speed_factor: f64,
}

impl ProfileStep {
    pub fn new(actions: Vec<Action>, execution_order: i64) -> Self {
        Self {
            actions,
            execution_order,
            execution_time_ms: 0,
            speed_factor: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Running,
    Finished,
    Cancelled,
}

/// Terminal status of a script or profile run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Cancelled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Completed => f.write_str("completed"),
            RunStatus::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    // Only emitted by profile chains
    StepStarted { step: usize },
    ActionPlayed { index: usize },
    Finished(RunStatus),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_from_listener_name() {
        assert_eq!("Button.left".parse::<MouseButton>(), Ok(MouseButton::Left));
        assert_eq!("RIGHT".parse::<MouseButton>(), Ok(MouseButton::Right));
        assert_eq!("middle".parse::<MouseButton>(), Ok(MouseButton::Middle));
        assert!("x1".parse::<MouseButton>().is_err());
    }

    #[test]
    fn test_record_keeps_every_field() {
        let action = Action {
            time_ms: 1500,
            random_radius_px: 4,
            random_time_ms: 20,
            kind: ActionKind::KeyDown(KeyInput {
                key: "item0005".to_string(),
                duration_ms: 30,
                auto_increment: true,
            }),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["kind"], "keydown");
        assert_eq!(json["key"], "item0005");
        assert_eq!(json["auto_increment"], true);
        assert_eq!(json["random_time_ms"], 20);
        assert!(json.get("x").is_none());

        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn test_record_defaults_for_absent_fields() {
        let json = r#"{"kind":"click","time_ms":100,"x":10,"y":10}"#;
        let action: Action = serde_json::from_str(json).unwrap();
        assert_eq!(action, Action::click(100, 10, 10, MouseButton::Left));
    }

    #[test]
    fn test_record_missing_required_field() {
        let json = r#"{"kind":"scroll","time_ms":0}"#;
        let err = serde_json::from_str::<Action>(json).unwrap_err();
        assert!(err.to_string().contains("amount"));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Action::click(1250, 10, 20, MouseButton::Left).to_string(),
            "[1.25s] Click at (10, 20)"
        );
        assert_eq!(
            Action::move_to(500, 3, 4).to_string(),
            "[0.50s] Move to (3, 4)"
        );
        assert_eq!(
            Action::key_press(2000, "a").to_string(),
            "[2.00s] Press key 'a'"
        );
        assert_eq!(Action::scroll(3100, -3).to_string(), "[3.10s] Scroll -3");
        let up = Action::new(0, ActionKind::KeyUp(KeyInput::new("a")));
        assert_eq!(up.to_string(), "[0.00s] keyup");
    }

    #[test]
    fn test_config_validation() {
        assert!(ScriptRunConfig::default().validate().is_ok());

        let zero_repeat = ScriptRunConfig {
            repeat_count: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero_repeat.validate(),
            Err(PlaybackError::InvalidConfiguration(_))
        ));

        let zero_speed = ScriptRunConfig {
            speed_factor: 0.0,
            ..Default::default()
        };
        assert!(zero_speed.validate().is_err());

        let nan_speed = ScriptRunConfig {
            speed_factor: f64::NAN,
            ..Default::default()
        };
        assert!(nan_speed.validate().is_err());
    }
}
