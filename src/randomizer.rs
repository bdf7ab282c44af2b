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

//! Timing and position jitter
//!
//! All draws come from one shared generator so a seeded randomizer makes a
//! whole playback run reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct Randomizer {
    rng: Arc<Mutex<StdRng>>,
}

impl Default for Randomizer {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl Randomizer {
    pub fn from_entropy() -> Self {
        Self {
            rng: Arc::new(Mutex::new(StdRng::from_os_rng())),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        // A panic while holding the lock cannot leave the generator invalid
        self.rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Scales `nominal_ms` by `1 + U(-1, 1) * factor` when enabled.
    pub fn jittered_delay(&self, nominal_ms: f64, enabled: bool, factor: f64) -> f64 {
        if !enabled || factor == 0.0 {
            return nominal_ms;
        }
        let u: f64 = self.rng().random_range(-1.0..=1.0);
        (nominal_ms * (1.0 + u * factor)).max(0.0)
    }

    /// Offsets each axis independently by a uniform integer in `[-radius, radius]`.
    pub fn jittered_position(&self, x: i32, y: i32, radius_px: u32) -> (i32, i32) {
        if radius_px == 0 {
            return (x, y);
        }
        let r = i32::try_from(radius_px).unwrap_or(i32::MAX);
        let mut rng = self.rng();
        let dx = rng.random_range(-r..=r);
        let dy = rng.random_range(-r..=r);
        (x.saturating_add(dx), y.saturating_add(dy))
    }

    /// Adds a uniform integer in `[-radius_ms, radius_ms]` to `nominal_ms`.
    pub fn jittered_delay_fixed(&self, nominal_ms: f64, radius_ms: u64) -> f64 {
        if radius_ms == 0 {
            return nominal_ms;
        }
        let r = i64::try_from(radius_ms).unwrap_or(i64::MAX);
        let offset = self.rng().random_range(-r..=r);
        (nominal_ms + offset as f64).max(0.0)
    }
}
