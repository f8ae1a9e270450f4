/*
 *  engine/state.rs
 *
 *  EPaperD - e-paper panel supervisor
 *  (c) 2020-26 Stuart Hunter
 *
 *  Refresh bookkeeping and timing parameters
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

use crate::constants::{
    MAX_PARTIAL_REFRESHES, MAX_REFRESH_INTERVAL, SLEEP_SETTLE_DELAY, SUPERVISOR_PERIOD,
    TIMEOUT_INTERVAL, TOUCH_POLL_PERIOD,
};

/// Timing parameters for the engine and its loops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    pub max_partial_refreshes: u32,
    pub timeout_interval: Duration,
    pub max_refresh_interval: Duration,
    pub touch_poll_period: Duration,
    pub supervisor_period: Duration,
    pub sleep_settle: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            max_partial_refreshes: MAX_PARTIAL_REFRESHES,
            timeout_interval: TIMEOUT_INTERVAL,
            max_refresh_interval: MAX_REFRESH_INTERVAL,
            touch_poll_period: TOUCH_POLL_PERIOD,
            supervisor_period: SUPERVISOR_PERIOD,
            sleep_settle: SLEEP_SETTLE_DELAY,
        }
    }
}

/// How a render request was carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderOutcome {
    /// Pushed through the partial-update path
    Partial,
    /// Full reinit and base-image push; the partial counter was reset
    Full,
    /// Screen was asleep; the render was discarded
    Dropped,
}

/// Supervisor-visible phase of the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScreenPhase {
    ActiveIdle,
    ActiveRendering,
    Sleeping,
}

/// Refresh bookkeeping owned by the engine actor.
///
/// `partial_refresh_counter` only grows through partial refreshes and drops
/// to zero on every full refresh.
#[derive(Debug, Clone)]
pub struct RefreshState {
    pub screen_active: bool,
    pub partial_refresh_counter: u32,
    pub last_full_refresh: Instant,
    pub last_touched: Instant,
    pub should_render: bool,
    /// Pending render must be a full refresh
    pub force_full: bool,
}

impl RefreshState {
    pub fn new(now: Instant) -> Self {
        Self {
            screen_active: true,
            partial_refresh_counter: 0,
            last_full_refresh: now,
            last_touched: now,
            should_render: false,
            force_full: false,
        }
    }

    pub fn phase(&self) -> ScreenPhase {
        match (self.screen_active, self.should_render) {
            (false, _) => ScreenPhase::Sleeping,
            (true, true) => ScreenPhase::ActiveRendering,
            (true, false) => ScreenPhase::ActiveIdle,
        }
    }

    /// Queue a render; a full request stays full until consumed
    pub fn request_render(&mut self, full: bool) {
        self.should_render = true;
        self.force_full |= full;
    }

    /// Consume the pending render, returning whether it must be full
    pub fn take_render(&mut self) -> bool {
        self.should_render = false;
        std::mem::take(&mut self.force_full)
    }

    pub fn partial_budget_spent(&self, max_partial_refreshes: u32) -> bool {
        self.partial_refresh_counter >= max_partial_refreshes
    }

    pub fn record_full_refresh(&mut self, now: Instant) {
        self.partial_refresh_counter = 0;
        self.last_full_refresh = now;
    }

    pub fn record_partial_refresh(&mut self) {
        self.partial_refresh_counter += 1;
    }

    pub fn snapshot(&self, now: Instant) -> RefreshSnapshot {
        RefreshSnapshot {
            phase: self.phase(),
            screen_active: self.screen_active,
            partial_refresh_counter: self.partial_refresh_counter,
            should_render: self.should_render,
            secs_since_full_refresh: now.saturating_duration_since(self.last_full_refresh).as_secs(),
            secs_since_touch: now.saturating_duration_since(self.last_touched).as_secs(),
        }
    }
}

/// Point-in-time copy of the refresh state for callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshSnapshot {
    pub phase: ScreenPhase,
    pub screen_active: bool,
    pub partial_refresh_counter: u32,
    pub should_render: bool,
    pub secs_since_full_refresh: u64,
    pub secs_since_touch: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_request_survives_coalescing() {
        let mut state = RefreshState::new(Instant::now());
        state.request_render(true);
        state.request_render(false);
        assert_eq!(state.phase(), ScreenPhase::ActiveRendering);
        assert!(state.take_render());
        assert!(!state.should_render);
        assert!(!state.force_full);
    }

    #[test]
    fn test_counter_resets_on_full_refresh() {
        let start = Instant::now();
        let mut state = RefreshState::new(start);
        for _ in 0..30 {
            state.record_partial_refresh();
        }
        assert!(state.partial_budget_spent(30));

        let later = start + Duration::from_secs(5);
        state.record_full_refresh(later);
        assert_eq!(state.partial_refresh_counter, 0);
        assert_eq!(state.last_full_refresh, later);
    }

    #[test]
    fn test_snapshot_ages() {
        let start = Instant::now();
        let mut state = RefreshState::new(start);
        state.screen_active = false;
        let snap = state.snapshot(start + Duration::from_secs(200));
        assert_eq!(snap.phase, ScreenPhase::Sleeping);
        assert_eq!(snap.secs_since_touch, 200);
        assert_eq!(snap.secs_since_full_refresh, 200);
    }
}
