/*
 *  engine/health.rs
 *
 *  EPaperD - e-paper panel supervisor
 *  (c) 2020-26 Stuart Hunter
 *
 *  Background loop status and the engine health report
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

/// Lifecycle of one background loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum LoopStatus {
    Starting,
    Running,
    Stopped,
    /// Terminated by a hardware fault; the loop does not restart
    Faulted(String),
}

impl LoopStatus {
    /// Still accepting or producing work
    pub fn is_live(&self) -> bool {
        matches!(self, LoopStatus::Starting | LoopStatus::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineHealth {
    /// Both loops running and no shutdown in progress
    pub ready: bool,
    pub shutting_down: bool,
    pub sampler: LoopStatus,
    pub supervisor: LoopStatus,
}

impl EngineHealth {
    pub fn new(sampler: LoopStatus, supervisor: LoopStatus, shutting_down: bool) -> Self {
        let ready = !shutting_down
            && sampler == LoopStatus::Running
            && supervisor == LoopStatus::Running;
        Self { ready, shutting_down, sampler, supervisor }
    }
}
