//! This module contains global constants used across the display, touch and engine modules.

use std::time::Duration;

/// Consecutive partial refreshes allowed before a full refresh clears ghosting.
pub const MAX_PARTIAL_REFRESHES: u32 = 30;

/// A full refresh is forced when none has happened for this long (24 hours).
pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Inactivity before the screen is put to sleep.
pub const TIMEOUT_INTERVAL: Duration = Duration::from_secs(120);

/// Touch interrupt line polling period.
pub const TOUCH_POLL_PERIOD: Duration = Duration::from_millis(20);

/// Display supervisor tick period.
pub const SUPERVISOR_PERIOD: Duration = Duration::from_secs(1);

/// Wait after the sleep-clear before the panel may enter deep sleep;
/// the clear is a multi-second physical operation.
pub const SLEEP_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Depth of the engine command queue.
pub const COMMAND_QUEUE_DEPTH: usize = 32;

/// Default cadence of the daemon's gesture polling.
pub const GESTURE_POLL_PERIOD: Duration = Duration::from_millis(50);
