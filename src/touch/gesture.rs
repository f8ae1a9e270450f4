/*
 *  touch/gesture.rs
 *
 *  EPaperD - e-paper panel supervisor
 *  (c) 2020-26 Stuart Hunter
 *
 *  Tap/swipe detection from successive touch scans
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

use chrono::{DateTime, Local};
use log::debug;
use serde::Serialize;
use tokio::time::Instant;

use crate::touch::traits::{TouchError, TouchPoint, TouchScan, TouchSensor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Left,
    Right,
}

/// Outcome of one detection call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GestureEvent {
    None,
    Tap { x: u16, y: u16 },
    Swipe { direction: SwipeDirection },
}

/// One scan as seen by the detector
#[derive(Debug, Clone)]
pub struct TouchSample {
    /// Sampler flag at scan time
    pub active: bool,
    pub scan: TouchScan,
    pub timestamp: Instant,
}

/// Touch tracking carried between detection calls
#[derive(Debug, Clone)]
pub struct GestureState {
    pub is_touching: bool,
    pub has_been_touching: bool,

    /// Set only on a press (false -> true)
    pub touch_start: Option<TouchPoint>,

    /// Set only on a release (true -> false)
    pub touch_end: Option<TouchPoint>,

    pub last_touched: Instant,
    pub last_touched_at: DateTime<Local>,

    /// Last gesture outcome fields, kept until overwritten
    pub swipe_direction: Option<SwipeDirection>,
    pub tap: Option<TouchPoint>,

    pub previous: TouchSample,
}

/// Snapshot returned to callers of `detect_interaction`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionReport {
    /// Interrupt line state from the sampler at scan time
    pub touch_active: bool,
    pub is_touching: bool,
    pub has_been_touching: bool,
    pub touch_start: Option<TouchPoint>,
    pub touch_end: Option<TouchPoint>,
    pub did_swipe: bool,
    pub swipe_direction: Option<SwipeDirection>,
    pub did_tap: bool,
    pub tap_x: Option<u16>,
    pub tap_y: Option<u16>,
    pub last_touched: DateTime<Local>,
    pub gesture: GestureEvent,
}

/// On-demand gesture translator.
///
/// Nothing here is self-scheduled: each `detect` call performs one scan, so
/// the caller's polling rate sets the gesture resolution. An event is only
/// produced on the call that observes a release.
#[derive(Debug, Clone)]
pub struct GestureDetector {
    state: GestureState,
}

impl GestureDetector {
    pub fn new(now: Instant) -> Self {
        Self {
            state: GestureState {
                is_touching: false,
                has_been_touching: false,
                touch_start: None,
                touch_end: None,
                last_touched: now,
                last_touched_at: Local::now(),
                swipe_direction: None,
                tap: None,
                previous: TouchSample {
                    active: false,
                    scan: TouchScan::released(),
                    timestamp: now,
                },
            },
        }
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    /// Scan the sensor once and fold the result into the gesture state
    pub fn detect(
        &mut self,
        sensor: &mut dyn TouchSensor,
        touch_active: bool,
        now: Instant,
    ) -> Result<GestureEvent, TouchError> {
        let scan = sensor.scan(touch_active, &self.state.previous.scan)?;
        Ok(self.update(TouchSample { active: touch_active, scan, timestamp: now }))
    }

    /// Fold one sample into the state and return the gesture it completes, if any
    pub fn update(&mut self, sample: TouchSample) -> GestureEvent {
        let state = &mut self.state;
        let is_touching = sample.scan.count() > 0;
        let was_touching = state.has_been_touching;
        state.is_touching = is_touching;

        let mut event = GestureEvent::None;

        if is_touching && !was_touching {
            state.last_touched = sample.timestamp;
            state.last_touched_at = Local::now();
            state.touch_start = sample.scan.first();
            debug!("Touch down at {:?}", state.touch_start);
        }

        if was_touching && !is_touching {
            // the release scan carries no point; the end is the last contact seen
            state.touch_end = state.previous.scan.first();
            event = classify(state.touch_start, state.touch_end);
            match event {
                GestureEvent::Swipe { direction } => state.swipe_direction = Some(direction),
                GestureEvent::Tap { x, y } => state.tap = Some(TouchPoint::new(x, y)),
                GestureEvent::None => {}
            }
            debug!("Touch up at {:?}: {:?}", state.touch_end, event);
        }

        state.has_been_touching = is_touching;
        state.previous = sample;
        event
    }

    /// Report for the caller, with per-call flags derived from `event`
    pub fn report(&self, event: GestureEvent) -> InteractionReport {
        let state = &self.state;
        InteractionReport {
            touch_active: state.previous.active,
            is_touching: state.is_touching,
            has_been_touching: state.has_been_touching,
            touch_start: state.touch_start,
            touch_end: state.touch_end,
            did_swipe: matches!(event, GestureEvent::Swipe { .. }),
            swipe_direction: state.swipe_direction,
            did_tap: matches!(event, GestureEvent::Tap { .. }),
            tap_x: state.tap.map(|p| p.x),
            tap_y: state.tap.map(|p| p.y),
            last_touched: state.last_touched_at,
            gesture: event,
        }
    }
}

/// Horizontal travel is measured on the y axis. Any travel at all is a swipe;
/// no travel, dy == 0 included, is a tap at the start point.
fn classify(start: Option<TouchPoint>, end: Option<TouchPoint>) -> GestureEvent {
    let Some(start) = start else {
        return GestureEvent::None;
    };
    let Some(end) = end else {
        return GestureEvent::Tap { x: start.x, y: start.y };
    };

    let dy = i32::from(start.y) - i32::from(end.y);
    if dy.abs() > 0 {
        let direction = if dy > 0 { SwipeDirection::Right } else { SwipeDirection::Left };
        GestureEvent::Swipe { direction }
    } else {
        GestureEvent::Tap { x: start.x, y: start.y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::touch::mock::MockTouch;
    use std::time::Duration;

    fn sample(scan: TouchScan, at: Instant) -> TouchSample {
        TouchSample { active: scan.count() > 0, scan, timestamp: at }
    }

    fn feed(detector: &mut GestureDetector, scans: Vec<TouchScan>) -> Vec<GestureEvent> {
        let start = Instant::now();
        scans
            .into_iter()
            .enumerate()
            .map(|(i, scan)| detector.update(sample(scan, start + Duration::from_millis(50 * i as u64))))
            .collect()
    }

    #[test]
    fn test_steady_release_yields_nothing() {
        let mut detector = GestureDetector::new(Instant::now());
        let events = feed(&mut detector, vec![TouchScan::released(); 10]);
        assert!(events.iter().all(|e| *e == GestureEvent::None));
        assert_eq!(detector.state().touch_start, None);
    }

    #[test]
    fn test_stationary_touch_is_tap() {
        let mut detector = GestureDetector::new(Instant::now());
        let events = feed(
            &mut detector,
            vec![TouchScan::single(100, 50), TouchScan::single(100, 50), TouchScan::released()],
        );
        assert_eq!(events, vec![GestureEvent::None, GestureEvent::None, GestureEvent::Tap { x: 100, y: 50 }]);
        assert_eq!(detector.state().touch_end, Some(TouchPoint::new(100, 50)));
    }

    #[test]
    fn test_swipe_directions() {
        // y decreasing over the stroke -> dy > 0 -> right
        let mut detector = GestureDetector::new(Instant::now());
        let events = feed(
            &mut detector,
            vec![TouchScan::single(60, 200), TouchScan::single(62, 120), TouchScan::released()],
        );
        assert_eq!(events[2], GestureEvent::Swipe { direction: SwipeDirection::Right });

        let events = feed(
            &mut detector,
            vec![TouchScan::single(60, 20), TouchScan::single(61, 21), TouchScan::released()],
        );
        assert_eq!(events[2], GestureEvent::Swipe { direction: SwipeDirection::Left });
    }

    #[test]
    fn test_vertical_only_motion_is_tap_at_start() {
        // x travel alone does not count as a swipe
        let mut detector = GestureDetector::new(Instant::now());
        let events = feed(
            &mut detector,
            vec![TouchScan::single(10, 80), TouchScan::single(90, 80), TouchScan::released()],
        );
        assert_eq!(events[2], GestureEvent::Tap { x: 10, y: 80 });
    }

    #[test]
    fn test_one_event_per_release() {
        let mut detector = GestureDetector::new(Instant::now());
        let events = feed(
            &mut detector,
            vec![
                TouchScan::single(5, 5),
                TouchScan::released(),
                TouchScan::released(),
                TouchScan::single(7, 9),
                TouchScan::single(7, 3),
                TouchScan::released(),
                TouchScan::released(),
            ],
        );
        let count = events.iter().filter(|e| **e != GestureEvent::None).count();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_touch_start_only_on_press() {
        let start = Instant::now();
        let mut detector = GestureDetector::new(start);
        detector.update(sample(TouchScan::single(1, 2), start + Duration::from_secs(3)));
        detector.update(sample(TouchScan::single(8, 9), start + Duration::from_secs(4)));
        assert_eq!(detector.state().touch_start, Some(TouchPoint::new(1, 2)));
        assert_eq!(detector.state().last_touched, start + Duration::from_secs(3));
        assert_eq!(detector.state().touch_end, None);
    }

    #[test]
    fn test_report_flags_reset_each_call() {
        let mut detector = GestureDetector::new(Instant::now());
        let events = feed(&mut detector, vec![TouchScan::single(4, 4), TouchScan::released()]);
        let report = detector.report(events[1]);
        assert!(report.did_tap);
        assert_eq!((report.tap_x, report.tap_y), (Some(4), Some(4)));

        let event = detector.update(sample(TouchScan::released(), Instant::now()));
        let report = detector.report(event);
        assert!(!report.did_tap);
        assert!(!report.did_swipe);
        // coordinates of the last tap remain visible
        assert_eq!(report.tap_x, Some(4));
    }

    #[test]
    fn test_detect_reads_sensor() {
        let mut touch = MockTouch::new();
        touch.push_scans([TouchScan::single(30, 40), TouchScan::single(30, 40)]);
        let mut detector = GestureDetector::new(Instant::now());

        assert_eq!(detector.detect(&mut touch, true, Instant::now()).unwrap(), GestureEvent::None);
        assert_eq!(detector.detect(&mut touch, true, Instant::now()).unwrap(), GestureEvent::None);
        assert!(detector.report(GestureEvent::None).touch_active);
        assert_eq!(
            detector.detect(&mut touch, false, Instant::now()).unwrap(),
            GestureEvent::Tap { x: 30, y: 40 }
        );
        assert!(!detector.report(GestureEvent::None).touch_active);
        assert_eq!(touch.state().lock().unwrap().scans, 3);
    }

    #[test]
    fn test_report_serializes_direction_lowercase() {
        let mut detector = GestureDetector::new(Instant::now());
        let events = feed(
            &mut detector,
            vec![TouchScan::single(0, 10), TouchScan::single(0, 90), TouchScan::released()],
        );
        let yaml = serde_yaml::to_string(&detector.report(events[2])).unwrap();
        assert!(yaml.contains("swipe_direction: left"));
        assert!(yaml.contains("did_swipe: true"));
    }
}
