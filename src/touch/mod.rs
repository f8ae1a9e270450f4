/*
 *  touch/mod.rs
 *
 *  EPaperD - e-paper panel supervisor
 *  (c) 2020-26 Stuart Hunter
 *
 *  Touch subsystem - controller abstraction, sampling and gestures
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

pub mod traits;
pub mod gesture;
pub mod sampler;

// Scripted controller, used by tests and by the daemon when no hardware is attached
pub mod mock;

pub use traits::{
    lock_sensor, shared, BoxedTouchSensor, PinLevel, SharedTouchSensor, TouchError, TouchPoint,
    TouchScan, TouchSensor,
};
pub use gesture::{GestureDetector, GestureEvent, GestureState, InteractionReport, SwipeDirection, TouchSample};
pub use sampler::TouchSampler;
pub use mock::{MockTouch, MockTouchState};
