//! Touch debounce engine.
//!
//! Polls the capacitive sensors at a bounded rate and turns noisy raw reads
//! into stable edge events. Each sensor runs an independent state machine:
//! a raw change resets its stability timer; once the raw state has held for
//! the debounce window it is promoted to the debounced state; a debounced
//! state that differs from the last reported one emits exactly one edge.
//!
//! Edge emission branches on the one-shot expectation tables: an armed
//! expectation turns the edge into a targeted `TOUCHED_*` event carrying the
//! stored command id and disarms itself; otherwise the spontaneous `TOUCH_*`
//! event is emitted. The dispatcher arms expectations, this engine clears
//! them — that handoff is the only shared state between the two.

use crate::config::{NUM_POSITIONS, TouchConfig};
use crate::event::{Event, EventQueue, SensorList};
use crate::time::{TimeDuration, TimeInstant, TimeSource};
use crate::types::{CommandId, Position};

/// Hardware seam for the sensor bank.
///
/// Implementations talk to the physical sensor chips (register reads/writes
/// over I2C or similar). All methods address sensors by position index.
pub trait TouchBus {
    /// Probes and initializes one sensor. Returns false if the sensor does
    /// not respond; the engine then excludes it for the whole session.
    fn probe(&mut self, sensor: usize) -> bool;

    /// Reads the raw touched state of one sensor.
    fn read_touched(&mut self, sensor: usize) -> Result<bool, TouchBusError>;

    /// Triggers a hardware recalibration of one sensor.
    fn recalibrate(&mut self, sensor: usize) -> Result<(), TouchBusError>;
}

/// Opaque bus-level failure (a register read or write did not complete).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchBusError;

impl core::fmt::Display for TouchBusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "touch bus operation failed")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TouchBusError {}

/// Stand-in bus for builds without touch hardware.
///
/// Probes report no sensors, so an engine over this bus stays empty; it
/// mostly exists to pin the bus type parameter when the touch engine slot is
/// `None`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTouchBus;

impl TouchBus for NoTouchBus {
    fn probe(&mut self, _sensor: usize) -> bool {
        false
    }

    fn read_touched(&mut self, _sensor: usize) -> Result<bool, TouchBusError> {
        Ok(false)
    }

    fn recalibrate(&mut self, _sensor: usize) -> Result<(), TouchBusError> {
        Err(TouchBusError)
    }
}

/// Per-sensor debounce state.
#[derive(Debug, Clone, Copy)]
struct SensorState<I> {
    /// Set once during begin(); never changes afterwards.
    active: bool,
    raw_touched: bool,
    debounced_touched: bool,
    /// Direction of the most recently emitted edge; makes emission idempotent.
    last_reported_touched: bool,
    last_change: Option<I>,
    /// Start of the post-recalibration settle window, if one is running.
    settle_from: Option<I>,
}

impl<I> SensorState<I> {
    const fn new() -> Self {
        Self {
            active: false,
            raw_touched: false,
            debounced_touched: false,
            last_reported_touched: false,
            last_change: None,
            settle_from: None,
        }
    }
}

/// One-shot edge subscription, armed by the dispatcher.
#[derive(Debug, Clone, Copy)]
struct ExpectSlot {
    armed: bool,
    id: Option<CommandId>,
}

impl ExpectSlot {
    const fn new() -> Self {
        Self { armed: false, id: None }
    }
}

/// Debounce engine for the 25-sensor bank.
///
/// # Type Parameters
/// * `'t` - Lifetime of the time source reference
/// * `I` - Time instant type
/// * `B` - Touch bus implementation
/// * `T` - Time source implementation
pub struct TouchEngine<'t, I: TimeInstant, B: TouchBus, T: TimeSource<I>> {
    bus: B,
    time_source: &'t T,
    config: TouchConfig<I::Duration>,
    sensors: [SensorState<I>; NUM_POSITIONS],
    expect_down: [ExpectSlot; NUM_POSITIONS],
    expect_up: [ExpectSlot; NUM_POSITIONS],
    last_poll: Option<I>,
    active_count: usize,
}

impl<'t, I: TimeInstant, B: TouchBus, T: TimeSource<I>> TouchEngine<'t, I, B, T> {
    /// Creates the engine. Call [`begin`](Self::begin) before ticking.
    pub fn new(bus: B, config: TouchConfig<I::Duration>, time_source: &'t T) -> Self {
        Self {
            bus,
            time_source,
            config,
            sensors: [SensorState::new(); NUM_POSITIONS],
            expect_down: [ExpectSlot::new(); NUM_POSITIONS],
            expect_up: [ExpectSlot::new(); NUM_POSITIONS],
            last_poll: None,
            active_count: 0,
        }
    }

    /// Probes every sensor. Sensors that fail the probe are marked inactive
    /// for the session and excluded from polling, scanning and recalibration.
    ///
    /// Returns the number of responding sensors.
    pub fn begin(&mut self) -> usize {
        self.active_count = 0;
        for (index, sensor) in self.sensors.iter_mut().enumerate() {
            *sensor = SensorState::new();
            sensor.active = self.bus.probe(index);
            if sensor.active {
                self.active_count += 1;
            }
        }
        self.last_poll = None;
        self.active_count
    }

    /// Polls and debounces all active sensors, emitting edge events.
    ///
    /// Rate-limited: does nothing until the poll interval has elapsed since
    /// the previous poll. Bounded work per call.
    pub fn tick<const N: usize>(&mut self, events: &mut EventQueue<N>) {
        let now = self.time_source.now();

        if let Some(last) = self.last_poll
            && now.duration_since(last).as_millis() < self.config.poll_interval.as_millis()
        {
            return;
        }
        self.last_poll = Some(now);

        self.poll_sensors(now);
        self.process_debounce(now, events);
    }

    /// Triggers a hardware recalibration of one sensor and starts its settle
    /// window: the first debounced change within two debounce windows of the
    /// trigger is adopted as a fresh baseline without emitting an edge.
    pub fn recalibrate(&mut self, position: Position) -> Result<(), TouchBusError> {
        let index = position.index();
        if !self.sensors[index].active {
            return Err(TouchBusError);
        }

        self.bus.recalibrate(index)?;
        self.sensors[index].settle_from = Some(self.time_source.now());
        Ok(())
    }

    /// Arms the one-shot expect-down subscription for a sensor.
    ///
    /// The next debounced touch-down edge emits `TOUCHED_DOWN` with this id
    /// and disarms the slot. Re-arming overwrites the stored id.
    pub fn arm_expect_down(&mut self, position: Position, id: Option<CommandId>) {
        self.expect_down[position.index()] = ExpectSlot { armed: true, id };
    }

    /// Arms the one-shot expect-up subscription for a sensor.
    pub fn arm_expect_up(&mut self, position: Position, id: Option<CommandId>) {
        self.expect_up[position.index()] = ExpectSlot { armed: true, id };
    }

    /// Builds the comma-separated letter list of active sensors for SCANNED.
    pub fn active_sensor_list(&self) -> SensorList {
        let mut list = SensorList::new();
        for position in Position::all() {
            if self.sensors[position.index()].active {
                if !list.is_empty() {
                    let _ = list.push(',');
                }
                let _ = list.push(position.letter());
            }
        }
        list
    }

    /// Returns true if the sensor responded at initialization.
    pub fn is_sensor_active(&self, position: Position) -> bool {
        self.sensors[position.index()].active
    }

    /// Returns the debounced touched state of a sensor.
    pub fn is_touched(&self, position: Position) -> bool {
        self.sensors[position.index()].debounced_touched
    }

    /// Number of sensors that responded at initialization.
    pub fn active_sensor_count(&self) -> usize {
        self.active_count
    }

    fn poll_sensors(&mut self, now: I) {
        for (index, sensor) in self.sensors.iter_mut().enumerate() {
            if !sensor.active {
                continue;
            }

            // A failed read counts as untouched rather than aborting the poll.
            let touched = self.bus.read_touched(index).unwrap_or(false);

            if touched != sensor.raw_touched {
                sensor.raw_touched = touched;
                sensor.last_change = Some(now);
            }
        }
    }

    fn process_debounce<const N: usize>(&mut self, now: I, events: &mut EventQueue<N>) {
        let debounce = self.config.debounce.as_millis();

        for (index, sensor) in self.sensors.iter_mut().enumerate() {
            if !sensor.active {
                continue;
            }

            let stable = match sensor.last_change {
                None => true,
                Some(changed) => now.duration_since(changed).as_millis() >= debounce,
            };
            if !stable || sensor.raw_touched == sensor.debounced_touched {
                continue;
            }

            sensor.debounced_touched = sensor.raw_touched;
            if sensor.debounced_touched == sensor.last_reported_touched {
                continue;
            }
            sensor.last_reported_touched = sensor.debounced_touched;

            // First promotion after a recent recalibration is the new
            // baseline, not a user edge.
            if let Some(settled) = sensor.settle_from {
                sensor.settle_from = None;
                if now.duration_since(settled).as_millis() < 2 * debounce {
                    continue;
                }
            }

            let position = match Position::from_index(index) {
                Some(position) => position,
                None => continue,
            };

            if sensor.debounced_touched {
                let slot = &mut self.expect_down[index];
                if slot.armed {
                    events.push(Event::TouchedDown { position, id: slot.id });
                    *slot = ExpectSlot::new();
                } else {
                    events.push(Event::TouchDown { position });
                }
            } else {
                let slot = &mut self.expect_up[index];
                if slot.armed {
                    events.push(Event::TouchedUp { position, id: slot.id });
                    *slot = ExpectSlot::new();
                } else {
                    events.push(Event::TouchUp { position });
                }
            }
        }
    }
}
