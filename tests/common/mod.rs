//! Shared mock hardware for the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use touch_grid::Srgb;
use touch_grid::event::EventSink;
use touch_grid::led::LedSurface;
use touch_grid::time::{TimeDuration, TimeInstant, TimeSource};
use touch_grid::touch::{TouchBus, TouchBusError};
use touch_grid::types::{CellAddr, StripId};

pub const NUM_SENSORS: usize = 25;
pub const STRIP_LEN: usize = 190;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TestDuration(pub u64);

impl TimeDuration for TestDuration {
    const ZERO: Self = TestDuration(0);

    fn as_millis(&self) -> u64 {
        self.0
    }

    fn from_millis(millis: u64) -> Self {
        TestDuration(millis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TestInstant(pub u64);

impl TimeInstant for TestInstant {
    type Duration = TestDuration;

    fn duration_since(&self, earlier: Self) -> Self::Duration {
        TestDuration(self.0 - earlier.0)
    }
}

pub struct MockClock {
    now: Cell<TestInstant>,
}

impl MockClock {
    pub fn new() -> Self {
        Self { now: Cell::new(TestInstant(0)) }
    }

    pub fn advance(&self, millis: u64) {
        let current = self.now.get();
        self.now.set(TestInstant(current.0 + millis));
    }
}

impl TimeSource<TestInstant> for MockClock {
    fn now(&self) -> TestInstant {
        self.now.get()
    }
}

/// Buffered cell state for two strips.
pub struct MockSurface {
    pub strip1: Vec<Srgb>,
    pub strip2: Vec<Srgb>,
    pub latches: usize,
}

impl MockSurface {
    pub fn new() -> Self {
        Self {
            strip1: vec![Srgb::new(0.0, 0.0, 0.0); STRIP_LEN],
            strip2: vec![Srgb::new(0.0, 0.0, 0.0); STRIP_LEN],
            latches: 0,
        }
    }

    pub fn cell(&self, cell: CellAddr) -> Srgb {
        match cell.strip {
            StripId::Strip1 => self.strip1[cell.index as usize],
            StripId::Strip2 => self.strip2[cell.index as usize],
        }
    }

    pub fn lit_count(&self) -> usize {
        self.strip1
            .iter()
            .chain(self.strip2.iter())
            .filter(|c| c.red > 0.001 || c.green > 0.001 || c.blue > 0.001)
            .count()
    }
}

impl LedSurface for MockSurface {
    fn set_cell(&mut self, cell: CellAddr, color: Srgb) {
        match cell.strip {
            StripId::Strip1 => self.strip1[cell.index as usize] = color,
            StripId::Strip2 => self.strip2[cell.index as usize] = color,
        }
    }

    fn strip_len(&self, _strip: StripId) -> u16 {
        STRIP_LEN as u16
    }

    fn clear_all(&mut self) {
        self.strip1.fill(Srgb::new(0.0, 0.0, 0.0));
        self.strip2.fill(Srgb::new(0.0, 0.0, 0.0));
    }

    fn latch(&mut self) {
        self.latches += 1;
    }
}

/// Scriptable sensor bank state, shared between the test and the bus.
pub struct BusState {
    pub present: [bool; NUM_SENSORS],
    pub touched: [bool; NUM_SENSORS],
    pub recalibrations: Vec<usize>,
}

impl BusState {
    pub fn all_present() -> Self {
        Self {
            present: [true; NUM_SENSORS],
            touched: [false; NUM_SENSORS],
            recalibrations: Vec::new(),
        }
    }
}

/// Bus over a shared [`BusState`] handle, so tests can flip raw sensor
/// states while the engine owns the bus.
pub struct SharedBus(pub Rc<RefCell<BusState>>);

impl TouchBus for SharedBus {
    fn probe(&mut self, sensor: usize) -> bool {
        self.0.borrow().present[sensor]
    }

    fn read_touched(&mut self, sensor: usize) -> Result<bool, TouchBusError> {
        Ok(self.0.borrow().touched[sensor])
    }

    fn recalibrate(&mut self, sensor: usize) -> Result<(), TouchBusError> {
        self.0.borrow_mut().recalibrations.push(sensor);
        Ok(())
    }
}

/// Sink that records every transmitted line.
pub struct CollectSink {
    pub lines: Vec<String>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self { lines: Vec::new() }
    }

    pub fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }
}

impl EventSink for CollectSink {
    fn send_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}
