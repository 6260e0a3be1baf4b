//! Device runtime: owns the engines and runs the tick loop body.
//!
//! [`DeviceCore::tick`] is the single entry point the firmware main loop
//! calls as fast as it likes. Each tick runs a fixed order: buffered command
//! lines, then queued long-running commands, then the touch engine, then the
//! LED engine, then a bounded event flush. Every stage does bounded work, so
//! tick latency stays flat regardless of host or user activity.

use crate::command::Dispatcher;
use crate::config::{COMMAND_QUEUE_LEN, EVENT_QUEUE_LEN, EVENTS_PER_FLUSH};
use crate::event::{EventQueue, EventSink};
use crate::led::{LedEngine, LedSurface};
use crate::time::{TimeInstant, TimeSource};
use crate::touch::{TouchBus, TouchEngine};

/// The complete firmware core behind the hardware seams.
///
/// The touch engine is optional; a build without touch hardware still serves
/// LED commands and answers touch commands with `no_touch_controller`.
///
/// # Type Parameters
/// * `'t` - Lifetime of the time source reference
/// * `I` - Time instant type
/// * `L` - LED surface implementation
/// * `B` - Touch bus implementation
/// * `T` - Time source implementation
/// * `CMD` - Long-running command queue capacity
/// * `EVT` - Outgoing event queue capacity
pub struct DeviceCore<
    't,
    I: TimeInstant,
    L: LedSurface,
    B: TouchBus,
    T: TimeSource<I>,
    const CMD: usize = COMMAND_QUEUE_LEN,
    const EVT: usize = EVENT_QUEUE_LEN,
> {
    dispatcher: Dispatcher<CMD>,
    led: LedEngine<'t, I, L, T>,
    touch: Option<TouchEngine<'t, I, B, T>>,
    events: EventQueue<EVT>,
}

impl<
    't,
    I: TimeInstant,
    L: LedSurface,
    B: TouchBus,
    T: TimeSource<I>,
    const CMD: usize,
    const EVT: usize,
> DeviceCore<'t, I, L, B, T, CMD, EVT>
{
    /// Assembles the core from its engines.
    pub fn new(led: LedEngine<'t, I, L, T>, touch: Option<TouchEngine<'t, I, B, T>>) -> Self {
        Self {
            dispatcher: Dispatcher::new(),
            led,
            touch,
            events: EventQueue::new(),
        }
    }

    /// Initializes the touch hardware. Returns the number of responding
    /// sensors, zero when no touch engine is present.
    pub fn begin(&mut self) -> usize {
        match self.touch.as_mut() {
            Some(touch) => touch.begin(),
            None => 0,
        }
    }

    /// Buffers received serial bytes. Returns the number accepted.
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        self.dispatcher.feed(bytes)
    }

    /// Executes one command line immediately, bypassing the serial buffer.
    pub fn inject(&mut self, line: &str) {
        self.dispatcher
            .inject(line, &mut self.led, self.touch.as_mut(), &mut self.events);
    }

    /// Runs one tick of the core.
    pub fn tick<S: EventSink>(&mut self, sink: &mut S) {
        self.dispatcher
            .process_ready_lines(&mut self.led, self.touch.as_mut(), &mut self.events);
        self.dispatcher
            .tick_queued(&mut self.led, self.touch.as_mut(), &mut self.events);

        if let Some(touch) = self.touch.as_mut() {
            touch.tick(&mut self.events);
        }
        self.led.tick();

        self.events.flush(EVENTS_PER_FLUSH, sink);
    }

    /// Returns true when no long-running command slot is free.
    pub fn is_busy(&self) -> bool {
        self.dispatcher.is_queue_full()
    }

    /// Number of events still waiting to be flushed.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Returns the LED engine, for inspection.
    pub fn led(&self) -> &LedEngine<'t, I, L, T> {
        &self.led
    }

    /// Returns the touch engine, if present.
    pub fn touch(&self) -> Option<&TouchEngine<'t, I, B, T>> {
        self.touch.as_ref()
    }

    /// Returns the touch engine mutably, if present.
    pub fn touch_mut(&mut self) -> Option<&mut TouchEngine<'t, I, B, T>> {
        self.touch.as_mut()
    }
}
