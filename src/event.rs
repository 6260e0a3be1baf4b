//! Outgoing event queue with rate-limited delivery.
//!
//! Decouples "event occurred" from "event transmitted": every detected
//! condition enqueues an [`Event`] synchronously, and [`EventQueue::flush`]
//! renders a bounded number of them per tick so a burst of touch events can
//! never stall command processing (or vice versa). Events leave in strict
//! enqueue order.

use core::fmt::Write;

use heapless::{Deque, String};

use crate::types::{Action, CommandId, ErrReason, Position};

/// Capacity of one rendered event line.
pub const EVENT_LINE_LEN: usize = 96;

/// Comma-separated sensor letter list, sized for all 25 positions.
pub type SensorList = String<52>;

/// Transport seam for outgoing lines.
///
/// Implementations write one protocol line (no terminator) to the serial
/// port, a log, or a test buffer. Must not block; the flush cap is the only
/// pacing mechanism.
pub trait EventSink {
    fn send_line(&mut self, line: &str);
}

/// Target of a RECALIBRATED result event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecalibrationTarget {
    Single(Position),
    All,
}

/// One outgoing protocol event.
///
/// Created at the moment a condition is detected; lives in the queue until
/// flushed. Fields that are absent on the wire are absent here (`Option`),
/// so rendering never has to special-case sentinel values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Ack {
        action: Action,
        position: Option<Position>,
        id: Option<CommandId>,
    },
    Done {
        action: Action,
        position: Option<Position>,
        id: Option<CommandId>,
    },
    Err {
        reason: ErrReason,
        id: Option<CommandId>,
    },
    /// Spontaneous debounced touch edge (no expectation armed).
    TouchDown { position: Position },
    /// Spontaneous debounced release edge (no expectation armed).
    TouchUp { position: Position },
    /// EXPECT_DOWN fulfilled; carries the expectation's command id.
    TouchedDown {
        position: Position,
        id: Option<CommandId>,
    },
    /// EXPECT_UP fulfilled; carries the expectation's command id.
    TouchedUp {
        position: Position,
        id: Option<CommandId>,
    },
    Scanned {
        sensors: SensorList,
        id: Option<CommandId>,
    },
    Recalibrated {
        target: RecalibrationTarget,
        id: Option<CommandId>,
    },
    Info { id: Option<CommandId> },
}

impl Event {
    /// Renders the event as a protocol line (no terminator).
    pub fn render(&self) -> String<EVENT_LINE_LEN> {
        let mut line = String::new();

        // All writes are bounded by EVENT_LINE_LEN; a truncated line would
        // mean the capacity constant is wrong, not a runtime condition.
        let _ = match self {
            Event::Ack { action, position, id } => {
                write_response(&mut line, "ACK", *action, *position, *id)
            }
            Event::Done { action, position, id } => {
                write_response(&mut line, "DONE", *action, *position, *id)
            }
            Event::Err { reason, id } => {
                write!(line, "ERR {}", reason.as_str()).and_then(|_| write_id(&mut line, *id))
            }
            Event::TouchDown { position } => write!(line, "TOUCH_DOWN {}", position.letter()),
            Event::TouchUp { position } => write!(line, "TOUCH_UP {}", position.letter()),
            Event::TouchedDown { position, id } => {
                write!(line, "TOUCHED_DOWN {}", position.letter())
                    .and_then(|_| write_id(&mut line, *id))
            }
            Event::TouchedUp { position, id } => {
                write!(line, "TOUCHED_UP {}", position.letter())
                    .and_then(|_| write_id(&mut line, *id))
            }
            Event::Scanned { sensors, id } => write!(line, "SCANNED[{}]", sensors.as_str())
                .and_then(|_| write_id(&mut line, *id)),
            Event::Recalibrated { target, id } => {
                match target {
                    RecalibrationTarget::Single(position) => {
                        write!(line, "RECALIBRATED {}", position.letter())
                    }
                    RecalibrationTarget::All => write!(line, "RECALIBRATED ALL"),
                }
                .and_then(|_| write_id(&mut line, *id))
            }
            Event::Info { id } => write!(
                line,
                "INFO version={} protocol={}",
                crate::config::FIRMWARE_VERSION,
                crate::config::PROTOCOL_VERSION
            )
            .and_then(|_| write_id(&mut line, *id)),
        };

        line
    }
}

fn write_response(
    line: &mut String<EVENT_LINE_LEN>,
    prefix: &str,
    action: Action,
    position: Option<Position>,
    id: Option<CommandId>,
) -> core::fmt::Result {
    write!(line, "{} {}", prefix, action.as_str())?;
    if let Some(position) = position {
        write!(line, " {}", position.letter())?;
    }
    write_id(line, id)
}

fn write_id(line: &mut String<EVENT_LINE_LEN>, id: Option<CommandId>) -> core::fmt::Result {
    if let Some(id) = id {
        write!(line, " #{}", id)?;
    }
    Ok(())
}

/// Bounded FIFO of outgoing events.
///
/// Enqueue never overwrites: [`push`](Self::push) returns `false` when full
/// and the event is lost. Callers treat a lost ACK/error as acceptable since
/// the command's effect already happened (or didn't).
#[derive(Debug)]
pub struct EventQueue<const N: usize> {
    queue: Deque<Event, N>,
}

impl<const N: usize> EventQueue<N> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self { queue: Deque::new() }
    }

    /// Enqueues an event. Returns false (event dropped) when the queue is full.
    pub fn push(&mut self, event: Event) -> bool {
        self.queue.push_back(event).is_ok()
    }

    /// Renders and transmits up to `max` queued events, oldest first.
    ///
    /// Must be called every tick; the cap bounds per-tick transmission cost.
    pub fn flush<S: EventSink>(&mut self, max: usize, sink: &mut S) {
        for _ in 0..max {
            let Some(event) = self.queue.pop_front() else {
                break;
            };
            sink.send_line(&event.render());
        }
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if no events are pending.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns true if a further push would fail.
    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }
}

impl<const N: usize> Default for EventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
