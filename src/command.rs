//! Command line parsing and dispatch.
//!
//! Bytes from the serial seam accumulate in a ring buffer; complete
//! terminated lines are parsed into [`ParsedCommand`]s and executed against
//! the LED and touch engines. Instant commands take effect and acknowledge in
//! the same tick. Long-running commands occupy a queue slot, acknowledge
//! immediately, and emit their completion event from [`Dispatcher::tick_queued`]
//! once their work finishes.
//!
//! Every failure is reported as an `ERR` event rather than silence, carrying
//! whatever command id had been parsed by the time the failure was detected.

use heapless::{Deque, String, Vec};

use crate::config::{MAX_LINE_LEN, NUM_POSITIONS, RX_BUFFER_LEN, SENSORS_PER_RECAL_TICK};
use crate::event::{Event, EventQueue, RecalibrationTarget};
use crate::led::{LedEngine, LedSurface};
use crate::time::{TimeInstant, TimeSource};
use crate::touch::{TouchBus, TouchEngine};
use crate::types::{Action, CommandId, ErrReason, Position};

/// A structurally valid command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedCommand {
    pub action: Action,
    pub position: Option<Position>,
    pub id: Option<CommandId>,
}

/// A rejected command line.
///
/// Carries the command id only if it had already been parsed when the error
/// was found, so the host can correlate what is correlatable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError {
    pub reason: ErrReason,
    pub id: Option<CommandId>,
}

/// Parses one terminated, non-empty command line.
///
/// Grammar: `ACTION [POSITION] [#ID]`, whitespace-separated, with the action
/// first and the remaining tokens in either order. Tokens are
/// case-insensitive except the id digits.
pub fn parse_line(line: &str) -> Result<ParsedCommand, ParseError> {
    let mut tokens = line.split_whitespace();

    let Some(action_token) = tokens.next() else {
        return Err(ParseError { reason: ErrReason::BadFormat, id: None });
    };
    let Some(action) = Action::parse(action_token) else {
        return Err(ParseError { reason: ErrReason::UnknownAction, id: None });
    };

    let mut position = None;
    let mut id = None;
    for token in tokens {
        if let Some(digits) = token.strip_prefix('#') {
            match digits.parse::<CommandId>() {
                Ok(value) => id = Some(value),
                Err(_) => return Err(ParseError { reason: ErrReason::BadFormat, id }),
            }
        } else if token.len() == 1 {
            match token.chars().next().and_then(Position::from_letter) {
                Some(parsed) => position = Some(parsed),
                None => return Err(ParseError { reason: ErrReason::UnknownPosition, id }),
            }
        } else {
            return Err(ParseError { reason: ErrReason::BadFormat, id });
        }
    }

    if action.requires_position() {
        if position.is_none() {
            return Err(ParseError { reason: ErrReason::BadFormat, id });
        }
    } else {
        // A position on an action that takes none is ignored, not an error.
        position = None;
    }

    Ok(ParsedCommand { action, position, id })
}

/// A long-running command occupying a queue slot.
#[derive(Debug, Clone, Copy)]
struct QueuedCommand {
    action: Action,
    position: Option<Position>,
    id: Option<CommandId>,
    /// Next sensor index for RECALIBRATE_ALL.
    cursor: usize,
}

/// Result of draining one line out of the receive buffer.
enum LinePump {
    /// No complete line buffered.
    Idle,
    Line(String<MAX_LINE_LEN>),
    /// An unterminated run exceeded the line buffer and was discarded.
    TooLong,
    /// The line was not valid UTF-8.
    Invalid,
}

/// Receive buffer, parser and command queue.
///
/// `CMD` is the number of concurrent long-running command slots.
pub struct Dispatcher<const CMD: usize> {
    rx: Deque<u8, RX_BUFFER_LEN>,
    line: Vec<u8, MAX_LINE_LEN>,
    overflow: bool,
    slots: [Option<QueuedCommand>; CMD],
}

impl<const CMD: usize> Dispatcher<CMD> {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        Self {
            rx: Deque::new(),
            line: Vec::new(),
            overflow: false,
            slots: [None; CMD],
        }
    }

    /// Buffers received bytes. Returns the number accepted; bytes beyond the
    /// ring capacity are dropped.
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        let mut accepted = 0;
        for &byte in bytes {
            if self.rx.push_back(byte).is_err() {
                break;
            }
            accepted += 1;
        }
        accepted
    }

    /// Returns true when no long-running slot is free.
    pub fn is_queue_full(&self) -> bool {
        self.slots.iter().all(|slot| slot.is_some())
    }

    /// Number of occupied long-running slots.
    pub fn queued_len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Drains and executes every complete line currently buffered.
    pub fn process_ready_lines<I, L, B, T, const N: usize>(
        &mut self,
        led: &mut LedEngine<'_, I, L, T>,
        mut touch: Option<&mut TouchEngine<'_, I, B, T>>,
        events: &mut EventQueue<N>,
    ) where
        I: TimeInstant,
        L: LedSurface,
        B: TouchBus,
        T: TimeSource<I>,
    {
        loop {
            match self.pump_line() {
                LinePump::Idle => break,
                LinePump::TooLong => {
                    events.push(Event::Err { reason: ErrReason::LineTooLong, id: None });
                }
                LinePump::Invalid => {
                    events.push(Event::Err { reason: ErrReason::BadFormat, id: None });
                }
                LinePump::Line(line) => match parse_line(&line) {
                    Ok(command) => self.execute(command, led, touch.as_deref_mut(), events),
                    Err(error) => {
                        events.push(Event::Err { reason: error.reason, id: error.id });
                    }
                },
            }
        }
    }

    /// Parses and executes one line directly, bypassing the receive buffer.
    /// For locally originated commands.
    pub fn inject<I, L, B, T, const N: usize>(
        &mut self,
        line: &str,
        led: &mut LedEngine<'_, I, L, T>,
        touch: Option<&mut TouchEngine<'_, I, B, T>>,
        events: &mut EventQueue<N>,
    ) where
        I: TimeInstant,
        L: LedSurface,
        B: TouchBus,
        T: TimeSource<I>,
    {
        match parse_line(line) {
            Ok(command) => self.execute(command, led, touch, events),
            Err(error) => {
                events.push(Event::Err { reason: error.reason, id: error.id });
            }
        }
    }

    /// Advances every queued long-running command by one bounded step and
    /// emits completion events for the ones that finished.
    pub fn tick_queued<I, L, B, T, const N: usize>(
        &mut self,
        led: &mut LedEngine<'_, I, L, T>,
        mut touch: Option<&mut TouchEngine<'_, I, B, T>>,
        events: &mut EventQueue<N>,
    ) where
        I: TimeInstant,
        L: LedSurface,
        B: TouchBus,
        T: TimeSource<I>,
    {
        for slot in &mut self.slots {
            let Some(command) = slot.as_mut() else {
                continue;
            };

            let finished = match command.action {
                Action::Success => {
                    let complete = command
                        .position
                        .is_none_or(|position| led.is_animation_complete(position));
                    if complete {
                        events.push(Event::Done {
                            action: Action::Success,
                            position: command.position,
                            id: command.id,
                        });
                    }
                    complete
                }
                Action::Scan => {
                    if let Some(touch) = touch.as_deref_mut() {
                        events.push(Event::Scanned {
                            sensors: touch.active_sensor_list(),
                            id: command.id,
                        });
                    }
                    true
                }
                Action::RecalibrateAll => {
                    Self::step_recalibrate_all(command, touch.as_deref_mut(), events)
                }
                Action::SequenceCompleted => {
                    let complete = led.is_celebration_complete();
                    if complete {
                        events.push(Event::Done {
                            action: Action::SequenceCompleted,
                            position: None,
                            id: command.id,
                        });
                    }
                    complete
                }
                _ => true,
            };

            if finished {
                *slot = None;
            }
        }
    }

    fn execute<I, L, B, T, const N: usize>(
        &mut self,
        command: ParsedCommand,
        led: &mut LedEngine<'_, I, L, T>,
        mut touch: Option<&mut TouchEngine<'_, I, B, T>>,
        events: &mut EventQueue<N>,
    ) where
        I: TimeInstant,
        L: LedSurface,
        B: TouchBus,
        T: TimeSource<I>,
    {
        let ParsedCommand { action, position, id } = command;

        match action {
            Action::Show | Action::Hide | Action::Blink | Action::StopBlink => {
                // The parser guarantees a position for these.
                if let Some(position) = position {
                    match action {
                        Action::Show => led.show(position),
                        Action::Hide => led.hide(position),
                        Action::Blink => led.blink(position),
                        _ => led.stop_blink(position),
                    }
                    events.push(Event::Ack { action, position: Some(position), id });
                }
            }
            Action::ExpectDown | Action::ExpectUp => {
                let Some(touch) = touch.as_deref_mut() else {
                    events.push(Event::Err { reason: ErrReason::NoTouchController, id });
                    return;
                };
                if let Some(position) = position {
                    if action == Action::ExpectDown {
                        touch.arm_expect_down(position, id);
                    } else {
                        touch.arm_expect_up(position, id);
                    }
                    events.push(Event::Ack { action, position: Some(position), id });
                }
            }
            Action::Recalibrate => {
                let Some(touch) = touch.as_deref_mut() else {
                    events.push(Event::Err { reason: ErrReason::NoTouchController, id });
                    return;
                };
                if let Some(position) = position {
                    match touch.recalibrate(position) {
                        Ok(()) => {
                            events.push(Event::Ack { action, position: Some(position), id });
                            events.push(Event::Recalibrated {
                                target: RecalibrationTarget::Single(position),
                                id,
                            });
                        }
                        Err(_) => {
                            events.push(Event::Err { reason: ErrReason::CommandFailed, id });
                        }
                    }
                }
            }
            Action::Info => {
                events.push(Event::Info { id });
            }
            Action::Ping => {
                events.push(Event::Ack { action, position, id });
            }
            Action::Success | Action::Scan | Action::RecalibrateAll | Action::SequenceCompleted => {
                self.admit(command, led, touch, events);
            }
        }
    }

    /// Admits a long-running command: checks its preconditions, starts its
    /// side effect, claims a slot and acknowledges.
    fn admit<I, L, B, T, const N: usize>(
        &mut self,
        command: ParsedCommand,
        led: &mut LedEngine<'_, I, L, T>,
        touch: Option<&mut TouchEngine<'_, I, B, T>>,
        events: &mut EventQueue<N>,
    ) where
        I: TimeInstant,
        L: LedSurface,
        B: TouchBus,
        T: TimeSource<I>,
    {
        let ParsedCommand { action, position, id } = command;

        if matches!(action, Action::Scan | Action::RecalibrateAll) && touch.is_none() {
            events.push(Event::Err { reason: ErrReason::NoTouchController, id });
            return;
        }

        let Some(slot) = self.slots.iter_mut().find(|slot| slot.is_none()) else {
            events.push(Event::Err { reason: ErrReason::Busy, id });
            return;
        };

        match action {
            Action::Success => {
                if let Some(position) = position {
                    led.success(position);
                }
            }
            Action::SequenceCompleted => led.start_celebration(),
            _ => {}
        }

        *slot = Some(QueuedCommand { action, position, id, cursor: 0 });
        events.push(Event::Ack { action, position, id });
    }

    /// Recalibrates up to the per-tick sensor budget, resuming at the stored
    /// cursor. Returns true once every sensor has been visited.
    fn step_recalibrate_all<I, B, T, const N: usize>(
        command: &mut QueuedCommand,
        touch: Option<&mut TouchEngine<'_, I, B, T>>,
        events: &mut EventQueue<N>,
    ) -> bool
    where
        I: TimeInstant,
        B: TouchBus,
        T: TimeSource<I>,
    {
        let Some(touch) = touch else {
            return true;
        };

        let mut visited = 0;
        while command.cursor < NUM_POSITIONS && visited < SENSORS_PER_RECAL_TICK {
            if let Some(position) = Position::from_index(command.cursor)
                && touch.is_sensor_active(position)
            {
                // Individual sensor failures do not abort the sweep.
                let _ = touch.recalibrate(position);
                visited += 1;
            }
            command.cursor += 1;
        }

        if command.cursor >= NUM_POSITIONS {
            events.push(Event::Recalibrated {
                target: RecalibrationTarget::All,
                id: command.id,
            });
            true
        } else {
            false
        }
    }

    /// Extracts the next complete line from the receive buffer.
    ///
    /// Terminators are CR or LF; runs of them (CRLF, blank lines) produce no
    /// output. A line exceeding the buffer is discarded through its
    /// terminator and reported once.
    fn pump_line(&mut self) -> LinePump {
        while let Some(byte) = self.rx.pop_front() {
            match byte {
                b'\r' | b'\n' => {
                    if self.overflow {
                        self.overflow = false;
                        return LinePump::TooLong;
                    }
                    if !self.line.is_empty() {
                        let result = match core::str::from_utf8(&self.line)
                            .ok()
                            .and_then(|text| String::try_from(text).ok())
                        {
                            Some(line) => LinePump::Line(line),
                            None => LinePump::Invalid,
                        };
                        self.line.clear();
                        return result;
                    }
                }
                _ if self.overflow => {}
                _ => {
                    if self.line.push(byte).is_err() {
                        self.overflow = true;
                        self.line.clear();
                    }
                }
            }
        }
        LinePump::Idle
    }
}

impl<const CMD: usize> Default for Dispatcher<CMD> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(letter: char) -> Position {
        Position::from_letter(letter).unwrap()
    }

    #[test]
    fn parses_full_command() {
        let command = parse_line("SHOW A #12").unwrap();
        assert_eq!(command.action, Action::Show);
        assert_eq!(command.position, Some(pos('A')));
        assert_eq!(command.id, Some(12));
    }

    #[test]
    fn parses_case_insensitively() {
        let command = parse_line("success b #7").unwrap();
        assert_eq!(command.action, Action::Success);
        assert_eq!(command.position, Some(pos('B')));
        assert_eq!(command.id, Some(7));
    }

    #[test]
    fn parses_without_optional_tokens() {
        let command = parse_line("PING").unwrap();
        assert_eq!(command.action, Action::Ping);
        assert_eq!(command.position, None);
        assert_eq!(command.id, None);

        let command = parse_line("SCAN #3").unwrap();
        assert_eq!(command.action, Action::Scan);
        assert_eq!(command.id, Some(3));
    }

    #[test]
    fn position_on_positionless_action_is_ignored() {
        let command = parse_line("PING A #1").unwrap();
        assert_eq!(command.action, Action::Ping);
        assert_eq!(command.position, None);
        assert_eq!(command.id, Some(1));
    }

    #[test]
    fn tolerates_extra_whitespace() {
        let command = parse_line("  SHOW   A   #1  ").unwrap();
        assert_eq!(command.action, Action::Show);
        assert_eq!(command.position, Some(pos('A')));
        assert_eq!(command.id, Some(1));
    }

    #[test]
    fn accepts_id_before_position() {
        let command = parse_line("SHOW #5 C").unwrap();
        assert_eq!(command.position, Some(pos('C')));
        assert_eq!(command.id, Some(5));
    }

    #[test]
    fn unknown_action_never_carries_an_id() {
        let error = parse_line("FROB A #5").unwrap_err();
        assert_eq!(error.reason, ErrReason::UnknownAction);
        assert_eq!(error.id, None);
    }

    #[test]
    fn unknown_position_carries_id_seen_so_far() {
        let error = parse_line("SHOW Z #5").unwrap_err();
        assert_eq!(error.reason, ErrReason::UnknownPosition);
        assert_eq!(error.id, None);

        let error = parse_line("SHOW #5 Z").unwrap_err();
        assert_eq!(error.reason, ErrReason::UnknownPosition);
        assert_eq!(error.id, Some(5));
    }

    #[test]
    fn missing_required_position_is_bad_format() {
        let error = parse_line("SHOW #2").unwrap_err();
        assert_eq!(error.reason, ErrReason::BadFormat);
        assert_eq!(error.id, Some(2));

        let error = parse_line("RECALIBRATE").unwrap_err();
        assert_eq!(error.reason, ErrReason::BadFormat);
        assert_eq!(error.id, None);
    }

    #[test]
    fn malformed_tokens_are_bad_format() {
        assert_eq!(parse_line("SHOW A #x").unwrap_err().reason, ErrReason::BadFormat);
        assert_eq!(parse_line("SHOW A #").unwrap_err().reason, ErrReason::BadFormat);
        assert_eq!(parse_line("SHOW AB").unwrap_err().reason, ErrReason::BadFormat);
        assert_eq!(parse_line("").unwrap_err().reason, ErrReason::BadFormat);
    }

    #[test]
    fn feed_is_bounded_by_the_ring_capacity() {
        let mut dispatcher: Dispatcher<8> = Dispatcher::new();
        let chunk = [b'X'; RX_BUFFER_LEN + 10];
        assert_eq!(dispatcher.feed(&chunk), RX_BUFFER_LEN);
        assert_eq!(dispatcher.feed(b"more"), 0);
    }

    #[test]
    fn pump_extracts_terminated_lines_and_collapses_crlf() {
        let mut dispatcher: Dispatcher<8> = Dispatcher::new();
        dispatcher.feed(b"SHOW A\r\n\r\nPING\n");

        match dispatcher.pump_line() {
            LinePump::Line(line) => assert_eq!(line.as_str(), "SHOW A"),
            _ => panic!("expected a line"),
        }
        match dispatcher.pump_line() {
            LinePump::Line(line) => assert_eq!(line.as_str(), "PING"),
            _ => panic!("expected a line"),
        }
        assert!(matches!(dispatcher.pump_line(), LinePump::Idle));
    }

    #[test]
    fn pump_holds_partial_lines_across_calls() {
        let mut dispatcher: Dispatcher<8> = Dispatcher::new();
        dispatcher.feed(b"SHO");
        assert!(matches!(dispatcher.pump_line(), LinePump::Idle));

        dispatcher.feed(b"W B\n");
        match dispatcher.pump_line() {
            LinePump::Line(line) => assert_eq!(line.as_str(), "SHOW B"),
            _ => panic!("expected a line"),
        }
    }

    #[test]
    fn overlong_line_is_discarded_and_reported_once() {
        let mut dispatcher: Dispatcher<8> = Dispatcher::new();
        let long = [b'A'; MAX_LINE_LEN + 5];
        dispatcher.feed(&long);
        assert!(matches!(dispatcher.pump_line(), LinePump::Idle));

        dispatcher.feed(b"\nPING\n");
        assert!(matches!(dispatcher.pump_line(), LinePump::TooLong));
        match dispatcher.pump_line() {
            LinePump::Line(line) => assert_eq!(line.as_str(), "PING"),
            _ => panic!("expected a line"),
        }
    }

    #[test]
    fn non_utf8_line_is_invalid() {
        let mut dispatcher: Dispatcher<8> = Dispatcher::new();
        dispatcher.feed(b"SHOW \xff\n");
        assert!(matches!(dispatcher.pump_line(), LinePump::Invalid));
    }

    #[test]
    fn max_length_line_survives_intact() {
        let mut dispatcher: Dispatcher<8> = Dispatcher::new();
        let mut bytes = [b'P'; MAX_LINE_LEN];
        bytes[..4].copy_from_slice(b"PING");
        for byte in &mut bytes[4..] {
            *byte = b' ';
        }
        dispatcher.feed(&bytes);
        dispatcher.feed(b"\n");

        match dispatcher.pump_line() {
            LinePump::Line(line) => assert_eq!(line.len(), MAX_LINE_LEN),
            _ => panic!("expected a line"),
        }
    }
}
