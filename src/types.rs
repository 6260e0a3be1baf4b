//! Protocol vocabulary shared across the core.

use crate::config::NUM_POSITIONS;

/// Request-response correlation identifier carried by the `#ID` token.
pub type CommandId = u32;

/// One of the 25 addressable slots (A-Y), each bound to one LED cell and one
/// touch sensor.
///
/// Positions are identified by a letter on the wire (case-insensitive on
/// input, canonical uppercase on output) and by a zero-based index
/// internally. The letter/index mapping is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Position(u8);

impl Position {
    /// Parses a position letter (`A`-`Y`, either case).
    pub fn from_letter(letter: char) -> Option<Self> {
        let upper = letter.to_ascii_uppercase();
        if upper.is_ascii_uppercase() && upper < 'Z' {
            Some(Position(upper as u8 - b'A'))
        } else {
            None
        }
    }

    /// Creates a position from its zero-based index (0-24).
    pub fn from_index(index: usize) -> Option<Self> {
        if index < NUM_POSITIONS {
            Some(Position(index as u8))
        } else {
            None
        }
    }

    /// Returns the zero-based index (0-24).
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// Returns the canonical uppercase letter (`A`-`Y`).
    pub fn letter(&self) -> char {
        (b'A' + self.0) as char
    }

    /// Iterates all positions in index order.
    pub fn all() -> impl Iterator<Item = Position> {
        (0..NUM_POSITIONS as u8).map(Position)
    }
}

impl core::fmt::Display for Position {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// The fixed set of protocol actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    Show,
    Hide,
    Success,
    Blink,
    StopBlink,
    ExpectDown,
    ExpectUp,
    Recalibrate,
    RecalibrateAll,
    Scan,
    SequenceCompleted,
    Info,
    Ping,
}

impl Action {
    /// Parses an action token, case-insensitively.
    pub fn parse(token: &str) -> Option<Self> {
        const TABLE: &[(&str, Action)] = &[
            ("SHOW", Action::Show),
            ("HIDE", Action::Hide),
            ("SUCCESS", Action::Success),
            ("BLINK", Action::Blink),
            ("STOP_BLINK", Action::StopBlink),
            ("EXPECT_DOWN", Action::ExpectDown),
            ("EXPECT_UP", Action::ExpectUp),
            ("RECALIBRATE", Action::Recalibrate),
            ("RECALIBRATE_ALL", Action::RecalibrateAll),
            ("SCAN", Action::Scan),
            ("SEQUENCE_COMPLETED", Action::SequenceCompleted),
            ("INFO", Action::Info),
            ("PING", Action::Ping),
        ];

        TABLE
            .iter()
            .find(|(name, _)| token.eq_ignore_ascii_case(name))
            .map(|(_, action)| *action)
    }

    /// Returns the canonical wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Show => "SHOW",
            Action::Hide => "HIDE",
            Action::Success => "SUCCESS",
            Action::Blink => "BLINK",
            Action::StopBlink => "STOP_BLINK",
            Action::ExpectDown => "EXPECT_DOWN",
            Action::ExpectUp => "EXPECT_UP",
            Action::Recalibrate => "RECALIBRATE",
            Action::RecalibrateAll => "RECALIBRATE_ALL",
            Action::Scan => "SCAN",
            Action::SequenceCompleted => "SEQUENCE_COMPLETED",
            Action::Info => "INFO",
            Action::Ping => "PING",
        }
    }

    /// Returns true if the action structurally requires a position argument.
    pub fn requires_position(&self) -> bool {
        matches!(
            self,
            Action::Show
                | Action::Hide
                | Action::Success
                | Action::Blink
                | Action::StopBlink
                | Action::ExpectDown
                | Action::ExpectUp
                | Action::Recalibrate
        )
    }

    /// Returns true if the action spans multiple ticks and completes with a
    /// later DONE/result event.
    pub fn is_long_running(&self) -> bool {
        matches!(
            self,
            Action::Success | Action::Scan | Action::RecalibrateAll | Action::SequenceCompleted
        )
    }
}

/// Protocol error taxonomy reported via `ERR` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrReason {
    /// Structurally malformed line (missing required position, bad token).
    BadFormat,
    /// Action token not in the protocol set.
    UnknownAction,
    /// Position letter outside A-Y.
    UnknownPosition,
    /// Unterminated input exceeded the line buffer; discarded.
    LineTooLong,
    /// Hardware-level operation failure.
    CommandFailed,
    /// Command queue has no free slot; retry later.
    Busy,
    /// Touch command issued but no touch hardware is present.
    NoTouchController,
}

impl ErrReason {
    /// Returns the wire spelling of the reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrReason::BadFormat => "bad_format",
            ErrReason::UnknownAction => "unknown_action",
            ErrReason::UnknownPosition => "unknown_position",
            ErrReason::LineTooLong => "line_too_long",
            ErrReason::CommandFailed => "command_failed",
            ErrReason::Busy => "busy",
            ErrReason::NoTouchController => "no_touch_controller",
        }
    }
}

impl core::fmt::Display for ErrReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one of the two physical LED strips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StripId {
    Strip1,
    Strip2,
}

/// Address of a single LED cell: strip plus cell index within that strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CellAddr {
    pub strip: StripId,
    pub index: u16,
}

impl CellAddr {
    /// Creates a cell address.
    pub const fn new(strip: StripId, index: u16) -> Self {
        Self { strip, index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_letter_round_trips_for_all_letters() {
        for letter in 'A'..='Y' {
            let pos = Position::from_letter(letter).unwrap();
            assert_eq!(pos.letter(), letter);
            assert_eq!(Position::from_index(pos.index()), Some(pos));
        }
    }

    #[test]
    fn position_accepts_lowercase_and_canonicalizes() {
        let pos = Position::from_letter('b').unwrap();
        assert_eq!(pos.letter(), 'B');
        assert_eq!(pos.index(), 1);
    }

    #[test]
    fn position_rejects_out_of_range() {
        assert_eq!(Position::from_letter('Z'), None);
        assert_eq!(Position::from_letter('z'), None);
        assert_eq!(Position::from_letter('1'), None);
        assert_eq!(Position::from_letter(' '), None);
        assert_eq!(Position::from_index(25), None);
    }

    #[test]
    fn all_positions_covers_full_grid() {
        let count = Position::all().count();
        assert_eq!(count, NUM_POSITIONS);
        assert_eq!(Position::all().next().unwrap().letter(), 'A');
        assert_eq!(Position::all().last().unwrap().letter(), 'Y');
    }

    #[test]
    fn action_parse_is_case_insensitive() {
        assert_eq!(Action::parse("show"), Some(Action::Show));
        assert_eq!(Action::parse("Success"), Some(Action::Success));
        assert_eq!(Action::parse("STOP_BLINK"), Some(Action::StopBlink));
        assert_eq!(Action::parse("sequence_completed"), Some(Action::SequenceCompleted));
        assert_eq!(Action::parse("SHOWING"), None);
        assert_eq!(Action::parse(""), None);
    }

    #[test]
    fn position_requirement_matches_protocol() {
        assert!(Action::Show.requires_position());
        assert!(Action::Recalibrate.requires_position());
        assert!(Action::ExpectUp.requires_position());
        assert!(!Action::Scan.requires_position());
        assert!(!Action::Info.requires_position());
        assert!(!Action::RecalibrateAll.requires_position());
        assert!(!Action::SequenceCompleted.requires_position());
    }

    #[test]
    fn long_running_classification_matches_protocol() {
        assert!(Action::Success.is_long_running());
        assert!(Action::Scan.is_long_running());
        assert!(Action::RecalibrateAll.is_long_running());
        assert!(Action::SequenceCompleted.is_long_running());
        assert!(!Action::Show.is_long_running());
        assert!(!Action::Recalibrate.is_long_running());
        assert!(!Action::Ping.is_long_running());
    }
}
