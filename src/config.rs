//! Build-time configuration carried as data.
//!
//! Capacities are const generics on the owning types; everything duration- or
//! color-valued lives here so a port only has to touch one module.

use crate::time::TimeDuration;
use crate::types::{CellAddr, StripId};
use palette::Srgb;

/// Number of logical positions (A-Y), each one LED cell and one touch sensor.
pub const NUM_POSITIONS: usize = 25;

/// Maximum length of one command line, terminator excluded.
pub const MAX_LINE_LEN: usize = 64;

/// Serial receive ring buffer capacity.
pub const RX_BUFFER_LEN: usize = MAX_LINE_LEN * 2;

/// Default number of in-flight long-running command slots.
pub const COMMAND_QUEUE_LEN: usize = 8;

/// Default outgoing event queue capacity.
pub const EVENT_QUEUE_LEN: usize = 16;

/// Maximum events transmitted per tick.
pub const EVENTS_PER_FLUSH: usize = 3;

/// Sensors recalibrated per tick during RECALIBRATE_ALL.
pub const SENSORS_PER_RECAL_TICK: usize = 5;

/// Firmware version reported by INFO.
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol version reported by INFO.
pub const PROTOCOL_VERSION: u32 = 2;

/// SHOW color (blue).
pub const COLOR_SHOW: Srgb = Srgb::new(0.0, 0.0, 1.0);

/// SUCCESS color (green).
pub const COLOR_SUCCESS: Srgb = Srgb::new(0.0, 1.0, 0.0);

/// BLINK color (amber, signals "release me").
pub const COLOR_BLINK: Srgb = Srgb::new(1.0, 0.392, 0.0);

/// All LEDs off.
pub const COLOR_OFF: Srgb = Srgb::new(0.0, 0.0, 0.0);

/// Brightness factor for the dim phase of the celebration pulse.
pub const CELEBRATION_DIM: f32 = 0.25;

/// Touch debounce engine timing.
#[derive(Debug, Clone, Copy)]
pub struct TouchConfig<D: TimeDuration> {
    /// Minimum interval between sensor polls; bounds bus traffic.
    pub poll_interval: D,
    /// A raw state must hold this long before it is promoted to debounced.
    /// Must span several poll intervals to be meaningful.
    pub debounce: D,
}

impl<D: TimeDuration> Default for TouchConfig<D> {
    fn default() -> Self {
        Self {
            poll_interval: D::from_millis(10),
            debounce: D::from_millis(30),
        }
    }
}

/// LED animation engine timing and geometry.
#[derive(Debug, Clone, Copy)]
pub struct LedConfig<D: TimeDuration> {
    /// Interval between success-expansion steps.
    pub animation_step: D,
    /// Interval between blink phase toggles.
    pub blink_interval: D,
    /// Interval between celebration steps.
    pub celebration_step: D,
    /// Cells lit on each side of the center when a success animation holds.
    pub expansion_radius: u8,
    /// Celebration pulse steps before everything clears.
    pub celebration_steps: u8,
}

impl<D: TimeDuration> Default for LedConfig<D> {
    fn default() -> Self {
        Self {
            animation_step: D::from_millis(80),
            blink_interval: D::from_millis(150),
            celebration_step: D::from_millis(150),
            expansion_radius: 5,
            celebration_steps: 8,
        }
    }
}

/// Default position-to-cell mapping for the physical build: two strips snaking
/// through the grid, positions interleaved across them.
pub const DEFAULT_LED_MAPPING: [CellAddr; NUM_POSITIONS] = [
    CellAddr::new(StripId::Strip1, 153), // A
    CellAddr::new(StripId::Strip1, 165), // B
    CellAddr::new(StripId::Strip1, 177), // C
    CellAddr::new(StripId::Strip2, 177), // D
    CellAddr::new(StripId::Strip2, 165), // E
    CellAddr::new(StripId::Strip2, 153), // F
    CellAddr::new(StripId::Strip1, 130), // G
    CellAddr::new(StripId::Strip1, 118), // H
    CellAddr::new(StripId::Strip1, 105), // I
    CellAddr::new(StripId::Strip1, 92),  // J
    CellAddr::new(StripId::Strip2, 105), // K
    CellAddr::new(StripId::Strip2, 118), // L
    CellAddr::new(StripId::Strip2, 130), // M
    CellAddr::new(StripId::Strip1, 55),  // N
    CellAddr::new(StripId::Strip1, 67),  // O
    CellAddr::new(StripId::Strip1, 79),  // P
    CellAddr::new(StripId::Strip2, 79),  // Q
    CellAddr::new(StripId::Strip2, 67),  // R
    CellAddr::new(StripId::Strip2, 55),  // S
    CellAddr::new(StripId::Strip1, 34),  // T
    CellAddr::new(StripId::Strip1, 22),  // U
    CellAddr::new(StripId::Strip1, 10),  // V
    CellAddr::new(StripId::Strip2, 10),  // W
    CellAddr::new(StripId::Strip2, 22),  // X
    CellAddr::new(StripId::Strip2, 34),  // Y
];
