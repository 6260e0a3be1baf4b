#![cfg_attr(not(feature = "std"), no_std)]
#![doc = include_str!("../README.md")]

//! # Core Concepts
//!
//! - **`DeviceCore`**: The complete firmware core; feed it serial bytes and call `tick()`
//! - **`Dispatcher`**: Line buffering, command parsing and the long-running command queue
//! - **`LedEngine`**: Per-position LED state machines and the non-blocking animations
//! - **`TouchEngine`**: Sensor polling, debouncing and one-shot touch expectations
//! - **`EventQueue`**: Bounded outgoing event queue with rate-limited flushing
//! - **`LedSurface`** / **`TouchBus`** / **`EventSink`**: Traits to implement for your hardware
//! - **`TimeSource`**: Trait to implement for your timing system
//!
//! The library uses `Srgb<f32>` (0.0-1.0 range) for all color values. When
//! implementing `LedSurface` for your strips, convert to your device's native
//! format (e.g., 8-bit GRB for WS2812-class pixels).

// Re-export Srgb from palette for user convenience
pub use palette::Srgb;

pub mod time;
pub mod types;
pub mod config;
pub mod event;
pub mod touch;
pub mod led;
pub mod command;
pub mod device;

pub use command::{Dispatcher, ParseError, ParsedCommand, parse_line};
pub use config::{LedConfig, TouchConfig};
pub use device::DeviceCore;
pub use event::{Event, EventQueue, EventSink, RecalibrationTarget};
pub use led::{LedEngine, LedSurface, PositionState};
pub use time::{TimeDuration, TimeInstant, TimeSource};
pub use touch::{NoTouchBus, TouchBus, TouchBusError, TouchEngine};
pub use types::{Action, CellAddr, CommandId, ErrReason, Position, StripId};
