//! LED position animation engine.
//!
//! Owns the per-position visual state machine and the two non-blocking
//! animation classes (success expansion and blink), plus the device-wide
//! celebration animation. All timing compares a stored instant against the
//! clock on each tick; no operation blocks.
//!
//! State transitions always clear the region the previous state occupied
//! before lighting anything new, so no stale cell survives a SHOW/HIDE/
//! SUCCESS/BLINK issued mid-animation. The cleared region for an expanded or
//! expanding success spans the full configured radius regardless of how far
//! the animation actually progressed.

use palette::Srgb;

use crate::config::{
    CELEBRATION_DIM, COLOR_BLINK, COLOR_OFF, COLOR_SHOW, COLOR_SUCCESS, LedConfig, NUM_POSITIONS,
};
use crate::time::{TimeDuration, TimeInstant, TimeSource};
use crate::types::{CellAddr, Position, StripId};

/// Hardware seam for the addressable LED strips.
///
/// Implementations buffer cell writes and push them to the physical strips
/// on [`latch`](Self::latch). Handle hardware errors internally; these
/// methods cannot fail.
pub trait LedSurface {
    /// Sets one cell to the given color.
    fn set_cell(&mut self, cell: CellAddr, color: Srgb);

    /// Number of cells on a strip.
    fn strip_len(&self, strip: StripId) -> u16;

    /// Sets every cell on every strip to off.
    fn clear_all(&mut self);

    /// Pushes buffered cell state to the physical strips.
    fn latch(&mut self);
}

/// Visual state of one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PositionState {
    /// Dark.
    Off,
    /// Solid single cell in the show color.
    Shown,
    /// Success expansion in progress.
    Animating,
    /// Success expansion finished and holding at full radius.
    Expanded,
    /// Periodic on/off toggle until explicitly stopped.
    Blinking,
}

#[derive(Debug, Clone, Copy)]
struct PositionData<I> {
    state: PositionState,
    animation_step: u8,
    last_step: Option<I>,
    blink_on: bool,
}

impl<I> PositionData<I> {
    const fn new() -> Self {
        Self {
            state: PositionState::Off,
            animation_step: 0,
            last_step: None,
            blink_on: false,
        }
    }
}

/// Controls the 25 LED positions through their animation state machines.
///
/// # Type Parameters
/// * `'t` - Lifetime of the time source reference
/// * `I` - Time instant type
/// * `L` - LED surface implementation
/// * `T` - Time source implementation
pub struct LedEngine<'t, I: TimeInstant, L: LedSurface, T: TimeSource<I>> {
    surface: L,
    time_source: &'t T,
    config: LedConfig<I::Duration>,
    mapping: [CellAddr; NUM_POSITIONS],
    positions: [PositionData<I>; NUM_POSITIONS],
    celebration_active: bool,
    celebration_step: u8,
    celebration_last_step: Option<I>,
    dirty: bool,
}

impl<'t, I: TimeInstant, L: LedSurface, T: TimeSource<I>> LedEngine<'t, I, L, T> {
    /// Creates the engine with all positions off and the surface cleared.
    pub fn new(
        mut surface: L,
        mapping: [CellAddr; NUM_POSITIONS],
        config: LedConfig<I::Duration>,
        time_source: &'t T,
    ) -> Self {
        surface.clear_all();
        surface.latch();

        Self {
            surface,
            time_source,
            config,
            mapping,
            positions: [PositionData::new(); NUM_POSITIONS],
            celebration_active: false,
            celebration_step: 0,
            celebration_last_step: None,
            dirty: false,
        }
    }

    /// Lights the position solid in the show color.
    pub fn show(&mut self, position: Position) {
        self.clear_for_transition(position);

        let data = &mut self.positions[position.index()];
        data.state = PositionState::Shown;
        data.animation_step = 0;
        data.blink_on = false;

        self.set_center(position, COLOR_SHOW);
        self.dirty = true;
    }

    /// Turns the position off, clearing the full expansion region.
    ///
    /// Idempotent: hiding an already-dark position succeeds and leaves no
    /// lit cell anywhere in `[center - radius, center + radius]`.
    pub fn hide(&mut self, position: Position) {
        self.clear_region(position);

        let data = &mut self.positions[position.index()];
        data.state = PositionState::Off;
        data.animation_step = 0;
        data.blink_on = false;

        self.dirty = true;
    }

    /// Starts blinking the position, beginning with the on phase.
    pub fn blink(&mut self, position: Position) {
        self.clear_for_transition(position);

        let data = &mut self.positions[position.index()];
        data.state = PositionState::Blinking;
        data.animation_step = 0;
        data.last_step = Some(self.time_source.now());
        data.blink_on = true;

        self.set_center(position, COLOR_BLINK);
        self.dirty = true;
    }

    /// Stops blinking and turns the position off. No-op when not blinking.
    pub fn stop_blink(&mut self, position: Position) {
        if self.positions[position.index()].state != PositionState::Blinking {
            return;
        }

        self.set_center(position, COLOR_OFF);

        let data = &mut self.positions[position.index()];
        data.state = PositionState::Off;
        data.animation_step = 0;
        data.blink_on = false;

        self.dirty = true;
    }

    /// Starts the success expansion: the center lights immediately, then the
    /// lit region grows by one cell per side each animation step until it
    /// reaches the configured radius and holds.
    pub fn success(&mut self, position: Position) {
        self.clear_for_transition(position);

        let data = &mut self.positions[position.index()];
        data.state = PositionState::Animating;
        data.animation_step = 0;
        data.last_step = Some(self.time_source.now());

        self.set_center(position, COLOR_SUCCESS);
        self.dirty = true;
    }

    /// True for every state except an in-progress success expansion.
    pub fn is_animation_complete(&self, position: Position) -> bool {
        self.positions[position.index()].state != PositionState::Animating
    }

    /// Returns the current state of a position.
    pub fn position_state(&self, position: Position) -> PositionState {
        self.positions[position.index()].state
    }

    /// Starts the device-wide celebration: every cell flashes the success
    /// color, then brightness alternates full/dim for the configured number
    /// of steps, then everything clears and all positions reset to off.
    pub fn start_celebration(&mut self) {
        self.celebration_active = true;
        self.celebration_step = 0;
        self.celebration_last_step = Some(self.time_source.now());

        self.fill_all(COLOR_SUCCESS);
        self.dirty = true;
    }

    /// True whenever no celebration is running.
    pub fn is_celebration_complete(&self) -> bool {
        !self.celebration_active
    }

    /// Advances all animations that are due and latches the surface once if
    /// anything changed.
    pub fn tick(&mut self) {
        let now = self.time_source.now();

        for position in Position::all() {
            match self.positions[position.index()].state {
                PositionState::Animating => self.advance_expansion(position, now),
                PositionState::Blinking => self.advance_blink(position, now),
                _ => {}
            }
        }

        if self.celebration_active {
            self.advance_celebration(now);
        }

        if self.dirty {
            self.surface.latch();
            self.dirty = false;
        }
    }

    /// Returns the underlying surface, for inspection.
    pub fn surface(&self) -> &L {
        &self.surface
    }

    /// Clears whatever region the position's current state occupies.
    ///
    /// Single transition table: every state-entering operation goes through
    /// here so no clear-before-transition case can be missed.
    fn clear_for_transition(&mut self, position: Position) {
        match self.positions[position.index()].state {
            PositionState::Off => {}
            PositionState::Shown | PositionState::Blinking => {
                self.set_center(position, COLOR_OFF);
            }
            PositionState::Animating | PositionState::Expanded => {
                self.clear_region(position);
            }
        }
    }

    /// Clears the full `[center - radius, center + radius]` span, clamped to
    /// the strip, regardless of actual animation progress.
    fn clear_region(&mut self, position: Position) {
        let cell = self.mapping[position.index()];
        let len = self.surface.strip_len(cell.strip) as i32;
        let center = cell.index as i32;
        let radius = self.config.expansion_radius as i32;

        for offset in -radius..=radius {
            let index = center + offset;
            if index >= 0 && index < len {
                self.surface
                    .set_cell(CellAddr::new(cell.strip, index as u16), COLOR_OFF);
            }
        }
    }

    fn set_center(&mut self, position: Position, color: Srgb) {
        let cell = self.mapping[position.index()];
        if cell.index < self.surface.strip_len(cell.strip) {
            self.surface.set_cell(cell, color);
        }
    }

    /// Lights the center plus `animation_step` cells on each side.
    fn render_expansion(&mut self, position: Position) {
        let cell = self.mapping[position.index()];
        let len = self.surface.strip_len(cell.strip) as i32;
        let center = cell.index as i32;
        let radius = self.positions[position.index()].animation_step as i32;

        for offset in -radius..=radius {
            let index = center + offset;
            if index >= 0 && index < len {
                self.surface
                    .set_cell(CellAddr::new(cell.strip, index as u16), COLOR_SUCCESS);
            }
        }
    }

    fn advance_expansion(&mut self, position: Position, now: I) {
        let interval = self.config.animation_step.as_millis();
        let data = &mut self.positions[position.index()];

        if let Some(last) = data.last_step
            && now.duration_since(last).as_millis() < interval
        {
            return;
        }

        data.animation_step += 1;
        data.last_step = Some(now);
        if data.animation_step >= self.config.expansion_radius {
            data.animation_step = self.config.expansion_radius;
            data.state = PositionState::Expanded;
        }

        self.render_expansion(position);
        self.dirty = true;
    }

    fn advance_blink(&mut self, position: Position, now: I) {
        let interval = self.config.blink_interval.as_millis();
        let data = &mut self.positions[position.index()];

        if let Some(last) = data.last_step
            && now.duration_since(last).as_millis() < interval
        {
            return;
        }

        data.blink_on = !data.blink_on;
        data.last_step = Some(now);
        let color = if data.blink_on { COLOR_BLINK } else { COLOR_OFF };

        self.set_center(position, color);
        self.dirty = true;
    }

    fn advance_celebration(&mut self, now: I) {
        let interval = self.config.celebration_step.as_millis();

        if let Some(last) = self.celebration_last_step
            && now.duration_since(last).as_millis() < interval
        {
            return;
        }

        self.celebration_step += 1;
        self.celebration_last_step = Some(now);

        if self.celebration_step < self.config.celebration_steps {
            let brightness = if self.celebration_step % 2 == 0 {
                1.0
            } else {
                CELEBRATION_DIM
            };
            self.fill_all(scale(COLOR_SUCCESS, brightness));
        } else {
            self.surface.clear_all();
            for data in &mut self.positions {
                data.state = PositionState::Off;
                data.animation_step = 0;
                data.blink_on = false;
            }
            self.celebration_active = false;
        }

        self.dirty = true;
    }

    fn fill_all(&mut self, color: Srgb) {
        for strip in [StripId::Strip1, StripId::Strip2] {
            for index in 0..self.surface.strip_len(strip) {
                self.surface.set_cell(CellAddr::new(strip, index), color);
            }
        }
    }
}

fn scale(color: Srgb, factor: f32) -> Srgb {
    Srgb::new(color.red * factor, color.green * factor, color.blue * factor)
}
