//! Pan/zoom state for a window looking onto the grid.
//!
//! Zoom is pixels per cell. The visible window never leaves the finite
//! `[0, cell_count)²` area and the grid never renders smaller than the window.

use thiserror::Error;

use crate::topology::index_of;

pub const DEFAULT_ZOOM: f64 = 10.0;
pub const MAX_ZOOM: f64 = 100.0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViewError {
    #[error("viewport has no window dimensions yet")]
    NotInitialized,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewUpdate {
    pub zoom: Option<f64>,
    pub pan_x: Option<f64>,
    pub pan_y: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellPosition {
    pub row: u32,
    pub col: u32,
    pub index: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Window {
    width: f64,
    height: f64,
}

/// Clamp without panicking when `min > max`; `max` wins.
fn clamp(value: f64, min: f64, max: f64) -> f64 {
    if value > max {
        max
    } else if value < min {
        min
    } else {
        value
    }
}

#[derive(Clone, Debug)]
pub struct Viewport {
    cell_count: u32,
    window: Option<Window>,
    zoom: Option<f64>,
    pan_x: Option<f64>,
    pan_y: Option<f64>,
    redraw_needed: bool,
}

impl Viewport {
    pub fn new(cell_count: u32) -> Self {
        Self {
            cell_count,
            window: None,
            zoom: None,
            pan_x: None,
            pan_y: None,
            redraw_needed: true,
        }
    }

    fn window(&self) -> Result<Window, ViewError> {
        self.window.ok_or(ViewError::NotInitialized)
    }

    pub fn state(&self) -> Result<ViewState, ViewError> {
        match (self.window, self.zoom, self.pan_x, self.pan_y) {
            (Some(_), Some(zoom), Some(pan_x), Some(pan_y)) => Ok(ViewState { zoom, pan_x, pan_y }),
            _ => Err(ViewError::NotInitialized),
        }
    }

    /// Store new window dimensions and re-clamp the view against them.
    pub fn set_window(&mut self, width: f64, height: f64) {
        let window = Window { width, height };
        self.window = Some(window);
        self.apply(window, ViewUpdate::default());
    }

    fn min_zoom_for(&self, window: Window) -> f64 {
        (window.width.max(window.height) / f64::from(self.cell_count)).ceil()
    }

    fn max_pan_for(&self, window: Window, zoom: f64) -> (f64, f64) {
        let span = f64::from(self.cell_count) * zoom;
        (span - window.width, span - window.height)
    }

    /// Smallest zoom at which the grid covers the window.
    pub fn min_zoom(&self) -> Result<f64, ViewError> {
        Ok(self.min_zoom_for(self.window()?))
    }

    pub fn max_pan_x(&self) -> Result<f64, ViewError> {
        let state = self.state()?;
        Ok(self.max_pan_for(self.window()?, state.zoom).0)
    }

    pub fn max_pan_y(&self) -> Result<f64, ViewError> {
        let state = self.state()?;
        Ok(self.max_pan_for(self.window()?, state.zoom).1)
    }

    /// Merge `update` into the view and clamp every field.
    /// Unset pans default to the centre of the grid.
    pub fn set_view(&mut self, update: ViewUpdate) -> Result<ViewState, ViewError> {
        let window = self.window()?;
        Ok(self.apply(window, update))
    }

    fn apply(&mut self, window: Window, update: ViewUpdate) -> ViewState {
        let zoom = clamp(
            update.zoom.or(self.zoom).unwrap_or(DEFAULT_ZOOM),
            self.min_zoom_for(window),
            MAX_ZOOM,
        );
        let (max_x, max_y) = self.max_pan_for(window, zoom);
        let pan_x = clamp(
            update.pan_x.or(self.pan_x).unwrap_or((max_x / 2.0).round()),
            0.0,
            max_x,
        );
        let pan_y = clamp(
            update.pan_y.or(self.pan_y).unwrap_or((max_y / 2.0).round()),
            0.0,
            max_y,
        );

        self.zoom = Some(zoom);
        self.pan_x = Some(pan_x);
        self.pan_y = Some(pan_y);
        self.redraw_needed = true;
        ViewState { zoom, pan_x, pan_y }
    }

    /// Zoom so the window point `(x, y)` stays over the same cell.
    pub fn zoom_at_point(&mut self, zoom: f64, x: f64, y: f64) -> Result<ViewState, ViewError> {
        let old = self.state()?;
        let new_zoom = clamp(zoom, self.min_zoom()?, MAX_ZOOM);
        let scale = new_zoom / old.zoom - 1.0;
        self.set_view(ViewUpdate {
            zoom: Some(new_zoom),
            pan_x: Some((old.pan_x + scale * (old.pan_x + x)).round()),
            pan_y: Some((old.pan_y + scale * (old.pan_y + y)).round()),
        })
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) -> Result<ViewState, ViewError> {
        let state = self.state()?;
        self.set_view(ViewUpdate {
            zoom: None,
            pan_x: Some(state.pan_x + dx),
            pan_y: Some(state.pan_y + dy),
        })
    }

    /// The cell under window point `(x, y)`, or `None` off the grid.
    pub fn cell_at(&self, x: f64, y: f64) -> Result<Option<CellPosition>, ViewError> {
        let state = self.state()?;
        let row = ((y + state.pan_y) / state.zoom).floor();
        let col = ((x + state.pan_x) / state.zoom).floor();
        let limit = f64::from(self.cell_count);
        if row < 0.0 || col < 0.0 || row >= limit || col >= limit {
            return Ok(None);
        }
        let (row, col) = (row as u32, col as u32);
        Ok(Some(CellPosition {
            row,
            col,
            index: index_of(row, col, self.cell_count),
        }))
    }

    /// Row and column under the window centre, relative to the grid centre.
    pub fn center_row_col(&self) -> Result<(i64, i64), ViewError> {
        let state = self.state()?;
        let window = self.window()?;
        let row = ((window.height / 2.0 + state.pan_y) / state.zoom).floor() as i64;
        let col = ((window.width / 2.0 + state.pan_x) / state.zoom).floor() as i64;
        let half = i64::from(self.cell_count / 2);
        Ok((row - half, col - half))
    }

    /// Whether a full redraw is due, clearing the flag.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::replace(&mut self.redraw_needed, false)
    }
}
