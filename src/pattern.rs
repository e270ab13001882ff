//! Rectangular 0/1 patterns and their placement onto the torus.

use thiserror::Error;

use crate::topology::index_of;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern has no cells")]
    Empty,
    #[error("pattern row {row} has {len} cells, expected {expected}")]
    Ragged {
        row: usize,
        len: usize,
        expected: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    Block,
    Blinker,
    Toad,
    Beacon,
    Glider,
    LightweightSpaceship,
    RPentomino,
    Acorn,
}

impl Preset {
    pub const ALL: [Preset; 8] = [
        Preset::Block,
        Preset::Blinker,
        Preset::Toad,
        Preset::Beacon,
        Preset::Glider,
        Preset::LightweightSpaceship,
        Preset::RPentomino,
        Preset::Acorn,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Block => "Block",
            Preset::Blinker => "Blinker",
            Preset::Toad => "Toad",
            Preset::Beacon => "Beacon",
            Preset::Glider => "Glider",
            Preset::LightweightSpaceship => "Lightweight Spaceship",
            Preset::RPentomino => "R-pentomino",
            Preset::Acorn => "Acorn",
        }
    }

    fn rows(self) -> &'static [&'static str] {
        match self {
            Preset::Block => &["OO", "OO"],
            Preset::Blinker => &["OOO"],
            Preset::Toad => &[".OOO", "OOO."],
            Preset::Beacon => &["OO..", "OO..", "..OO", "..OO"],
            Preset::Glider => &[".O.", "..O", "OOO"],
            Preset::LightweightSpaceship => &[".O..O", "O....", "O...O", "OOOO."],
            Preset::RPentomino => &[".OO", "OO.", ".O."],
            Preset::Acorn => &[".O.....", "...O...", "OO..OOO"],
        }
    }
}

/// A non-empty rectangle of cells, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl Pattern {
    /// Build from rows of 0/1 values; any nonzero value is alive.
    pub fn from_rows<R: AsRef<[u8]>>(rows: &[R]) -> Result<Self, PatternError> {
        let width = rows.first().map_or(0, |r| r.as_ref().len());
        if width == 0 {
            return Err(PatternError::Empty);
        }
        let mut cells = Vec::with_capacity(width * rows.len());
        for (row, values) in rows.iter().enumerate() {
            let values = values.as_ref();
            if values.len() != width {
                return Err(PatternError::Ragged {
                    row,
                    len: values.len(),
                    expected: width,
                });
            }
            cells.extend(values.iter().map(|&v| v != 0));
        }
        Ok(Self {
            width,
            height: rows.len(),
            cells,
        })
    }

    pub fn preset(preset: Preset) -> Self {
        let rows = preset.rows();
        let width = rows[0].len();
        let cells = rows
            .iter()
            .flat_map(|row| row.bytes().map(|b| b == b'O'))
            .collect();
        Self {
            width,
            height: rows.len(),
            cells,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn population(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// `(row, col)` offsets of alive cells.
    pub fn alive_offsets(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|&(_, &alive)| alive)
            .map(|(i, _)| (i / self.width, i % self.width))
    }

    /// Absolute indices of alive cells with the pattern centred on
    /// `(row, col)` of a `size × size` torus. Offsets past an edge wrap.
    pub fn cells_at(&self, row: u32, col: u32, size: u32) -> Vec<u32> {
        if size == 0 {
            return Vec::new();
        }
        let size_i = i64::from(size);
        let start_row = i64::from(row) + 1 - self.height.div_ceil(2) as i64;
        let start_col = i64::from(col) + 1 - self.width.div_ceil(2) as i64;
        self.alive_offsets()
            .map(|(dr, dc)| {
                let r = (start_row + dr as i64).rem_euclid(size_i) as u32;
                let c = (start_col + dc as i64).rem_euclid(size_i) as u32;
                index_of(r, c, size)
            })
            .collect()
    }
}
