//! Toroidal Moore neighbourhood for a square grid addressed by flat index.
//!
//! Neighbours are always returned in the order NW, N, NE, W, E, SW, S, SE.
//! Both engines walk this order when seeding the frontier, so keeping it fixed
//! keeps their diffs identical.

/// Number of neighbours of every cell on the torus.
pub const NEIGHBOR_COUNT: usize = 8;

#[inline(always)]
pub fn row_col(index: u32, size: u32) -> (u32, u32) {
    (index / size, index % size)
}

#[inline(always)]
pub fn index_of(row: u32, col: u32, size: u32) -> u32 {
    row * size + col
}

/// Number of cells on a `size × size` grid, or `None` when the index space
/// does not fit in a `u32`.
#[inline]
pub fn cell_count(size: u32) -> Option<u64> {
    let cells = u64::from(size) * u64::from(size);
    (cells <= u64::from(u32::MAX) + 1).then_some(cells)
}

/// The 8 wraparound neighbours of `index` on a `size × size` torus.
#[inline(always)]
pub fn neighbors(index: u32, size: u32) -> [u32; NEIGHBOR_COUNT] {
    debug_assert!(size > 0);
    let max = size - 1;
    let (row, col) = row_col(index, size);

    let row_prev = if row == 0 { max } else { row - 1 };
    let row_next = if row == max { 0 } else { row + 1 };
    let col_prev = if col == 0 { max } else { col - 1 };
    let col_next = if col == max { 0 } else { col + 1 };

    [
        index_of(row_prev, col_prev, size),
        index_of(row_prev, col, size),
        index_of(row_prev, col_next, size),
        index_of(row, col_prev, size),
        index_of(row, col_next, size),
        index_of(row_next, col_prev, size),
        index_of(row_next, col, size),
        index_of(row_next, col_next, size),
    ]
}
