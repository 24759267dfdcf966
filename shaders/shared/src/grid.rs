//! The uniform spatial grid: cell math and a host-side view of the linked lists built on the GPU.
//!
//! Every cell holds the index of its first particle, and every particle holds the index of the
//! next particle in the same cell. `SENTINEL` ends a list and marks an empty cell.

use glam::{IVec2, Vec2};

use crate::constants::{CELL_SIZE, SENTINEL, X_BOUND, Y_BOUND};

/// Number of grid columns covering `[-X_BOUND, X_BOUND]`
#[must_use]
#[inline]
pub fn columns() -> u32 {
    cells_along(X_BOUND)
}

/// Number of grid rows covering `[-Y_BOUND, Y_BOUND]`
#[must_use]
#[inline]
pub fn rows() -> u32 {
    cells_along(Y_BOUND)
}

/// Total number of cells, `floor(2·xBound/cellSize + 1) × floor(2·yBound/cellSize + 1)`
#[must_use]
#[inline]
pub fn cell_count() -> u32 {
    columns().saturating_mul(rows())
}

/// `floor(2 * bound / CELL_SIZE + 1)`
#[expect(clippy::as_conversions, reason = "Grid dimensions are small and positive")]
#[expect(clippy::cast_possible_truncation, reason = "Grid dimensions are small")]
#[expect(clippy::cast_sign_loss, reason = "Bounds are positive")]
fn cells_along(bound: f32) -> u32 {
    (2.0 * f64::from(bound) / f64::from(CELL_SIZE)).floor() as u32 + 1
}

/// Cell coordinates of a position, clamped into the grid so that every particle lands in a cell.
#[must_use]
#[inline]
#[expect(clippy::as_conversions, reason = "Float to int is the point of this function")]
#[expect(clippy::cast_possible_truncation, reason = "Clamped to the grid right after")]
#[expect(clippy::cast_possible_wrap, reason = "Grid dimensions are small")]
pub fn cell_coords(position: Vec2) -> IVec2 {
    let column = ((position.x + X_BOUND) / CELL_SIZE).floor() as i32;
    let row = ((position.y + Y_BOUND) / CELL_SIZE).floor() as i32;
    IVec2::new(
        column.clamp(0, columns() as i32 - 1),
        row.clamp(0, rows() as i32 - 1),
    )
}

/// Flat index of the cell containing `position`
#[must_use]
#[inline]
#[expect(clippy::as_conversions, reason = "Coordinates are clamped to be non-negative")]
#[expect(clippy::cast_sign_loss, reason = "Coordinates are clamped to be non-negative")]
pub fn cell_index(position: Vec2) -> u32 {
    let coords = cell_coords(position);
    (coords.y as u32) * columns() + coords.x as u32
}

/// A host-side copy of the grid buffers
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[expect(clippy::exhaustive_structs, reason = "Plain data")]
pub struct GridSnapshot {
    /// First particle of every cell
    pub heads: Vec<i32>,
    /// Next particle in the same cell, per particle
    pub next: Vec<i32>,
}

impl GridSnapshot {
    /// Has every cell and every link been reset to `SENTINEL`?
    #[must_use]
    #[inline]
    pub fn is_cleared(&self) -> bool {
        self.heads.iter().chain(&self.next).all(|&entry| entry == SENTINEL)
    }

    /// Walk the list of a single cell. `None` if it points outside the particles or loops.
    #[must_use]
    #[inline]
    pub fn cell_members(&self, cell: usize) -> Option<Vec<u32>> {
        let mut members = Vec::new();
        let mut current = *self.heads.get(cell)?;
        while current != SENTINEL {
            let index = usize::try_from(current).ok()?;
            if members.len() >= self.next.len() {
                return None;
            }
            members.push(u32::try_from(index).ok()?);
            current = *self.next.get(index)?;
        }
        Some(members)
    }

    /// Every particle index reachable from any cell, in walk order. `None` if any list is broken.
    #[must_use]
    #[inline]
    pub fn members(&self) -> Option<Vec<u32>> {
        let mut all = Vec::new();
        for cell in 0..self.heads.len() {
            all.extend(self.cell_members(cell)?);
        }
        Some(all)
    }

    /// Do the lists partition the particles, every index exactly once?
    #[must_use]
    #[inline]
    pub fn is_partition(&self) -> bool {
        let Some(mut members) = self.members() else {
            return false;
        };
        members.sort_unstable();
        members.len() == self.next.len()
            && members
                .iter()
                .zip(0_u32..)
                .all(|(&member, expected)| member == expected)
    }

    /// How many cells hold at least one particle
    #[must_use]
    #[inline]
    pub fn occupied_cells(&self) -> usize {
        self.heads.iter().filter(|&&head| head != SENTINEL).count()
    }
}

#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_dimensions_follow_the_world_bounds() {
        assert_eq!(columns(), 101);
        assert_eq!(rows(), 51);
        assert_eq!(cell_count(), 5151);
    }

    #[test]
    fn calculating_a_cell_in_the_bottom_left_corner() {
        assert_eq!(cell_coords(Vec2::new(-X_BOUND, -Y_BOUND)), IVec2::new(0, 0));
        assert_eq!(cell_index(Vec2::new(-1.99, -0.99)), 0);
    }

    #[test]
    fn calculating_a_cell_at_the_origin() {
        assert_eq!(cell_coords(Vec2::ZERO), IVec2::new(50, 25));
        assert_eq!(cell_index(Vec2::ZERO), 25 * 101 + 50);
    }

    #[test]
    fn positions_outside_the_world_are_clamped_into_edge_cells() {
        assert_eq!(cell_coords(Vec2::new(-10.0, 10.0)), IVec2::new(0, 50));
        assert_eq!(cell_coords(Vec2::new(10.0, -10.0)), IVec2::new(100, 0));
        assert!(cell_index(Vec2::new(100.0, 100.0)) < cell_count());
    }

    #[test]
    fn a_cleared_grid_has_no_members() {
        let snapshot = GridSnapshot {
            heads: vec![SENTINEL; 4],
            next: vec![SENTINEL; 3],
        };
        assert!(snapshot.is_cleared());
        assert_eq!(snapshot.members(), Some(Vec::new()));
        assert!(!snapshot.is_partition());
    }

    #[test]
    fn walking_lists_that_partition_the_particles() {
        // Cell 0: 2 -> 0, cell 2: 1
        let snapshot = GridSnapshot {
            heads: vec![2, SENTINEL, 1],
            next: vec![SENTINEL, SENTINEL, 0],
        };
        assert_eq!(snapshot.cell_members(0), Some(vec![2, 0]));
        assert_eq!(snapshot.members(), Some(vec![2, 0, 1]));
        assert!(snapshot.is_partition());
        assert_eq!(snapshot.occupied_cells(), 2);
    }

    #[test]
    fn a_looping_list_is_not_a_partition() {
        let snapshot = GridSnapshot {
            heads: vec![0],
            next: vec![1, 0],
        };
        assert_eq!(snapshot.members(), None);
        assert!(!snapshot.is_partition());
    }

    #[test]
    fn a_particle_in_two_cells_is_not_a_partition() {
        let snapshot = GridSnapshot {
            heads: vec![0, 0],
            next: vec![SENTINEL, SENTINEL],
        };
        assert!(!snapshot.is_partition());
    }
}
