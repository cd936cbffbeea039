use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{math::Bounds, scene::GroupId};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum GridError {
    #[error("Invalid Cell Size: expected a positive cell size, got {0}")]
    InvalidCellSize(f32),
}

/// Uniform broad-phase grid over group bounding boxes. A group spanning
/// several cells is referenced from every one of them; a point query returns
/// candidates only, and callers must re-test with exact containment.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f32,
    cells: FxHashMap<glam::IVec2, SmallVec<[GroupId; 8]>>,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Result<SpatialGrid, GridError> {
        if !(cell_size > 0.) || !cell_size.is_finite() {
            return Err(GridError::InvalidCellSize(cell_size));
        }

        Ok(SpatialGrid {
            cell_size,
            cells: FxHashMap::default(),
        })
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    fn cell(&self, point: glam::Vec2) -> glam::IVec2 {
        (point / self.cell_size).floor().as_ivec2()
    }

    pub fn insert(&mut self, id: GroupId, bounds: Bounds) {
        let min = self.cell(bounds.min);
        let max = self.cell(bounds.max);

        log::trace!("Inserting {id:?} into cells {min}..={max}");

        for y in min.y..=max.y {
            for x in min.x..=max.x {
                self.cells
                    .entry(glam::ivec2(x, y))
                    .or_default()
                    .push(id);
            }
        }
    }

    pub fn query(&self, point: glam::Vec2) -> &[GroupId] {
        self.cells
            .get(&self.cell(point))
            .map(|bucket| bucket.as_slice())
            .unwrap_or(&[])
    }
}
