use glam::Vec3;
use gridrealm_common::BoundingBox;

/// Integer coordinate of a cell inside one grid.
///
/// Ordering is lexicographic on (x, y, z); interest areas rely on it to keep
/// their cell sets sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl CellCoord {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl std::fmt::Display for CellCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{},{}]", self.x, self.y, self.z)
    }
}

/// Cells are created by the grid, once, from their coordinate.
pub trait GridCell {
    fn at(coord: CellCoord) -> Self;
}

/// Plain cell carrying only its coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicCell {
    pub coord: CellCoord,
}

impl GridCell for BasicCell {
    fn at(coord: CellCoord) -> Self {
        Self { coord }
    }
}

/// Errors from grid construction.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("tile size must be positive on every axis, got {0}")]
    InvalidTileSize(Vec3),
    #[error("grid volume must have positive size on every axis, got {0}")]
    InvalidArea(BoundingBox),
    #[error("grid would need {tiles} tiles, more than the limit of {limit} cells")]
    TooManyCells { tiles: Vec3, limit: usize },
}

/// Upper bound on the cells of one grid.
pub const MAX_CELLS: usize = 1 << 24;

/// Dense partition of a bounding volume into fixed-size tiles.
///
/// Tile counts are `ceil(size / tile)` per axis, so a volume that is not an
/// exact multiple of the tile size is covered by a wider boundary tile.
/// Lookups are half-open: the max boundary of the volume belongs to no cell.
/// Only cell contents change after construction.
#[derive(Debug, Clone)]
pub struct Grid<C> {
    area: BoundingBox,
    tile: Vec3,
    counts: [i32; 3],
    cells: Vec<C>,
}

impl<C: GridCell> Grid<C> {
    pub fn new(area: BoundingBox, tile: Vec3) -> Result<Self, GridError> {
        if !tile.cmpgt(Vec3::ZERO).all() {
            return Err(GridError::InvalidTileSize(tile));
        }
        if !area.size().cmpgt(Vec3::ZERO).all() {
            return Err(GridError::InvalidArea(area));
        }

        let tiles = (area.size() / tile).ceil();
        // float casts saturate, so an absurd axis still fails the product check
        let total = (tiles.x as usize)
            .checked_mul(tiles.y as usize)
            .and_then(|n| n.checked_mul(tiles.z as usize))
            .filter(|&n| n <= MAX_CELLS)
            .ok_or(GridError::TooManyCells {
                tiles,
                limit: MAX_CELLS,
            })?;
        // every axis is at most MAX_CELLS here
        let counts = [tiles.x as i32, tiles.y as i32, tiles.z as i32];

        let mut cells = Vec::with_capacity(total);
        for x in 0..counts[0] {
            for y in 0..counts[1] {
                for z in 0..counts[2] {
                    cells.push(C::at(CellCoord::new(x, y, z)));
                }
            }
        }

        Ok(Self {
            area,
            tile,
            counts,
            cells,
        })
    }
}

impl<C> Grid<C> {
    /// The partitioned volume.
    pub fn area(&self) -> &BoundingBox {
        &self.area
    }

    pub fn tile_size(&self) -> Vec3 {
        self.tile
    }

    /// Tile count per axis.
    pub fn counts(&self) -> (i32, i32, i32) {
        (self.counts[0], self.counts[1], self.counts[2])
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn index(&self, coord: CellCoord) -> Option<usize> {
        let [tx, ty, tz] = self.counts;
        let inside = (0..tx).contains(&coord.x) && (0..ty).contains(&coord.y) && (0..tz).contains(&coord.z);
        inside.then(|| ((coord.x * ty + coord.y) * tz + coord.z) as usize)
    }

    /// Cell at an integer coordinate; `None` outside `[0, count)` on any axis.
    pub fn cell(&self, coord: CellCoord) -> Option<&C> {
        self.index(coord).map(|i| &self.cells[i])
    }

    pub fn cell_mut(&mut self, coord: CellCoord) -> Option<&mut C> {
        self.index(coord).map(|i| &mut self.cells[i])
    }

    /// Coordinate of the cell containing `position`, `None` outside the volume.
    pub fn coord_at(&self, position: Vec3) -> Option<CellCoord> {
        let local = position - self.area.min;
        let size = self.area.size();
        if !(local.cmpge(Vec3::ZERO).all() && local.cmplt(size).all()) {
            return None;
        }
        let t = (local / self.tile).floor();
        // Float rounding right below the max boundary must not step past the last tile.
        Some(CellCoord::new(
            (t.x as i32).min(self.counts[0] - 1),
            (t.y as i32).min(self.counts[1] - 1),
            (t.z as i32).min(self.counts[2] - 1),
        ))
    }

    /// Cell containing `position`, `None` outside the volume.
    pub fn cell_at(&self, position: Vec3) -> Option<&C> {
        self.coord_at(position).and_then(|c| self.cell(c))
    }

    /// Coordinates of every cell overlapping `area`, in ascending order.
    ///
    /// The query box is first intersected with the grid volume; an empty
    /// intersection yields no cells.
    pub fn coords_in(&self, area: &BoundingBox) -> Vec<CellCoord> {
        let overlap = self.area.intersect(area);
        if !overlap.is_valid() {
            return Vec::new();
        }
        let lo = ((overlap.min - self.area.min) / self.tile).floor();
        let hi = ((overlap.max - self.area.min) / self.tile).ceil();

        let x0 = (lo.x as i32).max(0);
        let x1 = (hi.x as i32).min(self.counts[0]);
        let y0 = (lo.y as i32).max(0);
        let y1 = (hi.y as i32).min(self.counts[1]);
        let z0 = (lo.z as i32).max(0);
        let z1 = (hi.z as i32).min(self.counts[2]);

        let mut result = Vec::new();
        for x in x0..x1 {
            for y in y0..y1 {
                for z in z0..z1 {
                    result.push(CellCoord::new(x, y, z));
                }
            }
        }
        result
    }

    /// Every cell overlapping `area`.
    pub fn cells_in(&self, area: &BoundingBox) -> Vec<&C> {
        self.coords_in(area)
            .into_iter()
            .filter_map(|c| self.cell(c))
            .collect()
    }

    /// World-space box covered by a cell. The last tile on an axis may extend
    /// past the volume.
    pub fn cell_bounds(&self, coord: CellCoord) -> BoundingBox {
        let min = self.area.min
            + Vec3::new(coord.x as f32, coord.y as f32, coord.z as f32) * self.tile;
        BoundingBox::new(min, min + self.tile)
    }

    pub fn iter(&self) -> impl Iterator<Item = &C> {
        self.cells.iter()
    }
}
