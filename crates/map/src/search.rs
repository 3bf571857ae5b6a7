//! Bookkeeping of requested tiles and the ring search that picks the next one.

use std::collections::HashSet;

use crate::tile::TileIndex;

/// Tiles already requested during the current zoom session.
///
/// Indices are zoom-relative, so the set is bound to one zoom level and must be
/// [`reset`](LoadedTileSet::reset) wholesale when the zoom changes.
#[derive(Debug, Clone, Default)]
pub struct LoadedTileSet {
    zoom: u8,
    tiles: HashSet<TileIndex>,
}

impl LoadedTileSet {
    pub fn new(zoom: u8) -> Self {
        Self {
            zoom,
            tiles: HashSet::new(),
        }
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn contains(&self, index: &TileIndex) -> bool {
        self.tiles.contains(index)
    }

    /// Records `index` as requested. Returns `false` if it already was.
    pub fn insert(&mut self, index: TileIndex) -> bool {
        assert_eq!(
            index.zoom, self.zoom,
            "tile {index} does not belong to zoom session {}",
            self.zoom
        );
        self.tiles.insert(index)
    }

    /// Forgets every tile and rebinds the set to `zoom`.
    pub fn reset(&mut self, zoom: u8) {
        self.zoom = zoom;
        self.tiles.clear();
    }

    /// Nearest tile around `reference` that has not been requested yet.
    ///
    /// Rings are visited by increasing Chebyshev distance up to
    /// `sight_distance`. Inside a ring, cells come in `(dx, dy)` lexicographic
    /// order, which is the order a full square scan would report them in since
    /// every inner ring is already known to be loaded. Cells falling off the
    /// map are never candidates.
    pub fn find_next(&self, reference: TileIndex, sight_distance: u32) -> Option<TileIndex> {
        let sight_distance = sight_distance as i64;

        (0..=sight_distance)
            .flat_map(ring_offsets)
            .filter_map(|(dx, dy)| reference.offset(dx, dy))
            .find(|candidate| !self.contains(candidate))
    }

    /// Finds the next tile and marks it loaded in the same step, so a fetch in
    /// flight can never be selected twice.
    pub fn claim_next(&mut self, reference: TileIndex, sight_distance: u32) -> Option<TileIndex> {
        let next = self.find_next(reference, sight_distance)?;
        self.insert(next);
        Some(next)
    }
}

/// Offsets on the boundary of the square ring at `distance`.
///
/// The outer columns are walked in full, inner columns only yield their top
/// and bottom cells.
fn ring_offsets(distance: i64) -> impl Iterator<Item = (i64, i64)> {
    (-distance..=distance).flat_map(move |dx| {
        // Inner columns only exist for distance > 0, so the step is at least 2
        let step = if dx.abs() == distance { 1 } else { (2 * distance) as usize };
        (-distance..=distance).step_by(step).map(move |dy| (dx, dy))
    })
}
