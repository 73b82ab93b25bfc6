use std::collections::{HashMap, HashSet};

use super::tile::{Tile, TileCoord};
use super::view::ViewState;

/// Zoom-dependent resident tile budget.
///
/// The budget shrinks as the zoom factor rises and grows as it falls, so
/// peak memory stays bounded no matter how far the user zooms in. The band
/// cutoffs and multipliers are policy knobs, not constants baked into the
/// store.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileBudgetCurve {
    pub base_limit: usize,
    /// Band edges, ascending: below `low_cutoff` is the far-out band,
    /// above `high_cutoff` the far-in band.
    pub low_cutoff: f32,
    pub mid_cutoff: f32,
    pub high_cutoff: f32,
    pub far_out_mult: f32,
    pub out_mult: f32,
    pub in_mult: f32,
    pub far_in_mult: f32,
}

impl Default for TileBudgetCurve {
    fn default() -> Self {
        Self {
            base_limit: 500,
            low_cutoff: 0.1,
            mid_cutoff: 0.5,
            high_cutoff: 5.0,
            far_out_mult: 1.5,
            out_mult: 1.0,
            in_mult: 0.6,
            far_in_mult: 0.3,
        }
    }
}

impl TileBudgetCurve {
    /// Maximum resident tile count at the given zoom factor. Never below 1.
    pub fn max_tiles(&self, zoom: f32) -> usize {
        let mult = if zoom < self.low_cutoff {
            self.far_out_mult
        } else if zoom < self.mid_cutoff {
            self.out_mult
        } else if zoom <= self.high_cutoff {
            self.in_mult
        } else {
            self.far_in_mult
        };
        ((self.base_limit as f32 * mult) as usize).max(1)
    }
}

/// Sparse mapping from tile coordinates to exclusively-owned tiles.
///
/// Tiles are allocated lazily on the first write (`get_or_create`) and
/// reclaimed by an LRU eviction pass bounded by the zoom-dependent budget.
/// Read paths use `try_get`, which never allocates, so panning across
/// unpainted regions doesn't pollute memory with empty tiles.
pub struct TileStore {
    tiles: HashMap<TileCoord, Tile>,
    tile_size: u32,
    budget: TileBudgetCurve,
    /// Logical access clock; bumped on every mutating lookup.
    clock: u64,
    /// Allocations since the last eviction pass.
    alloc_counter: u32,
    /// Run an eviction pass after this many allocations even if nobody
    /// asked for one explicitly.
    cleanup_interval: u32,
}

impl TileStore {
    pub fn new(tile_size: u32, budget: TileBudgetCurve, cleanup_interval: u32) -> Self {
        Self {
            tiles: HashMap::new(),
            tile_size,
            budget,
            clock: 0,
            alloc_counter: 0,
            cleanup_interval: cleanup_interval.max(1),
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn budget(&self) -> &TileBudgetCurve {
        &self.budget
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Fetch the tile at `coord`, allocating an empty one if absent.
    /// Bumps the tile's LRU clock.
    pub fn get_or_create(&mut self, coord: TileCoord) -> &mut Tile {
        self.clock += 1;
        let clock = self.clock;
        let size = self.tile_size;
        let tile = self.tiles.entry(coord).or_insert_with(|| {
            Tile::new(size)
        });
        if tile.last_access == 0 && tile.is_empty() {
            // Freshly allocated this call.
            self.alloc_counter += 1;
        }
        tile.last_access = clock;
        tile
    }

    /// Read-only lookup; never allocates and never touches the LRU clock.
    pub fn try_get(&self, coord: TileCoord) -> Option<&Tile> {
        self.tiles.get(&coord)
    }

    /// True when enough allocations have happened since the last eviction
    /// pass that the caller should run [`TileStore::evict_if_needed`].
    pub fn eviction_due(&self) -> bool {
        self.alloc_counter >= self.cleanup_interval
    }

    /// Reclaim least-recently-used tiles until the resident count fits the
    /// budget for the current zoom. Tiles visible in `view` are never
    /// evicted; clean (non-dirty) tiles go first, and dirty tiles are only
    /// reclaimed if evicting every clean candidate wasn't enough. Returns
    /// the number of tiles dropped.
    pub fn evict_if_needed(&mut self, view: &ViewState) -> usize {
        self.alloc_counter = 0;
        let target = self.budget.max_tiles(view.zoom());
        if self.tiles.len() <= target {
            return 0;
        }

        let (min, max) = view.visible_tile_range(self.tile_size);
        let visible: HashSet<TileCoord> = (min.ty..=max.ty)
            .flat_map(|ty| (min.tx..=max.tx).map(move |tx| TileCoord::new(tx, ty)))
            .collect();

        // Oldest-first candidate list, clean tiles ahead of dirty ones.
        let mut candidates: Vec<(TileCoord, u64, bool)> = self
            .tiles
            .iter()
            .filter(|(coord, _)| !visible.contains(coord))
            .map(|(coord, tile)| (*coord, tile.last_access, tile.dirty))
            .collect();
        candidates.sort_by_key(|&(_, access, dirty)| (dirty, access));

        let mut dropped = 0;
        for (coord, _, _) in candidates {
            if self.tiles.len() <= target {
                break;
            }
            self.tiles.remove(&coord);
            dropped += 1;
        }
        dropped
    }

    /// Memory-pressure fallback: drop LRU tiles regardless of dirtiness or
    /// visibility until at most `target` remain. Only called when a normal
    /// eviction pass can't relieve pressure.
    pub fn evict_aggressively(&mut self, target: usize) -> usize {
        let mut candidates: Vec<(TileCoord, u64)> = self
            .tiles
            .iter()
            .map(|(coord, tile)| (*coord, tile.last_access))
            .collect();
        candidates.sort_by_key(|&(_, access)| access);

        let mut dropped = 0;
        for (coord, _) in candidates {
            if self.tiles.len() <= target {
                break;
            }
            self.tiles.remove(&coord);
            dropped += 1;
        }
        dropped
    }

    /// Drop every tile (new document / reload).
    pub fn clear(&mut self) {
        self.tiles.clear();
        self.clock = 0;
        self.alloc_counter = 0;
    }

    /// Coordinates of every resident tile.
    pub fn coords(&self) -> impl Iterator<Item = TileCoord> + '_ {
        self.tiles.keys().copied()
    }

    /// Resident tiles with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (TileCoord, &Tile)> {
        self.tiles.iter().map(|(c, t)| (*c, t))
    }

    /// Clear every tile's dirty flag (called after a composite pass).
    pub fn mark_composited(&mut self) {
        for tile in self.tiles.values_mut() {
            tile.dirty = false;
        }
    }

    /// Inclusive coordinate bounds of all painted (non-empty) tiles, or
    /// `None` if nothing has been painted.
    pub fn painted_bounds(&self) -> Option<(TileCoord, TileCoord)> {
        let mut bounds: Option<(TileCoord, TileCoord)> = None;
        for (coord, tile) in &self.tiles {
            if tile.is_empty() {
                continue;
            }
            bounds = Some(match bounds {
                None => (*coord, *coord),
                Some((min, max)) => (
                    TileCoord::new(min.tx.min(coord.tx), min.ty.min(coord.ty)),
                    TileCoord::new(max.tx.max(coord.tx), max.ty.max(coord.ty)),
                ),
            });
        }
        bounds
    }

    /// Insert a pre-built tile (project load / raster import). Replaces any
    /// resident tile at the same coordinate.
    pub fn insert(&mut self, coord: TileCoord, mut tile: Tile) {
        self.clock += 1;
        tile.last_access = self.clock;
        self.tiles.insert(coord, tile);
    }
}
