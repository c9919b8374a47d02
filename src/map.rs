//! Map state consumed by the batch builder.
//!
//! The builder only needs an ordered stream of [`Placement`]s.  [`TileMap`] is
//! the grid snapshot the viewer loads; it flattens its cells into the map's
//! layering order.

use std::cmp::Reverse;
use std::path::Path;

use serde::Deserialize;

use crate::color::Color;
use crate::error::LoadError;

// ── Placement ─────────────────────────────────────────────────────────────────

/// One sprite instance at a world pixel position (y up, bottom-left origin).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Placement<'a> {
    pub x: f32,
    pub y: f32,
    pub sprite: &'a str,
    pub tint: Color,
}

/// Read-only source of placements, iterated back-to-front.
pub trait MapSource {
    fn placements(&self) -> impl Iterator<Item = Placement<'_>>;
}

// ── Instance ──────────────────────────────────────────────────────────────────

/// Free-standing placed sprite; a slice of these is already in draw order.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Instance {
    pub x: f32,
    pub y: f32,
    pub sprite: String,
    #[serde(default)]
    pub tint: Color,
}

impl Instance {
    pub fn new(x: f32, y: f32, sprite: &str) -> Self {
        Self { x, y, sprite: sprite.to_string(), tint: Color::WHITE }
    }
}

impl MapSource for [Instance] {
    fn placements(&self) -> impl Iterator<Item = Placement<'_>> {
        self.iter().map(|i| Placement { x: i.x, y: i.y, sprite: &i.sprite, tint: i.tint })
    }
}

// ── TileMap ───────────────────────────────────────────────────────────────────

fn default_tile_size() -> u32 {
    crate::DEFAULT_TILE_SIZE
}

/// An object stacked on a tile.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TileObject {
    pub sprite: String,
    /// Draw layer; higher layers are drawn on top.
    #[serde(default)]
    pub layer: f32,
    #[serde(default)]
    pub tint: Color,
    /// Pixel offset from the tile's bottom-left corner.
    #[serde(default)]
    pub offset: [f32; 2],
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Cell {
    pub x: u32,
    pub y: u32,
    #[serde(default)]
    pub objects: Vec<TileObject>,
}

/// Snapshot of a tile grid.  Only occupied cells are stored.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TileMap {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    #[serde(default)]
    pub cells: Vec<Cell>,
}

impl TileMap {
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        Self { width, height, tile_size, cells: Vec::new() }
    }

    /// Parse a map snapshot, dropping cells that lie outside the grid.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut map: TileMap = serde_json::from_str(json)?;
        let (w, h) = (map.width, map.height);
        map.cells.retain(|c| {
            let inside = c.x < w && c.y < h;
            if !inside {
                log::warn!("[map] cell ({}, {}) outside {}x{} grid; dropped", c.x, c.y, w, h);
            }
            inside
        });
        Ok(map)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let json = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }

    /// Stack `object` on top of tile `(x, y)`.
    pub fn push(&mut self, x: u32, y: u32, object: TileObject) {
        match self.cells.iter_mut().find(|c| c.x == x && c.y == y) {
            Some(cell) => cell.objects.push(object),
            None => self.cells.push(Cell { x, y, objects: vec![object] }),
        }
    }

    pub fn object_count(&self) -> usize {
        self.cells.iter().map(|c| c.objects.len()).sum()
    }
}

impl MapSource for TileMap {
    /// Layering rule: ascending layer, then rows top to bottom (so lower rows
    /// overlap the ones behind them), then columns left to right, then stack
    /// order within a tile.
    fn placements(&self) -> impl Iterator<Item = Placement<'_>> {
        let mut order: Vec<(usize, usize)> = self
            .cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.x < self.width && c.y < self.height)
            .flat_map(|(ci, c)| (0..c.objects.len()).map(move |oi| (ci, oi)))
            .collect();

        order.sort_by(|&(ca, oa), &(cb, ob)| {
            let (a, b) = (&self.cells[ca], &self.cells[cb]);
            a.objects[oa]
                .layer
                .total_cmp(&b.objects[ob].layer)
                .then_with(|| Reverse(a.y).cmp(&Reverse(b.y)))
                .then_with(|| a.x.cmp(&b.x))
                .then_with(|| ca.cmp(&cb))
                .then_with(|| oa.cmp(&ob))
        });

        let tile = self.tile_size as f32;
        order.into_iter().map(move |(ci, oi)| {
            let cell = &self.cells[ci];
            let obj = &cell.objects[oi];
            Placement {
                x: cell.x as f32 * tile + obj.offset[0],
                y: cell.y as f32 * tile + obj.offset[1],
                sprite: &obj.sprite,
                tint: obj.tint,
            }
        })
    }
}
