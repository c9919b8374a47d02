use std::collections::HashSet;

use crate::gpu::TextureId;
use crate::map::MapSource;
use crate::renderer::pipeline::TileVertex;
use crate::sprites::{Quad, SpriteSource};

/// Vertices per unit quad.
pub const UNIT_VERTICES: u32 = 4;
/// Indices per unit quad (two triangles).
pub const UNIT_INDICES: usize = 6;

// ── Unit ──────────────────────────────────────────────────────────────────────

/// One drawable instance inside a [`Bucket`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Unit {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub texture: TextureId,
    first_vertex: u32,
}

impl Unit {
    /// World-space bounding box `[x1, y1, x2, y2]`.
    pub fn bounds(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    pub fn first_vertex(&self) -> u32 {
        self.first_vertex
    }

    /// Append this unit's two triangles (bottom-left, bottom-right, top-right,
    /// then top-right, top-left, bottom-left).
    pub fn push_indices(&self, indices: &mut Vec<u32>) {
        let v = self.first_vertex;
        indices.extend_from_slice(&[v, v + 1, v + 2, v + 2, v + 3, v]);
    }
}

// ── Placeholder ───────────────────────────────────────────────────────────────

/// Stand-in used for sprites the provider cannot resolve.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Placeholder {
    pub texture: TextureId,
    pub width: f32,
    pub height: f32,
}

impl Placeholder {
    /// Checker texture sized to one map tile.
    pub fn tile(tile_size: u32) -> Self {
        let size = tile_size as f32;
        Self { texture: TextureId::PLACEHOLDER, width: size, height: size }
    }
}

impl Default for Placeholder {
    fn default() -> Self {
        Self::tile(crate::DEFAULT_TILE_SIZE)
    }
}

// ── Bucket ────────────────────────────────────────────────────────────────────

/// Flattened vertex data and per-unit bookkeeping for one loaded map.
///
/// Units keep the map's draw order and unit `i` owns vertices
/// `4i .. 4i + 4`.  Nothing is uploaded here.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bucket {
    vertices: Vec<TileVertex>,
    units: Vec<Unit>,
    missing: usize,
}

impl Bucket {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Walk every placement of `map` once.
    ///
    /// A sprite `sprites` cannot resolve still produces a unit, drawn with
    /// `placeholder`; each distinct missing name is logged once.
    pub fn build<M, S>(map: &M, sprites: &S, placeholder: &Placeholder) -> Self
    where
        M: MapSource + ?Sized,
        S: SpriteSource + ?Sized,
    {
        let mut bucket = Self::empty();
        let mut unresolved: HashSet<&str> = HashSet::new();

        for p in map.placements() {
            let resolved = sprites.texture(p.sprite).zip(sprites.quad(p.sprite));
            let (texture, quad) = match resolved {
                Some(found) => found,
                None => {
                    if unresolved.insert(p.sprite) {
                        log::warn!("[bucket] unresolved sprite '{}'; using placeholder", p.sprite);
                    }
                    bucket.missing += 1;
                    (placeholder.texture, Quad::full(placeholder.width, placeholder.height))
                }
            };
            bucket.push(p.x, p.y, texture, quad, p.tint.0);
        }

        log::debug!(
            "[bucket] built {} units ({} vertices, {} unresolved)",
            bucket.units.len(),
            bucket.vertices.len(),
            bucket.missing
        );
        bucket
    }

    fn push(&mut self, x: f32, y: f32, texture: TextureId, quad: Quad, color: [f32; 4]) {
        let (x1, y1) = (x, y);
        let (x2, y2) = (x + quad.width, y + quad.height);
        // Texture rows run top-down, world y runs bottom-up.
        let [u1, v1] = quad.uv_min;
        let [u2, v2] = quad.uv_max;

        let first_vertex = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&[
            TileVertex { position: [x1, y1], color, uv: [u1, v2] },
            TileVertex { position: [x2, y1], color, uv: [u2, v2] },
            TileVertex { position: [x2, y2], color, uv: [u2, v1] },
            TileVertex { position: [x1, y2], color, uv: [u1, v1] },
        ]);
        self.units.push(Unit { x1, y1, x2, y2, texture, first_vertex });
    }

    pub fn vertices(&self) -> &[TileVertex] {
        &self.vertices
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Units drawn with the placeholder because their sprite was unresolved.
    pub fn missing(&self) -> usize {
        self.missing
    }

    /// Indices needed when every unit is visible at once.
    pub fn index_capacity(&self) -> usize {
        self.units.len() * UNIT_INDICES
    }

    /// Number of distinct textures referenced.
    pub fn texture_count(&self) -> usize {
        self.units.iter().map(|u| u.texture).collect::<HashSet<_>>().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_at(first_vertex: u32) -> Unit {
        Unit { x1: 0.0, y1: 0.0, x2: 1.0, y2: 1.0, texture: TextureId(1), first_vertex }
    }

    #[test]
    fn push_indices_offsets_by_first_vertex() {
        let mut out = Vec::new();
        unit_at(8).push_indices(&mut out);
        assert_eq!(out, vec![8, 9, 10, 10, 11, 8]);
    }

    #[test]
    fn push_indices_appends() {
        let mut out = vec![0, 1, 2, 2, 3, 0];
        unit_at(4).push_indices(&mut out);
        assert_eq!(out.len(), 12);
        assert_eq!(&out[6..], &[4, 5, 6, 6, 7, 4]);
    }

    #[test]
    fn placeholder_tile_is_square() {
        let p = Placeholder::tile(16);
        assert_eq!((p.width, p.height), (16.0, 16.0));
        assert_eq!(p.texture, TextureId::PLACEHOLDER);
    }
}
