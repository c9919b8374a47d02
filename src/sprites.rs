//! Sprite/texture provider consumed by the batch builder.

use std::collections::HashMap;
use std::path::Path;

use crate::error::RenderError;
use crate::gpu::{Gpu, TextureId};

// ── Quad ──────────────────────────────────────────────────────────────────────

/// Pixel size of a sprite plus its UV rectangle inside its texture.
/// `uv_min` is the texel-space top-left corner.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Quad {
    pub width: f32,
    pub height: f32,
    pub uv_min: [f32; 2],
    pub uv_max: [f32; 2],
}

impl Quad {
    /// Quad covering a whole texture.
    pub fn full(width: f32, height: f32) -> Self {
        Self { width, height, uv_min: [0.0, 0.0], uv_max: [1.0, 1.0] }
    }
}

/// Resolves sprite references to resident textures and quad geometry.
/// Answers must stay stable for the lifetime of a loaded batch.
pub trait SpriteSource {
    fn texture(&self, sprite: &str) -> Option<TextureId>;
    fn quad(&self, sprite: &str) -> Option<Quad>;
}

// ── Frame slicing (pure, GPU-free) ────────────────────────────────────────────

/// Pixel rectangle of one frame inside a sprite sheet.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Cut a `sheet_w × sheet_h` sheet into `frame_w × frame_h` frames, row-major.
///
/// Partial frames on the right and bottom edges are ignored.  A sheet smaller
/// than one frame in either direction becomes a single frame of its own size.
pub fn slice_frames(sheet_w: u32, sheet_h: u32, frame_w: u32, frame_h: u32) -> Vec<FrameRect> {
    if frame_w == 0 || frame_h == 0 || sheet_w < frame_w || sheet_h < frame_h {
        return vec![FrameRect { x: 0, y: 0, w: sheet_w, h: sheet_h }];
    }
    let cols = sheet_w / frame_w;
    let rows = sheet_h / frame_h;
    (0..rows)
        .flat_map(|row| {
            (0..cols).map(move |col| FrameRect { x: col * frame_w, y: row * frame_h, w: frame_w, h: frame_h })
        })
        .collect()
}

/// Quad for `frame` inside a `sheet_w × sheet_h` texture.
pub fn frame_quad(frame: FrameRect, sheet_w: u32, sheet_h: u32) -> Quad {
    let (sw, sh) = (sheet_w as f32, sheet_h as f32);
    Quad {
        width: frame.w as f32,
        height: frame.h as f32,
        uv_min: [frame.x as f32 / sw, frame.y as f32 / sh],
        uv_max: [(frame.x + frame.w) as f32 / sw, (frame.y + frame.h) as f32 / sh],
    }
}

// ── SpriteStore ───────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SpriteData {
    pub texture: TextureId,
    pub quad: Quad,
}

/// Named sprites backed by uploaded textures.
///
/// A sheet loaded from `walls.png` exposes frame `n` as `walls:n`; `walls`
/// alone is frame 0.  Frames of one sheet share a texture, so neighbouring
/// tiles cut from it batch into one draw call.
#[derive(Default, Debug)]
pub struct SpriteStore {
    sprites: HashMap<String, SpriteData>,
    sheets: usize,
}

impl SpriteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, texture: TextureId, quad: Quad) {
        self.sprites.insert(name.to_string(), SpriteData { texture, quad });
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    /// Number of sheets (textures) registered through [`add_sheet`](Self::add_sheet).
    pub fn sheet_count(&self) -> usize {
        self.sheets
    }

    /// Upload `image` as one texture and register its frames under `stem`.
    ///
    /// Nothing is registered when the backend rejects the upload.
    pub fn add_sheet<G: Gpu>(
        &mut self,
        gpu: &mut G,
        stem: &str,
        image: &image::RgbaImage,
        frame_w: u32,
        frame_h: u32,
    ) -> Result<TextureId, RenderError> {
        let texture = gpu.upload_texture(image)?;
        let (sheet_w, sheet_h) = image.dimensions();
        for (i, frame) in slice_frames(sheet_w, sheet_h, frame_w, frame_h).into_iter().enumerate() {
            let quad = frame_quad(frame, sheet_w, sheet_h);
            if i == 0 {
                self.insert(stem, texture, quad);
            }
            self.insert(&format!("{stem}:{i}"), texture, quad);
        }
        self.sheets += 1;
        Ok(texture)
    }

    /// Scan `path` recursively for `.png` sheets and upload each one.
    ///
    /// Duplicate file stems keep the first sheet found; unreadable files and
    /// sheets the backend cannot hold are logged and skipped.  A missing folder yields an empty store.
    pub fn load_folder<G: Gpu>(gpu: &mut G, path: impl AsRef<Path>, frame_w: u32, frame_h: u32) -> Self {
        let path = path.as_ref();
        let mut store = Self::new();

        let mut files: Vec<walkdir::DirEntry> = walkdir::WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("png"))
            .collect();
        // Deterministic texture ids regardless of directory iteration order.
        files.sort_by(|a, b| a.path().cmp(b.path()));

        for entry in files {
            let file_path = entry.path();
            let stem = match file_path.file_stem().and_then(|s| s.to_str()) {
                Some(s) if !s.is_empty() => s.to_string(),
                _ => continue,
            };
            if store.sprites.contains_key(&stem) {
                log::warn!("[sprites] duplicate sheet '{}' from {:?}; skipping", stem, file_path);
                continue;
            }
            let img = match image::open(file_path) {
                Ok(img) => img.to_rgba8(),
                Err(e) => {
                    log::warn!("[sprites] failed to load {:?}: {e}", file_path);
                    continue;
                }
            };
            if let Err(e) = store.add_sheet(gpu, &stem, &img, frame_w, frame_h) {
                log::warn!("[sprites] skipping {:?}: {e}", file_path);
            }
        }

        log::info!(
            "[sprites] loaded {} sheets ({} sprites) from {:?}",
            store.sheets,
            store.sprites.len(),
            path
        );
        store
    }
}

impl SpriteSource for SpriteStore {
    fn texture(&self, sprite: &str) -> Option<TextureId> {
        self.sprites.get(sprite).map(|s| s.texture)
    }

    fn quad(&self, sprite: &str) -> Option<Quad> {
        self.sprites.get(sprite).map(|s| s.quad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_exact_grid_row_major() {
        let frames = slice_frames(64, 32, 32, 32);
        assert_eq!(
            frames,
            vec![FrameRect { x: 0, y: 0, w: 32, h: 32 }, FrameRect { x: 32, y: 0, w: 32, h: 32 }]
        );
    }

    #[test]
    fn slice_ignores_partial_edge_frames() {
        let frames = slice_frames(70, 40, 32, 32);
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn slice_small_sheet_is_one_frame() {
        let frames = slice_frames(16, 24, 32, 32);
        assert_eq!(frames, vec![FrameRect { x: 0, y: 0, w: 16, h: 24 }]);
    }

    #[test]
    fn frame_quad_uvs_are_normalised() {
        let q = frame_quad(FrameRect { x: 32, y: 0, w: 32, h: 32 }, 64, 32);
        assert_eq!(q.uv_min, [0.5, 0.0]);
        assert_eq!(q.uv_max, [1.0, 1.0]);
        assert_eq!((q.width, q.height), (32.0, 32.0));
    }
}
