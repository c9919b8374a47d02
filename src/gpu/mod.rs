//! Backend seam between the batching logic and the graphics API.
//!
//! The renderer and canvas only ever talk to a [`Gpu`].  [`WgpuGpu`] drives a
//! real device; [`RecordingGpu`] logs every call so the draw stream can be
//! inspected without a graphics context.

pub mod recording;
pub mod wgpu_backend;

use std::rc::Rc;

use glam::Mat4;
use image::RgbaImage;

use crate::color::Color;
use crate::error::RenderError;
use crate::renderer::pipeline::TileVertex;

pub use recording::{GpuCommand, RecordingGpu};
pub use wgpu_backend::WgpuGpu;

// ── TextureId ─────────────────────────────────────────────────────────────────

/// Opaque handle of a texture registered with a backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

impl TextureId {
    /// 2×2 magenta/black checker every backend registers on creation.
    pub const PLACEHOLDER: Self = Self(0);
}

// ── Gpu ───────────────────────────────────────────────────────────────────────

/// Graphics operations needed to upload a batch and draw it into a canvas.
///
/// All calls happen on the thread that owns the device.  Per-frame calls come
/// in the order `begin_pass → prepare → (bind_texture | draw_indexed)* →
/// cleanup → end_pass`.
pub trait Gpu: 'static {
    /// Compiled tile shader and pipeline state, shared by every renderer.
    type Pipeline: 'static;
    /// Vertex, index and transform buffers owned by one renderer.
    type Buffers: 'static;
    /// Off-screen colour target owned by one canvas.
    type Target: 'static;

    fn create_pipeline(&mut self) -> Result<Self::Pipeline, RenderError>;

    /// Upload an RGBA image as a sampled texture.
    ///
    /// Fails with [`RenderError::TextureTooLarge`] when either edge is zero or
    /// beyond the device's 2D texture limit.
    fn upload_texture(&mut self, image: &RgbaImage) -> Result<TextureId, RenderError>;

    /// Upload `vertices` once and reserve room for `index_capacity` indices.
    ///
    /// Fails with [`RenderError::BatchTooLarge`] when either buffer would
    /// exceed the device's buffer size limit.
    fn create_buffers(
        &mut self,
        vertices: &[TileVertex],
        index_capacity: usize,
    ) -> Result<Self::Buffers, RenderError>;
    fn destroy_buffers(&mut self, buffers: Self::Buffers);

    fn create_target(&mut self, width: u32, height: u32) -> Result<Self::Target, RenderError>;
    fn target_texture(&self, target: &Self::Target) -> TextureId;
    /// Pixel size the target was created with.
    fn target_size(&self, target: &Self::Target) -> [u32; 2];
    fn destroy_target(&mut self, target: Self::Target);

    /// Direct rendering into `target`, restricted to `viewport` and cleared to `clear`.
    fn begin_pass(&mut self, target: &Self::Target, viewport: [u32; 2], clear: Color);
    /// Bind pipeline, buffers and the frame transform.  Blending is
    /// source-alpha / one-minus-source-alpha with an additive equation.
    fn prepare(&mut self, pipeline: &Self::Pipeline, buffers: &Self::Buffers, transform: &Mat4);
    fn bind_texture(&mut self, texture: TextureId);
    /// Upload `indices` and issue one indexed triangle-list draw over them.
    fn draw_indexed(&mut self, buffers: &Self::Buffers, indices: &[u32]);
    /// Undo everything `prepare` and `bind_texture` bound.
    fn cleanup(&mut self);
    /// Finish the pass; later rendering targets the default surface again.
    fn end_pass(&mut self);
}

// ── PipelineCache ─────────────────────────────────────────────────────────────

/// Application-owned, lazily created tile pipeline.
///
/// The first [`get_or_init`](Self::get_or_init) compiles the shader; every
/// later call hands out the same `Rc`.  A compile failure is not cached, but
/// callers are expected to treat it as fatal and stop rendering.
pub struct PipelineCache<G: Gpu> {
    pipeline: Option<Rc<G::Pipeline>>,
}

impl<G: Gpu> PipelineCache<G> {
    pub fn new() -> Self {
        Self { pipeline: None }
    }

    pub fn get_or_init(&mut self, gpu: &mut G) -> Result<Rc<G::Pipeline>, RenderError> {
        if let Some(pipeline) = &self.pipeline {
            return Ok(Rc::clone(pipeline));
        }
        let pipeline = Rc::new(gpu.create_pipeline()?);
        log::info!("[renderer] tile pipeline compiled");
        self.pipeline = Some(Rc::clone(&pipeline));
        Ok(pipeline)
    }

    pub fn is_initialized(&self) -> bool {
        self.pipeline.is_some()
    }
}

impl<G: Gpu> Default for PipelineCache<G> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Device limits ─────────────────────────────────────────────────────────────

pub(crate) fn check_texture_size(width: u32, height: u32, max: u32) -> Result<(), RenderError> {
    if width == 0 || height == 0 || width > max || height > max {
        return Err(RenderError::TextureTooLarge { width, height, max });
    }
    Ok(())
}

/// Vertex and index buffers are separate allocations; each must fit on its own.
pub(crate) fn check_batch_size(vertices: usize, index_capacity: usize, max: u64) -> Result<(), RenderError> {
    let vertex_bytes = (vertices as u64).saturating_mul(std::mem::size_of::<TileVertex>() as u64);
    let index_bytes = (index_capacity as u64).saturating_mul(std::mem::size_of::<u32>() as u64);
    let bytes = vertex_bytes.max(index_bytes);
    if bytes > max {
        return Err(RenderError::BatchTooLarge { bytes, max });
    }
    Ok(())
}

/// Pixels of the placeholder checker texture (2×2, row-major).
pub(crate) fn placeholder_image() -> RgbaImage {
    let magenta = image::Rgba([255, 0, 255, 255]);
    let black = image::Rgba([0, 0, 0, 255]);
    RgbaImage::from_fn(2, 2, |x, y| if (x + y) % 2 == 0 { magenta } else { black })
}
