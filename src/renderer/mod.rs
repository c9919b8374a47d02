pub mod bucket;
pub mod pipeline;
pub mod scratch;
pub mod view;

use std::rc::Rc;

use bucket::Bucket;
use scratch::IndexScratch;
use view::ViewState;

use crate::error::RenderError;
use crate::gpu::{Gpu, TextureId};

/// Per-frame counters returned by [`Renderer::draw`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DrawStats {
    /// Units that survived culling.
    pub visible: usize,
    /// Units rejected by the bounding-box test.
    pub culled: usize,
    /// Indexed draw calls issued (one per flush).
    pub draw_calls: usize,
    /// Indices submitted across all flushes.
    pub indices: usize,
}

/// Draws one [`Bucket`] with texture batching and viewport culling.
///
/// The renderer owns the batch and its GPU buffers; the pipeline is shared
/// with every other renderer through the application's
/// [`PipelineCache`](crate::gpu::PipelineCache).
pub struct Renderer<G: Gpu> {
    /// Pan/zoom, read every frame and mutated by the embedding UI.
    pub state: ViewState,
    pipeline: Rc<G::Pipeline>,
    bucket: Bucket,
    buffers: Option<G::Buffers>,
    scratch: IndexScratch,
}

impl<G: Gpu> Renderer<G> {
    pub fn new(pipeline: Rc<G::Pipeline>) -> Self {
        Self {
            state: ViewState::new(),
            pipeline,
            bucket: Bucket::empty(),
            buffers: None,
            scratch: IndexScratch::new(),
        }
    }

    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    pub fn has_batch(&self) -> bool {
        self.buffers.is_some()
    }

    /// Upload `bucket` once and make it the batch drawn from now on.
    ///
    /// Returns the previous batch's buffers.  A frame may still reference
    /// them, so the caller disposes of them later (see
    /// [`DisposalQueue`](crate::deferred::DisposalQueue)).
    pub fn load_batch(&mut self, gpu: &mut G, bucket: Bucket) -> Result<Option<G::Buffers>, RenderError> {
        let buffers = gpu.create_buffers(bucket.vertices(), bucket.index_capacity())?;
        log::info!(
            "[renderer] batch loaded: {} units, {} textures",
            bucket.len(),
            bucket.texture_count()
        );
        self.bucket = bucket;
        Ok(self.buffers.replace(buffers))
    }

    /// Draw the batch into the current pass of a `width × height` pixel viewport.
    ///
    /// Consecutive visible units sharing a texture go out as one indexed draw;
    /// units are never reordered, so layering follows the map's draw order.
    pub fn draw(&mut self, gpu: &mut G, width: f32, height: f32) -> DrawStats {
        let mut stats = DrawStats::default();
        let Some(buffers) = &self.buffers else { return stats };

        gpu.prepare(&self.pipeline, buffers, &self.state.transform(width, height));

        let [w, h] = self.state.visible_extent(width, height);
        let mut active: Option<TextureId> = None;

        for unit in self.bucket.units() {
            if self.state.is_out_of_bounds(unit.bounds(), w, h) {
                stats.culled += 1;
                continue;
            }
            stats.visible += 1;

            if active != Some(unit.texture) {
                if !self.scratch.is_empty() {
                    flush(gpu, buffers, &mut self.scratch, &mut stats);
                }
                gpu.bind_texture(unit.texture);
                active = Some(unit.texture);
            }

            unit.push_indices(self.scratch.indices_mut());
        }

        if !self.scratch.is_empty() {
            flush(gpu, buffers, &mut self.scratch, &mut stats);
        }

        gpu.cleanup();
        stats
    }

    /// Destroy the batch buffers.  Call only once no frame references them.
    pub fn dispose(self, gpu: &mut G) {
        if let Some(buffers) = self.buffers {
            gpu.destroy_buffers(buffers);
        }
        log::info!("[renderer] disposed");
    }
}

fn flush<G: Gpu>(gpu: &mut G, buffers: &G::Buffers, scratch: &mut IndexScratch, stats: &mut DrawStats) {
    gpu.draw_indexed(buffers, scratch.as_slice());
    stats.draw_calls += 1;
    stats.indices += scratch.len();
    scratch.truncate();
}
