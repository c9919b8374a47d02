use std::rc::Rc;

use crate::color::Color;
use crate::deferred::DisposalQueue;
use crate::error::RenderError;
use crate::gpu::{Gpu, TextureId};
use crate::renderer::bucket::Bucket;
use crate::renderer::view::ViewState;
use crate::renderer::{DrawStats, Renderer};

/// Off-screen render target backing one embedded map viewport.
///
/// The canvas renders at the panel's own pixel size, independent of the main
/// window, and hands the resulting texture to the embedding UI.
pub struct Canvas<G: Gpu> {
    renderer: Renderer<G>,
    target: Option<G::Target>,
    background: Color,
}

impl<G: Gpu> Canvas<G> {
    pub fn new(pipeline: Rc<G::Pipeline>) -> Self {
        Self {
            renderer: Renderer::new(pipeline),
            target: None,
            background: Color::CANVAS,
        }
    }

    pub fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }

    pub fn renderer(&self) -> &Renderer<G> {
        &self.renderer
    }

    pub fn state(&self) -> &ViewState {
        &self.renderer.state
    }

    pub fn state_mut(&mut self) -> &mut ViewState {
        &mut self.renderer.state
    }

    /// Currently allocated target size in pixels; `[0, 0]` before the first resize.
    pub fn size(&self, gpu: &G) -> [u32; 2] {
        self.target.as_ref().map_or([0, 0], |t| gpu.target_size(t))
    }

    /// Texture the embedding UI displays; `None` before the first successful resize.
    pub fn texture(&self, gpu: &G) -> Option<TextureId> {
        self.target.as_ref().map(|t| gpu.target_texture(t))
    }

    /// Replace the drawn batch; the old buffers are retired through `disposal`.
    pub fn load_batch(
        &mut self,
        gpu: &mut G,
        disposal: &mut DisposalQueue<G>,
        bucket: Bucket,
    ) -> Result<(), RenderError> {
        if let Some(old) = self.renderer.load_batch(gpu, bucket)? {
            disposal.retire_buffers(old);
        }
        Ok(())
    }

    /// Reallocate the target when `width × height` differs from the current one.
    ///
    /// Returns `Ok(false)` without touching the GPU when nothing changed.  On
    /// failure the previous target stays allocated and usable.
    pub fn resize(
        &mut self,
        gpu: &mut G,
        disposal: &mut DisposalQueue<G>,
        width: u32,
        height: u32,
    ) -> Result<bool, RenderError> {
        if self.target.as_ref().is_some_and(|t| gpu.target_size(t) == [width, height]) {
            return Ok(false);
        }

        let target = gpu.create_target(width, height)?;
        if let Some(old) = self.target.replace(target) {
            disposal.retire_target(old);
        }
        log::debug!("[canvas] target resized to {}x{}", width, height);
        Ok(true)
    }

    /// Render one frame into the target: clear, draw the batch, end the pass.
    pub fn render_frame(&mut self, gpu: &mut G, width: u32, height: u32) -> DrawStats {
        let Some(target) = &self.target else { return DrawStats::default() };

        gpu.begin_pass(target, [width, height], self.background);
        let stats = self.renderer.draw(gpu, width as f32, height as f32);
        gpu.end_pass();
        stats
    }

    /// Per-UI-frame entry point: resize if the panel changed, render, and
    /// return the texture to display.
    ///
    /// Panel sizes are rounded to whole pixels, minimum 1×1.  When resizing
    /// fails the error is returned and [`texture`](Self::texture) still yields
    /// the previous frame's image.
    pub fn process_frame(
        &mut self,
        gpu: &mut G,
        disposal: &mut DisposalQueue<G>,
        panel_size: [f32; 2],
    ) -> Result<TextureId, RenderError> {
        let width = (panel_size[0].round() as u32).max(1);
        let height = (panel_size[1].round() as u32).max(1);

        self.resize(gpu, disposal, width, height)?;
        self.render_frame(gpu, width, height);

        match &self.target {
            Some(target) => Ok(gpu.target_texture(target)),
            None => Err(RenderError::TargetAllocation("canvas has no target".into())),
        }
    }

    /// Schedule destruction of the target and the batch buffers on `disposal`.
    pub fn dispose(self, disposal: &mut DisposalQueue<G>) {
        let Self { renderer, target, .. } = self;
        disposal.defer(move |gpu| {
            renderer.dispose(gpu);
            if let Some(target) = target {
                gpu.destroy_target(target);
            }
            log::info!("[canvas] disposed");
        });
    }
}
