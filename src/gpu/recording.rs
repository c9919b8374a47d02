use std::collections::HashSet;

use glam::Mat4;
use image::RgbaImage;

use super::{Gpu, TextureId, check_batch_size, check_texture_size};
use crate::color::Color;
use crate::error::RenderError;
use crate::renderer::pipeline::TileVertex;

// ── GpuCommand ────────────────────────────────────────────────────────────────

/// One call made against a [`RecordingGpu`].
#[derive(Clone, Debug, PartialEq)]
pub enum GpuCommand {
    CreatePipeline,
    UploadTexture { texture: TextureId, width: u32, height: u32 },
    CreateBuffers { id: u32, vertices: usize, index_capacity: usize },
    DestroyBuffers { id: u32 },
    CreateTarget { texture: TextureId, width: u32, height: u32 },
    DestroyTarget { texture: TextureId },
    BeginPass { texture: TextureId, viewport: [u32; 2], clear: Color },
    Prepare { transform: Mat4 },
    BindTexture(TextureId),
    /// `texture` is whatever was bound when the draw was issued.
    DrawIndexed { texture: Option<TextureId>, indices: Vec<u32> },
    Cleanup,
    EndPass,
}

// ── Handles ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct RecordedPipeline;

#[derive(Debug)]
pub struct RecordedBuffers {
    pub id: u32,
    pub vertices: Vec<TileVertex>,
    pub index_capacity: usize,
}

#[derive(Debug)]
pub struct RecordedTarget {
    pub texture: TextureId,
    pub size: [u32; 2],
}

// ── RecordingGpu ──────────────────────────────────────────────────────────────

/// Headless [`Gpu`] that records every call instead of touching a device.
///
/// Resource misuse that a real driver would turn into corruption (drawing
/// past the reserved index capacity, destroying an unknown handle) panics,
/// so ordering defects surface in tests.
#[derive(Debug)]
pub struct RecordingGpu {
    commands: Vec<GpuCommand>,
    next_texture: u32,
    next_buffers: u32,
    bound: Option<TextureId>,
    live_buffers: HashSet<u32>,
    live_targets: HashSet<TextureId>,
    /// Make `create_pipeline` fail with this message.
    pub shader_failure: Option<String>,
    /// Largest target edge `create_target` accepts.
    pub max_target_size: u32,
    /// Largest sheet edge `upload_texture` accepts.
    pub max_texture_size: u32,
    /// Largest vertex or index buffer, in bytes, `create_buffers` accepts.
    pub max_buffer_size: u64,
}

impl RecordingGpu {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            // Id 0 is the placeholder, registered implicitly.
            next_texture: TextureId::PLACEHOLDER.0 + 1,
            next_buffers: 1,
            bound: None,
            live_buffers: HashSet::new(),
            live_targets: HashSet::new(),
            shader_failure: None,
            max_target_size: 8192,
            max_texture_size: 8192,
            max_buffer_size: 256 << 20,
        }
    }

    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<GpuCommand> {
        std::mem::take(&mut self.commands)
    }

    /// `(bound texture, indices)` of every indexed draw, in submission order.
    /// The texture is `None` for a draw issued with nothing bound.
    pub fn draw_calls(&self) -> Vec<(Option<TextureId>, Vec<u32>)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                GpuCommand::DrawIndexed { texture, indices } => Some((*texture, indices.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&GpuCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }

    /// Buffers and targets created but not yet destroyed.
    pub fn live_resources(&self) -> usize {
        self.live_buffers.len() + self.live_targets.len()
    }
}

impl Default for RecordingGpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Gpu for RecordingGpu {
    type Pipeline = RecordedPipeline;
    type Buffers = RecordedBuffers;
    type Target = RecordedTarget;

    fn create_pipeline(&mut self) -> Result<RecordedPipeline, RenderError> {
        if let Some(msg) = &self.shader_failure {
            return Err(RenderError::Shader(msg.clone()));
        }
        self.commands.push(GpuCommand::CreatePipeline);
        Ok(RecordedPipeline)
    }

    fn upload_texture(&mut self, image: &RgbaImage) -> Result<TextureId, RenderError> {
        let (width, height) = image.dimensions();
        check_texture_size(width, height, self.max_texture_size)?;
        let texture = TextureId(self.next_texture);
        self.next_texture += 1;
        self.commands.push(GpuCommand::UploadTexture { texture, width, height });
        Ok(texture)
    }

    fn create_buffers(
        &mut self,
        vertices: &[TileVertex],
        index_capacity: usize,
    ) -> Result<RecordedBuffers, RenderError> {
        check_batch_size(vertices.len(), index_capacity, self.max_buffer_size)?;
        let id = self.next_buffers;
        self.next_buffers += 1;
        self.live_buffers.insert(id);
        self.commands.push(GpuCommand::CreateBuffers { id, vertices: vertices.len(), index_capacity });
        Ok(RecordedBuffers { id, vertices: vertices.to_vec(), index_capacity })
    }

    fn destroy_buffers(&mut self, buffers: RecordedBuffers) {
        assert!(self.live_buffers.remove(&buffers.id), "buffers {} destroyed twice", buffers.id);
        self.commands.push(GpuCommand::DestroyBuffers { id: buffers.id });
    }

    fn create_target(&mut self, width: u32, height: u32) -> Result<RecordedTarget, RenderError> {
        if width > self.max_target_size || height > self.max_target_size {
            return Err(RenderError::TargetTooLarge { width, height, max: self.max_target_size });
        }
        let texture = TextureId(self.next_texture);
        self.next_texture += 1;
        self.live_targets.insert(texture);
        self.commands.push(GpuCommand::CreateTarget { texture, width, height });
        Ok(RecordedTarget { texture, size: [width, height] })
    }

    fn target_texture(&self, target: &RecordedTarget) -> TextureId {
        target.texture
    }

    fn target_size(&self, target: &RecordedTarget) -> [u32; 2] {
        target.size
    }

    fn destroy_target(&mut self, target: RecordedTarget) {
        assert!(self.live_targets.remove(&target.texture), "target {:?} destroyed twice", target.texture);
        self.commands.push(GpuCommand::DestroyTarget { texture: target.texture });
    }

    fn begin_pass(&mut self, target: &RecordedTarget, viewport: [u32; 2], clear: Color) {
        self.commands.push(GpuCommand::BeginPass { texture: target.texture, viewport, clear });
    }

    fn prepare(&mut self, _pipeline: &RecordedPipeline, _buffers: &RecordedBuffers, transform: &Mat4) {
        self.commands.push(GpuCommand::Prepare { transform: *transform });
    }

    fn bind_texture(&mut self, texture: TextureId) {
        self.bound = Some(texture);
        self.commands.push(GpuCommand::BindTexture(texture));
    }

    fn draw_indexed(&mut self, buffers: &RecordedBuffers, indices: &[u32]) {
        assert!(
            indices.len() <= buffers.index_capacity,
            "{} indices exceed capacity {}",
            indices.len(),
            buffers.index_capacity
        );
        self.commands.push(GpuCommand::DrawIndexed { texture: self.bound, indices: indices.to_vec() });
    }

    fn cleanup(&mut self) {
        self.bound = None;
        self.commands.push(GpuCommand::Cleanup);
    }

    fn end_pass(&mut self) {
        self.commands.push(GpuCommand::EndPass);
    }
}
