use std::collections::HashMap;

use glam::Mat4;
use image::RgbaImage;
use wgpu::util::DeviceExt;

use super::{Gpu, TextureId, check_batch_size, check_texture_size, placeholder_image};
use crate::color::Color;
use crate::error::RenderError;
use crate::renderer::pipeline::{TileLayouts, TilePipeline, TileVertex, create_tile_layouts, create_tile_pipeline};

/// Colour format of every canvas target.
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

const INDEX_SIZE: u64 = std::mem::size_of::<u32>() as u64;

// ── Resources ─────────────────────────────────────────────────────────────────

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
}

/// Buffers owned by one renderer.
pub struct BatchBuffers {
    vertex: wgpu::Buffer,
    /// Rewritten every flush; sized for every unit being visible at once.
    index: wgpu::Buffer,
    index_capacity: u64,
    transform: wgpu::Buffer,
    transform_bind_group: wgpu::BindGroup,
}

/// Colour target owned by one canvas.  The texture itself lives in the
/// backend's registry under `texture` so the embedding UI can sample it.
pub struct GpuTarget {
    texture: TextureId,
    size: [u32; 2],
}

// ── WgpuGpu ───────────────────────────────────────────────────────────────────

/// [`Gpu`] implementation on top of a wgpu device.
///
/// Flushes inside one pass write their indices to consecutive, disjoint
/// ranges of the index buffer.  `queue.write_buffer` lands before the pass
/// executes, so reusing offset 0 for every flush would leave all draws
/// reading the last flush's indices.
pub struct WgpuGpu {
    device: wgpu::Device,
    queue: wgpu::Queue,
    layouts: TileLayouts,
    sampler: wgpu::Sampler,
    textures: HashMap<TextureId, GpuTexture>,
    next_texture: u32,
    encoder: Option<wgpu::CommandEncoder>,
    pass: Option<wgpu::RenderPass<'static>>,
    /// Next free slot (in indices) of the bound index buffer.
    index_cursor: u64,
}

impl WgpuGpu {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let layouts = create_tile_layouts(&device);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sprite_sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let mut gpu = Self {
            device,
            queue,
            layouts,
            sampler,
            textures: HashMap::new(),
            next_texture: TextureId::PLACEHOLDER.0,
            encoder: None,
            pass: None,
            index_cursor: 0,
        };
        let placeholder = gpu.create_sheet_texture(&placeholder_image());
        debug_assert_eq!(placeholder, TextureId::PLACEHOLDER);
        gpu
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// View of a registered texture, e.g. a canvas target for display.
    pub fn texture_view(&self, id: TextureId) -> Option<&wgpu::TextureView> {
        self.textures.get(&id).map(|t| &t.view)
    }

    fn create_sheet_texture(&mut self, image: &RgbaImage) -> TextureId {
        let (width, height) = image.dimensions();
        let texture = self.device.create_texture_with_data(
            &self.queue,
            &wgpu::TextureDescriptor {
                label: Some("sprite_texture"),
                size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            image,
        );
        self.register(texture)
    }

    fn register(&mut self, texture: wgpu::Texture) -> TextureId {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sprite_texture_bg"),
            layout: &self.layouts.texture,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(id, GpuTexture { texture, view, bind_group });
        id
    }
}

impl Gpu for WgpuGpu {
    type Pipeline = TilePipeline;
    type Buffers = BatchBuffers;
    type Target = GpuTarget;

    fn create_pipeline(&mut self) -> Result<TilePipeline, RenderError> {
        let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tile_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/tile.wgsl").into()),
        });

        let info = pollster::block_on(shader.get_compilation_info());
        let errors: Vec<String> = info
            .messages
            .iter()
            .filter(|m| matches!(m.message_type, wgpu::CompilationMessageType::Error))
            .map(|m| m.message.clone())
            .collect();
        if !errors.is_empty() {
            return Err(RenderError::Shader(errors.join("; ")));
        }

        Ok(create_tile_pipeline(&self.device, &shader, &self.layouts, TARGET_FORMAT))
    }

    fn upload_texture(&mut self, image: &RgbaImage) -> Result<TextureId, RenderError> {
        let (width, height) = image.dimensions();
        check_texture_size(width, height, self.device.limits().max_texture_dimension_2d)?;
        Ok(self.create_sheet_texture(image))
    }

    fn create_buffers(
        &mut self,
        vertices: &[TileVertex],
        index_capacity: usize,
    ) -> Result<BatchBuffers, RenderError> {
        // Zero-sized slices cannot be bound; an empty batch still gets one quad's worth.
        let padding = [TileVertex { position: [0.0; 2], color: [0.0; 4], uv: [0.0; 2] }];
        let contents = if vertices.is_empty() { &padding[..] } else { vertices };
        check_batch_size(contents.len(), index_capacity.max(6), self.device.limits().max_buffer_size)?;
        let index_capacity = (index_capacity as u64).max(6);

        let vertex = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("bucket_vertex_buffer"),
            contents: bytemuck::cast_slice(contents),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("bucket_index_buffer"),
            size: index_capacity * INDEX_SIZE,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let transform = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("transform_buffer"),
            contents: bytemuck::cast_slice(&Mat4::IDENTITY.to_cols_array()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let transform_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("transform_bg"),
            layout: &self.layouts.transform,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: transform.as_entire_binding(),
            }],
        });

        Ok(BatchBuffers { vertex, index, index_capacity, transform, transform_bind_group })
    }

    fn destroy_buffers(&mut self, buffers: BatchBuffers) {
        buffers.vertex.destroy();
        buffers.index.destroy();
        buffers.transform.destroy();
    }

    fn create_target(&mut self, width: u32, height: u32) -> Result<GpuTarget, RenderError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(RenderError::TargetTooLarge { width, height, max });
        }
        if width == 0 || height == 0 {
            return Err(RenderError::TargetAllocation(format!("empty size {width}x{height}")));
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("canvas_texture"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let texture = self.register(texture);
        Ok(GpuTarget { texture, size: [width, height] })
    }

    fn target_texture(&self, target: &GpuTarget) -> TextureId {
        target.texture
    }

    fn target_size(&self, target: &GpuTarget) -> [u32; 2] {
        target.size
    }

    fn destroy_target(&mut self, target: GpuTarget) {
        if let Some(t) = self.textures.remove(&target.texture) {
            t.texture.destroy();
        }
    }

    fn begin_pass(&mut self, target: &GpuTarget, viewport: [u32; 2], clear: Color) {
        let Some(color) = self.textures.get(&target.texture) else {
            log::warn!("[canvas] target texture {:?} is not registered", target.texture);
            return;
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("canvas_encoder") });

        let mut pass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("canvas_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &color.view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear.to_wgpu()),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            })
            .forget_lifetime();

        let w = viewport[0].min(target.size[0]).max(1);
        let h = viewport[1].min(target.size[1]).max(1);
        pass.set_viewport(0.0, 0.0, w as f32, h as f32, 0.0, 1.0);

        self.pass = Some(pass);
        self.encoder = Some(encoder);
    }

    fn prepare(&mut self, pipeline: &TilePipeline, buffers: &BatchBuffers, transform: &Mat4) {
        self.queue
            .write_buffer(&buffers.transform, 0, bytemuck::cast_slice(&transform.to_cols_array()));
        self.index_cursor = 0;

        let Some(pass) = self.pass.as_mut() else { return };
        pass.set_pipeline(&pipeline.render_pipeline);
        pass.set_bind_group(0, &buffers.transform_bind_group, &[]);
        pass.set_vertex_buffer(0, buffers.vertex.slice(..));
        pass.set_index_buffer(buffers.index.slice(..), wgpu::IndexFormat::Uint32);
    }

    fn bind_texture(&mut self, texture: TextureId) {
        let Some(pass) = self.pass.as_mut() else { return };
        let bound = self
            .textures
            .get(&texture)
            .or_else(|| self.textures.get(&TextureId::PLACEHOLDER));
        if let Some(t) = bound {
            pass.set_bind_group(1, &t.bind_group, &[]);
        }
    }

    fn draw_indexed(&mut self, buffers: &BatchBuffers, indices: &[u32]) {
        let count = indices.len() as u64;
        let start = self.index_cursor;
        if start + count > buffers.index_capacity {
            log::warn!(
                "[renderer] index overflow: {} + {} exceeds capacity {}",
                start,
                count,
                buffers.index_capacity
            );
            return;
        }
        let Some(pass) = self.pass.as_mut() else { return };

        self.queue
            .write_buffer(&buffers.index, start * INDEX_SIZE, bytemuck::cast_slice(indices));
        pass.draw_indexed(start as u32..(start + count) as u32, 0, 0..1);
        self.index_cursor = start + count;
    }

    fn cleanup(&mut self) {
        // Bindings are scoped to the render pass; ending it releases them.
        self.index_cursor = 0;
    }

    fn end_pass(&mut self) {
        drop(self.pass.take());
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
    }
}
