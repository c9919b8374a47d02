/// One corner of a unit quad: 8 floats, 32 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TileVertex {
    /// World-space pixel position.
    pub position: [f32; 2],
    /// Tint multiplied with the sampled texel.
    pub color: [f32; 4],
    pub uv: [f32; 2],
}

impl TileVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x2,  // position, offset 0
        1 => Float32x4,  // color, offset 8
        2 => Float32x2,  // uv, offset 24
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TileVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Straight alpha blending applied to both colour and alpha channels:
/// `src * src_alpha + dst * (1 - src_alpha)`.
pub const TILE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    },
};

pub struct TilePipeline {
    pub render_pipeline: wgpu::RenderPipeline,
}

/// Bind group layouts shared by the tile pipeline and every resource bound to it.
pub struct TileLayouts {
    /// Group 0: the frame transform (`mat4x4<f32>`).
    pub transform: wgpu::BindGroupLayout,
    /// Group 1: sprite texture + sampler.
    pub texture: wgpu::BindGroupLayout,
}

pub fn create_tile_layouts(device: &wgpu::Device) -> TileLayouts {
    let transform = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("tile_transform_bgl"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(64),
            },
            count: None,
        }],
    });

    let texture = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("tile_texture_bgl"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    });

    TileLayouts { transform, texture }
}

/// Build the tile pipeline from an already validated shader module.
pub fn create_tile_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layouts: &TileLayouts,
    target_format: wgpu::TextureFormat,
) -> TilePipeline {
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("tile_pipeline_layout"),
        bind_group_layouts: &[&layouts.transform, &layouts.texture],
        ..Default::default()
    });

    let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("tile_pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[TileVertex::layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: target_format,
                blend: Some(TILE_BLEND),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    });

    TilePipeline { render_pipeline }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_eight_floats() {
        assert_eq!(std::mem::size_of::<TileVertex>(), 32);
    }

    #[test]
    fn attribute_offsets_match_interleaving() {
        let offsets: Vec<u64> = TileVertex::ATTRIBS.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 8, 24]);
        let locations: Vec<u32> = TileVertex::ATTRIBS.iter().map(|a| a.shader_location).collect();
        assert_eq!(locations, vec![0, 1, 2]);
    }
}
