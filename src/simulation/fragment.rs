//! Fragment-draw backend: every pass is a fullscreen triangle rendered
//! into an `rgba16float` color attachment. This is the path for GL-class
//! devices without reliable storage-texture support; the pass semantics
//! are identical to the compute backend's.

use super::resources::TextureSet;
use super::{FIELD_FORMAT, PassBackend, PassDesc, PassKind, SimulationMethod};

pub struct FragmentBackend {
    sampler: wgpu::Sampler,
    single_layout: wgpu::BindGroupLayout,
    dual_layout: wgpu::BindGroupLayout,
    advect_pipeline: wgpu::RenderPipeline,
    force_pipeline: wgpu::RenderPipeline,
    viscous_pipeline: wgpu::RenderPipeline,
    divergence_pipeline: wgpu::RenderPipeline,
    poisson_pipeline: wgpu::RenderPipeline,
    project_pipeline: wgpu::RenderPipeline,
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        // The vertex stage needs the boundary offset for the UV mapping.
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

impl FragmentBackend {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader =
            device.create_shader_module(wgpu::include_wgsl!("../shaders/sim_fragment.wgsl"));

        let single_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Sim Pass Layout"),
            entries: &[uniform_entry(0), sampler_entry(1), texture_entry(2)],
        });
        let dual_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Sim Dual Pass Layout"),
            entries: &[
                uniform_entry(0),
                sampler_entry(1),
                texture_entry(2),
                texture_entry(3),
            ],
        });

        let pipeline = |label: &str, entry: &str, layout: &wgpu::BindGroupLayout| {
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[layout],
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_face"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(entry),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: FIELD_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        Self {
            advect_pipeline: pipeline("Advection Pipeline", "fs_advect", &single_layout),
            force_pipeline: pipeline("Force Pipeline", "fs_force", &single_layout),
            viscous_pipeline: pipeline("Viscous Pipeline", "fs_viscous", &dual_layout),
            divergence_pipeline: pipeline("Divergence Pipeline", "fs_divergence", &single_layout),
            poisson_pipeline: pipeline("Poisson Pipeline", "fs_poisson", &dual_layout),
            project_pipeline: pipeline("Projection Pipeline", "fs_project", &dual_layout),
            sampler: device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("Field Sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                ..Default::default()
            }),
            single_layout,
            dual_layout,
        }
    }

    fn pipeline_for(&self, kind: PassKind) -> (&wgpu::RenderPipeline, &wgpu::BindGroupLayout) {
        match kind {
            PassKind::Advect => (&self.advect_pipeline, &self.single_layout),
            PassKind::Force => (&self.force_pipeline, &self.single_layout),
            PassKind::Viscous => (&self.viscous_pipeline, &self.dual_layout),
            PassKind::Divergence => (&self.divergence_pipeline, &self.single_layout),
            PassKind::Poisson => (&self.poisson_pipeline, &self.dual_layout),
            PassKind::Project => (&self.project_pipeline, &self.dual_layout),
        }
    }

    fn begin_target_pass<'a>(
        encoder: &'a mut wgpu::CommandEncoder,
        dst: &TextureSet,
        label: &str,
    ) -> wgpu::RenderPass<'a> {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &dst.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        })
    }
}

impl PassBackend for FragmentBackend {
    fn method(&self) -> SimulationMethod {
        SimulationMethod::Fragment
    }

    fn create_texture(
        &self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
        label: &str,
    ) -> TextureSet {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FIELD_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        TextureSet {
            texture,
            view,
            width,
            height,
        }
    }

    fn encode_clear(
        &self,
        _device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        dst: &TextureSet,
    ) {
        // A load-clear with no draw zeroes the attachment.
        let _ = Self::begin_target_pass(encoder, dst, "Clear Pass");
    }

    fn encode(&self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder, pass: &PassDesc) {
        let (pipeline, layout) = self.pipeline_for(pass.kind);

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: pass.uniforms.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&pass.src.view),
            },
        ];
        if let Some(aux) = pass.aux {
            entries.push(wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(&aux.view),
            });
        }

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Sim Pass Bind Group"),
            layout,
            entries: &entries,
        });

        let mut render_pass = Self::begin_target_pass(encoder, pass.dst, "Sim Pass");
        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}
