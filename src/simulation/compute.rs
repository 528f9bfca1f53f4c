//! Compute-dispatch backend: every pass is a compute shader writing a
//! write-only storage texture.

use super::resources::TextureSet;
use super::{FIELD_FORMAT, PassBackend, PassDesc, PassKind, SimulationMethod};

pub struct ComputeBackend {
    sampler: wgpu::Sampler,
    single_layout: wgpu::BindGroupLayout,
    dual_layout: wgpu::BindGroupLayout,
    force_layout: wgpu::BindGroupLayout,
    clear_layout: wgpu::BindGroupLayout,
    clear_pipeline: wgpu::ComputePipeline,
    advect_pipeline: wgpu::ComputePipeline,
    force_pipeline: wgpu::ComputePipeline,
    viscous_pipeline: wgpu::ComputePipeline,
    divergence_pipeline: wgpu::ComputePipeline,
    poisson_pipeline: wgpu::ComputePipeline,
    project_pipeline: wgpu::ComputePipeline,
}

const WORKGROUP: u32 = 8;

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
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
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: FIELD_FORMAT,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

impl ComputeBackend {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::include_wgsl!("../shaders/sim_compute.wgsl"));

        let single_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Sim Pass Layout"),
            entries: &[
                uniform_entry(0),
                sampler_entry(1),
                texture_entry(2),
                storage_entry(4),
            ],
        });
        let dual_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Sim Dual Pass Layout"),
            entries: &[
                uniform_entry(0),
                sampler_entry(1),
                texture_entry(2),
                texture_entry(3),
                storage_entry(4),
            ],
        });
        let force_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Force Pass Layout"),
            entries: &[uniform_entry(0), texture_entry(2), storage_entry(4)],
        });
        let clear_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Clear Pass Layout"),
            entries: &[storage_entry(4)],
        });

        let pipeline = |label: &str, entry: &str, layout: &wgpu::BindGroupLayout| {
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[layout],
                push_constant_ranges: &[],
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some(entry),
                compilation_options: Default::default(),
                cache: None,
            })
        };

        Self {
            clear_pipeline: pipeline("Clear Pipeline", "clear_main", &clear_layout),
            advect_pipeline: pipeline("Advection Pipeline", "advect_main", &single_layout),
            force_pipeline: pipeline("Force Pipeline", "force_main", &force_layout),
            viscous_pipeline: pipeline("Viscous Pipeline", "viscous_main", &dual_layout),
            divergence_pipeline: pipeline("Divergence Pipeline", "divergence_main", &single_layout),
            poisson_pipeline: pipeline("Poisson Pipeline", "poisson_main", &dual_layout),
            project_pipeline: pipeline("Projection Pipeline", "project_main", &dual_layout),
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
            force_layout,
            clear_layout,
        }
    }

    fn pipeline_for(&self, kind: PassKind) -> (&wgpu::ComputePipeline, &wgpu::BindGroupLayout) {
        match kind {
            PassKind::Advect => (&self.advect_pipeline, &self.single_layout),
            PassKind::Force => (&self.force_pipeline, &self.force_layout),
            PassKind::Viscous => (&self.viscous_pipeline, &self.dual_layout),
            PassKind::Divergence => (&self.divergence_pipeline, &self.single_layout),
            PassKind::Poisson => (&self.poisson_pipeline, &self.dual_layout),
            PassKind::Project => (&self.project_pipeline, &self.dual_layout),
        }
    }
}

impl PassBackend for ComputeBackend {
    fn method(&self) -> SimulationMethod {
        SimulationMethod::Compute
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
                | wgpu::TextureUsages::STORAGE_BINDING
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
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        dst: &TextureSet,
    ) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Clear Bind Group"),
            layout: &self.clear_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::TextureView(&dst.view),
            }],
        });
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Clear Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.clear_pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(dst.width.div_ceil(WORKGROUP), dst.height.div_ceil(WORKGROUP), 1);
    }

    fn encode(&self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder, pass: &PassDesc) {
        let (pipeline, layout) = self.pipeline_for(pass.kind);

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: pass.uniforms.as_entire_binding(),
        }];
        if pass.kind != PassKind::Force {
            entries.push(wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            });
        }
        entries.push(wgpu::BindGroupEntry {
            binding: 2,
            resource: wgpu::BindingResource::TextureView(&pass.src.view),
        });
        if let Some(aux) = pass.aux {
            entries.push(wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(&aux.view),
            });
        }
        entries.push(wgpu::BindGroupEntry {
            binding: 4,
            resource: wgpu::BindingResource::TextureView(&pass.dst.view),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Sim Pass Bind Group"),
            layout,
            entries: &entries,
        });

        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Sim Pass"),
            timestamp_writes: None,
        });
        compute_pass.set_pipeline(pipeline);
        compute_pass.set_bind_group(0, &bind_group, &[]);
        compute_pass.dispatch_workgroups(
            pass.dst.width.div_ceil(WORKGROUP),
            pass.dst.height.div_ceil(WORKGROUP),
            1,
        );
    }
}
