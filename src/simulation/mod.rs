//! The simulation stepper and its two interchangeable GPU backends.
//!
//! The per-frame pass pipeline (advect, inject force, optionally diffuse,
//! measure divergence, solve pressure, project) is written exactly once,
//! against the [`PassBackend`] trait. The compute backend runs each pass as
//! a compute dispatch into a storage texture; the fragment backend runs the
//! same pass as a fullscreen draw into a color attachment. Which one is
//! used is decided once, at startup, from the adapter capabilities.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use wgpu::util::DeviceExt;

use crate::pointer::PointerSample;
use crate::settings::{AdvectionScheme, SimulationSettings};

pub mod compute;
pub mod fragment;
pub mod resources;

pub use compute::ComputeBackend;
pub use fragment::FragmentBackend;
pub use resources::{PingPong, SimResources, Slot, TextureSet};

/// Texture format shared by every simulation target. Half float: the
/// velocity and pressure fields need negative and fractional values.
pub const FIELD_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationMethod {
    /// Compute dispatches into storage textures.
    Compute,
    /// Fragment draws into render targets; works on GL-class devices.
    Fragment,
}

impl SimulationMethod {
    /// Choose the compute path when the device can run it. The GL backend
    /// is denied outright: storage-texture support there is unreliable
    /// even where the limits claim otherwise.
    pub fn select(backend: wgpu::Backend, limits: &wgpu::Limits) -> Self {
        let storage_textures = limits.max_storage_textures_per_shader_stage >= 1;
        let compute_capable = limits.max_compute_workgroup_size_x >= 8;
        if backend != wgpu::Backend::Gl && storage_textures && compute_capable {
            SimulationMethod::Compute
        } else {
            SimulationMethod::Fragment
        }
    }
}

/// One stage of the per-frame pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Advect,
    Force,
    Viscous,
    Divergence,
    Poisson,
    Project,
}

/// A single pass: read `src` (and maybe `aux`), write `dst`. Buffers are
/// never read and written within the same pass.
pub struct PassDesc<'a> {
    pub kind: PassKind,
    pub uniforms: &'a wgpu::Buffer,
    pub src: &'a TextureSet,
    pub aux: Option<&'a TextureSet>,
    pub dst: &'a TextureSet,
}

/// The backend-neutral interface the stepper is written against. Both
/// implementations encode into the frame's shared command encoder and
/// never submit themselves.
pub trait PassBackend {
    fn method(&self) -> SimulationMethod;
    fn create_texture(
        &self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
        label: &str,
    ) -> TextureSet;
    fn encode_clear(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        dst: &TextureSet,
    );
    fn encode(&self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder, pass: &PassDesc);
}

/// Per-pass uniform block: two vec4s, laid out identically for every pass.
/// `params0 = [dt, aux, px.x, px.y]`, `params1 = [fbo.w, fbo.h, b.x, b.y]`;
/// the force pass reinterprets them as `[force.xy, center.xy]` and
/// `[cursor.xy, px.xy]`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SimUniforms {
    pub params0: [f32; 4],
    pub params1: [f32; 4],
}

impl SimUniforms {
    fn for_pass(dt: f32, aux: f32, px: Vec2, fbo: [u32; 2], boundary: Vec2) -> Self {
        Self {
            params0: [dt, aux, px.x, px.y],
            params1: [fbo[0] as f32, fbo[1] as f32, boundary.x, boundary.y],
        }
    }
}

/// Cursor impulse parameters for one frame. The cursor center is clamped
/// so the impulse footprint stays inside the domain.
pub(crate) fn force_uniforms(
    settings: &SimulationSettings,
    fbo: [u32; 2],
    sample: &PointerSample,
) -> SimUniforms {
    let px = SimulationSettings::texel(fbo);
    let cursor = Vec2::splat(settings.cursor_size) * px;
    let lo = Vec2::new(-1.0, -1.0) + cursor + px * 2.0;
    let hi = Vec2::new(1.0, 1.0) - cursor - px * 2.0;
    let center = sample.position.max(lo).min(hi);
    let force = sample.delta * 0.5 * settings.mouse_force;
    SimUniforms {
        params0: [force.x, force.y, center.x, center.y],
        params1: [settings.cursor_size, settings.cursor_size, px.x, px.y],
    }
}

/// One 32-byte uniform buffer per pass. Static pass parameters are written
/// at (re)allocation; only the force block changes per frame.
struct UniformSet {
    advect: wgpu::Buffer,
    viscous: wgpu::Buffer,
    divergence: wgpu::Buffer,
    poisson: wgpu::Buffer,
    project: wgpu::Buffer,
    force: wgpu::Buffer,
}

impl UniformSet {
    fn new(device: &wgpu::Device) -> Self {
        let buffer = |label: &str| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::bytes_of(&SimUniforms::zeroed()),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
        };
        Self {
            advect: buffer("Advection Uniforms"),
            viscous: buffer("Viscous Uniforms"),
            divergence: buffer("Divergence Uniforms"),
            poisson: buffer("Poisson Uniforms"),
            project: buffer("Projection Uniforms"),
            force: buffer("External Force Uniforms"),
        }
    }

    fn write_static(&self, queue: &wgpu::Queue, settings: &SimulationSettings, fbo: [u32; 2]) {
        let px = SimulationSettings::texel(fbo);
        let boundary = settings.boundary_offset(fbo);
        let bfecc = match settings.advection {
            AdvectionScheme::Bfecc => 1.0,
            AdvectionScheme::SemiLagrangian => 0.0,
        };
        let write = |buffer: &wgpu::Buffer, dt: f32, aux: f32| {
            let uniforms = SimUniforms::for_pass(dt, aux, px, fbo, boundary);
            queue.write_buffer(buffer, 0, bytemuck::bytes_of(&uniforms));
        };
        write(&self.advect, settings.dt, bfecc);
        write(&self.viscous, settings.dt, settings.viscosity);
        write(&self.divergence, settings.dt, 0.0);
        write(&self.poisson, 0.0, 0.0);
        write(&self.project, settings.dt, 0.0);
    }
}

/// The simulation: one backend, one generation of GPU resources, and the
/// stepper that runs the fixed pass pipeline every frame.
pub struct FluidSimulation {
    backend: Box<dyn PassBackend>,
    resources: SimResources,
    uniforms: UniformSet,
    settings: SimulationSettings,
    canvas_size: [u32; 2],
}

impl FluidSimulation {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        method: SimulationMethod,
        settings: SimulationSettings,
        canvas_size: [u32; 2],
    ) -> Self {
        let backend: Box<dyn PassBackend> = match method {
            SimulationMethod::Compute => Box::new(ComputeBackend::new(device)),
            SimulationMethod::Fragment => Box::new(FragmentBackend::new(device)),
        };
        let uniforms = UniformSet::new(device);
        let fbo = settings.fbo_size(canvas_size);
        let resources = Self::build_resources(device, queue, backend.as_ref(), fbo);
        uniforms.write_static(queue, &settings, fbo);
        Self {
            backend,
            resources,
            uniforms,
            settings,
            canvas_size,
        }
    }

    /// Allocate a resource generation and zero every texture before
    /// anything reads it.
    fn build_resources(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        backend: &dyn PassBackend,
        fbo: [u32; 2],
    ) -> SimResources {
        let resources = SimResources::allocate(device, backend, fbo[0], fbo[1]);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Field Clear Encoder"),
        });
        for texture in resources.all() {
            backend.encode_clear(device, &mut encoder, texture);
        }
        queue.submit(Some(encoder.finish()));
        resources
    }

    pub fn method(&self) -> SimulationMethod {
        self.backend.method()
    }

    pub fn canvas_size(&self) -> [u32; 2] {
        self.canvas_size
    }

    pub fn fbo_size(&self) -> [u32; 2] {
        [self.resources.width, self.resources.height]
    }

    pub fn resources(&self) -> &SimResources {
        &self.resources
    }

    /// The velocity pair; the current side holds the latest projected
    /// field for presentation.
    pub fn velocity(&self) -> &PingPong<TextureSet> {
        &self.resources.velocity
    }

    /// Full teardown and reallocation at the new canvas size. Must be
    /// called between frames: no encoder may be holding views into the
    /// old generation.
    pub fn resize(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, canvas_size: [u32; 2]) {
        self.canvas_size = canvas_size;
        let fbo = self.settings.fbo_size(canvas_size);
        self.resources.destroy();
        self.resources = Self::build_resources(device, queue, self.backend.as_ref(), fbo);
        self.uniforms.write_static(queue, &self.settings, fbo);
    }

    /// Encode one simulation frame. Pass order is fixed; each stage reads
    /// the previous stage's output.
    pub fn step(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        sample: &PointerSample,
    ) {
        let fbo = [self.resources.width, self.resources.height];
        queue.write_buffer(
            &self.uniforms.force,
            0,
            bytemuck::bytes_of(&force_uniforms(&self.settings, fbo, sample)),
        );

        let backend = self.backend.as_ref();
        let res = &mut self.resources;

        // 1. Advect the velocity field along itself.
        backend.encode(
            device,
            encoder,
            &PassDesc {
                kind: PassKind::Advect,
                uniforms: &self.uniforms.advect,
                src: res.velocity.current(),
                aux: None,
                dst: res.velocity.next(),
            },
        );

        // 2. Add the cursor impulse on top of the advected field.
        backend.encode(
            device,
            encoder,
            &PassDesc {
                kind: PassKind::Force,
                uniforms: &self.uniforms.force,
                src: res.velocity.next(),
                aux: None,
                dst: &res.force,
            },
        );

        // 3. Optional viscous diffusion, Jacobi with a fixed iteration
        // count. The pair's parity after the loop decides which side the
        // remaining passes read.
        if self.settings.viscous {
            for _ in 0..self.settings.iterations_viscous {
                backend.encode(
                    device,
                    encoder,
                    &PassDesc {
                        kind: PassKind::Viscous,
                        uniforms: &self.uniforms.viscous,
                        src: &res.force,
                        aux: Some(res.viscous.current()),
                        dst: res.viscous.next(),
                    },
                );
                res.viscous.swap();
            }
        }
        let solved = if self.settings.viscous {
            res.viscous.current()
        } else {
            &res.force
        };

        // 4. Divergence of the (possibly diffused) field.
        backend.encode(
            device,
            encoder,
            &PassDesc {
                kind: PassKind::Divergence,
                uniforms: &self.uniforms.divergence,
                src: solved,
                aux: None,
                dst: &res.divergence,
            },
        );

        // 5. Pressure Poisson solve. The pressure pair is warm-started:
        // it carries last frame's solution as the initial guess.
        for _ in 0..self.settings.iterations_poisson {
            backend.encode(
                device,
                encoder,
                &PassDesc {
                    kind: PassKind::Poisson,
                    uniforms: &self.uniforms.poisson,
                    src: res.pressure.current(),
                    aux: Some(&res.divergence),
                    dst: res.pressure.next(),
                },
            );
            res.pressure.swap();
        }

        // 6. Subtract the pressure gradient. The write target becomes the
        // current velocity for the next frame; this is the swap point.
        backend.encode(
            device,
            encoder,
            &PassDesc {
                kind: PassKind::Project,
                uniforms: &self.uniforms.project,
                src: res.pressure.current(),
                aux: Some(solved),
                dst: res.velocity.next(),
            },
        );
        res.velocity.swap();
    }
}

impl Drop for FluidSimulation {
    fn drop(&mut self) {
        self.resources.destroy();
    }
}
