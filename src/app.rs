use crate::pointer::PointerTracker;
use crate::render::Presenter;
use crate::settings::SimulationSettings;
use crate::simulation::{FluidSimulation, SimulationMethod};

use glam::Vec2;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// The animated fluid backdrop. Owns the canvas-sized GPU resources for
/// its mounted lifetime; everything is best-effort and a missing GPU just
/// means nothing is drawn.
pub struct BackdropApp {
    method: Option<SimulationMethod>,
    simulation: Option<FluidSimulation>,
    presenter: Option<Presenter>,
    pointer: PointerTracker,
    settings: SimulationSettings,
    reduced_motion: bool,
    rendered_once: bool,
}

impl BackdropApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let settings = SimulationSettings::default();
        let reduced_motion = reduced_motion_preference();

        let (method, presenter) = match cc.wgpu_render_state.as_ref() {
            Some(render_state) => {
                let info = render_state.adapter.get_info();
                let method =
                    SimulationMethod::select(info.backend, &render_state.device.limits());
                log::info!(
                    "fluid backdrop: {method:?} path on {} ({:?})",
                    info.name,
                    info.backend
                );
                (
                    Some(method),
                    Some(Presenter::new(
                        &render_state.device,
                        render_state.target_format,
                    )),
                )
            }
            None => {
                log::warn!("fluid backdrop: no wgpu render state, rendering nothing");
                (None, None)
            }
        };

        Self {
            method,
            simulation: None,
            presenter,
            pointer: PointerTracker::new(),
            settings,
            reduced_motion,
            rendered_once: false,
        }
    }
}

impl eframe::App for BackdropApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        let rect = ctx.screen_rect();
        let viewport = Vec2::new(rect.width(), rect.height());
        let now = Instant::now();

        // Pointer and single-touch tracking. Multi-touch gestures are not
        // input to the simulation.
        let (pointer_pos, multi_touch) =
            ctx.input(|i| (i.pointer.latest_pos(), i.multi_touch().is_some()));
        if !multi_touch {
            if let Some(pos) = pointer_pos {
                self.pointer.observe(pos.x, pos.y, viewport, now);
            }
        }

        let minimized = ctx.input(|i| i.viewport().minimized.unwrap_or(false));
        // With reduced motion, render the first frame and then stand still.
        let halted = minimized || (self.reduced_motion && self.rendered_once);

        if let Some(render_state) = frame.wgpu_render_state() {
            let device = &render_state.device;
            let queue = &render_state.queue;
            let canvas = self
                .settings
                .canvas_size(viewport, ctx.pixels_per_point());

            // Reallocation happens here, before any encoding this frame:
            // a submission must never reference a torn-down generation.
            if let Some(sim) = &mut self.simulation {
                if sim.canvas_size() != canvas {
                    sim.resize(device, queue, canvas);
                    if let Some(presenter) = &mut self.presenter {
                        presenter.rebuild(device, sim.velocity());
                    }
                }
            } else if let Some(method) = self.method {
                if viewport.x >= 1.0 && viewport.y >= 1.0 {
                    let sim = FluidSimulation::new(device, queue, method, self.settings, canvas);
                    if let Some(presenter) = &mut self.presenter {
                        presenter.rebuild(device, sim.velocity());
                    }
                    self.simulation = Some(sim);
                }
            }

            if !halted {
                if let Some(sim) = &mut self.simulation {
                    let sample = self.pointer.tick(now);
                    let mut encoder =
                        device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                            label: Some("Fluid Step Encoder"),
                        });
                    sim.step(device, queue, &mut encoder, &sample);
                    queue.submit(Some(encoder.finish()));
                    self.rendered_once = true;
                }
            }
        }

        // Near-white backing, matching the zero-velocity field color.
        let backing = egui::Frame::NONE.fill(egui::Color32::from_rgb(247, 250, 255));
        egui::CentralPanel::default()
            .frame(backing)
            .show(ctx, |ui| {
                if let (Some(sim), Some(presenter)) = (&self.simulation, &self.presenter) {
                    let slot = sim.velocity().current_slot();
                    if let Some(callback) = presenter.paint_callback(ui.max_rect(), slot) {
                        ui.painter().add(callback);
                    }
                }
            });

        // Continuous animation; the loop stops rescheduling itself while
        // hidden and resumes on the next event-driven frame.
        if !halted {
            ctx.request_repaint();
        }
    }
}

/// Read once at startup; a mid-session preference change takes effect on
/// next launch.
fn reduced_motion_preference() -> bool {
    #[cfg(not(target_arch = "wasm32"))]
    {
        std::env::var_os("BACKDROP_REDUCE_MOTION").is_some()
    }
    #[cfg(target_arch = "wasm32")]
    {
        web_sys::window()
            .and_then(|window| {
                window
                    .match_media("(prefers-reduced-motion: reduce)")
                    .ok()
                    .flatten()
            })
            .is_some_and(|query| query.matches())
    }
}
