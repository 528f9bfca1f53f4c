#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

#[cfg(not(target_arch = "wasm32"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

// When compiling natively:
#[cfg(not(target_arch = "wasm32"))]
fn main() -> eframe::Result {
    use std::sync::Arc;

    #[cfg(feature = "logs")]
    env_logger::init(); // Log to stderr (if you run with `RUST_LOG=debug`).

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Fluid Backdrop")
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([320.0, 240.0]),
        renderer: eframe::Renderer::Wgpu,
        wgpu_options: egui_wgpu::WgpuConfiguration {
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: None, // Use default

            wgpu_setup: egui_wgpu::WgpuSetup::CreateNew(egui_wgpu::WgpuSetupCreateNew {
                // Use default instance descriptor (important for web compatibility)
                instance_descriptor: wgpu::InstanceDescriptor::default(),

                // A decorative backdrop must not contend for the discrete GPU
                power_preference: wgpu::PowerPreference::LowPower,

                // No custom adapter selector for better web compatibility
                native_adapter_selector: None,

                // Take whatever the adapter offers; the fragment fallback
                // handles devices without storage textures.
                device_descriptor: Arc::new(|adapter| wgpu::DeviceDescriptor {
                    label: Some("Fluid Backdrop Device"),
                    required_limits: adapter.limits(),
                    ..Default::default()
                }),

                trace_path: None,
            }),

            on_surface_error: Arc::new(|error| {
                log::error!("surface error: {error:?}");
                egui_wgpu::SurfaceErrorAction::RecreateSurface
            }),
        },
        depth_buffer: 0,
        multisampling: 1,
        ..Default::default()
    };
    eframe::run_native(
        "Fluid Backdrop",
        native_options,
        Box::new(|cc| Ok(Box::new(fluid_backdrop::BackdropApp::new(cc)))),
    )
}

// When compiling to web using trunk:
#[cfg(target_arch = "wasm32")]
fn main() {
    use eframe::wasm_bindgen::JsCast as _;

    // Redirect `log` message to `console.log` and friends:
    eframe::WebLogger::init(log::LevelFilter::Info).ok();

    let web_options = eframe::WebOptions::default();

    wasm_bindgen_futures::spawn_local(async {
        let document = web_sys::window()
            .expect("No window")
            .document()
            .expect("No document");

        let canvas = document
            .get_element_by_id("backdrop_canvas")
            .expect("Failed to find backdrop_canvas")
            .dyn_into::<web_sys::HtmlCanvasElement>()
            .expect("backdrop_canvas was not a HtmlCanvasElement");

        let start_result = eframe::WebRunner::new()
            .start(
                canvas,
                web_options,
                Box::new(|cc| Ok(Box::new(fluid_backdrop::BackdropApp::new(cc)))),
            )
            .await;

        // Remove the loading text and spinner:
        if let Some(loading_text) = document.get_element_by_id("loading_text") {
            match start_result {
                Ok(_) => {
                    loading_text.remove();
                }
                Err(e) => {
                    loading_text.set_inner_html(
                        "<p> The backdrop failed to start. See the developer console for details. </p>",
                    );
                    log::error!("Failed to start eframe: {e:?}");
                }
            }
        }
    });
}
