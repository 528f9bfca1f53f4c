pub mod app;
pub mod pointer;
pub mod render;
pub mod settings;
pub mod simulation;

pub use app::BackdropApp;
pub use pointer::{PointerSample, PointerTracker};
pub use settings::{AdvectionScheme, BoundaryMode, SimulationSettings};
pub use simulation::{FluidSimulation, SimulationMethod};
