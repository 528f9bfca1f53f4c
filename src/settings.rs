use glam::Vec2;

/// How the simulated domain meets the texture edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryMode {
    /// Sample one texel inside the edge (default).
    Inset,
    /// Fill the texture edge-to-edge.
    Bounce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvectionScheme {
    /// Single backward trace.
    SemiLagrangian,
    /// Back-and-forth error compensation; less numerical smearing.
    Bfecc,
}

/// Immutable simulation configuration. Built once before the first frame
/// and re-applied wholesale on resize; never mutated in place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationSettings {
    pub iterations_poisson: u32,
    pub iterations_viscous: u32,
    pub mouse_force: f32,
    /// Simulation texture size relative to canvas pixels.
    pub resolution: f32,
    /// Cursor impulse radius, in simulation texels.
    pub cursor_size: f32,
    pub viscosity: f32,
    pub dt: f32,
    pub boundary: BoundaryMode,
    pub viscous: bool,
    pub advection: AdvectionScheme,
    /// Device-pixel-ratio ceiling, bounding GPU cost on hidpi displays.
    pub dpr_cap: f32,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            iterations_poisson: 32,
            iterations_viscous: 32,
            mouse_force: 20.0,
            resolution: 0.5,
            cursor_size: 100.0,
            viscosity: 30.0,
            dt: 0.014,
            boundary: BoundaryMode::Inset,
            viscous: false,
            advection: AdvectionScheme::Bfecc,
            dpr_cap: 2.0,
        }
    }
}

impl SimulationSettings {
    /// Canvas size in physical pixels, from logical points and the
    /// display's pixel ratio capped at `dpr_cap`.
    pub fn canvas_size(&self, points: Vec2, pixels_per_point: f32) -> [u32; 2] {
        let scale = pixels_per_point.min(self.dpr_cap).max(0.0);
        [
            ((points.x * scale).floor() as u32).max(1),
            ((points.y * scale).floor() as u32).max(1),
        ]
    }

    /// Simulation texture size for a given canvas size.
    pub fn fbo_size(&self, canvas: [u32; 2]) -> [u32; 2] {
        [
            ((self.resolution * canvas[0] as f32).round() as u32).max(1),
            ((self.resolution * canvas[1] as f32).round() as u32).max(1),
        ]
    }

    /// One-texel UV step for a simulation texture.
    pub fn texel(fbo: [u32; 2]) -> Vec2 {
        Vec2::new(1.0 / fbo[0] as f32, 1.0 / fbo[1] as f32)
    }

    /// UV offset applied when mapping an output cell to its sample
    /// position, in every pass.
    pub fn boundary_offset(&self, fbo: [u32; 2]) -> Vec2 {
        match self.boundary {
            BoundaryMode::Bounce => Vec2::ZERO,
            BoundaryMode::Inset => Self::texel(fbo),
        }
    }
}
