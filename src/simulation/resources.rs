//! GPU-resident simulation state: the fixed set of equal-sized
//! floating-point textures the pass pipeline reads and writes.
//!
//! All textures live exactly as long as one allocation generation: they are
//! created together, cleared to zero before first use, and explicitly
//! destroyed together on resize or teardown.

use super::PassBackend;

/// A simulation texture with its render/storage view.
pub struct TextureSet {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl TextureSet {
    pub fn destroy(&self) {
        self.texture.destroy();
    }
}

/// Which half of a ping-pong pair currently holds the latest valid data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn other(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }
}

/// A ping-pong buffer pair with an explicit current-side tag. The tag is
/// the single source of truth for buffer identity; passes never compare
/// texture handles.
pub struct PingPong<T> {
    a: T,
    b: T,
    current: Slot,
}

impl<T> PingPong<T> {
    pub fn new(a: T, b: T) -> Self {
        Self {
            a,
            b,
            current: Slot::A,
        }
    }

    pub fn get(&self, slot: Slot) -> &T {
        match slot {
            Slot::A => &self.a,
            Slot::B => &self.b,
        }
    }

    /// The side holding the latest valid data.
    pub fn current(&self) -> &T {
        self.get(self.current)
    }

    /// The write target for the next pass.
    pub fn next(&self) -> &T {
        self.get(self.current.other())
    }

    pub fn current_slot(&self) -> Slot {
        self.current
    }

    /// Promote the write target to current. Called by the stepper, and
    /// only by the stepper, at each pass that completes a pair.
    pub fn swap(&mut self) {
        self.current = self.current.other();
    }
}

/// The full mutable buffer set for one allocation generation.
pub struct SimResources {
    pub velocity: PingPong<TextureSet>,
    /// Scratch target for advected velocity plus the cursor impulse;
    /// overwritten every frame.
    pub force: TextureSet,
    pub viscous: PingPong<TextureSet>,
    pub divergence: TextureSet,
    pub pressure: PingPong<TextureSet>,
    pub width: u32,
    pub height: u32,
}

impl SimResources {
    /// Allocate every texture at the given simulation size. The caller
    /// must clear them before the first frame reads them; uninitialized
    /// GPU memory must not leak into the simulation.
    pub fn allocate(
        device: &wgpu::Device,
        backend: &dyn PassBackend,
        width: u32,
        height: u32,
    ) -> Self {
        let tex = |label| backend.create_texture(device, width, height, label);
        Self {
            velocity: PingPong::new(tex("velocity a"), tex("velocity b")),
            force: tex("velocity force"),
            viscous: PingPong::new(tex("velocity viscous a"), tex("velocity viscous b")),
            divergence: tex("divergence"),
            pressure: PingPong::new(tex("pressure a"), tex("pressure b")),
            width,
            height,
        }
    }

    pub fn all(&self) -> [&TextureSet; 8] {
        [
            self.velocity.get(Slot::A),
            self.velocity.get(Slot::B),
            &self.force,
            self.viscous.get(Slot::A),
            self.viscous.get(Slot::B),
            &self.divergence,
            self.pressure.get(Slot::A),
            self.pressure.get(Slot::B),
        ]
    }

    /// Explicit, total destruction. GPU textures are not collected; their
    /// lifetime is scoped to the component's mounted lifetime.
    pub fn destroy(&self) {
        for texture in self.all() {
            texture.destroy();
        }
    }
}
