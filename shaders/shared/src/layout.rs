//! Record layouts of the GPU buffers. Each must match its struct in `common.wgsl` byte for byte.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec4};

use crate::constants::{SHAPE_CIRCLE, SHAPE_RECT};

/// A single simulated particle. Index in the particle buffer is its identity.
#[derive(Pod, Zeroable, Clone, Copy, Default, Debug, PartialEq)]
#[repr(C)]
#[expect(clippy::exhaustive_structs, reason = "Fixed GPU layout")]
pub struct Particle {
    /// Homogeneous position, only `xy` are simulated
    pub position: Vec4,
    /// Velocity in world units per second
    pub velocity: Vec2,
    /// Mass, always positive
    pub mass: f32,
    /// Non-zero for pinned particles, which integration never moves
    pub is_static: u32,
}

impl Particle {
    /// A particle at rest at `position`
    #[must_use]
    #[inline]
    pub const fn at_rest(position: Vec2, mass: f32) -> Self {
        Self {
            position: Vec4::new(position.x, position.y, 0.0, 1.0),
            velocity: Vec2::ZERO,
            mass,
            is_static: 0,
        }
    }

    /// The simulated part of the position
    #[must_use]
    #[inline]
    pub fn xy(&self) -> Vec2 {
        Vec2::new(self.position.x, self.position.y)
    }

    /// Is this particle pinned in place?
    #[must_use]
    #[inline]
    pub const fn is_pinned(&self) -> bool {
        self.is_static != 0
    }
}

/// An elastic link between two particles
#[derive(Pod, Zeroable, Clone, Copy, Default, Debug, PartialEq)]
#[repr(C)]
#[expect(clippy::exhaustive_structs, reason = "Fixed GPU layout")]
pub struct Spring {
    /// Index of the first endpoint
    pub particle_a: u32,
    /// Index of the second endpoint
    pub particle_b: u32,
    /// Length at which the spring exerts no elastic force
    pub rest_length: f32,
    /// Elastic force per unit of stretch
    pub stiffness: f32,
    /// Goes from 0 to 1 once, when the elastic force exceeds `breaking_threshold`
    pub is_broken: u32,
    /// Elastic force magnitude above which the spring breaks
    pub breaking_threshold: f32,
    /// Pads the record to 32 bytes
    pub padding: [u32; 2],
}

impl Spring {
    /// Has this spring snapped?
    #[must_use]
    #[inline]
    pub const fn is_snapped(&self) -> bool {
        self.is_broken != 0
    }
}

/// A static obstacle. Circles use `params.x` as radius, rectangles use `params.xy` as half-extents.
#[derive(Pod, Zeroable, Clone, Copy, Default, Debug, PartialEq)]
#[repr(C)]
#[expect(clippy::exhaustive_structs, reason = "Fixed GPU layout")]
pub struct Obstacle {
    /// Shape-specific dimensions
    pub params: Vec4,
    /// Centre of the shape
    pub position: Vec2,
    /// Rotation in radians, counter-clockwise. Ignored for circles.
    pub rotation: f32,
    /// Either `SHAPE_CIRCLE` or `SHAPE_RECT`
    pub shape: u32,
}

impl Obstacle {
    /// Size in bytes of one record in the obstacle buffer
    pub const BYTE_SIZE: usize = size_of::<Self>();

    /// Encode a circle
    #[must_use]
    #[inline]
    pub const fn circle(center: Vec2, radius: f32) -> Self {
        Self {
            params: Vec4::new(radius, 0.0, 0.0, 0.0),
            position: center,
            rotation: 0.0,
            shape: SHAPE_CIRCLE,
        }
    }

    /// Encode a rectangle from its centre, half-extents and rotation
    #[must_use]
    #[inline]
    pub const fn rect(center: Vec2, half_extents: Vec2, rotation: f32) -> Self {
        Self {
            params: Vec4::new(half_extents.x, half_extents.y, 0.0, 0.0),
            position: center,
            rotation,
            shape: SHAPE_RECT,
        }
    }
}

/// Mouse state, as a uniform. Written by the host on input events.
#[derive(Pod, Zeroable, Clone, Copy, Default, Debug, PartialEq)]
#[repr(C)]
#[expect(clippy::exhaustive_structs, reason = "Fixed GPU layout")]
pub struct MouseState {
    /// Cursor position in world coordinates
    pub position: Vec2,
    /// Non-zero while a button is held
    pub pressed: u32,
    /// Uniforms are 16 byte aligned
    pub padding: u32,
}

impl MouseState {
    /// Byte offset of `position` inside the uniform
    pub const POSITION_OFFSET: u64 = 0;
    /// Byte offset of `pressed` inside the uniform
    pub const PRESSED_OFFSET: u64 = 8;
}

/// Per-particle force, stored as fixed-point so that it can be accumulated with integer atomics.
#[derive(Pod, Zeroable, Clone, Copy, Default, Debug, PartialEq, Eq)]
#[repr(C)]
#[expect(clippy::exhaustive_structs, reason = "Fixed GPU layout")]
pub struct ForceAccumulator {
    /// `x` component multiplied by `FORCE_SCALE`
    pub x: i32,
    /// `y` component multiplied by `FORCE_SCALE`
    pub y: i32,
}

impl ForceAccumulator {
    /// The accumulated force in world units
    #[must_use]
    #[inline]
    #[expect(clippy::as_conversions, reason = "Fixed-point to float, precision loss is fine")]
    #[expect(clippy::cast_precision_loss, reason = "Forces are nowhere near 2^24")]
    pub fn force(&self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32) / crate::constants::FORCE_SCALE
    }
}
