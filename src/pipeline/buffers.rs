//! Just some constants to make it easier to refer to registry entries in multiple places.

/// Just a place to keep buffer names.
#[non_exhaustive]
pub struct Buffers;

impl Buffers {
    /// Mouse position and pressed state, a uniform written by the host
    pub const MOUSE: &'static str = "mouse";
    /// The encoded static obstacles
    pub const OBSTACLES: &'static str = "obstacles";
    /// Every particle, owned by the particle stage
    pub const PARTICLES: &'static str = "particles";
    /// Every spring, owned by the spring stage
    pub const SPRINGS: &'static str = "springs";
    /// Fixed-point force per particle. Written by springs, consumed by particles.
    pub const FORCES: &'static str = "forces";
    /// Head of every grid cell's particle list
    pub const GRID: &'static str = "grid";
    /// Next particle in the same cell, per particle
    pub const PARTICLE_NEXT: &'static str = "particle_next";
}

/// Bind group names
#[non_exhaustive]
pub struct BindGroups;

impl BindGroups {
    /// Resources every kernel may bind at group 0
    pub const GLOBAL: &'static str = "global";
}

/// Bind group layout names
#[non_exhaustive]
pub struct BindGroupLayouts;

impl BindGroupLayouts {
    /// Layout of [`BindGroups::GLOBAL`]
    pub const GLOBAL: &'static str = "global";
}
