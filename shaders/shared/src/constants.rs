//! Tunable constants used by both the host and the kernels.
//!
//! Changing anything here changes the kernels too, they're compiled with a prelude generated from
//! these values.

use glam::Vec2;

/// Marks an empty grid cell and the end of a cell's particle list.
pub const SENTINEL: i32 = -1;

/// Number of invocations in a single workgroup, for every simulation kernel.
pub const WORKGROUP_SIZE: u32 = 64;

/// Radius of a single particle. Also used as the collision margin against obstacles.
pub const PARTICLE_RADIUS: f32 = 0.01;

/// Side length of a square spatial grid cell
pub const CELL_SIZE: f32 = PARTICLE_RADIUS * 4.0;

/// Half-width of the simulated world. The grid covers `[-X_BOUND, X_BOUND]`.
pub const X_BOUND: f32 = 2.0;

/// Half-height of the simulated world. The grid covers `[-Y_BOUND, Y_BOUND]`.
pub const Y_BOUND: f32 = 1.0;

/// Seconds simulated by one frame
pub const TIME_STEP: f32 = 1.0 / 60.0;

/// Constant acceleration applied to every free particle
pub const GRAVITY: Vec2 = Vec2::new(0.0, -1.0);

/// Fraction of velocity kept after every integration step
pub const DAMPING: f32 = 0.998;

/// Fraction of the normal velocity kept when bouncing off a surface
pub const RESTITUTION: f32 = 0.5;

/// Acceleration per unit of overlap between two particles
pub const SEPARATION_STIFFNESS: f32 = 500.0;

/// Damping along a spring's axis, proportional to the endpoints' relative velocity
pub const SPRING_DAMPING: f32 = 2.0;

/// Radius of the circle pushed around by a pressed mouse
pub const MOUSE_RADIUS: f32 = 0.1;

/// Forces are accumulated as fixed-point integers, because WGSL only has integer atomics.
pub const FORCE_SCALE: f32 = 1000.0;

/// Initial height of the seeded rope
pub const ROPE_HEIGHT: f32 = 0.8;

/// Rest length of every seeded spring
pub const REST_LENGTH: f32 = 0.05;

/// Lowest stiffness of a seeded spring. Stiffness ramps up across the spring index range.
pub const MIN_STIFFNESS: f32 = 500.0;

/// How much stiffer the last seeded spring is than the first.
pub const STIFFNESS_RAMP: f32 = 1000.0;

/// Elastic force above which a spring snaps for good
pub const BREAKING_FORCE: f32 = 100.0;

/// Number of static obstacle records in the obstacle buffer
pub const OBSTACLE_COUNT: usize = 3;

/// Shape tag of a circular obstacle
pub const SHAPE_CIRCLE: u32 = 0;

/// Shape tag of a rotated rectangular obstacle
pub const SHAPE_RECT: u32 = 1;
