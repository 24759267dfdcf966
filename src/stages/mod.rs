//! The four simulation stages

pub mod clean_grid;
pub mod grid;
pub mod particle;
pub mod spring;

pub use clean_grid::CleanGridStage;
pub use grid::GridStage;
pub use particle::ParticleStage;
pub use spring::SpringStage;
