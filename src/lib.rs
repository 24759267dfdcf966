//! 2D particle-spring physics, simulated entirely in GPU compute passes.
//!
//! A [`PhysicsEngine`] owns four compute stages:
//!   * particles, integrated from spring forces, gravity and neighbour separation, and collided
//!     against obstacles, the mouse and the world bounds
//!   * springs, which accumulate forces into a shared buffer and snap when overstretched
//!   * a uniform grid of per-cell linked lists, rebuilt every frame
//!   * a stage that clears that grid
//!
//! Stages share buffers through a [`Registry`] and declare what they provide and depend on with a
//! [`Descriptor`](pipeline::descriptor::Descriptor). The engine resolves their circular
//! dependencies with a three-phase initialization.
//!
//! Rendering is left to the caller, who can bind the particle, spring and obstacle buffers
//! directly.

#![allow(clippy::pub_use, reason = "Re-exporting the main types at the crate root")]

pub mod config;
pub mod engine;
pub mod error;
pub mod gpu_manager;
pub mod pipeline;
pub mod reference;
pub mod registry;
pub mod shader;
pub mod stages;

pub use config::{SimulationConfig, SpringTopology};
pub use engine::{FramePass, PhysicsEngine};
pub use error::{Error, Result};
pub use gpu_manager::{GPUManager, Gpu};
pub use reference::ReferenceSimulation;
pub use registry::{Registration, Registry, ResourceKind};
pub use shader::{ShaderLibrary, ShaderLoader};
pub use tether_gpu_shared as shared;
