//! Code shared by both the CPU and GPU
//!
//! The WGSL kernels can't import Rust, so every record layout and every numeric constant that a
//! kernel depends on is defined here once. The host writes buffers with these layouts, and the
//! constants reach the kernels through the generated [`wgsl_prelude`].

#![allow(clippy::pub_use, reason = "Re-exporting the main types at the crate root")]

pub mod constants;
pub mod grid;
pub mod layout;
pub mod prelude;

pub use crate::grid::GridSnapshot;
pub use crate::layout::{ForceAccumulator, MouseState, Obstacle, Particle, Spring};
pub use crate::prelude::wgsl_prelude;
