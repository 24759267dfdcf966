//! Generates the WGSL constant declarations that every kernel is compiled with

use core::fmt::Write as _;

use crate::{constants, grid};

/// WGSL source declaring every shared constant. Prepended to each kernel before compilation.
#[must_use]
#[inline]
pub fn wgsl_prelude() -> String {
    let mut prelude = String::from("// Generated from `tether_gpu_shared::constants`\n");

    let floats = [
        ("PARTICLE_RADIUS", constants::PARTICLE_RADIUS),
        ("CELL_SIZE", constants::CELL_SIZE),
        ("X_BOUND", constants::X_BOUND),
        ("Y_BOUND", constants::Y_BOUND),
        ("TIME_STEP", constants::TIME_STEP),
        ("DAMPING", constants::DAMPING),
        ("RESTITUTION", constants::RESTITUTION),
        ("SEPARATION_STIFFNESS", constants::SEPARATION_STIFFNESS),
        ("SPRING_DAMPING", constants::SPRING_DAMPING),
        ("MOUSE_RADIUS", constants::MOUSE_RADIUS),
        ("FORCE_SCALE", constants::FORCE_SCALE),
    ];
    for (name, value) in floats {
        let _infallible = writeln!(prelude, "const {name}: f32 = {value:?};");
    }

    let unsigned = [
        ("WORKGROUP_SIZE", constants::WORKGROUP_SIZE),
        ("GRID_COLUMNS", grid::columns()),
        ("GRID_ROWS", grid::rows()),
        ("SHAPE_CIRCLE", constants::SHAPE_CIRCLE),
        ("SHAPE_RECT", constants::SHAPE_RECT),
    ];
    for (name, value) in unsigned {
        let _infallible = writeln!(prelude, "const {name}: u32 = {value}u;");
    }

    let _infallible = writeln!(prelude, "const SENTINEL: i32 = {};", constants::SENTINEL);
    let _infallible = writeln!(
        prelude,
        "const GRAVITY: vec2<f32> = vec2<f32>({:?}, {:?});",
        constants::GRAVITY.x,
        constants::GRAVITY.y
    );

    prelude
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_are_always_written_as_float_literals() {
        let prelude = wgsl_prelude();
        assert!(prelude.contains("const X_BOUND: f32 = 2.0;"));
        assert!(prelude.contains("const CELL_SIZE: f32 = 0.04;"));
        assert!(prelude.contains("const GRAVITY: vec2<f32> = vec2<f32>(0.0, -1.0);"));
    }

    #[test]
    fn grid_dimensions_are_baked_into_the_prelude() {
        let prelude = wgsl_prelude();
        assert!(prelude.contains("const GRID_COLUMNS: u32 = 101u;"));
        assert!(prelude.contains("const GRID_ROWS: u32 = 51u;"));
        assert!(prelude.contains("const SENTINEL: i32 = -1;"));
        assert!(prelude.contains("const WORKGROUP_SIZE: u32 = 64u;"));
    }
}
