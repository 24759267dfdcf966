//! Runs the default simulation headlessly and logs what the rope does.
//!
//! `RUST_LOG=info cargo run`

use tether::{GPUManager, PhysicsEngine, ShaderLibrary, SimulationConfig};

/// Frames to simulate, 10 seconds at 60 FPS
const FRAMES: u32 = 600;

/// The mouse is pressed on the rope for the second half
const PRESS_AT: u32 = FRAMES / 2;

fn main() -> Result<(), tether::Error> {
    env_logger::init();

    let manager = pollster::block_on(GPUManager::setup())?;
    let engine = PhysicsEngine::new(
        manager.gpu.clone(),
        SimulationConfig::default(),
        &ShaderLibrary::embedded(),
    )?;
    log::info!(
        "Simulating {} particles, {} springs, {} obstacles over {} grid cells",
        engine.particle_count(),
        engine.spring_count(),
        engine.obstacle_count(),
        engine.grid_cell_count()
    );

    engine.update_mouse_position(0.0, 0.5);
    for frame in 0..FRAMES {
        if frame == PRESS_AT {
            log::info!("Pressing the mouse");
            engine.update_mouse_pressed(true);
        }
        engine.run();

        if frame % 60 == 0 {
            report(&engine, frame)?;
        }
    }
    report(&engine, FRAMES)?;

    Ok(())
}

/// Log the free end of the rope, broken springs and grid occupancy
fn report(engine: &PhysicsEngine, frame: u32) -> Result<(), tether::Error> {
    let particles = engine.read_particles()?;
    let springs = engine.read_springs()?;
    let grid = engine.read_grid()?;

    let broken = springs.iter().filter(|spring| spring.is_snapped()).count();
    if let Some(tail) = particles.first() {
        log::info!(
            "Frame {frame}: rope tail at {:?}, {broken} broken springs, {} occupied cells",
            tail.xy(),
            grid.occupied_cells()
        );
    }
    Ok(())
}
