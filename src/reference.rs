//! The four kernels, run on the CPU.
//!
//! Same record layouts, same constants and the same atomic operations as the WGSL, one loop
//! iteration per invocation. Useful for checking the simulation's invariants without a GPU and
//! as the expected side of GPU parity tests. Invocation order is sequential here, so results
//! only match the GPU exactly where the GPU's order doesn't matter.

use core::sync::atomic::{AtomicI32, Ordering};

use glam::Vec2;
use tether_gpu_shared::{
    constants::{
        CELL_SIZE, DAMPING, FORCE_SCALE, GRAVITY, MOUSE_RADIUS, OBSTACLE_COUNT, PARTICLE_RADIUS,
        RESTITUTION, SENTINEL, SEPARATION_STIFFNESS, SHAPE_CIRCLE, SPRING_DAMPING, TIME_STEP,
        X_BOUND, Y_BOUND,
    },
    grid, ForceAccumulator, GridSnapshot, MouseState, Obstacle, Particle, Spring,
};

use crate::{
    config::SimulationConfig,
    stages::{particle::seed_particles, spring::seed_springs},
};

/// A particle's position and velocity while its collisions are being resolved
#[derive(Clone, Copy, Debug, PartialEq)]
struct Contact {
    position: Vec2,
    velocity: Vec2,
}

/// A simulation held entirely in host memory
pub struct ReferenceSimulation {
    /// Every particle
    pub particles: Vec<Particle>,
    /// Every spring
    pub springs: Vec<Spring>,
    /// The static obstacles
    pub obstacles: [Obstacle; OBSTACLE_COUNT],
    /// Mouse state, as the uniform would hold it
    pub mouse: MouseState,
    /// Fixed-point force per particle
    forces: Vec<[AtomicI32; 2]>,
    /// Head of every cell's list
    heads: Vec<AtomicI32>,
    /// Next particle in the same cell
    next: Vec<AtomicI32>,
}

fn sentinels(count: usize) -> Vec<AtomicI32> {
    (0..count).map(|_| AtomicI32::new(SENTINEL)).collect()
}

impl ReferenceSimulation {
    /// Seed a simulation exactly as the GPU stages would
    #[must_use]
    #[inline]
    #[expect(clippy::as_conversions, reason = "u32 always fits in usize on our targets")]
    pub fn new(config: &SimulationConfig) -> Self {
        let particles = seed_particles(config);
        let forces = particles
            .iter()
            .map(|_| [AtomicI32::new(0), AtomicI32::new(0)])
            .collect();
        Self {
            next: sentinels(particles.len()),
            heads: sentinels(grid::cell_count() as usize),
            forces,
            particles,
            springs: seed_springs(config),
            obstacles: config.obstacles,
            mouse: MouseState::default(),
        }
    }

    /// Move or press the mouse
    #[inline]
    pub fn set_mouse(&mut self, position: Vec2, pressed: bool) {
        self.mouse.position = position;
        self.mouse.pressed = u32::from(pressed);
    }

    /// One whole frame, in the same pass order as the GPU
    #[inline]
    pub fn step(&mut self) {
        self.clear_grid();
        self.accumulate_springs();
        self.build_grid();
        self.integrate_particles();
    }

    /// The clean grid kernel
    #[inline]
    pub fn clear_grid(&mut self) {
        for entry in self.heads.iter().chain(&self.next) {
            entry.store(SENTINEL, Ordering::Relaxed);
        }
    }

    /// The grid kernel
    #[inline]
    pub fn build_grid(&self) {
        for index in 0..self.particles.len() {
            self.insert_particle(index);
        }
    }

    /// A single invocation of the grid kernel
    #[expect(clippy::as_conversions, reason = "Mirrors the kernel's casts")]
    #[expect(clippy::cast_possible_truncation, reason = "Particle counts fit in i32")]
    #[expect(clippy::cast_possible_wrap, reason = "Particle counts fit in i32")]
    fn insert_particle(&self, index: usize) {
        let Some(particle) = self.particles.get(index) else {
            return;
        };
        let cell = grid::cell_index(particle.xy()) as usize;
        let (Some(head), Some(link)) = (self.heads.get(cell), self.next.get(index)) else {
            return;
        };
        let previous_head = head.swap(index as i32, Ordering::Relaxed);
        link.store(previous_head, Ordering::Relaxed);
    }

    /// The spring kernel
    #[inline]
    pub fn accumulate_springs(&mut self) {
        for index in 0..self.springs.len() {
            self.apply_spring(index);
        }
    }

    /// A single invocation of the spring kernel
    #[expect(clippy::as_conversions, reason = "u32 always fits in usize on our targets")]
    fn apply_spring(&mut self, index: usize) {
        let Some(&spring) = self.springs.get(index) else {
            return;
        };
        if spring.is_snapped() {
            return;
        }
        let (Some(a), Some(b)) = (
            self.particles.get(spring.particle_a as usize),
            self.particles.get(spring.particle_b as usize),
        ) else {
            return;
        };

        let offset = b.xy() - a.xy();
        let span = offset.length();
        if span <= 0.0 {
            return;
        }
        let direction = offset / span;

        let elastic = spring.stiffness * (span - spring.rest_length);
        let closing_speed = (b.velocity - a.velocity).dot(direction);
        let force = direction * (elastic + SPRING_DAMPING * closing_speed);
        self.add_force(spring.particle_a as usize, force);
        self.add_force(spring.particle_b as usize, -force);

        if elastic.abs() > spring.breaking_threshold {
            if let Some(snapped) = self.springs.get_mut(index) {
                snapped.is_broken = 1;
            }
        }
    }

    #[expect(clippy::as_conversions, reason = "Mirrors the kernel's `i32(round(..))`")]
    #[expect(clippy::cast_possible_truncation, reason = "Saturates, like the kernel")]
    fn add_force(&self, index: usize, force: Vec2) {
        let Some([x, y]) = self.forces.get(index) else {
            return;
        };
        x.fetch_add((force.x * FORCE_SCALE).round_ties_even() as i32, Ordering::Relaxed);
        y.fetch_add((force.y * FORCE_SCALE).round_ties_even() as i32, Ordering::Relaxed);
    }

    /// The particle kernel. Neighbours are read from the positions at the start of the pass.
    #[inline]
    pub fn integrate_particles(&mut self) {
        let before = self.particles.clone();
        for (index, particle) in self.particles.iter_mut().enumerate() {
            let Some([x, y]) = self.forces.get(index) else {
                continue;
            };
            let fixed = Vec2::new(
                fixed_to_float(x.swap(0, Ordering::Relaxed)),
                fixed_to_float(y.swap(0, Ordering::Relaxed)),
            );
            if particle.is_pinned() {
                continue;
            }

            let force = fixed / FORCE_SCALE;
            let separation = separation(&before, &self.heads, &self.next, index, particle.xy());
            let acceleration = force / particle.mass + GRAVITY + separation;
            let velocity = (particle.velocity + acceleration * TIME_STEP) * DAMPING;

            let mut contact = Contact {
                position: particle.xy() + velocity * TIME_STEP,
                velocity,
            };
            for obstacle in &self.obstacles {
                contact = collide_obstacle(contact, obstacle);
            }
            if self.mouse.pressed != 0 {
                contact = push_out_of_circle(contact, self.mouse.position, MOUSE_RADIUS);
            }
            contact = keep_in_bounds(contact);

            particle.position.x = contact.position.x;
            particle.position.y = contact.position.y;
            particle.velocity = contact.velocity;
        }
    }

    /// Forces accumulated since they were last consumed
    #[must_use]
    #[inline]
    pub fn forces(&self) -> Vec<ForceAccumulator> {
        self.forces
            .iter()
            .map(|[x, y]| ForceAccumulator {
                x: x.load(Ordering::Relaxed),
                y: y.load(Ordering::Relaxed),
            })
            .collect()
    }

    /// The grid and the particle links, as they stand
    #[must_use]
    #[inline]
    pub fn grid_snapshot(&self) -> GridSnapshot {
        let load = |entries: &[AtomicI32]| -> Vec<i32> {
            entries
                .iter()
                .map(|entry| entry.load(Ordering::Relaxed))
                .collect()
        };
        GridSnapshot {
            heads: load(&self.heads),
            next: load(&self.next),
        }
    }
}

#[expect(clippy::as_conversions, reason = "Mirrors the kernel's `f32(..)`")]
#[expect(clippy::cast_precision_loss, reason = "Mirrors the kernel's `f32(..)`")]
fn fixed_to_float(fixed: i32) -> f32 {
    fixed as f32
}

fn rotate(vector: Vec2, angle: f32) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(cos * vector.x - sin * vector.y, sin * vector.x + cos * vector.y)
}

/// Move onto the surface and reflect any velocity heading into it
fn bounce(contact: Contact, normal: Vec2, surface: Vec2) -> Contact {
    let approach = contact.velocity.dot(normal);
    let velocity = if approach < 0.0 {
        contact.velocity - (1.0 + RESTITUTION) * approach * normal
    } else {
        contact.velocity
    };
    Contact {
        position: surface,
        velocity,
    }
}

fn push_out_of_circle(contact: Contact, center: Vec2, radius: f32) -> Contact {
    let offset = contact.position - center;
    let gap = offset.length();
    let reach = radius + PARTICLE_RADIUS;
    if gap >= reach || gap <= 0.0 {
        return contact;
    }
    let normal = offset / gap;
    bounce(contact, normal, center + normal * reach)
}

fn push_out_of_rect(contact: Contact, center: Vec2, extent: Vec2, rotation: f32) -> Contact {
    let relative = rotate(contact.position - center, -rotation);
    let reach = extent + Vec2::splat(PARTICLE_RADIUS);
    let depth = relative.abs() - reach;
    if depth.x >= 0.0 || depth.y >= 0.0 {
        return contact;
    }
    let side = Vec2::select(relative.cmpge(Vec2::ZERO), Vec2::ONE, Vec2::NEG_ONE);
    let mut surface = relative;
    // Leave through the nearest edge
    let normal = if depth.x > depth.y {
        surface.x = side.x * reach.x;
        Vec2::new(side.x, 0.0)
    } else {
        surface.y = side.y * reach.y;
        Vec2::new(0.0, side.y)
    };
    bounce(
        contact,
        rotate(normal, rotation),
        center + rotate(surface, rotation),
    )
}

fn collide_obstacle(contact: Contact, obstacle: &Obstacle) -> Contact {
    if obstacle.shape == SHAPE_CIRCLE {
        return push_out_of_circle(contact, obstacle.position, obstacle.params.x);
    }
    push_out_of_rect(
        contact,
        obstacle.position,
        Vec2::new(obstacle.params.x, obstacle.params.y),
        obstacle.rotation,
    )
}

fn keep_in_bounds(contact: Contact) -> Contact {
    let mut result = contact;
    let limit = Vec2::new(X_BOUND, Y_BOUND) - Vec2::splat(PARTICLE_RADIUS);
    if result.position.x.abs() > limit.x {
        result.position.x = result.position.x.clamp(-limit.x, limit.x);
        result.velocity.x = -result.velocity.x * RESTITUTION;
    }
    if result.position.y.abs() > limit.y {
        result.position.y = result.position.y.clamp(-limit.y, limit.y);
        result.velocity.y = -result.velocity.y * RESTITUTION;
    }
    result
}

/// Push apart from overlapping particles in the surrounding 3x3 cells
#[expect(clippy::as_conversions, reason = "Mirrors the kernel's casts")]
#[expect(clippy::cast_sign_loss, reason = "Walked indices are never negative")]
#[expect(clippy::cast_possible_wrap, reason = "Grid dimensions fit in i32")]
fn separation(
    particles: &[Particle],
    heads: &[AtomicI32],
    next: &[AtomicI32],
    index: usize,
    position: Vec2,
) -> Vec2 {
    let mut acceleration = Vec2::ZERO;
    let home = grid::cell_coords(position);
    let reach = 2.0 * PARTICLE_RADIUS;
    let (columns, rows) = (grid::columns() as i32, grid::rows() as i32);

    for dy in -1..=1 {
        for dx in -1..=1 {
            let (column, row) = (home.x + dx, home.y + dy);
            if column < 0 || row < 0 || column >= columns || row >= rows {
                continue;
            }
            let cell = (row * columns + column) as usize;
            let mut other = heads
                .get(cell)
                .map_or(SENTINEL, |head| head.load(Ordering::Relaxed));
            let mut visited = 0;
            while other != SENTINEL && visited < particles.len() {
                let neighbour = other as usize;
                if neighbour != index {
                    if let Some(particle) = particles.get(neighbour) {
                        let offset = position - particle.xy();
                        let gap = offset.length();
                        if gap > 0.0 && gap < reach {
                            acceleration += (offset / gap) * (reach - gap) * SEPARATION_STIFFNESS;
                        }
                    }
                }
                other = next
                    .get(neighbour)
                    .map_or(SENTINEL, |link| link.load(Ordering::Relaxed));
                visited += 1;
            }
        }
    }
    acceleration
}

// The 3x3 walk only finds every overlapping neighbour while a cell is at least a particle's reach
const _: () = assert!(CELL_SIZE >= 2.0 * PARTICLE_RADIUS);

#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]
#[cfg(test)]
mod tests {
    use tether_gpu_shared::constants::ROPE_HEIGHT;

    use super::*;
    use crate::config::SpringTopology;

    fn rope() -> ReferenceSimulation {
        ReferenceSimulation::new(&SimulationConfig::rope_only(32))
    }

    #[test]
    fn pinned_particles_never_move() {
        let mut simulation = ReferenceSimulation::new(&SimulationConfig {
            seed: Some(5),
            ..Default::default()
        });
        let pinned = simulation.particles[31];
        for _ in 0..120 {
            simulation.step();
            assert_eq!(simulation.particles[31], pinned);
        }
    }

    #[test]
    fn one_frame_of_the_rope_moves_everything_but_the_pin() {
        let mut simulation = rope();
        let before = simulation.particles.clone();
        simulation.step();

        assert_eq!(simulation.particles[31], before[31]);
        assert_eq!(
            simulation.particles[31].xy(),
            Vec2::new(before[31].position.x, ROPE_HEIGHT)
        );
        for (after, before) in simulation.particles[..31].iter().zip(&before) {
            assert_ne!(after.xy(), before.xy());
        }
    }

    #[test]
    fn forces_are_consumed_by_integration() {
        let mut simulation = rope();
        simulation.accumulate_springs();
        assert!(simulation.forces().iter().any(|force| force.x != 0));
        simulation.integrate_particles();
        assert!(simulation
            .forces()
            .iter()
            .all(|&force| force == ForceAccumulator::default()));
    }

    #[test]
    fn spring_forces_are_equal_and_opposite() {
        let mut simulation = ReferenceSimulation::new(&SimulationConfig::rope_only(2));
        // Close enough that the spring holds
        simulation.particles[1].position.x = -0.9;
        simulation.accumulate_springs();
        assert!(!simulation.springs[0].is_snapped());
        let forces = simulation.forces();
        assert_eq!(forces[0].x, -forces[1].x);
        assert_eq!(forces[0].y, -forces[1].y);
        // Stretched beyond the rest length, so the endpoints are pulled together
        assert!(forces[0].x > 0);
    }

    #[test]
    fn a_spring_still_pulls_in_the_frame_it_snaps() {
        // The default two-particle rope is stretched far past its breaking force
        let mut simulation = ReferenceSimulation::new(&SimulationConfig::rope_only(2));
        simulation.accumulate_springs();
        assert!(simulation.springs[0].is_snapped());
        let forces = simulation.forces();
        assert!(forces[0].x > 0);
        assert_eq!(forces[0].x, -forces[1].x);

        simulation.integrate_particles();
        simulation.accumulate_springs();
        assert!(simulation
            .forces()
            .iter()
            .all(|&force| force == ForceAccumulator::default()));
    }

    #[test]
    fn broken_springs_stay_broken_and_exert_nothing() {
        let mut simulation = rope();
        simulation.springs[3].breaking_threshold = 0.0;
        simulation.accumulate_springs();
        assert!(simulation.springs[3].is_snapped());

        simulation.springs[3].breaking_threshold = f32::MAX;
        for _ in 0..30 {
            simulation.step();
            assert!(simulation.springs[3].is_snapped());
        }

        // With only the broken spring left, nothing pulls on its endpoints
        let mut lone = ReferenceSimulation::new(&SimulationConfig::rope_only(2));
        lone.springs[0].is_broken = 1;
        lone.accumulate_springs();
        assert!(lone
            .forces()
            .iter()
            .all(|&force| force == ForceAccumulator::default()));
    }

    #[test]
    fn the_grid_partitions_every_particle() {
        let mut simulation = ReferenceSimulation::new(&SimulationConfig {
            seed: Some(9),
            ..Default::default()
        });
        for _ in 0..10 {
            simulation.step();
            let snapshot = simulation.grid_snapshot();
            assert!(snapshot.is_partition());
        }
    }

    #[test]
    fn clearing_resets_every_entry() {
        let mut simulation = rope();
        simulation.build_grid();
        assert!(!simulation.grid_snapshot().is_cleared());
        simulation.clear_grid();
        assert!(simulation.grid_snapshot().is_cleared());
    }

    #[test]
    fn particles_in_the_same_cell_share_a_list() {
        let mut simulation = ReferenceSimulation::new(&SimulationConfig::rope_only(3));
        for particle in &mut simulation.particles {
            particle.position.x = 0.001;
            particle.position.y = 0.001;
        }
        simulation.build_grid();
        let snapshot = simulation.grid_snapshot();
        let cell = grid::cell_index(Vec2::new(0.001, 0.001)) as usize;
        // Each insert goes to the front
        assert_eq!(snapshot.cell_members(cell), Some(vec![2, 1, 0]));
        assert_eq!(snapshot.occupied_cells(), 1);
    }

    #[test]
    fn random_topologies_keep_the_grid_consistent() {
        let mut simulation = ReferenceSimulation::new(&SimulationConfig {
            spring_topology: SpringTopology::Random { count: 64 },
            seed: Some(4),
            ..Default::default()
        });
        for _ in 0..5 {
            simulation.step();
        }
        assert!(simulation.grid_snapshot().is_partition());
    }

    #[test]
    fn overlapping_particles_are_pushed_apart() {
        let mut simulation = ReferenceSimulation::new(&SimulationConfig {
            rope_particles: 0,
            free_particles: 2,
            seed: Some(0),
            ..Default::default()
        });
        simulation.particles[0] = Particle::at_rest(Vec2::new(1.5, 0.5), 1.0);
        simulation.particles[1] = Particle::at_rest(Vec2::new(1.51, 0.5), 1.0);
        simulation.step();
        assert!(simulation.particles[0].velocity.x < 0.0);
        assert!(simulation.particles[1].velocity.x > 0.0);
    }

    #[test]
    fn a_pressed_mouse_pushes_particles_away() {
        let mut simulation = ReferenceSimulation::new(&SimulationConfig::rope_only(2));
        let target = simulation.particles[0].xy();
        simulation.set_mouse(target + Vec2::new(0.0, 0.05), true);
        simulation.step();
        let distance = simulation.particles[0].xy().distance(simulation.mouse.position);
        assert!(distance >= MOUSE_RADIUS + PARTICLE_RADIUS - 1e-5);
    }

    #[test]
    fn a_released_mouse_is_ignored() {
        let mut pressed = ReferenceSimulation::new(&SimulationConfig::rope_only(2));
        let mut released = ReferenceSimulation::new(&SimulationConfig::rope_only(2));
        let near = pressed.particles[0].xy() + Vec2::new(0.0, 0.05);
        pressed.set_mouse(near, true);
        released.set_mouse(near, false);
        pressed.step();
        released.step();
        assert_ne!(pressed.particles[0], released.particles[0]);
        let mut untouched = ReferenceSimulation::new(&SimulationConfig::rope_only(2));
        untouched.step();
        assert_eq!(released.particles[0], untouched.particles[0]);
    }

    #[test]
    fn circles_push_particles_to_their_surface() {
        let contact = Contact {
            position: Vec2::new(0.05, 0.0),
            velocity: Vec2::new(-1.0, 0.0),
        };
        let pushed = push_out_of_circle(contact, Vec2::ZERO, 0.1);
        assert!((pushed.position.x - (0.1 + PARTICLE_RADIUS)).abs() < 1e-6);
        assert!((pushed.velocity.x - RESTITUTION).abs() < 1e-6);
    }

    #[test]
    fn rectangles_push_out_through_the_nearest_edge() {
        let contact = Contact {
            position: Vec2::new(0.0, 0.09),
            velocity: Vec2::new(0.0, -1.0),
        };
        let pushed = push_out_of_rect(contact, Vec2::ZERO, Vec2::new(0.3, 0.1), 0.0);
        assert!((pushed.position.y - (0.1 + PARTICLE_RADIUS)).abs() < 1e-6);
        assert!((pushed.position.x).abs() < 1e-6);
        assert!(pushed.velocity.y > 0.0);
    }

    #[test]
    fn rotated_rectangles_push_along_their_own_axes() {
        let rotation = core::f32::consts::FRAC_PI_2;
        // Rotated a quarter turn, the long side runs vertically
        let contact = Contact {
            position: Vec2::new(0.09, 0.0),
            velocity: Vec2::ZERO,
        };
        let pushed = push_out_of_rect(contact, Vec2::ZERO, Vec2::new(0.3, 0.1), rotation);
        assert!((pushed.position.x - (0.1 + PARTICLE_RADIUS)).abs() < 1e-5);
        assert!(pushed.position.y.abs() < 1e-5);
    }

    #[test]
    fn particles_outside_an_obstacle_are_untouched() {
        let contact = Contact {
            position: Vec2::new(1.0, 1.0),
            velocity: Vec2::ONE,
        };
        let obstacle = Obstacle::rect(Vec2::ZERO, Vec2::new(0.3, 0.1), 0.5);
        assert_eq!(collide_obstacle(contact, &obstacle), contact);
    }

    #[test]
    fn world_bounds_clamp_and_bounce() {
        let contact = Contact {
            position: Vec2::new(2.5, -1.5),
            velocity: Vec2::new(1.0, -2.0),
        };
        let kept = keep_in_bounds(contact);
        assert!((kept.position.x - (X_BOUND - PARTICLE_RADIUS)).abs() < 1e-6);
        assert!((kept.position.y + (Y_BOUND - PARTICLE_RADIUS)).abs() < 1e-6);
        assert!((kept.velocity.x + RESTITUTION).abs() < 1e-6);
        assert!((kept.velocity.y - 2.0 * RESTITUTION).abs() < 1e-6);
    }
}
