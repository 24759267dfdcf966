//! User-defineable config for a simulation

use core::f32::consts::PI;

use glam::Vec2;
use rand::{rngs::StdRng, SeedableRng as _};
use tether_gpu_shared::{constants::OBSTACLE_COUNT, Obstacle};

/// How springs connect particles
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum SpringTopology {
    /// Spring `i` joins particle `i` to particle `i + 1` along the rope
    Rope,
    /// `count` springs joining random pairs of distinct particles
    Random {
        /// Number of springs
        count: u32,
    },
}

/// All the config for a simulation
#[derive(Clone, Copy, Debug, PartialEq)]
#[expect(clippy::exhaustive_structs, reason = "Plain config, built with struct update syntax")]
pub struct SimulationConfig {
    /// Particles seeded as a rope along the top of the world. The last one is pinned.
    pub rope_particles: u32,
    /// Particles scattered randomly after the rope
    pub free_particles: u32,
    /// How the springs are wired up
    pub spring_topology: SpringTopology,
    /// Seed for the random parts of the initial state. `None` seeds from entropy.
    pub seed: Option<u64>,
    /// The static obstacles, already encoded
    pub obstacles: [Obstacle; OBSTACLE_COUNT],
}

impl Default for SimulationConfig {
    #[inline]
    fn default() -> Self {
        Self {
            rope_particles: 32,
            free_particles: 256,
            spring_topology: SpringTopology::Rope,
            seed: None,
            obstacles: [
                Obstacle::circle(Vec2::new(-0.5, -0.3), 0.2),
                Obstacle::circle(Vec2::new(0.0, -0.2), 0.1),
                Obstacle::rect(Vec2::new(0.5, 0.2), Vec2::new(0.3, 0.1), PI / 6.0),
            ],
        }
    }
}

impl SimulationConfig {
    /// Just the rope, no free particles. Handy for deterministic scenarios.
    #[must_use]
    #[inline]
    pub fn rope_only(rope_particles: u32) -> Self {
        Self {
            rope_particles,
            free_particles: 0,
            seed: Some(0),
            ..Default::default()
        }
    }

    /// Total number of particles
    #[must_use]
    #[inline]
    pub const fn particle_count(&self) -> u32 {
        self.rope_particles.saturating_add(self.free_particles)
    }

    /// Total number of springs
    #[must_use]
    #[inline]
    pub const fn spring_count(&self) -> u32 {
        match self.spring_topology {
            SpringTopology::Rope => self.rope_particles.saturating_sub(1),
            SpringTopology::Random { count } => {
                // A spring needs two distinct endpoints
                if self.particle_count() < 2 {
                    0
                } else {
                    count
                }
            }
        }
    }

    /// A random generator for one consumer of randomness. Each `stream` gets its own sequence so
    /// that, for instance, changing the spring topology doesn't reshuffle the particles.
    #[must_use]
    #[inline]
    pub fn rng(&self, stream: u64) -> StdRng {
        self.seed.map_or_else(StdRng::from_entropy, |seed| {
            StdRng::seed_from_u64(seed.wrapping_add(stream))
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng as _;
    use tether_gpu_shared::constants::{SHAPE_CIRCLE, SHAPE_RECT};

    use super::*;

    #[test]
    fn default_counts() {
        let config = SimulationConfig::default();
        assert_eq!(config.particle_count(), 288);
        assert_eq!(config.spring_count(), 31);
    }

    #[test]
    fn default_obstacles_are_two_circles_and_a_rectangle() {
        let shapes = SimulationConfig::default().obstacles.map(|obstacle| obstacle.shape);
        assert_eq!(shapes, [SHAPE_CIRCLE, SHAPE_CIRCLE, SHAPE_RECT]);
    }

    #[test]
    fn random_springs_need_two_particles() {
        let config = SimulationConfig {
            rope_particles: 1,
            free_particles: 0,
            spring_topology: SpringTopology::Random { count: 10 },
            ..Default::default()
        };
        assert_eq!(config.spring_count(), 0);
    }

    #[test]
    fn an_empty_rope_has_no_springs() {
        assert_eq!(SimulationConfig::rope_only(0).spring_count(), 0);
    }

    #[test]
    fn seeded_streams_are_reproducible_and_distinct() {
        let config = SimulationConfig::rope_only(4);
        let first: u64 = config.rng(1).gen();
        let again: u64 = config.rng(1).gen();
        let other: u64 = config.rng(2).gen();
        assert_eq!(first, again);
        assert_ne!(first, other);
    }
}
