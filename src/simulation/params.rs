//! Numerical and physical parameters for the simulation
//!
//! `Parameters` is the validated, immutable counterpart of the YAML-facing
//! `ScenarioConfig`. It is built once by `configuration::validate` and then
//! passed by reference into every component.

use crate::configuration::config::{CentralConfig, CollisionConfig, MeshConfig, TreeConfig};

#[derive(Debug, Clone)]
pub struct Parameters {
    pub t_end: f64, // time end
    pub dt: f64, // fixed time step
    pub G: f64, // gravitational constant
    pub n_max: usize, // hard maximum of live bodies
    pub output_step: u64, // output cadence in timesteps
    pub low_dumping_threshold: f64,
    pub high_dumping_threshold: f64,
    pub softening: f64, // in units of the sum of the radii
    pub seed: u64, // deterministic seed
    pub switch_to_brute_force: usize,
    pub central: CentralConfig,
    pub tree: TreeConfig,
    pub mesh: MeshConfig,
    pub collision: CollisionConfig,
}

impl Parameters {
    /// Orbital frequency at the surface of the central body
    pub fn surface_frequency(&self) -> f64 {
        (self.G * self.central.m_unit / self.central.r_unit.powi(3)).sqrt()
    }

    /// Orbital period at the surface of the central body
    pub fn surface_period(&self) -> f64 {
        2.0 * std::f64::consts::PI / self.surface_frequency()
    }

    /// Number of whole timesteps until `t_end`
    pub fn total_steps(&self) -> u64 {
        (self.t_end / self.dt).round() as u64
    }
}
