//! Configuration types for loading simulation scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! simulation scenario. Every section is optional and every field falls back
//! to a sensible default, so a scenario only lists what it changes.
//!
//! - [`EngineConfig`]     – switches: central mass, algorithm groups, perturbations
//! - [`ParametersConfig`] – time step, end time, dumping thresholds, body limit
//! - [`CentralConfig`]    – central body, distant star and inner fluid disk physics
//! - [`TreeConfig`]       – falcON / standard tree thresholds
//! - [`MeshConfig`]       – mesh-grid neighbour search
//! - [`CollisionConfig`]  – inelasticity and fragmentation model coefficients
//! - [`InitialConfig`]    – random draw bounds or an init file
//! - [`BodyConfig`]       – explicit initial state for each body
//! - [`OutputConfig`]     – periodic output and resume checkpoint
//! - [`ScenarioConfig`]   – top-level wrapper
//!
//! # YAML format
//!
//! ```yaml
//! engine:
//!   central_mass: true
//!   walk: { falcon: true }
//!   collision_model: { fragmentation: true }
//!
//! parameters:
//!   t_end: 10.0
//!   time_step: 0.015625
//!
//! initial:
//!   random: true
//!   n_0: 1000
//! ```
//!
//! The configuration is validated by [`crate::configuration::validate`] into
//! the runtime `Parameters` / `Engine` pair before any step runs.

use serde::Deserialize;

/// Which walk strategy handles mutual gravity and collision search.
/// Exactly one flag must be set when mutual gravity or collisions are on.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct WalkFlags {
    pub brute_force: bool,
    pub falcon: bool,
    pub standard_tree: bool,
    pub mesh: bool,
}

/// Which collision outcome model is used.
/// Exactly one flag must be set when collisions are on.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct CollisionModelFlags {
    pub elastic: bool,
    pub inelastic: bool,
    pub instant_merger: bool,
    pub fragmentation: bool,
}

/// Interactions with the central mass or a distant object
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct PerturbationFlags {
    pub j2: bool, // oblateness of the central body
    pub sun: bool, // distant object the system orbits
    pub central_tides: bool, // tides raised on the central body (constant time lag)
    pub inner_fluid_disk: bool, // disk below the Roche radius from which bodies spawn
}

/// High-level engine configuration
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct EngineConfig {
    pub central_mass: bool, // a dominant central body sits at the origin
    pub reduce_to_com: bool, // cancel position and velocity of the center of mass before simulating
    pub one_collision_only: bool, // at most one collision per body per timestep
    pub mutual_gravity: bool, // mutual gravity between the bodies
    pub collisions: bool, // bodies can collide
    pub walk: WalkFlags,
    pub collision_model: CollisionModelFlags,
    pub perturbations: PerturbationFlags,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            central_mass: true,
            reduce_to_com: true,
            one_collision_only: false,
            mutual_gravity: true,
            collisions: true,
            walk: WalkFlags { falcon: true, ..Default::default() },
            collision_model: CollisionModelFlags { fragmentation: true, ..Default::default() },
            perturbations: PerturbationFlags::default(),
        }
    }
}

/// Global numerical parameters
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ParametersConfig {
    pub t_end: f64, // total simulation length
    pub time_step: f64, // fixed timestep
    pub G: f64, // gravitational constant
    pub n_max: usize, // the run stops if the number of bodies ever exceeds this
    pub output_step: u64, // output every that many timesteps
    pub low_dumping_threshold: f64, // bodies closer to the central body are removed
    pub high_dumping_threshold: f64, // bodies farther than this are removed (unbound)
    pub softening_parameter: f64, // in units of the sum of the radii
    pub seed: Option<u64>, // deterministic seed; wall clock when absent
    pub switch_to_brute_force: usize, // below that many bodies, brute force is used
}

impl Default for ParametersConfig {
    fn default() -> Self {
        Self {
            t_end: 256.0,
            time_step: 0.015625,
            G: 4.0 * std::f64::consts::PI * std::f64::consts::PI,
            n_max: 15000,
            output_step: 32,
            low_dumping_threshold: 2.0,
            high_dumping_threshold: 128.0,
            softening_parameter: 0.0,
            seed: Some(129425372),
            switch_to_brute_force: 0,
        }
    }
}

/// Central body, distant star and inner fluid disk
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CentralConfig {
    pub r_unit: f64, // radius of the central body
    pub m_unit: f64, // mass of the central body
    pub t_earth: f64, // sidereal period in units of the surface orbital period, > 1
    pub j2_value: f64, // 0 -> fluid value 1/2 Omega^2 / Omega_crit^2
    pub k2: f64, // second Love number
    pub delta_t: f64, // tidal time lag, in units of the surface orbital period
    pub dimensionless_moi: f64, // moment of inertia in units of M R^2
    pub star_semi_major: f64, // semi-major axis of the orbit around the distant object
    pub star_mass: f64, // mass of the distant object
    pub obliquity: f64, // inclination of the distant object's orbit on the reference plane
    pub inner_mass: f64, // mass of the inner fluid disk at t = 0
    pub spawned_density: f64, // density of bodies spawned from the disk
    pub f_tilde: f64, // spawned mass parameter, < 1
    pub r_roche: f64, // Roche radius, where bodies spawn
}

impl Default for CentralConfig {
    fn default() -> Self {
        Self {
            r_unit: 1.0,
            m_unit: 1.0,
            t_earth: 3.4076,
            j2_value: 0.0,
            k2: 1.5,
            delta_t: 0.0002428,
            dimensionless_moi: 0.3307,
            star_semi_major: 23481.066,
            star_mass: 332946.0434581987,
            obliquity: 0.0,
            inner_mass: 0.014,
            spawned_density: 0.1448,
            f_tilde: 0.3,
            r_roche: 2.9,
        }
    }
}

/// Tree-code parameters (falcON and the standard tree code)
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TreeConfig {
    pub expansion_order: usize, // order p of the expansions, 1..=6
    pub theta_min: f64, // minimal opening parameter, < 1
    pub subdivision_threshold: usize, // a cell holding at most that many bodies is a leaf
    pub root_sidelength: f64, // side of the root cell, grown if bodies lie outside
    pub level_max: u32, // cells at level level_max - 1 are never divided
    pub child_multipole_threshold: usize, // bodies/children at most this -> moments from bodies
    pub n_cc_pre: usize,
    pub n_cc_post: usize,
    pub n_cs: usize,
    pub n_cb_pre: usize,
    pub n_cb_post: usize,
    pub n_cc_collision: usize,
    pub n_cs_collision: usize,
    pub n_cb_collision: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            expansion_order: 3,
            theta_min: 0.5,
            subdivision_threshold: 17,
            root_sidelength: 128.0,
            level_max: 25,
            child_multipole_threshold: 1,
            n_cc_pre: 8,
            n_cc_post: 64,
            n_cs: 64,
            n_cb_pre: 6,
            n_cb_post: 16,
            n_cc_collision: 16,
            n_cs_collision: 12,
            n_cb_collision: 16,
        }
    }
}

/// Mesh-grid neighbour search
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MeshConfig {
    pub collision_cube_min: f64, // minimal side of the mesh grid
    pub collision_cube_cells: usize, // mesh cells per dimension, even
    pub how_many_neighbours: f64, // desired expected number of neighbours
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            collision_cube_min: 80.0,
            collision_cube_cells: 1024,
            how_many_neighbours: 16.0,
        }
    }
}

/// Collision resolution coefficients
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CollisionConfig {
    pub collision_parameter: f64, // 1 (fully inelastic) ..= 2 (elastic)
    pub n_tilde: usize, // number of fragments in the tail
    pub mu_parameter: f64, // velocity exponent of the coupling parameter
    pub nu_parameter: f64, // density exponent of the coupling parameter
    pub c1_parameter: f64,
    pub k_parameter: f64,
    pub frag_threshold: f64, // ejected mass below this -> merger
    pub pq_min_max: [i32; 4], // integer rectangle of the tail grid: [p_min, p_max, q_min, q_max]
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            collision_parameter: 1.0,
            n_tilde: 15,
            mu_parameter: 0.55,
            nu_parameter: 0.4,
            c1_parameter: 1.5,
            k_parameter: 0.2,
            frag_threshold: 2.0e-8,
            pq_min_max: [-1, 3, -1, 1],
        }
    }
}

/// Initial conditions when not listed in `bodies`
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct InitialConfig {
    pub random: bool, // draw uniformly between the bounds below
    pub cartesian: bool, // init file columns are cartesian (else a, e, i, nu, omega, Omega)
    pub file: Option<String>, // 8-column init file (6 coordinates, mass, radius)
    pub n_0: usize,
    pub radius_min: f64,
    pub radius_max: f64,
    pub density_min: f64,
    pub density_max: f64,
    pub eccentricity_min: f64,
    pub eccentricity_max: f64,
    pub sma_min: f64,
    pub sma_max: f64,
    pub inclination_min: f64,
    pub inclination_max: f64,
}

impl Default for InitialConfig {
    fn default() -> Self {
        Self {
            random: false,
            cartesian: true,
            file: None,
            n_0: 1000,
            radius_min: 0.01,
            radius_max: 0.06,
            density_min: 0.1448,
            density_max: 0.1448,
            eccentricity_min: 0.0,
            eccentricity_max: 0.2,
            sma_min: 2.9,
            sma_max: 14.0,
            inclination_min: 0.0,
            inclination_max: 0.174533,
        }
    }
}

/// Periodic output and resume checkpoint
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub write: bool,
    pub directory: String,
    pub cartesian: bool, // x y z vx vy vz snapshots
    pub elliptic: bool, // a e i nu omega Omega snapshots about the central body
    pub resume: bool, // write init.txt at the end of the run
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            write: false,
            directory: "output".to_string(),
            cartesian: true,
            elliptic: false,
            resume: false,
        }
    }
}

/// Configuration for a single body's initial state
#[derive(Deserialize, Debug, Clone)]
pub struct BodyConfig {
    pub x: Vec<f64>, // initial position in simulation units
    pub v: Vec<f64>, // initial velocity in simulation units per time unit
    pub m: f64, // mass of the body
    pub radius: f64, // physical radius, used for collisions
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ScenarioConfig {
    pub engine: EngineConfig,
    pub parameters: ParametersConfig,
    pub central: CentralConfig,
    pub tree: TreeConfig,
    pub mesh: MeshConfig,
    pub collision: CollisionConfig,
    pub initial: InitialConfig,
    pub bodies: Vec<BodyConfig>, // explicit bodies; the central body is implicit
    pub output: OutputConfig,
}

impl ScenarioConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(s)
    }
}
