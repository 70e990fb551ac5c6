//! Build fully-initialized simulations from configuration
//!
//! Takes a `ScenarioConfig` (YAML-facing) and produces a `Scenario`, the
//! runtime bundle holding:
//! - engine settings (`Engine`)
//! - numerical parameters (`Parameters`)
//! - the initial bodies, from the init file, the explicit `bodies` list and
//!   random draws, in that order
//! - the central body, when there is one
//!
//! `Scenario::into_simulation` hands everything to a `Simulation`, which
//! performs the centre-of-mass reduction and the first walk.

use std::f64::consts::TAU;
use std::path::Path;

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::configuration::config::{BodyConfig, InitialConfig, ScenarioConfig};
use crate::configuration::validate::validate;
use crate::output::writer::read_init_file;
use crate::simulation::elements::OrbitalElements;
use crate::simulation::engine::Engine;
use crate::simulation::error::SimError;
use crate::simulation::integrator::Simulation;
use crate::simulation::params::Parameters;
use crate::simulation::states::{sphere_volume, Body, CentralBody, NVec3};

pub struct Scenario {
    pub engine: Engine,
    pub parameters: Parameters,
    pub bodies: Vec<Body>,
    pub central: Option<CentralBody>,
}

impl Scenario {
    pub fn build(cfg: &ScenarioConfig) -> Result<Self, SimError> {
        let (parameters, engine) = validate(cfg)?;

        // Central body spins about z, `t_earth` surface periods per turn
        let central = engine.central_mass.then(|| {
            let c = &parameters.central;
            let spin = NVec3::z() * parameters.surface_frequency() / c.t_earth;
            CentralBody::new(c.m_unit, c.r_unit, spin)
        });

        // Mass the initial orbits are computed about
        let disk_mass = if engine.central_mass && engine.perturbations.inner_fluid_disk {
            parameters.central.inner_mass
        } else {
            0.0
        };
        let gm = parameters.G * (parameters.central.m_unit + disk_mass);

        let mut bodies = Vec::new();
        if let Some(file) = &cfg.initial.file {
            let loaded = read_init_file(Path::new(file), cfg.initial.cartesian, gm, parameters.G, NVec3::zeros())?;
            info!("read {} bodies from {}", loaded.len(), file);
            bodies.extend(loaded);
        }
        bodies.extend(cfg.bodies.iter().map(body_from_config));
        if cfg.initial.random {
            let mut rng = StdRng::seed_from_u64(parameters.seed);
            bodies.extend((0..cfg.initial.n_0).map(|_| random_body(&mut rng, &cfg.initial, gm, parameters.G)));
        }

        if bodies.len() > parameters.n_max {
            return Err(SimError::BodyCountExceeded { live: bodies.len(), max: parameters.n_max });
        }

        Ok(Self {
            engine,
            parameters,
            bodies,
            central,
        })
    }

    pub fn into_simulation(self) -> Result<Simulation, SimError> {
        Simulation::new(self.engine, self.parameters, self.bodies, self.central)
    }
}

fn body_from_config(bc: &BodyConfig) -> Body {
    Body::new(
        NVec3::new(bc.x[0], bc.x[1], bc.x[2]),
        NVec3::new(bc.v[0], bc.v[1], bc.v[2]),
        bc.m,
        bc.radius,
    )
}

fn uniform(rng: &mut StdRng, min: f64, max: f64) -> f64 {
    if max > min { rng.gen_range(min..max) } else { min }
}

/// A body drawn uniformly between the configured bounds, on a Keplerian
/// orbit about the central mass
fn random_body(rng: &mut StdRng, init: &InitialConfig, gm: f64, G: f64) -> Body {
    let radius = uniform(rng, init.radius_min, init.radius_max);
    let density = uniform(rng, init.density_min, init.density_max);
    let m = density * sphere_volume(radius);

    let el = OrbitalElements {
        a: uniform(rng, init.sma_min, init.sma_max),
        e: uniform(rng, init.eccentricity_min, init.eccentricity_max),
        i: uniform(rng, init.inclination_min, init.inclination_max),
        nu: uniform(rng, 0.0, TAU),
        omega: uniform(rng, 0.0, TAU),
        big_omega: uniform(rng, 0.0, TAU),
    };
    let (x, v) = el.to_cartesian(gm + G * m);
    Body::new(x, v, m, radius)
}
