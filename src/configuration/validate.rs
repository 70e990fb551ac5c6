//! Configuration-time validation.
//!
//! Turns a [`ScenarioConfig`] into the runtime [`Parameters`] / [`Engine`]
//! pair, rejecting anything that must not reach the first timestep.

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::configuration::config::ScenarioConfig;
use crate::simulation::engine::{CollisionModelKind, Engine, WalkMode};
use crate::simulation::params::Parameters;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("exactly one of {group} must be enabled, found {found}")]
    ExclusiveGroup { group: &'static str, found: usize },

    #[error("pq_min_max {pq:?} spans {points} integer points but n_tilde is {n_tilde}")]
    FragmentGrid { pq: [i32; 4], points: i64, n_tilde: usize },

    #[error("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },

    #[error("{name} must lie in {range}, got {value}")]
    OutOfRange { name: &'static str, range: &'static str, value: f64 },

    #[error("{min_name} ({min}) is larger than {max_name} ({max})")]
    InvertedBounds { min_name: &'static str, min: f64, max_name: &'static str, max: f64 },

    #[error("{0} requires a central mass")]
    NeedsCentralMass(&'static str),

    #[error("initial number of bodies ({n_0}) exceeds n_max ({n_max})")]
    TooManyInitialBodies { n_0: usize, n_max: usize },

    #[error("body {index}: {reason}")]
    InvalidBody { index: usize, reason: String },
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}

fn ordered(min_name: &'static str, min: f64, max_name: &'static str, max: f64) -> Result<(), ConfigError> {
    if min <= max {
        Ok(())
    } else {
        Err(ConfigError::InvertedBounds { min_name, min, max_name, max })
    }
}

fn exactly_one(group: &'static str, flags: &[bool]) -> Result<usize, ConfigError> {
    let found = flags.iter().filter(|f| **f).count();
    if found != 1 {
        return Err(ConfigError::ExclusiveGroup { group, found });
    }
    Ok(flags.iter().position(|f| *f).unwrap_or(0))
}

/// Validate a scenario and build the runtime parameters and engine.
pub fn validate(cfg: &ScenarioConfig) -> Result<(Parameters, Engine), ConfigError> {
    let e = &cfg.engine;
    let p = &cfg.parameters;
    let c = &cfg.central;
    let t = &cfg.tree;
    let col = &cfg.collision;

    // Algorithm groups
    let walk = if e.mutual_gravity || e.collisions {
        let w = &e.walk;
        let idx = exactly_one(
            "{brute_force, falcon, standard_tree, mesh}",
            &[w.brute_force, w.falcon, w.standard_tree, w.mesh],
        )?;
        Some([WalkMode::BruteForce, WalkMode::Falcon, WalkMode::StandardTree, WalkMode::Mesh][idx])
    } else {
        None
    };

    let collision_model = if e.collisions {
        let m = &e.collision_model;
        let idx = exactly_one(
            "{elastic, inelastic, instant_merger, fragmentation}",
            &[m.elastic, m.inelastic, m.instant_merger, m.fragmentation],
        )?;
        Some(
            [
                CollisionModelKind::Elastic,
                CollisionModelKind::Inelastic,
                CollisionModelKind::InstantMerger,
                CollisionModelKind::Fragmentation,
            ][idx],
        )
    } else {
        None
    };

    // General parameters
    positive("time_step", p.time_step)?;
    positive("t_end", p.t_end)?;
    positive("G", p.G)?;
    positive("high_dumping_threshold", p.high_dumping_threshold)?;
    if p.softening_parameter < 0.0 {
        return Err(ConfigError::OutOfRange { name: "softening_parameter", range: "[0, inf)", value: p.softening_parameter });
    }
    if p.n_max == 0 {
        return Err(ConfigError::NotPositive { name: "n_max", value: 0.0 });
    }
    if p.output_step == 0 {
        return Err(ConfigError::NotPositive { name: "output_step", value: 0.0 });
    }

    // Central body and its perturbations
    let pert = &e.perturbations;
    if !e.central_mass {
        if pert.j2 {
            return Err(ConfigError::NeedsCentralMass("j2"));
        }
        if pert.sun {
            return Err(ConfigError::NeedsCentralMass("sun"));
        }
        if pert.central_tides {
            return Err(ConfigError::NeedsCentralMass("central_tides"));
        }
        if pert.inner_fluid_disk {
            return Err(ConfigError::NeedsCentralMass("inner_fluid_disk"));
        }
    }
    positive("m_unit", c.m_unit)?;
    if e.central_mass {
        positive("r_unit", c.r_unit)?;
        ordered("low_dumping_threshold", p.low_dumping_threshold, "high_dumping_threshold", p.high_dumping_threshold)?;
        if c.t_earth <= 1.0 {
            return Err(ConfigError::OutOfRange { name: "t_earth", range: "(1, inf)", value: c.t_earth });
        }
    }
    if pert.central_tides {
        positive("dimensionless_moi", c.dimensionless_moi)?;
    }
    if pert.sun {
        positive("star_semi_major", c.star_semi_major)?;
        positive("star_mass", c.star_mass)?;
    }
    if pert.inner_fluid_disk {
        positive("spawned_density", c.spawned_density)?;
        if !(c.f_tilde > 0.0 && c.f_tilde < 1.0) {
            return Err(ConfigError::OutOfRange { name: "f_tilde", range: "(0, 1)", value: c.f_tilde });
        }
        if c.inner_mass < 0.0 {
            return Err(ConfigError::OutOfRange { name: "inner_mass", range: "[0, inf)", value: c.inner_mass });
        }
        if c.r_roche <= p.low_dumping_threshold || c.r_roche <= c.r_unit {
            return Err(ConfigError::OutOfRange {
                name: "r_roche",
                range: "(max(low_dumping_threshold, r_unit), inf)",
                value: c.r_roche,
            });
        }
    }

    // Tree codes
    if matches!(walk, Some(WalkMode::Falcon) | Some(WalkMode::StandardTree)) || p.switch_to_brute_force > 0 {
        if !(1..=6).contains(&t.expansion_order) {
            return Err(ConfigError::OutOfRange { name: "expansion_order", range: "[1, 6]", value: t.expansion_order as f64 });
        }
        if !(t.theta_min > 0.0 && t.theta_min < 1.0) {
            return Err(ConfigError::OutOfRange { name: "theta_min", range: "(0, 1)", value: t.theta_min });
        }
        if t.subdivision_threshold == 0 {
            return Err(ConfigError::NotPositive { name: "subdivision_threshold", value: 0.0 });
        }
        if t.level_max == 0 {
            return Err(ConfigError::NotPositive { name: "level_max", value: 0.0 });
        }
        positive("root_sidelength", t.root_sidelength)?;
        ordered("n_cc_pre", t.n_cc_pre as f64, "n_cc_post", t.n_cc_post as f64)?;
        ordered("n_cb_pre", t.n_cb_pre as f64, "n_cb_post", t.n_cb_post as f64)?;
    }

    // Mesh
    if walk == Some(WalkMode::Mesh) {
        let m = &cfg.mesh;
        positive("collision_cube_min", m.collision_cube_min)?;
        positive("how_many_neighbours", m.how_many_neighbours)?;
        if m.collision_cube_cells == 0 || m.collision_cube_cells % 2 != 0 {
            return Err(ConfigError::OutOfRange {
                name: "collision_cube_cells",
                range: "positive even integers",
                value: m.collision_cube_cells as f64,
            });
        }
    }

    // Collision models
    match collision_model {
        Some(CollisionModelKind::Inelastic) => {
            if !(1.0..=2.0).contains(&col.collision_parameter) {
                return Err(ConfigError::OutOfRange {
                    name: "collision_parameter",
                    range: "[1, 2]",
                    value: col.collision_parameter,
                });
            }
        }
        Some(CollisionModelKind::Fragmentation) => {
            let [a, b, cq, d] = col.pq_min_max;
            let points = if b >= a && d >= cq {
                (b as i64 - a as i64 + 1) * (d as i64 - cq as i64 + 1)
            } else {
                0
            };
            if col.n_tilde == 0 || points != col.n_tilde as i64 {
                return Err(ConfigError::FragmentGrid { pq: col.pq_min_max, points, n_tilde: col.n_tilde });
            }
            positive("mu_parameter", col.mu_parameter)?;
            positive("c1_parameter", col.c1_parameter)?;
            positive("k_parameter", col.k_parameter)?;
            positive("frag_threshold", col.frag_threshold)?;
        }
        _ => {}
    }

    // Initial state
    let init = &cfg.initial;
    if init.random {
        positive("radius_min", init.radius_min)?;
        positive("density_min", init.density_min)?;
        ordered("radius_min", init.radius_min, "radius_max", init.radius_max)?;
        ordered("density_min", init.density_min, "density_max", init.density_max)?;
        ordered("eccentricity_min", init.eccentricity_min, "eccentricity_max", init.eccentricity_max)?;
        ordered("sma_min", init.sma_min, "sma_max", init.sma_max)?;
        ordered("inclination_min", init.inclination_min, "inclination_max", init.inclination_max)?;
        positive("sma_min", init.sma_min)?;
        if !(0.0..1.0).contains(&init.eccentricity_min) || !(0.0..1.0).contains(&init.eccentricity_max) {
            return Err(ConfigError::OutOfRange { name: "eccentricity", range: "[0, 1)", value: init.eccentricity_max });
        }
        if init.n_0 > p.n_max {
            return Err(ConfigError::TooManyInitialBodies { n_0: init.n_0, n_max: p.n_max });
        }
    }
    if cfg.bodies.len() > p.n_max {
        return Err(ConfigError::TooManyInitialBodies { n_0: cfg.bodies.len(), n_max: p.n_max });
    }
    for (index, b) in cfg.bodies.iter().enumerate() {
        if b.x.len() != 3 || b.v.len() != 3 {
            return Err(ConfigError::InvalidBody { index, reason: "x and v need three components".to_string() });
        }
        if !(b.m > 0.0) || !(b.radius > 0.0) {
            return Err(ConfigError::InvalidBody { index, reason: "mass and radius must be positive".to_string() });
        }
    }

    let seed = p.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    });

    let parameters = Parameters {
        t_end: p.t_end,
        dt: p.time_step,
        G: p.G,
        n_max: p.n_max,
        output_step: p.output_step,
        low_dumping_threshold: p.low_dumping_threshold,
        high_dumping_threshold: p.high_dumping_threshold,
        softening: p.softening_parameter,
        seed,
        switch_to_brute_force: p.switch_to_brute_force,
        central: cfg.central.clone(),
        tree: cfg.tree.clone(),
        mesh: cfg.mesh.clone(),
        collision: cfg.collision.clone(),
    };

    let engine = Engine {
        central_mass: e.central_mass,
        reduce_to_com: e.reduce_to_com,
        one_collision_only: e.one_collision_only,
        mutual_gravity: e.mutual_gravity,
        collisions: e.collisions,
        walk,
        collision_model,
        perturbations: e.perturbations.clone(),
    };

    Ok((parameters, engine))
}
