use std::time::Instant;

use crate::configuration::config::ScenarioConfig;
use crate::configuration::validate::{validate, ConfigError};
use crate::simulation::params::Parameters;
use crate::simulation::states::{radius_from_mass, Body, NVec3};
use crate::simulation::walk::{BruteForceWalk, DualTreeWalk, MeshWalk, SingleTreeWalk, TreeWalk, WalkRequest};

/// Helper to build a ring of `n` bodies, deterministic positions, no rand needed
fn make_bodies(n: usize) -> Vec<Body> {
    let m = 1.0e-9;
    let radius = radius_from_mass(m, 0.1448);
    (0..n)
        .map(|i| {
            let i_f = i as f64;
            let r = 3.0 + 5.0 * ((i_f * 0.37).sin() * 0.5 + 0.5);
            let phi = i_f * 2.399963; // golden angle
            let x = NVec3::new(r * phi.cos(), r * phi.sin(), 0.05 * (i_f * 0.07).sin());
            let v = NVec3::new(-phi.sin(), phi.cos(), 0.0) * (39.478 / r).sqrt();
            Body::new(x, v, m, radius)
        })
        .collect()
}

/// Default parameters, as a scenario without overrides would get them
fn make_params() -> Result<Parameters, ConfigError> {
    let (params, _) = validate(&ScenarioConfig::default())?;
    Ok(params)
}

/// Mean relative error of `approx` against `exact`
fn relative_error(exact: &[NVec3], approx: &[NVec3]) -> f64 {
    let sum: f64 = exact
        .iter()
        .zip(approx)
        .map(|(e, a)| (e - a).norm() / e.norm().max(f64::MIN_POSITIVE))
        .sum();
    sum / exact.len().max(1) as f64
}

/// Time one walk (gravity and collision search), after a warm-up
fn time_walk(walk: &dyn TreeWalk, bodies: &[Body], params: &Parameters, reps: usize) -> (f64, Vec<NVec3>) {
    let request = WalkRequest { gravity: true, collisions: true };
    let out = walk.walk(bodies, request, params);
    let t0 = Instant::now();
    for _ in 0..reps {
        walk.walk(bodies, request, params);
    }
    (t0.elapsed().as_secs_f64() / reps as f64, out.accelerations)
}

/// Walk strategies against brute force for a range of N
pub fn bench_walks() -> Result<(), ConfigError> {
    let ns = [1000, 2000, 4000, 8000, 16000];
    let params = make_params()?;
    let walks: [&dyn TreeWalk; 3] = [&DualTreeWalk, &SingleTreeWalk, &MeshWalk];

    for n in ns {
        let bodies = make_bodies(n);
        let (t_direct, exact) = time_walk(&BruteForceWalk, &bodies, &params, 1);
        print!("N = {:6}, brute force = {:8.5} s", n, t_direct);
        for walk in walks {
            let (t, acc) = time_walk(walk, &bodies, &params, 3);
            print!(", {} = {:8.5} s (err {:.1e})", walk.name(), t, relative_error(&exact, &acc));
        }
        println!();
    }
    Ok(())
}

/// Per-walk timings as CSV
/// Paste output directly into excel to graph
pub fn bench_walk_curve() -> Result<(), ConfigError> {
    let params = make_params()?;
    println!("N,direct_ms,falcon_ms,tree_ms");

    for n in (1000..=20000).step_by(1000) {
        let bodies = make_bodies(n);
        let reps_direct = if n <= 4000 { 3 } else { 1 };

        let (t_direct, _) = time_walk(&BruteForceWalk, &bodies, &params, reps_direct);
        let (t_falcon, _) = time_walk(&DualTreeWalk, &bodies, &params, 3);
        let (t_tree, _) = time_walk(&SingleTreeWalk, &bodies, &params, 3);

        println!("{},{:.6},{:.6},{:.6}", n, t_direct * 1e3, t_falcon * 1e3, t_tree * 1e3);
    }
    Ok(())
}
