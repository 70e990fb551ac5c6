use approx::assert_relative_eq;

use collsim::configuration::config::ScenarioConfig;
use collsim::configuration::validate::{validate, ConfigError};
use collsim::simulation::error::SimError;
use collsim::simulation::forces::{CentralFrame, CentralResponse, DistantStar, Kepler, Oblateness, PerturbationSet, Tides};
use collsim::simulation::params::Parameters;
use collsim::simulation::states::{Body, CentralBody, NVec3};
use collsim::simulation::store::BodyStore;
use collsim::simulation::walk::{BruteForceWalk, TreeWalk, WalkRequest};

/// Two bodies separated along the x-axis, with ids from a store
pub fn two_bodies(dist: f64, m1: f64, m2: f64, radius: f64) -> Vec<Body> {
    let mut store = BodyStore::new(16);
    store.insert(Body::new(NVec3::new(-dist / 2.0, 0.0, 0.0), NVec3::zeros(), m1, radius)).unwrap();
    store.insert(Body::new(NVec3::new(dist / 2.0, 0.0, 0.0), NVec3::zeros(), m2, radius)).unwrap();
    store.snapshot()
}

/// Default physics parameters for tests
pub fn test_params() -> Parameters {
    let (mut p, _) = validate(&ScenarioConfig::default()).unwrap();
    p.G = 0.1;
    p
}

pub fn gravity_only() -> WalkRequest {
    WalkRequest { gravity: true, collisions: false }
}

fn parse(yaml: &str) -> ScenarioConfig {
    ScenarioConfig::from_yaml_str(yaml).unwrap()
}

// ==================================================================================
// Gravity tests
// ==================================================================================

#[test]
fn gravity_newton_third_law() {
    let bodies = two_bodies(1.0, 2.0, 3.0, 0.0);
    let p = test_params();
    let acc = BruteForceWalk.walk(&bodies, gravity_only(), &p).accelerations;

    let net = acc[0] * bodies[0].m + acc[1] * bodies[1].m;
    assert!(net.norm() < 1e-12, "Net momentum not zero: {:?}", net);
}

#[test]
fn gravity_points_toward_other_body() {
    let bodies = two_bodies(2.0, 1.0, 1.0, 0.0);
    let p = test_params();
    let acc = BruteForceWalk.walk(&bodies, gravity_only(), &p).accelerations;

    let dx = bodies[1].x - bodies[0].x;
    assert!(acc[0].dot(&dx) > 0.0, "Acceleration is not toward second body");
}

#[test]
fn gravity_inverse_square_law() {
    let p = test_params();
    let acc_r = BruteForceWalk.walk(&two_bodies(1.0, 1.0, 1.0, 0.0), gravity_only(), &p).accelerations;
    let acc_2r = BruteForceWalk.walk(&two_bodies(2.0, 1.0, 1.0, 0.0), gravity_only(), &p).accelerations;

    let ratio = acc_r[0].norm() / acc_2r[0].norm();
    assert_relative_eq!(ratio, 4.0, max_relative = 1e-12);
}

#[test]
fn gravity_softening_prevents_blowup() {
    let mut p = test_params();
    p.softening = 1.0;

    let bodies = two_bodies(1e-9, 1.0, 1.0, 0.1);
    let acc = BruteForceWalk.walk(&bodies, gravity_only(), &p).accelerations;

    assert!(acc[0].norm() < 1e9, "Softening failed; acceleration too large");
}

// ==================================================================================
// Body store tests
// ==================================================================================

#[test]
fn store_stale_id_resolves_to_nothing() {
    let mut store = BodyStore::new(8);
    let a = store.insert(Body::new(NVec3::zeros(), NVec3::zeros(), 1.0, 0.1)).unwrap();
    assert!(store.remove(a).is_some());

    let b = store.insert(Body::new(NVec3::x(), NVec3::zeros(), 2.0, 0.1)).unwrap();
    assert_eq!(a.index, b.index, "free slot should be reused");
    assert_ne!(a, b);
    assert!(store.get(a).is_none());
    assert!(store.remove(a).is_none());
    assert_eq!(store.get(b).map(|body| body.m), Some(2.0));
    assert_eq!(store.len(), 1);
}

#[test]
fn store_rejects_bodies_beyond_maximum() {
    let mut store = BodyStore::new(2);
    for _ in 0..2 {
        store.insert(Body::new(NVec3::zeros(), NVec3::zeros(), 1.0, 0.1)).unwrap();
    }
    let err = store.insert(Body::new(NVec3::zeros(), NVec3::zeros(), 1.0, 0.1));
    assert!(matches!(err, Err(SimError::BodyCountExceeded { live: 3, max: 2 })));
    assert_eq!(store.len(), 2);
}

#[test]
fn store_snapshot_carries_ids() {
    let mut store = BodyStore::new(8);
    let ids: Vec<_> = (0..4)
        .map(|i| store.insert(Body::new(NVec3::new(i as f64, 0.0, 0.0), NVec3::zeros(), 1.0, 0.1)).unwrap())
        .collect();
    store.remove(ids[1]);

    let snap = store.snapshot();
    assert_eq!(snap.len(), 3);
    for b in &snap {
        assert_eq!(store.get(b.id).map(|s| s.x), Some(b.x));
    }
    assert_relative_eq!(store.total_mass(), 3.0);
}

// ==================================================================================
// Configuration tests
// ==================================================================================

#[test]
fn config_defaults_are_valid() {
    let (params, engine) = validate(&ScenarioConfig::default()).unwrap();
    assert_eq!(params.tree.expansion_order, 3);
    assert!(engine.walk.is_some());
    assert!(engine.collision_model.is_some());
    assert_relative_eq!(params.G, 4.0 * std::f64::consts::PI * std::f64::consts::PI);
}

#[test]
fn config_rejects_two_walk_modes() {
    let cfg = parse("engine:\n  walk: { falcon: true, mesh: true }\n");
    assert!(matches!(validate(&cfg), Err(ConfigError::ExclusiveGroup { found: 2, .. })));
}

#[test]
fn config_rejects_missing_collision_model() {
    let cfg = parse("engine:\n  collision_model: { fragmentation: false }\n");
    assert!(matches!(validate(&cfg), Err(ConfigError::ExclusiveGroup { found: 0, .. })));
}

#[test]
fn config_rejects_fragment_grid_mismatch() {
    let cfg = parse("collision:\n  n_tilde: 14\n");
    assert!(matches!(
        validate(&cfg),
        Err(ConfigError::FragmentGrid { points: 15, n_tilde: 14, .. })
    ));
}

#[test]
fn config_rejects_perturbation_without_central_mass() {
    let cfg = parse("engine:\n  central_mass: false\n  perturbations: { j2: true }\n");
    assert_eq!(validate(&cfg).unwrap_err(), ConfigError::NeedsCentralMass("j2"));
}

#[test]
fn config_rejects_bad_opening_angle_and_order() {
    let cfg = parse("tree:\n  theta_min: 1.2\n");
    assert!(matches!(validate(&cfg), Err(ConfigError::OutOfRange { name: "theta_min", .. })));

    let cfg = parse("tree:\n  expansion_order: 7\n");
    assert!(matches!(validate(&cfg), Err(ConfigError::OutOfRange { name: "expansion_order", .. })));
}

#[test]
fn config_rejects_odd_mesh() {
    let cfg = parse("engine:\n  walk: { falcon: false, mesh: true }\nmesh:\n  collision_cube_cells: 255\n");
    assert!(matches!(validate(&cfg), Err(ConfigError::OutOfRange { name: "collision_cube_cells", .. })));
}

#[test]
fn config_rejects_inverted_bounds() {
    let cfg = parse("initial:\n  random: true\n  radius_min: 0.5\n  radius_max: 0.1\n");
    assert!(matches!(validate(&cfg), Err(ConfigError::InvertedBounds { .. })));
}

#[test]
fn config_without_gravity_or_collisions_needs_no_walk() {
    let cfg = parse("engine:\n  mutual_gravity: false\n  collisions: false\n  walk: { falcon: false }\n");
    let (_, engine) = validate(&cfg).unwrap();
    assert!(engine.walk.is_none());
    assert!(engine.collision_model.is_none());
}

// ==================================================================================
// Perturbation tests
// ==================================================================================

fn spinning_central(p: &Parameters) -> CentralBody {
    CentralBody::new(1.0, 1.0, NVec3::z() * p.surface_frequency() / p.central.t_earth)
}

#[test]
fn j2_pushes_out_at_pole_and_in_at_equator() {
    let p = test_params();
    let central = spinning_central(&p);
    let frame = CentralFrame { t: 0.0, central: &central, disk_mass: 0.0 };
    let set = PerturbationSet::new().with(Oblateness {
        G: p.G,
        j2_value: 1e-3,
        critical_frequency: p.surface_frequency(),
    });

    let bodies = vec![
        Body::new(NVec3::new(0.0, 0.0, 3.0), NVec3::zeros(), 1e-6, 0.01),
        Body::new(NVec3::new(3.0, 0.0, 0.0), NVec3::zeros(), 1e-6, 0.01),
    ];
    let mut out = vec![NVec3::zeros(); 2];
    set.accumulate_accels(&frame, &bodies, &mut out);

    assert!(out[0].z > 0.0);
    assert!(out[0].x.abs() < 1e-15 && out[0].y.abs() < 1e-15);
    assert!(out[1].x < 0.0);
    assert!(out[1].z.abs() < 1e-15);
    // |a_pole| = 2 |a_equator| at the same distance
    assert_relative_eq!(out[0].norm(), 2.0 * out[1].norm(), max_relative = 1e-12);
}

#[test]
fn fluid_j2_follows_the_spin() {
    let p = test_params();
    let central = spinning_central(&p);
    let term = Oblateness { G: p.G, j2_value: 0.0, critical_frequency: p.surface_frequency() };
    let expected = 0.5 / (p.central.t_earth * p.central.t_earth);
    assert_relative_eq!(term.j2(&central), expected, max_relative = 1e-12);
}

#[test]
fn perturbations_conserve_momentum() {
    let p = test_params();
    let mut central = spinning_central(&p);
    central.v = NVec3::new(0.01, 0.0, 0.0);
    let disk_mass = 0.01;
    let frame = CentralFrame { t: 0.0, central: &central, disk_mass };
    let set = PerturbationSet::new()
        .with(Kepler { G: p.G })
        .with(Oblateness { G: p.G, j2_value: 0.0, critical_frequency: p.surface_frequency() })
        .with(Tides { G: p.G, k2: 1.5, time_lag: 0.01, dimensionless_moi: 0.33 });

    let bodies: Vec<Body> = (0..20)
        .map(|i| {
            let phi = i as f64 * 0.7;
            let r = 2.0 + 0.1 * i as f64;
            Body::new(
                NVec3::new(r * phi.cos(), r * phi.sin(), 0.1 * phi.sin()),
                NVec3::new(-phi.sin(), phi.cos(), 0.05) * 3.0,
                1e-4 * (1.0 + i as f64),
                0.02,
            )
        })
        .collect();

    let mut out = vec![NVec3::zeros(); bodies.len()];
    let response = set.accumulate_accels(&frame, &bodies, &mut out);

    let mut net: NVec3 = bodies.iter().zip(&out).map(|(b, a)| b.m * a).sum();
    let scale: f64 = bodies.iter().zip(&out).map(|(b, a)| b.m * a.norm()).sum();
    net += (central.m + disk_mass) * response.acceleration;
    assert!(net.norm() < 1e-12 * scale, "net force {:?}", net);
    assert!(response.spin_rate.norm() > 0.0);
}

#[test]
fn distant_star_pull_is_tidal() {
    let p = test_params();
    let star = DistantStar {
        G: p.G,
        mass: 1000.0,
        semi_major: 100.0,
        mean_motion: (p.G * 1001.0 / 1.0e6).sqrt(),
        obliquity: 0.3,
    };
    let mut central = CentralBody::new(1.0, 1.0, NVec3::zeros());
    central.x = NVec3::new(0.5, -0.2, 0.1);
    let t = 2.0;
    let frame = CentralFrame { t, central: &central, disk_mass: 0.0 };
    let toward = star.position(t).normalize();
    let across = toward.cross(&NVec3::z()).normalize();

    let bodies = vec![
        Body::new(central.x, NVec3::zeros(), 1e-9, 0.01),
        Body::new(central.x + 3.0 * toward, NVec3::zeros(), 1e-9, 0.01),
        Body::new(central.x + 3.0 * across, NVec3::zeros(), 1e-9, 0.01),
    ];
    let mut out = vec![NVec3::zeros(); 3];
    let set = PerturbationSet::new().with(star);
    let response = set.accumulate_accels(&frame, &bodies, &mut out);

    let indirect = p.G * 1000.0 / (100.0 * 100.0);
    // nothing left at the central body itself
    assert!(out[0].norm() < 1e-12 * indirect, "{:?}", out[0]);
    // stretched along the star direction, squeezed across it
    assert!(out[1].dot(&toward) > 0.0);
    assert!(out[2].dot(&across) < 0.0);
    assert_relative_eq!(out[1].dot(&toward), 2.0 * 3.0 * indirect / 100.0, max_relative = 0.1);
    assert_eq!(response, CentralResponse::default());
}
