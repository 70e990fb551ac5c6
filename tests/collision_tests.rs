use approx::assert_relative_eq;

use collsim::configuration::config::ScenarioConfig;
use collsim::configuration::validate::validate;
use collsim::simulation::collision::{bounce, contact_time, merge, CollisionModel, OutcomeKind, Resolver};
use collsim::simulation::engine::CollisionModelKind;
use collsim::simulation::error::SimError;
use collsim::simulation::fragmentation::FragmentationModel;
use collsim::simulation::lifecycle::RunStats;
use collsim::simulation::params::Parameters;
use collsim::simulation::states::{radius_from_mass, Body, BodyId, NVec3};
use collsim::simulation::store::BodyStore;
use collsim::simulation::walk::CollisionCandidate;

pub fn test_params() -> Parameters {
    let (p, _) = validate(&ScenarioConfig::default()).unwrap();
    p
}

/// Bodies of radius 0.1 on the x-axis, registered in a store
pub fn bodies_on_axis(store: &mut BodyStore, setup: &[(f64, f64, f64)]) -> Vec<BodyId> {
    setup
        .iter()
        .map(|&(x, v, m)| {
            store
                .insert(Body::new(NVec3::new(x, 0.0, 0.0), NVec3::new(v, 0.0, 0.0), m, 0.1))
                .unwrap()
        })
        .collect()
}

fn pair(first: BodyId, second: BodyId, window: f64) -> CollisionCandidate {
    CollisionCandidate { first, second, window }
}

/// Target and impactor in contact, the impactor hitting at `ratio` times the
/// mutual escape velocity, 45 degrees off the normal
pub fn impact(ratio: f64, g: f64) -> (Body, Body) {
    let (m_t, m_i, rho) = (1.0e-6, 3.0e-7, 0.1448);
    let (r_t, r_i) = (radius_from_mass(m_t, rho), radius_from_mass(m_i, rho));
    let v_esc = (2.0 * g * (m_t + m_i) / (r_t + r_i)).sqrt();
    let dir = NVec3::new(-1.0, 1.0, 0.0).normalize();

    let target = Body::new(NVec3::zeros(), NVec3::new(0.0, 0.0, 1.0e-4), m_t, r_t);
    let impactor = Body::new(NVec3::new(r_t + r_i, 0.0, 0.0), ratio * v_esc * dir, m_i, r_i);
    (target, impactor)
}

fn momentum(bodies: &[Body]) -> NVec3 {
    bodies.iter().map(|b| b.m * b.v).sum()
}

fn center_of_mass(bodies: &[Body]) -> NVec3 {
    let m: f64 = bodies.iter().map(|b| b.m).sum();
    bodies.iter().map(|b| b.m * b.x).sum::<NVec3>() / m
}

fn kinetic_energy_about(bodies: &[Body], v_cm: &NVec3) -> f64 {
    bodies.iter().map(|b| 0.5 * b.m * (b.v - v_cm).norm_squared()).sum()
}

fn assert_conserved(before: &[Body], after: &[Body]) {
    let m_before: f64 = before.iter().map(|b| b.m).sum();
    let m_after: f64 = after.iter().map(|b| b.m).sum();
    assert_relative_eq!(m_after, m_before, max_relative = 1e-12);

    let p_scale: f64 = before.iter().map(|b| b.m * b.v.norm()).sum();
    assert!((momentum(after) - momentum(before)).norm() < 1e-12 * p_scale, "momentum not conserved");

    let x_scale: f64 = before.iter().map(|b| b.radius).sum();
    assert!((center_of_mass(after) - center_of_mass(before)).norm() < 1e-12 * x_scale, "center of mass moved");

    let v_cm = momentum(before) / m_before;
    let ke_before = kinetic_energy_about(before, &v_cm);
    let ke_after = kinetic_energy_about(after, &v_cm);
    assert!(ke_after <= ke_before * (1.0 + 1e-9), "kinetic energy grew: {:e} -> {:e}", ke_before, ke_after);
}

fn assert_disjoint(bodies: &[Body]) {
    for (i, a) in bodies.iter().enumerate() {
        for b in &bodies[i + 1..] {
            assert!((a.x - b.x).norm() > a.radius + b.radius, "products overlap");
        }
    }
}

// ==================================================================================
// Contact time tests
// ==================================================================================

#[test]
fn contact_time_of_overlapping_pair() {
    let b1 = Body::new(NVec3::new(-0.05, 0.0, 0.0), NVec3::new(1.0, 0.0, 0.0), 1.0, 0.1);
    let b2 = Body::new(NVec3::new(0.05, 0.0, 0.0), NVec3::new(-1.0, 0.0, 0.0), 1.0, 0.1);

    let s = contact_time(&b1, &b2, 0.1).unwrap();
    assert_relative_eq!(s, -0.05, epsilon = 1e-12);
}

#[test]
fn contact_time_rejects_separating_and_future_pairs() {
    let apart_1 = Body::new(NVec3::new(-0.15, 0.0, 0.0), NVec3::new(-1.0, 0.0, 0.0), 1.0, 0.1);
    let apart_2 = Body::new(NVec3::new(0.15, 0.0, 0.0), NVec3::new(1.0, 0.0, 0.0), 1.0, 0.1);
    assert_eq!(contact_time(&apart_1, &apart_2, 0.1), None);

    let soon_1 = Body::new(NVec3::new(-0.5, 0.0, 0.0), NVec3::new(1.0, 0.0, 0.0), 1.0, 0.1);
    let soon_2 = Body::new(NVec3::new(0.5, 0.0, 0.0), NVec3::new(-1.0, 0.0, 0.0), 1.0, 0.1);
    assert_eq!(contact_time(&soon_1, &soon_2, 0.1), None);

    let still = Body::new(NVec3::new(0.05, 0.0, 0.0), NVec3::zeros(), 1.0, 0.1);
    assert_eq!(contact_time(&still, &still.drifted(0.0), 0.1), None);
}

#[test]
fn contact_time_clamps_to_window_when_overlapping_throughout() {
    // deep overlap, approaching slowly: contact happened long before the window
    let b1 = Body::new(NVec3::new(-0.02, 0.0, 0.0), NVec3::new(0.01, 0.0, 0.0), 1.0, 0.1);
    let b2 = Body::new(NVec3::new(0.02, 0.0, 0.0), NVec3::new(-0.01, 0.0, 0.0), 1.0, 0.1);
    assert_eq!(contact_time(&b1, &b2, 0.1), Some(-0.1));
}

// ==================================================================================
// Bounce and merger tests
// ==================================================================================

#[test]
fn elastic_bounce_conserves_momentum_and_energy() {
    let b1 = Body::new(NVec3::zeros(), NVec3::new(1.0, 0.5, 0.0), 1.0, 0.1);
    let b2 = Body::new(NVec3::new(0.2, 0.0, 0.0), NVec3::new(-0.5, 0.2, 0.1), 2.0, 0.1);

    let out = bounce(&b1, &b2, 2.0);
    assert_eq!(out.kind, OutcomeKind::Bounce);
    let before = [b1, b2];
    assert_relative_eq!(momentum(&out.bodies), momentum(&before), epsilon = 1e-12);

    let ke = |bs: &[Body]| kinetic_energy_about(bs, &NVec3::zeros());
    assert_relative_eq!(ke(&out.bodies), ke(&before), max_relative = 1e-12);
    // the tangential velocities are untouched
    assert_relative_eq!(out.bodies[0].v.y, 0.5);
    assert_relative_eq!(out.bodies[1].v.z, 0.1);
}

#[test]
fn fully_inelastic_bounce_removes_normal_velocity() {
    let b1 = Body::new(NVec3::zeros(), NVec3::new(1.0, 0.3, 0.0), 1.0, 0.1);
    let b2 = Body::new(NVec3::new(0.2, 0.0, 0.0), NVec3::new(-0.5, 0.0, 0.0), 3.0, 0.1);

    let out = bounce(&b1, &b2, 1.0);
    let closing = (out.bodies[0].v - out.bodies[1].v).dot(&NVec3::x());
    assert!(closing.abs() < 1e-12, "normal relative velocity left: {}", closing);
    assert_relative_eq!(momentum(&out.bodies), momentum(&[b1, b2]), epsilon = 1e-12);
}

#[test]
fn bounce_ignores_separating_pair() {
    let b1 = Body::new(NVec3::zeros(), NVec3::new(-1.0, 0.0, 0.0), 1.0, 0.1);
    let b2 = Body::new(NVec3::new(0.2, 0.0, 0.0), NVec3::new(1.0, 0.0, 0.0), 1.0, 0.1);

    let out = bounce(&b1, &b2, 2.0);
    assert_eq!(out.bodies[0].v, b1.v);
    assert_eq!(out.bodies[1].v, b2.v);
}

#[test]
fn merger_conserves_mass_momentum_and_volume() {
    let b1 = Body::new(NVec3::new(-0.1, 0.0, 0.0), NVec3::new(1.0, 0.0, 0.0), 1.0, 0.1);
    let b2 = Body::new(NVec3::new(0.1, 0.05, 0.0), NVec3::new(-0.2, 0.4, 0.0), 3.0, 0.2);

    let merged = merge(&b1, &b2);
    assert_relative_eq!(merged.m, 4.0);
    assert_relative_eq!(merged.m * merged.v, momentum(&[b1.clone(), b2.clone()]), epsilon = 1e-12);
    assert_relative_eq!(merged.x, center_of_mass(&[b1.clone(), b2.clone()]), epsilon = 1e-12);
    assert_relative_eq!(merged.radius.powi(3), 0.1f64.powi(3) + 0.2f64.powi(3), max_relative = 1e-12);
}

// ==================================================================================
// Fragmentation tests
// ==================================================================================

fn fragmentation_model(threshold: f64) -> FragmentationModel {
    let mut params = test_params();
    params.collision.frag_threshold = threshold;
    FragmentationModel::new(&params.collision, params.G)
}

#[test]
fn gentle_impact_merges() {
    let model = fragmentation_model(2.0e-8);
    let (t, i) = impact(0.01, model.G);

    let out = model.resolve(&t, &i);
    assert_eq!(out.kind, OutcomeKind::Merger);
    assert!(!out.disruption);
    assert_eq!(out.bodies.len(), 1);
    assert_conserved(&[t, i], &out.bodies);
}

#[test]
fn moderate_impact_leaves_a_single_tail() {
    let model = fragmentation_model(2.0e-8);
    let (t, i) = impact(3.0, model.G);

    let masses = model.masses(&t, &i);
    assert!(!masses.disruption);
    assert_relative_eq!(masses.largest, t.m + i.m - masses.ejected, max_relative = 1e-12);

    let out = model.resolve(&t, &i);
    assert_eq!(out.kind, OutcomeKind::PartialFragmentation);
    assert_eq!(out.bodies.len(), 2);
    assert_relative_eq!(out.bodies[0].m, masses.largest, max_relative = 1e-12);
    assert_conserved(&[t, i], &out.bodies);
    assert_disjoint(&out.bodies);
}

#[test]
fn moderate_impact_with_low_threshold_fragments_fully() {
    let model = fragmentation_model(1.0e-10);
    let (t, i) = impact(3.0, model.G);

    let out = model.resolve(&t, &i);
    assert_eq!(out.kind, OutcomeKind::FullFragmentation);
    assert_eq!(out.bodies.len(), 2 + model.n_tilde);
    assert_conserved(&[t, i], &out.bodies);
    assert_disjoint(&out.bodies);
}

#[test]
fn violent_impact_is_a_disruption() {
    let model = fragmentation_model(2.0e-8);
    let (t, i) = impact(30.0, model.G);

    let masses = model.masses(&t, &i);
    assert!(masses.disruption);
    assert!(masses.largest < 0.1 * (t.m + i.m));

    let out = model.resolve(&t, &i);
    assert_eq!(out.kind, OutcomeKind::FullFragmentation);
    assert!(out.disruption);
    assert_conserved(&[t, i], &out.bodies);
    assert_disjoint(&out.bodies);
}

/// Two equal bodies in contact, closing head on at `ratio` times the mutual
/// escape velocity
pub fn head_on(ratio: f64, g: f64) -> (Body, Body) {
    let m = 1.0e-6;
    let r = radius_from_mass(m, 0.1448);
    let v_esc = (2.0 * g * 2.0 * m / (2.0 * r)).sqrt();
    let a = Body::new(NVec3::new(-r, 0.0, 0.0), NVec3::new(0.5 * ratio * v_esc, 0.0, 0.0), m, r);
    let b = Body::new(NVec3::new(r, 0.0, 0.0), NVec3::new(-0.5 * ratio * v_esc, 0.0, 0.0), m, r);
    (a, b)
}

#[test]
fn slow_head_on_equal_masses_merge() {
    let model = fragmentation_model(2.0e-8);
    let (a, b) = head_on(0.1, model.G);

    let out = model.resolve(&a, &b);
    assert_eq!(out.kind, OutcomeKind::Merger);
    assert_eq!(out.bodies.len(), 1);
    assert_relative_eq!(out.bodies[0].m, 2.0e-6, max_relative = 1e-12);
    assert_conserved(&[a, b], &out.bodies);
}

#[test]
fn fast_head_on_equal_masses_shatter() {
    let model = fragmentation_model(2.0e-8);
    for ratio in [3.0, 100.0] {
        let (a, b) = head_on(ratio, model.G);

        let out = model.resolve(&a, &b);
        assert_eq!(out.kind, OutcomeKind::FullFragmentation, "ratio {}", ratio);
        assert_eq!(out.disruption, ratio > 10.0);
        assert_eq!(out.bodies.len(), 2 + model.n_tilde);
        assert!(out.bodies.iter().all(|f| f.m > 0.0 && f.radius > 0.0));
        assert_conserved(&[a, b], &out.bodies);
        assert_disjoint(&out.bodies);
    }
}

// ==================================================================================
// Resolver tests
// ==================================================================================

#[test]
fn resolver_bounces_in_place() {
    let params = test_params();
    let mut store = BodyStore::new(8);
    let ids = bodies_on_axis(&mut store, &[(-0.05, 1.0, 1.0), (0.05, -1.0, 1.0)]);
    let resolver = Resolver::new(CollisionModel::new(CollisionModelKind::Elastic, &params), false);
    let mut stats = RunStats::default();

    resolver.resolve_candidates(&mut store, &[pair(ids[0], ids[1], 0.1)], &mut stats).unwrap();

    assert_eq!(store.len(), 2);
    assert_eq!((stats.collisions, stats.bounces), (1, 1));
    let (a, b) = (store.get(ids[0]).unwrap(), store.get(ids[1]).unwrap());
    assert_relative_eq!(a.v.x, -1.0, epsilon = 1e-12);
    assert_relative_eq!(b.v.x, 1.0, epsilon = 1e-12);
    assert_relative_eq!(a.x.x, -0.15, epsilon = 1e-12);
    assert_relative_eq!(b.x.x, 0.15, epsilon = 1e-12);
}

#[test]
fn resolver_follows_heirs_through_a_chain() {
    let params = test_params();
    let mut store = BodyStore::new(8);
    let ids = bodies_on_axis(&mut store, &[(0.0, 1.0, 1.0), (0.15, 0.0, 1.0), (0.3, -1.0, 1.0)]);
    let resolver = Resolver::new(CollisionModel::new(CollisionModelKind::InstantMerger, &params), false);
    let mut stats = RunStats::default();

    let candidates = [pair(ids[0], ids[1], 0.1), pair(ids[1], ids[2], 0.1)];
    resolver.resolve_candidates(&mut store, &candidates, &mut stats).unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(stats.mergers, 2);
    let survivor = store.iter().next().unwrap();
    assert_relative_eq!(survivor.m, 3.0);
    assert!(survivor.v.norm() < 1e-12);
    assert!(ids.iter().all(|id| store.get(*id).is_none()));
}

#[test]
fn resolver_one_collision_only_skips_involved_bodies() {
    let params = test_params();
    let mut store = BodyStore::new(8);
    let ids = bodies_on_axis(&mut store, &[(0.0, 1.0, 1.0), (0.15, 0.0, 1.0), (0.3, -1.0, 1.0)]);
    let resolver = Resolver::new(CollisionModel::new(CollisionModelKind::InstantMerger, &params), true);
    let mut stats = RunStats::default();

    let candidates = [pair(ids[0], ids[1], 0.1), pair(ids[1], ids[2], 0.1)];
    resolver.resolve_candidates(&mut store, &candidates, &mut stats).unwrap();

    assert_eq!(store.len(), 2);
    assert_eq!(stats.mergers, 1);
    assert!(store.get(ids[2]).is_some());
}

#[test]
fn resolver_ignores_stale_candidates() {
    let params = test_params();
    let mut store = BodyStore::new(8);
    let ids = bodies_on_axis(&mut store, &[(-0.05, 1.0, 1.0), (0.05, -1.0, 1.0)]);
    store.remove(ids[1]);
    let resolver = Resolver::new(CollisionModel::new(CollisionModelKind::InstantMerger, &params), false);
    let mut stats = RunStats::default();

    resolver.resolve_candidates(&mut store, &[pair(ids[0], ids[1], 0.1)], &mut stats).unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(stats, RunStats::default());
}

#[test]
fn resolver_fragmentation_keeps_store_mass() {
    let mut params = test_params();
    params.collision.frag_threshold = 1.0e-10;
    let model = CollisionModel::new(CollisionModelKind::Fragmentation, &params);
    let resolver = Resolver::new(model, false);

    // move the pair apart by a drift so that contact happens inside the window
    let (t, i) = impact(3.0, params.G);
    let window = params.dt;
    let mut store = BodyStore::new(64);
    let t_id = store.insert(t.drifted(0.5 * window)).unwrap();
    let i_id = store.insert(i.drifted(0.5 * window)).unwrap();
    let mass = store.total_mass();
    let p_before: NVec3 = store.iter().map(|b| b.momentum()).sum();

    let mut stats = RunStats::default();
    resolver.resolve_candidates(&mut store, &[pair(t_id, i_id, window)], &mut stats).unwrap();

    assert_eq!(stats.full_fragmentations, 1);
    assert_eq!(store.len(), 17);
    assert_relative_eq!(store.total_mass(), mass, max_relative = 1e-12);
    let p_after: NVec3 = store.iter().map(|b| b.momentum()).sum();
    assert!((p_after - p_before).norm() < 1e-12 * mass);
}

#[test]
fn resolver_overflow_leaves_the_store_untouched() {
    let mut params = test_params();
    params.collision.frag_threshold = 1.0e-10;
    let resolver = Resolver::new(CollisionModel::new(CollisionModelKind::Fragmentation, &params), false);

    let (t, i) = impact(3.0, params.G);
    let window = params.dt;
    let mut store = BodyStore::new(5);
    let t_id = store.insert(t.drifted(0.5 * window)).unwrap();
    let i_id = store.insert(i.drifted(0.5 * window)).unwrap();
    let mass = store.total_mass();

    let mut stats = RunStats::default();
    let result = resolver.resolve_candidates(&mut store, &[pair(t_id, i_id, window)], &mut stats);

    assert!(matches!(result, Err(SimError::BodyCountExceeded { live: 17, max: 5 })));
    assert_eq!(store.len(), 2);
    assert!(store.contains(t_id) && store.contains(i_id));
    assert_relative_eq!(store.total_mass(), mass);
}
