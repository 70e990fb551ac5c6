//! Tree walkers: mutual gravity and collision search.
//!
//! Every strategy implements [`TreeWalk`] and is selected once, when the
//! simulation is built, from the engine's [`WalkMode`]. A walk reads a dense
//! snapshot of the live bodies and returns one acceleration per snapshot
//! entry plus the candidate colliding pairs, in the order they were found.

pub mod brute_force;
pub mod dual_tree;
pub mod mesh;
pub mod single_tree;

use crate::simulation::engine::WalkMode;
use crate::simulation::params::Parameters;
use crate::simulation::states::{Body, BodyId, NVec3};
use crate::simulation::tree::sweep_sphere;

pub use brute_force::BruteForceWalk;
pub use dual_tree::DualTreeWalk;
pub use mesh::MeshWalk;
pub use single_tree::SingleTreeWalk;

/// Two bodies whose sweep spheres overlap during the coming timestep.
///
/// Produced by a walk and consumed by the collision resolver within the next
/// step; the ids are generation-checked, so a candidate naming a retired body
/// simply fails to resolve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionCandidate {
    pub first: BodyId,
    pub second: BodyId,
    pub window: f64, // length of the drift the pair is checked over
}

#[derive(Debug, Clone, Default)]
pub struct WalkOutput {
    pub accelerations: Vec<NVec3>, // one per snapshot entry
    pub candidates: Vec<CollisionCandidate>,
}

/// What a walk must produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkRequest {
    pub gravity: bool,
    pub collisions: bool,
}

pub trait TreeWalk: Send + Sync {
    fn name(&self) -> &'static str;

    fn walk(&self, bodies: &[Body], request: WalkRequest, params: &Parameters) -> WalkOutput;
}

/// The walker implementing `mode`
pub fn walker_for(mode: WalkMode) -> Box<dyn TreeWalk> {
    match mode {
        WalkMode::BruteForce => Box::new(BruteForceWalk),
        WalkMode::Falcon => Box::new(DualTreeWalk),
        WalkMode::StandardTree => Box::new(SingleTreeWalk),
        WalkMode::Mesh => Box::new(MeshWalk),
    }
}

// shared kernels ==========================================================================

/// Softened Newtonian acceleration of body `i` due to body `j` (per unit G).
///
/// Softening length is `softening * (R_i + R_j)`.
#[inline]
pub fn pair_acceleration(bi: &Body, bj: &Body, softening: f64) -> NVec3 {
    let r = bj.x - bi.x;
    let eps = softening * (bi.radius + bj.radius);
    let d2 = r.norm_squared() + eps * eps;
    if d2 == 0.0 {
        return NVec3::zeros();
    }
    let inv_r = d2.sqrt().recip();
    let inv_r3 = inv_r * inv_r * inv_r;
    bj.m * inv_r3 * r
}

/// Whether the sweep spheres of two bodies overlap over a step of `dt`
#[inline]
pub fn may_collide(bi: &Body, bj: &Body, dt: f64) -> bool {
    let (ci, ri) = sweep_sphere(bi, dt);
    let (cj, rj) = sweep_sphere(bj, dt);
    (ci - cj).norm_squared() <= (ri + rj) * (ri + rj)
}

pub(crate) fn candidate(bi: &Body, bj: &Body, dt: f64) -> CollisionCandidate {
    CollisionCandidate {
        first: bi.id,
        second: bj.id,
        window: dt,
    }
}
