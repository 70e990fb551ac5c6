//! Direct O(N²) walk.
//!
//! Used as a strategy of its own, below `switch_to_brute_force` bodies, and
//! as the reference the tree codes are tested against. Each body sums its own
//! acceleration, so the loop over bodies runs in parallel without sharing
//! accumulators.

use rayon::prelude::*;

use crate::simulation::params::Parameters;
use crate::simulation::states::{Body, NVec3};
use crate::simulation::walk::{candidate, may_collide, pair_acceleration, CollisionCandidate, TreeWalk, WalkOutput, WalkRequest};

pub struct BruteForceWalk;

impl TreeWalk for BruteForceWalk {
    fn name(&self) -> &'static str {
        "brute force"
    }

    fn walk(&self, bodies: &[Body], request: WalkRequest, params: &Parameters) -> WalkOutput {
        let n = bodies.len();
        let dt = params.dt;

        let accelerations = if request.gravity {
            (0..n)
                .into_par_iter()
                .map(|i| {
                    let bi = &bodies[i];
                    let mut acc = NVec3::zeros();
                    for (j, bj) in bodies.iter().enumerate() {
                        if j != i {
                            acc += pair_acceleration(bi, bj, params.softening);
                        }
                    }
                    params.G * acc
                })
                .collect()
        } else {
            vec![NVec3::zeros(); n]
        };

        let candidates = if request.collisions {
            let per_body: Vec<Vec<CollisionCandidate>> = (0..n)
                .into_par_iter()
                .map(|i| {
                    let bi = &bodies[i];
                    bodies[i + 1..]
                        .iter()
                        .filter(|bj| may_collide(bi, bj, dt))
                        .map(|bj| candidate(bi, bj, dt))
                        .collect()
                })
                .collect();
            per_body.into_iter().flatten().collect()
        } else {
            Vec::new()
        };

        WalkOutput { accelerations, candidates }
    }
}
