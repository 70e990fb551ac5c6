//! # Single-tree walk
//!
//! Classic Barnes–Hut descent, one body at a time. For a body at `x` and a
//! cell holding `N` bodies:
//!
//! - `N < n_cb_pre`: brute force over the cell's bodies
//! - `|x - com| > r_crit`: the cell's multipole expansion is evaluated at `x`
//! - `N < n_cb_post`, or the cell is a leaf: brute force
//! - otherwise its children are visited
//!
//! The body's own cell is never accepted since `r_crit > r_max`. Bodies are
//! independent, so the outer loop runs in parallel. Forces are not
//! symmetrized and momentum is only conserved to the accuracy of the
//! expansion.

use rayon::prelude::*;

use crate::simulation::params::Parameters;
use crate::simulation::states::{Body, NVec3};
use crate::simulation::tree::{sweep_sphere, Octree};
use crate::simulation::walk::{candidate, may_collide, pair_acceleration, CollisionCandidate, TreeWalk, WalkOutput, WalkRequest};

pub struct SingleTreeWalk;

impl TreeWalk for SingleTreeWalk {
    fn name(&self) -> &'static str {
        "standard tree"
    }

    fn walk(&self, bodies: &[Body], request: WalkRequest, params: &Parameters) -> WalkOutput {
        let tree = Octree::build(bodies, &params.tree, params.dt);
        let n = bodies.len();

        let accelerations = if request.gravity {
            let table_len = tree.table.len();
            (0..n)
                .into_par_iter()
                .map_init(
                    || (vec![0.0; table_len], Vec::with_capacity(64)),
                    |(d, stack), i| body_acceleration(&tree, bodies, i, params, d, stack),
                )
                .collect()
        } else {
            vec![NVec3::zeros(); n]
        };

        let candidates = if request.collisions {
            let per_body: Vec<Vec<CollisionCandidate>> = (0..n)
                .into_par_iter()
                .map_init(
                    || Vec::with_capacity(64),
                    |stack, i| body_collisions(&tree, bodies, i, params, stack),
                )
                .collect();
            per_body.into_iter().flatten().collect()
        } else {
            Vec::new()
        };

        WalkOutput { accelerations, candidates }
    }
}

fn brute_over(tree: &Octree, bodies: &[Body], i: usize, cell: usize, softening: f64) -> NVec3 {
    let bi = &bodies[i];
    tree.bodies_of(cell)
        .iter()
        .filter(|&&j| j != i)
        .map(|&j| pair_acceleration(bi, &bodies[j], softening))
        .sum()
}

fn body_acceleration(
    tree: &Octree,
    bodies: &[Body],
    i: usize,
    params: &Parameters,
    d: &mut [f64],
    stack: &mut Vec<usize>,
) -> NVec3 {
    let cfg = &params.tree;
    let x = bodies[i].x;
    let mut direct = NVec3::zeros(); // per unit G
    let mut far = NVec3::zeros();

    stack.clear();
    stack.push(tree.root);
    while let Some(c) = stack.pop() {
        let cell = &tree.cells[c];
        if cell.count == 0 {
            continue;
        }
        if cell.count < cfg.n_cb_pre {
            direct += brute_over(tree, bodies, i, c, params.softening);
        } else if tree.well_separated_from(&x, c) {
            far += tree.table.multipole_acceleration(tree.moments(c), &(x - cell.com), tree.expansion_order, params.G, d);
        } else if cell.count < cfg.n_cb_post || cell.is_leaf() {
            direct += brute_over(tree, bodies, i, c, params.softening);
        } else {
            stack.extend(cell.child_indices());
        }
    }

    params.G * direct + far
}

fn body_collisions(
    tree: &Octree,
    bodies: &[Body],
    i: usize,
    params: &Parameters,
    stack: &mut Vec<usize>,
) -> Vec<CollisionCandidate> {
    let dt = params.dt;
    let bi = &bodies[i];
    let (center, radius) = sweep_sphere(bi, dt);
    let mut found = Vec::new();

    stack.clear();
    stack.push(tree.root);
    while let Some(c) = stack.pop() {
        let cell = &tree.cells[c];
        if cell.count == 0 {
            continue;
        }
        let reach = radius + cell.sweep_radius;
        if (center - cell.com).norm_squared() > reach * reach {
            continue;
        }
        if cell.count < params.tree.n_cb_collision || cell.is_leaf() {
            for &j in tree.bodies_of(c) {
                if j > i && may_collide(bi, &bodies[j], dt) {
                    found.push(candidate(bi, &bodies[j], dt));
                }
            }
        } else {
            stack.extend(cell.child_indices());
        }
    }

    found
}
