//! # Dual-tree walk (falcON)
//!
//! Mutual gravity follows Dehnen's falcON: cells are compared in pairs,
//! starting with the root against itself.
//!
//! - **self interaction** of a cell: brute force below `n_cs` bodies (or for
//!   a leaf), otherwise every child against itself and every pair of
//!   children.
//! - **pair interaction** of two cells with `N_A N_B` bodies:
//!   - `N_A N_B < n_cc_pre`: brute force, regardless of separation
//!   - well separated: one symmetric multipole-multipole interaction
//!   - `N_A N_B < n_cc_post`: brute force
//!   - otherwise the larger cell is split and the comparison recurses; two
//!     leaves that cannot be split are evaluated brute force.
//!
//! Local expansions are then passed down the tree and evaluated at each body.
//! Because every cell-cell interaction is applied to both cells with the same
//! derivative tensor, total momentum is conserved to rounding.
//!
//! Collision search runs a second traversal of the same tree with the sweep
//! radii and `n_cc_collision` / `n_cs_collision` thresholds: pairs whose sweep
//! volumes are disjoint are pruned, there is no "pre" tier.

use rayon::prelude::*;

use crate::simulation::params::Parameters;
use crate::simulation::states::{Body, NVec3};
use crate::simulation::tree::Octree;
use crate::simulation::walk::{candidate, may_collide, CollisionCandidate, TreeWalk, WalkOutput, WalkRequest};

pub struct DualTreeWalk;

impl TreeWalk for DualTreeWalk {
    fn name(&self) -> &'static str {
        "falcON"
    }

    fn walk(&self, bodies: &[Body], request: WalkRequest, params: &Parameters) -> WalkOutput {
        let tree = Octree::build(bodies, &params.tree, params.dt);

        let accelerations = if request.gravity {
            dual_tree_gravity(&tree, bodies, params)
        } else {
            vec![NVec3::zeros(); bodies.len()]
        };

        let candidates = if request.collisions {
            dual_tree_collisions(&tree, bodies, params)
        } else {
            Vec::new()
        };

        WalkOutput { accelerations, candidates }
    }
}

/// Accelerations of every body of `tree` by the falcON interaction scheme
pub fn dual_tree_gravity(tree: &Octree, bodies: &[Body], params: &Parameters) -> Vec<NVec3> {
    let mut walker = GravityWalker {
        tree,
        bodies,
        params,
        direct: vec![NVec3::zeros(); bodies.len()],
        locals: vec![0.0; tree.cells.len() * tree.stride],
        scratch: vec![0.0; tree.table.len()],
    };

    if !bodies.is_empty() {
        walker.self_interaction(tree.root);
        walker.pass_down();
    }

    let GravityWalker { direct, locals, .. } = walker;

    let mut leaf_of = vec![0usize; bodies.len()];
    for leaf in tree.leaves() {
        for &bi in tree.bodies_of(leaf) {
            leaf_of[bi] = leaf;
        }
    }

    let stride = tree.stride;
    let p = tree.expansion_order;
    let table_len = tree.table.len();
    direct
        .par_iter()
        .enumerate()
        .map_init(
            || vec![0.0; table_len],
            |scratch, (i, acc)| {
                let leaf = leaf_of[i];
                let local = &locals[leaf * stride..(leaf + 1) * stride];
                let y = bodies[i].x - tree.cells[leaf].com;
                acc + tree.table.local_acceleration(local, &y, p, scratch)
            },
        )
        .collect()
}

/// Candidate colliding pairs by a dual-tree traversal, in traversal order
pub fn dual_tree_collisions(tree: &Octree, bodies: &[Body], params: &Parameters) -> Vec<CollisionCandidate> {
    let mut walker = CollisionWalker {
        tree,
        bodies,
        params,
        candidates: Vec::new(),
    };
    if !bodies.is_empty() {
        walker.self_search(tree.root);
    }
    walker.candidates
}

/// Mutable views of two distinct cells' coefficient blocks
fn two_blocks(v: &mut [f64], a: usize, b: usize, stride: usize) -> (&mut [f64], &mut [f64]) {
    debug_assert_ne!(a, b);
    if a < b {
        let (lo, hi) = v.split_at_mut(b * stride);
        (&mut lo[a * stride..(a + 1) * stride], &mut hi[..stride])
    } else {
        let (lo, hi) = v.split_at_mut(a * stride);
        let (b_block, a_block) = (&mut lo[b * stride..(b + 1) * stride], &mut hi[..stride]);
        (a_block, b_block)
    }
}

fn children_of(tree: &Octree, cell: usize) -> ([usize; 8], usize) {
    let mut kids = [0usize; 8];
    let mut k = 0;
    for c in tree.cells[cell].child_indices() {
        kids[k] = c;
        k += 1;
    }
    (kids, k)
}

// gravity ==================================================================================

struct GravityWalker<'a> {
    tree: &'a Octree,
    bodies: &'a [Body],
    params: &'a Parameters,
    direct: Vec<NVec3>, // brute-force contributions
    locals: Vec<f64>, // local expansion coefficients, per cell
    scratch: Vec<f64>,
}

impl<'a> GravityWalker<'a> {
    fn self_interaction(&mut self, a: usize) {
        let tree = self.tree;
        let cell = &tree.cells[a];
        if cell.is_leaf() || cell.count < self.params.tree.n_cs {
            self.brute_self(a);
            return;
        }

        let (kids, k) = children_of(tree, a);
        for i in 0..k {
            self.self_interaction(kids[i]);
            for j in (i + 1)..k {
                self.pair_interaction(kids[i], kids[j]);
            }
        }
    }

    fn pair_interaction(&mut self, a: usize, b: usize) {
        let tree = self.tree;
        let cfg = &self.params.tree;
        let (ca, cb) = (&tree.cells[a], &tree.cells[b]);
        let product = ca.count * cb.count;

        if product < cfg.n_cc_pre {
            self.brute_pair(a, b);
            return;
        }
        if tree.well_separated(a, b) {
            self.multipole_pair(a, b);
            return;
        }
        if product < cfg.n_cc_post {
            self.brute_pair(a, b);
            return;
        }

        // split the larger cell; leaves cannot be split
        let (big, small) = match (ca.is_leaf(), cb.is_leaf()) {
            (true, true) => {
                self.brute_pair(a, b);
                return;
            }
            (true, false) => (b, a),
            (false, true) => (a, b),
            (false, false) => {
                if ca.r_max >= cb.r_max { (a, b) } else { (b, a) }
            }
        };

        let (kids, k) = children_of(tree, big);
        for &child in &kids[..k] {
            self.pair_interaction(child, small);
        }
    }

    fn multipole_pair(&mut self, a: usize, b: usize) {
        let tree = self.tree;
        let r = tree.cells[b].com - tree.cells[a].com;
        let (la, lb) = two_blocks(&mut self.locals, a, b, tree.stride);
        tree.table.interact_mutual(
            tree.expansion_order,
            tree.moments(a),
            tree.moments(b),
            &r,
            self.params.G,
            &mut self.scratch,
            la,
            lb,
        );
    }

    #[inline]
    fn mutual(&mut self, i: usize, j: usize) {
        let (bi, bj) = (&self.bodies[i], &self.bodies[j]);
        let r = bj.x - bi.x;
        let eps = self.params.softening * (bi.radius + bj.radius);
        let d2 = r.norm_squared() + eps * eps;
        if d2 == 0.0 {
            return;
        }
        let inv_r = d2.sqrt().recip();
        let coef = self.params.G * inv_r * inv_r * inv_r;
        self.direct[i] += coef * bj.m * r;
        self.direct[j] -= coef * bi.m * r;
    }

    fn brute_self(&mut self, a: usize) {
        let members = self.tree.bodies_of(a);
        for (k, &i) in members.iter().enumerate() {
            for &j in &members[k + 1..] {
                self.mutual(i, j);
            }
        }
    }

    fn brute_pair(&mut self, a: usize, b: usize) {
        let tree = self.tree;
        for &i in tree.bodies_of(a) {
            for &j in tree.bodies_of(b) {
                self.mutual(i, j);
            }
        }
    }

    /// Translate every cell's local expansion into its children (L2L).
    fn pass_down(&mut self) {
        let tree = self.tree;
        let stride = tree.stride;
        let p = tree.expansion_order;
        for parent in 0..tree.cells.len() {
            for child in tree.cells[parent].child_indices() {
                let s = tree.cells[child].com - tree.cells[parent].com;
                // children always sit after their parent in the arena
                let (lo, hi) = self.locals.split_at_mut(child * stride);
                let from = &lo[parent * stride..(parent + 1) * stride];
                tree.table.translate_local(from, &s, p, &mut self.scratch, &mut hi[..stride]);
            }
        }
    }
}

// collisions ===============================================================================

struct CollisionWalker<'a> {
    tree: &'a Octree,
    bodies: &'a [Body],
    params: &'a Parameters,
    candidates: Vec<CollisionCandidate>,
}

impl<'a> CollisionWalker<'a> {
    fn self_search(&mut self, a: usize) {
        let tree = self.tree;
        let cell = &tree.cells[a];
        if cell.is_leaf() || cell.count < self.params.tree.n_cs_collision {
            self.brute_self(a);
            return;
        }

        let (kids, k) = children_of(tree, a);
        for i in 0..k {
            self.self_search(kids[i]);
            for j in (i + 1)..k {
                self.pair_search(kids[i], kids[j]);
            }
        }
    }

    fn pair_search(&mut self, a: usize, b: usize) {
        let tree = self.tree;
        if !tree.sweeps_overlap(a, b) {
            return;
        }
        let (ca, cb) = (&tree.cells[a], &tree.cells[b]);
        if ca.count * cb.count < self.params.tree.n_cc_collision {
            self.brute_pair(a, b);
            return;
        }

        let (big, small) = match (ca.is_leaf(), cb.is_leaf()) {
            (true, true) => {
                self.brute_pair(a, b);
                return;
            }
            (true, false) => (b, a),
            (false, true) => (a, b),
            (false, false) => {
                if ca.sweep_radius >= cb.sweep_radius { (a, b) } else { (b, a) }
            }
        };

        let (kids, k) = children_of(tree, big);
        for &child in &kids[..k] {
            self.pair_search(child, small);
        }
    }

    fn check(&mut self, i: usize, j: usize) {
        let (bi, bj) = (&self.bodies[i], &self.bodies[j]);
        if may_collide(bi, bj, self.params.dt) {
            self.candidates.push(candidate(bi, bj, self.params.dt));
        }
    }

    fn brute_self(&mut self, a: usize) {
        let members = self.tree.bodies_of(a);
        for (k, &i) in members.iter().enumerate() {
            for &j in &members[k + 1..] {
                self.check(i, j);
            }
        }
    }

    fn brute_pair(&mut self, a: usize, b: usize) {
        let tree = self.tree;
        for &i in tree.bodies_of(a) {
            for &j in tree.bodies_of(b) {
                self.check(i, j);
            }
        }
    }
}
