//! # Mesh walk
//!
//! Neighbour search on a uniform grid instead of a tree. The grid covers the
//! "collision cube", `collision_cube_cells` cells per side, centred on the
//! origin. The cell size is the largest of
//!
//! - `collision_cube_min / collision_cube_cells`
//! - `(how_many_neighbours / (27 n))^(1/3)`, `n` the number density of the
//!   bodies over their bounding box, so that a 27-cell neighbourhood holds
//!   about `how_many_neighbours` bodies
//! - the largest sweep diameter, so colliding pairs are always neighbours
//!
//! Bodies are binned by the centre of their sweep sphere. Bodies outside the
//! cube have no neighbours.
//!
//! Gravity in this mode is an approximation: each body feels the bodies of
//! its 27 neighbouring cells and the three most massive bodies of the
//! system, nothing else.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::configuration::config::MeshConfig;
use crate::simulation::params::Parameters;
use crate::simulation::states::{Body, NVec3};
use crate::simulation::tree::sweep_sphere;
use crate::simulation::walk::{candidate, may_collide, pair_acceleration, CollisionCandidate, TreeWalk, WalkOutput, WalkRequest};

const HEAVIEST: usize = 3;

pub struct MeshWalk;

impl TreeWalk for MeshWalk {
    fn name(&self) -> &'static str {
        "mesh"
    }

    fn walk(&self, bodies: &[Body], request: WalkRequest, params: &Parameters) -> WalkOutput {
        let grid = Mesh::build(bodies, &params.mesh, params.dt);
        let n = bodies.len();

        let accelerations = if request.gravity {
            let heavy = heaviest(bodies);
            (0..n)
                .into_par_iter()
                .map(|i| grid.body_acceleration(bodies, i, &heavy, params.softening) * params.G)
                .collect()
        } else {
            vec![NVec3::zeros(); n]
        };

        let candidates = if request.collisions {
            let per_body: Vec<Vec<CollisionCandidate>> = (0..n)
                .into_par_iter()
                .map(|i| grid.body_collisions(bodies, i, params.dt))
                .collect();
            per_body.into_iter().flatten().collect()
        } else {
            Vec::new()
        };

        WalkOutput { accelerations, candidates }
    }
}

type CellKey = [i64; 3];

/// Uniform grid over the collision cube
pub struct Mesh {
    pub gamma: f64, // cell side
    pub cells_per_side: i64,
    half_side: f64,
    cells: HashMap<CellKey, Vec<usize>>,
    keys: Vec<Option<CellKey>>, // per body
}

impl Mesh {
    pub fn build(bodies: &[Body], cfg: &MeshConfig, dt: f64) -> Self {
        let cells_per_side = cfg.collision_cube_cells.max(1) as i64;
        let gamma = cell_size(bodies, cfg, dt);
        let half_side = 0.5 * gamma * cells_per_side as f64;

        let mut mesh = Mesh {
            gamma,
            cells_per_side,
            half_side,
            cells: HashMap::new(),
            keys: Vec::with_capacity(bodies.len()),
        };

        for (i, b) in bodies.iter().enumerate() {
            let (center, _) = sweep_sphere(b, dt);
            let key = mesh.key_of(&center);
            if let Some(k) = key {
                mesh.cells.entry(k).or_default().push(i);
            }
            mesh.keys.push(key);
        }
        mesh
    }

    /// Grid cell containing `p`, if inside the cube
    pub fn key_of(&self, p: &NVec3) -> Option<CellKey> {
        let mut key = [0i64; 3];
        for (axis, k) in key.iter_mut().enumerate() {
            let c = ((p[axis] + self.half_side) / self.gamma).floor();
            if !c.is_finite() || c < 0.0 || c >= self.cells_per_side as f64 {
                return None;
            }
            *k = c as i64;
        }
        Some(key)
    }

    /// Snapshot indices in the 27 cells around `key`, in a fixed order
    fn neighbourhood(&self, key: CellKey) -> impl Iterator<Item = usize> + '_ {
        (-1..=1).flat_map(move |dx| {
            (-1..=1).flat_map(move |dy| {
                (-1..=1).flat_map(move |dz| {
                    self.cells
                        .get(&[key[0] + dx, key[1] + dy, key[2] + dz])
                        .into_iter()
                        .flatten()
                        .copied()
                })
            })
        })
    }

    fn are_neighbours(&self, i: usize, j: usize) -> bool {
        match (self.keys[i], self.keys[j]) {
            (Some(a), Some(b)) => (0..3).all(|axis| (a[axis] - b[axis]).abs() <= 1),
            _ => false,
        }
    }

    /// Acceleration of body `i` per unit G
    fn body_acceleration(&self, bodies: &[Body], i: usize, heavy: &[usize], softening: f64) -> NVec3 {
        let bi = &bodies[i];
        let mut acc = NVec3::zeros();
        if let Some(key) = self.keys[i] {
            for j in self.neighbourhood(key) {
                if j != i {
                    acc += pair_acceleration(bi, &bodies[j], softening);
                }
            }
        }
        for &j in heavy {
            if j != i && !self.are_neighbours(i, j) {
                acc += pair_acceleration(bi, &bodies[j], softening);
            }
        }
        acc
    }

    fn body_collisions(&self, bodies: &[Body], i: usize, dt: f64) -> Vec<CollisionCandidate> {
        let Some(key) = self.keys[i] else {
            return Vec::new();
        };
        let bi = &bodies[i];
        self.neighbourhood(key)
            .filter(|&j| j > i && may_collide(bi, &bodies[j], dt))
            .map(|j| candidate(bi, &bodies[j], dt))
            .collect()
    }
}

fn cell_size(bodies: &[Body], cfg: &MeshConfig, dt: f64) -> f64 {
    let floor = cfg.collision_cube_min / cfg.collision_cube_cells.max(1) as f64;

    let mut lo = NVec3::repeat(f64::INFINITY);
    let mut hi = NVec3::repeat(f64::NEG_INFINITY);
    let mut largest_sweep: f64 = 0.0;
    for b in bodies {
        lo = lo.inf(&b.x);
        hi = hi.sup(&b.x);
        largest_sweep = largest_sweep.max(2.0 * sweep_sphere(b, dt).1);
    }

    let volume = if bodies.len() > 1 { (hi - lo).product() } else { 0.0 };
    let by_density = if volume > 0.0 {
        let density = bodies.len() as f64 / volume;
        (cfg.how_many_neighbours / (27.0 * density)).cbrt()
    } else {
        0.0
    };

    floor.max(by_density).max(largest_sweep)
}

/// Snapshot indices of the most massive bodies, heaviest first
fn heaviest(bodies: &[Body]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..bodies.len()).collect();
    idx.sort_by(|&a, &b| bodies[b].m.total_cmp(&bodies[a].m));
    idx.truncate(HEAVIEST);
    idx
}
