//! # Spatial tree (octree) with multipole moments
//!
//! The tree is rebuilt from scratch every timestep from a dense snapshot of
//! the live bodies. Cells are stored in an arena (`Vec<Cell>`) and refer to
//! each other by index only; nothing survives from one step to the next.
//!
//! ## Layout
//!
//! - The root is a cube centered on the origin. Its side starts at
//!   `root_sidelength` and doubles until every body fits, so every body lands
//!   in exactly one leaf.
//! - Bodies are not stored in the cells: the tree owns a permutation `order`
//!   of the snapshot indices and each cell covers a contiguous range of it.
//!   A cell's range is the disjoint union of its children's ranges.
//! - A cell is divided while it holds more than `subdivision_threshold`
//!   bodies and sits above level `level_max - 1`. Only non-empty octants get
//!   a child.
//! - Cells are pushed parent-first, so a reverse sweep over the arena visits
//!   children before parents (upward pass) and a forward sweep visits
//!   parents before children (downward pass).
//!
//! ## Per-cell data
//!
//! - mass, center of mass (the expansion center) and multipoles up to order
//!   `p` (dipole is exactly zero about the center of mass)
//! - `r_max`, a bound on the distance of its bodies from the center of mass,
//!   and `r_crit = r_max / θ(M)` with Dehnen's mass-dependent opening angle
//! - a sweep radius enclosing the sweep spheres of its bodies over the next
//!   timestep (collision search)

use log::warn;

use crate::configuration::config::TreeConfig;
use crate::simulation::multipole::MultiIndexTable;
use crate::simulation::states::{Body, NVec3};

#[derive(Debug, Clone)]
pub struct Cell {
    pub center: NVec3, // geometric center
    pub half_width: f64,
    pub level: u32,
    pub start: usize, // first entry of the cell in `Octree::order`
    pub count: usize, // number of bodies in the cell
    pub children: [Option<usize>; 8], // indices into Octree::cells
    pub n_children: usize,
    pub mass: f64,
    pub com: NVec3, // expansion center
    pub r_max: f64,
    pub r_crit: f64,
    pub sweep_radius: f64,
}

impl Cell {
    fn new(center: NVec3, half_width: f64, level: u32, start: usize, count: usize) -> Self {
        Self {
            center,
            half_width,
            level,
            start,
            count,
            children: [None; 8],
            n_children: 0,
            mass: 0.0,
            com: NVec3::zeros(),
            r_max: 0.0,
            r_crit: 0.0,
            sweep_radius: 0.0,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.n_children == 0
    }

    pub fn child_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.children.iter().flatten().copied()
    }
}

/// Sweep sphere of a body over one timestep.
///
/// The body stays inside this sphere while drifting for `dt`, even when its
/// velocity changes by about `dt * a` in the kick that precedes the drift.
pub fn sweep_sphere(b: &Body, dt: f64) -> (NVec3, f64) {
    let center = b.x + 0.5 * dt * b.v;
    let radius = b.radius + 0.5 * dt * b.v.norm() + 2.0 * dt * dt * b.a.norm();
    (center, radius)
}

pub struct Octree {
    pub cells: Vec<Cell>,
    pub root: usize,
    pub order: Vec<usize>, // permutation of snapshot indices
    pub expansion_order: usize,
    pub stride: usize, // number of multipole terms per cell
    pub multipoles: Vec<f64>, // cells.len() * stride
    pub table: MultiIndexTable, // built for expansion_order + 1
}

impl Octree {
    /// Build the octree over `bodies` and compute every cell's moments.
    ///
    /// `dt` sizes the collision sweep spheres. Bodies are only read.
    pub fn build(bodies: &[Body], cfg: &TreeConfig, dt: f64) -> Self {
        let p = cfg.expansion_order;
        let table = MultiIndexTable::new(p + 1);
        let stride = MultiIndexTable::len_for_order(p);

        let half_width = root_half_width(bodies, 0.5 * cfg.root_sidelength);
        let mut tree = Octree {
            cells: vec![Cell::new(NVec3::zeros(), half_width, 0, 0, bodies.len())],
            root: 0,
            order: (0..bodies.len()).collect(),
            expansion_order: p,
            stride,
            multipoles: Vec::new(),
            table,
        };

        tree.subdivide(bodies, cfg);
        tree.compute_moments(bodies, cfg, dt);
        tree
    }

    pub fn moments(&self, cell: usize) -> &[f64] {
        &self.multipoles[cell * self.stride..(cell + 1) * self.stride]
    }

    /// Snapshot indices of the bodies contained in `cell`
    pub fn bodies_of(&self, cell: usize) -> &[usize] {
        let c = &self.cells[cell];
        &self.order[c.start..c.start + c.count]
    }

    pub fn leaves(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.cells.len()).filter(|&i| self.cells[i].is_leaf())
    }

    /// Multipole acceptance criterion between two cells
    pub fn well_separated(&self, a: usize, b: usize) -> bool {
        let ca = &self.cells[a];
        let cb = &self.cells[b];
        let r = ca.com - cb.com;
        r.norm_squared() > (ca.r_crit + cb.r_crit).powi(2)
    }

    /// Multipole acceptance criterion between a point and a cell
    pub fn well_separated_from(&self, x: &NVec3, cell: usize) -> bool {
        let c = &self.cells[cell];
        (x - c.com).norm_squared() > c.r_crit * c.r_crit
    }

    /// Whether the sweep volumes of two cells overlap
    pub fn sweeps_overlap(&self, a: usize, b: usize) -> bool {
        let ca = &self.cells[a];
        let cb = &self.cells[b];
        (ca.com - cb.com).norm_squared() <= (ca.sweep_radius + cb.sweep_radius).powi(2)
    }

    // helpers ==============================================================================

    /// Split cells breadth by breadth until every leaf is small enough or at
    /// the last allowed level.
    fn subdivide(&mut self, bodies: &[Body], cfg: &TreeConfig) {
        let max_level = cfg.level_max.saturating_sub(1);
        let mut idx = 0;
        let mut scratch: Vec<usize> = Vec::new();

        while idx < self.cells.len() {
            let (center, half, level, start, count) = {
                let c = &self.cells[idx];
                (c.center, c.half_width, c.level, c.start, c.count)
            };

            if count <= cfg.subdivision_threshold || level >= max_level {
                idx += 1;
                continue;
            }

            // counting sort of the cell's range by octant
            let mut counts = [0usize; 8];
            for &bi in &self.order[start..start + count] {
                counts[child_index_for_point(&bodies[bi].x, &center)] += 1;
            }
            let mut offsets = [0usize; 8];
            for o in 1..8 {
                offsets[o] = offsets[o - 1] + counts[o - 1];
            }
            scratch.clear();
            scratch.resize(count, 0);
            let mut cursor = offsets;
            for &bi in &self.order[start..start + count] {
                let o = child_index_for_point(&bodies[bi].x, &center);
                scratch[cursor[o]] = bi;
                cursor[o] += 1;
            }
            self.order[start..start + count].copy_from_slice(&scratch);

            for o in 0..8 {
                if counts[o] == 0 {
                    continue;
                }
                let child = Cell::new(
                    child_center(&center, half, o),
                    0.5 * half,
                    level + 1,
                    start + offsets[o],
                    counts[o],
                );
                let child_idx = self.cells.len();
                self.cells.push(child);
                self.cells[idx].children[o] = Some(child_idx);
                self.cells[idx].n_children += 1;
            }
            idx += 1;
        }
    }

    /// Upward pass: mass, center of mass, radii and multipoles.
    fn compute_moments(&mut self, bodies: &[Body], cfg: &TreeConfig, dt: f64) {
        let p = self.expansion_order;
        let stride = self.stride;
        self.multipoles = vec![0.0; self.cells.len() * stride];
        let mut scratch = vec![0.0; self.table.len()];
        let total_mass: f64 = bodies.iter().map(|b| b.m).sum();

        for ci in (0..self.cells.len()).rev() {
            let cell = &self.cells[ci];
            let members = &self.order[cell.start..cell.start + cell.count];

            let mut mass = 0.0;
            let mut weighted = NVec3::zeros();
            for &bi in members {
                mass += bodies[bi].m;
                weighted += bodies[bi].m * bodies[bi].x;
            }
            let com = if mass > 0.0 { weighted / mass } else { cell.center };

            let direct = cell.is_leaf()
                || cell.count <= cfg.child_multipole_threshold * cell.n_children;

            let mut moments = vec![0.0; stride];
            let (r_max, sweep_radius);
            if direct {
                let mut rm: f64 = 0.0;
                let mut sr: f64 = 0.0;
                for &bi in members {
                    let b = &bodies[bi];
                    let d = b.x - com;
                    rm = rm.max(d.norm());
                    let (sc, sw) = sweep_sphere(b, dt);
                    sr = sr.max((sc - com).norm() + sw);
                    self.table.add_point_mass(b.m, &d, p, &mut scratch, &mut moments);
                }
                r_max = rm;
                sweep_radius = sr;
            } else {
                let mut rm: f64 = 0.0;
                let mut sr: f64 = 0.0;
                for child in cell.child_indices() {
                    let cc = &self.cells[child];
                    let d = cc.com - com;
                    rm = rm.max(d.norm() + cc.r_max);
                    sr = sr.max(d.norm() + cc.sweep_radius);
                    let child_m = &self.multipoles[child * stride..(child + 1) * stride];
                    self.table.translate_multipole(child_m, &d, p, &mut scratch, &mut moments);
                }
                // the cell's own corners bound r_max as well
                let corner = (cell.center - com).abs() + NVec3::repeat(cell.half_width);
                r_max = rm.min(corner.norm());
                sweep_radius = sr;
            }

            // expansion about the center of mass: no dipole
            for k in 1..MultiIndexTable::len_for_order(1.min(p)) {
                moments[k] = 0.0;
            }

            let theta = opening_angle(cfg.theta_min, mass, total_mass);
            let cell = &mut self.cells[ci];
            cell.mass = mass;
            cell.com = com;
            cell.r_max = r_max;
            cell.r_crit = r_max / theta;
            cell.sweep_radius = sweep_radius;
            self.multipoles[ci * stride..(ci + 1) * stride].copy_from_slice(&moments);
        }
    }
}

// helpers ===========================================================================

/// Half side of the root cube: starts from `half` and doubles until every
/// body lies inside a cube centered on the origin.
fn root_half_width(bodies: &[Body], half: f64) -> f64 {
    let extent = bodies
        .iter()
        .map(|b| b.x.x.abs().max(b.x.y.abs()).max(b.x.z.abs()))
        .fold(0.0, f64::max);

    let mut h = half;
    while h <= extent {
        h *= 2.0;
    }
    if h != half {
        warn!("root cell grown from side {} to {} to contain all bodies", 2.0 * half, 2.0 * h);
    }
    h
}

/// Dehnen's mass-dependent opening angle.
///
/// Solves `θ⁵ / (1 - θ)² = θ_min⁵ / (1 - θ_min)² · (M_tot / M)^(1/3)`, so the
/// most massive cells get the smallest angle `θ_min`.
pub fn opening_angle(theta_min: f64, mass: f64, total_mass: f64) -> f64 {
    if mass <= 0.0 || total_mass <= 0.0 || mass >= total_mass {
        return theta_min;
    }
    let f = |t: f64| t.powi(5) / ((1.0 - t) * (1.0 - t));
    let target = f(theta_min) * (total_mass / mass).cbrt();

    let mut lo = theta_min;
    let mut hi = 1.0;
    for _ in 0..60 {
        let mid = 0.5 * (lo + hi);
        if f(mid) < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Octant of a point relative to a cell center.
///
/// - Bit 0 (value 1): x >= center.x
/// - Bit 1 (value 2): y >= center.y
/// - Bit 2 (value 4): z >= center.z
fn child_index_for_point(p: &NVec3, center: &NVec3) -> usize {
    let mut idx = 0;

    if p.x >= center.x { idx |= 1; } // bit 0
    if p.y >= center.y { idx |= 2; } // bit 1
    if p.z >= center.z { idx |= 4; } // bit 2

    idx
}

/// Center of octant `child_idx` of a cell, same bit encoding as
/// `child_index_for_point`.
fn child_center(center: &NVec3, half_width: f64, child_idx: usize) -> NVec3 {
    let q = 0.5 * half_width;
    let sx = if (child_idx & 1) == 0 { -q } else { q };
    let sy = if (child_idx & 2) == 0 { -q } else { q };
    let sz = if (child_idx & 4) == 0 { -q } else { q };
    center + NVec3::new(sx, sy, sz)
}
