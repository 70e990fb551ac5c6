//! Core state types for the N-body simulation.
//!
//! - `Body`        one orbiting body (position, velocity, mass, radius, identity)
//! - `BodyId`      stable, generation-checked handle into the body store
//! - `CentralBody` the dominant central mass, integrated separately from the tree
//!
//! All vectors are `NVec3` (nalgebra, f64).

use nalgebra::Vector3;
pub type NVec3 = Vector3<f64>;

/// Handle to a slot of the body store.
///
/// `index` is the slot, `generation` counts how many times the slot has been
/// retired. A handle whose generation no longer matches its slot is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId {
    pub index: u32,
    pub generation: u32,
}

#[derive(Debug, Clone)]
pub struct Body {
    pub id: BodyId, // assigned by the store on insertion
    pub x: NVec3, // position
    pub v: NVec3, // velocity
    pub a: NVec3, // last computed acceleration
    pub m: f64, // mass
    pub radius: f64, // physical radius
}

impl Body {
    /// A body not yet owned by a store. The id is overwritten on insertion.
    pub fn new(x: NVec3, v: NVec3, m: f64, radius: f64) -> Self {
        Self {
            id: BodyId { index: u32::MAX, generation: 0 },
            x,
            v,
            a: NVec3::zeros(),
            m,
            radius,
        }
    }

    pub fn momentum(&self) -> NVec3 {
        self.v * self.m
    }

    /// Bulk density, assuming a homogeneous sphere
    pub fn density(&self) -> f64 {
        self.m / sphere_volume(self.radius)
    }

    /// Drift along a straight line for a (possibly negative) time `dt`
    pub fn drifted(&self, dt: f64) -> Self {
        let mut b = self.clone();
        b.x += dt * b.v;
        b
    }
}

/// The dominant central mass (planet or star).
///
/// It is never part of the tree: its gravity, oblateness and tides are added
/// directly by the perturbation terms in `forces`.
#[derive(Debug, Clone)]
pub struct CentralBody {
    pub x: NVec3, // position
    pub v: NVec3, // velocity
    pub a: NVec3, // last computed acceleration
    pub m: f64, // mass (inner disk excluded)
    pub radius: f64, // equatorial radius
    pub spin: NVec3, // sidereal rotation vector
    pub spin_rate: NVec3, // last computed d(spin)/dt
}

impl CentralBody {
    pub fn new(m: f64, radius: f64, spin: NVec3) -> Self {
        Self {
            x: NVec3::zeros(),
            v: NVec3::zeros(),
            a: NVec3::zeros(),
            m,
            radius,
            spin,
            spin_rate: NVec3::zeros(),
        }
    }
}

pub fn sphere_volume(radius: f64) -> f64 {
    4.0 / 3.0 * std::f64::consts::PI * radius * radius * radius
}

/// Radius of a homogeneous sphere of mass `m` and density `rho`
pub fn radius_from_mass(m: f64, rho: f64) -> f64 {
    (3.0 * m / (4.0 * std::f64::consts::PI * rho)).cbrt()
}
