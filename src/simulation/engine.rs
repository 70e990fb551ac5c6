//! High-level runtime engine settings
//!
//! Selects the walk strategy, the collision model and the physical switches
//! used when building and running a `Simulation`. Each algorithm family is a
//! closed enum chosen once at configuration load.

use crate::configuration::config::PerturbationFlags;

/// How mutual gravity and collision candidates are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    BruteForce, // direct O(N^2) summation
    Falcon, // dual-tree walk (Dehnen's falcON)
    StandardTree, // single-tree walk (Barnes & Hut)
    Mesh, // uniform grid, neighbours and largest bodies only
}

/// What happens to two bodies that touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionModelKind {
    Elastic,
    Inelastic,
    InstantMerger,
    Fragmentation,
}

#[derive(Debug, Clone)]
pub struct Engine {
    pub central_mass: bool,
    pub reduce_to_com: bool,
    pub one_collision_only: bool,
    pub mutual_gravity: bool,
    pub collisions: bool,
    pub walk: Option<WalkMode>, // None when neither mutual gravity nor collisions are on
    pub collision_model: Option<CollisionModelKind>, // None when collisions are off
    pub perturbations: PerturbationFlags,
}
