//! # Collision resolution
//!
//! Candidates found by a walk are resolved after the drift that follows it.
//! Over that drift each body moved on a straight line, so the moment the two
//! surfaces touched can be recovered exactly:
//!
//! ```text
//! |Δx + Δv s| = R₁ + R₂,   s ∈ [-window, 0]
//! ```
//!
//! The pair is moved back to contact, the collision model is applied there and
//! the products are drifted forward again to the present time.
//!
//! Models:
//! - elastic: normal impulse with coefficient 2, ids preserved
//! - inelastic: normal impulse with coefficient `f ∈ [1, 2]`, ids preserved
//! - merger: one body with the total mass, momentum and volume, new id
//! - fragmentation: see [`crate::simulation::fragmentation`]

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::simulation::engine::CollisionModelKind;
use crate::simulation::error::SimError;
use crate::simulation::fragmentation::FragmentationModel;
use crate::simulation::lifecycle::RunStats;
use crate::simulation::params::Parameters;
use crate::simulation::states::{Body, BodyId, NVec3};
use crate::simulation::store::BodyStore;
use crate::simulation::walk::CollisionCandidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Bounce, // both bodies survive with new velocities
    Merger,
    PartialFragmentation, // largest remnant and a tail
    FullFragmentation, // largest, second largest and a tail of fragments
}

/// Result of one collision, at the time of contact.
///
/// For a bounce `bodies` holds the two colliding bodies with their ids. For
/// every other outcome it holds the products, largest first, and their ids
/// are assigned when inserted into the store.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub kind: OutcomeKind,
    pub disruption: bool, // super-catastrophic impact
    pub bodies: Vec<Body>,
}

#[derive(Debug, Clone)]
pub enum CollisionModel {
    Elastic,
    Inelastic { f: f64 },
    Merger,
    Fragmentation(FragmentationModel),
}

impl CollisionModel {
    pub fn new(kind: CollisionModelKind, params: &Parameters) -> Self {
        match kind {
            CollisionModelKind::Elastic => CollisionModel::Elastic,
            CollisionModelKind::Inelastic => CollisionModel::Inelastic {
                f: params.collision.collision_parameter,
            },
            CollisionModelKind::InstantMerger => CollisionModel::Merger,
            CollisionModelKind::Fragmentation => {
                CollisionModel::Fragmentation(FragmentationModel::new(&params.collision, params.G))
            }
        }
    }

    /// Apply the model to two bodies in contact
    pub fn resolve(&self, b1: &Body, b2: &Body) -> Outcome {
        match self {
            CollisionModel::Elastic => bounce(b1, b2, 2.0),
            CollisionModel::Inelastic { f } => bounce(b1, b2, *f),
            CollisionModel::Merger => Outcome {
                kind: OutcomeKind::Merger,
                disruption: false,
                bodies: vec![merge(b1, b2)],
            },
            CollisionModel::Fragmentation(model) => model.resolve(b1, b2),
        }
    }
}

/// Time `s ∈ [-window, 0]` at which two linearly drifting bodies touched.
///
/// `None` when they did not touch during the window, or were already moving
/// apart. A pair that was already overlapping at the start of the window and
/// still approaching is resolved at `-window`.
pub fn contact_time(b1: &Body, b2: &Body, window: f64) -> Option<f64> {
    let dx = b2.x - b1.x;
    let dv = b2.v - b1.v;
    let reach = b1.radius + b2.radius;

    let a = dv.norm_squared();
    let b = 2.0 * dx.dot(&dv);
    let c = dx.norm_squared() - reach * reach;
    if a == 0.0 {
        return None;
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }

    let s = (-b - disc.sqrt()) / (2.0 * a);
    if s > 0.0 {
        return None; // not touching yet
    }
    if s >= -window {
        return Some(s);
    }
    // overlapping since before the window: only if still approaching then
    if b - 2.0 * a * window < 0.0 {
        Some(-window)
    } else {
        None
    }
}

/// Unit vector from `b1` to `b2`
fn impact_normal(b1: &Body, b2: &Body) -> NVec3 {
    let d = b2.x - b1.x;
    let n = d.norm();
    if n > 0.0 { d / n } else { NVec3::x() }
}

/// Exchange of normal momentum with coefficient `f`.
///
/// `f = 2` conserves kinetic energy, `f = 1` removes the normal relative
/// velocity.
pub fn bounce(b1: &Body, b2: &Body, f: f64) -> Outcome {
    let n = impact_normal(b1, b2);
    let closing = (b1.v - b2.v).dot(&n);
    let total = b1.m + b2.m;

    let mut first = b1.clone();
    let mut second = b2.clone();
    if closing > 0.0 {
        first.v -= f * b2.m / total * closing * n;
        second.v += f * b1.m / total * closing * n;
    }

    Outcome {
        kind: OutcomeKind::Bounce,
        disruption: false,
        bodies: vec![first, second],
    }
}

/// Perfect merger: mass, momentum, center of mass and volume are conserved
pub fn merge(b1: &Body, b2: &Body) -> Body {
    let m = b1.m + b2.m;
    let x = (b1.m * b1.x + b2.m * b2.x) / m;
    let v = (b1.m * b1.v + b2.m * b2.v) / m;
    let radius = (b1.radius.powi(3) + b2.radius.powi(3)).cbrt();
    let mut merged = Body::new(x, v, m, radius);
    merged.a = (b1.m * b1.a + b2.m * b2.a) / m;
    merged
}

/// Applies a collision model to the candidates of a walk and keeps track of
/// which bodies were consumed within the current step.
pub struct Resolver {
    pub model: CollisionModel,
    pub one_collision_only: bool,
}

impl Resolver {
    pub fn new(model: CollisionModel, one_collision_only: bool) -> Self {
        Self { model, one_collision_only }
    }

    /// Resolve `candidates` in the order they were emitted.
    ///
    /// A body consumed by a collision (merger or fragmentation) is replaced by
    /// its heir, the largest product. With `one_collision_only` any candidate
    /// naming a body already involved in a collision this step is skipped;
    /// otherwise it is redirected to the heir and tested again.
    pub fn resolve_candidates(
        &self,
        store: &mut BodyStore,
        candidates: &[CollisionCandidate],
        stats: &mut RunStats,
    ) -> Result<(), SimError> {
        let mut heirs: HashMap<BodyId, BodyId> = HashMap::new();
        let mut involved: HashSet<BodyId> = HashSet::new();

        for c in candidates {
            let (first, second) = if self.one_collision_only {
                if involved.contains(&c.first) || involved.contains(&c.second) {
                    continue;
                }
                (c.first, c.second)
            } else {
                (heir_of(&heirs, c.first), heir_of(&heirs, c.second))
            };
            if first == second {
                continue;
            }

            let (Some(b1), Some(b2)) = (store.get(first), store.get(second)) else {
                continue;
            };
            let Some(s) = contact_time(b1, b2, c.window) else {
                continue;
            };

            let outcome = self.model.resolve(&b1.drifted(s), &b2.drifted(s));
            debug!(
                "collision {:?} + {:?} at s = {:.3e}: {:?} into {} bodies",
                first,
                second,
                s,
                outcome.kind,
                outcome.bodies.len()
            );
            stats.record_collision(&outcome);
            involved.insert(first);
            involved.insert(second);

            match outcome.kind {
                OutcomeKind::Bounce => {
                    for b in &outcome.bodies {
                        if let Some(slot) = store.get_mut(b.id) {
                            slot.x = b.x - s * b.v;
                            slot.v = b.v;
                        }
                    }
                }
                _ => {
                    // fail before touching the store so it stays whole at the fatal point
                    let live = store.len() - 2 + outcome.bodies.len();
                    if live > store.max_live() {
                        return Err(SimError::BodyCountExceeded { live, max: store.max_live() });
                    }
                    store.remove(first);
                    store.remove(second);
                    let mut heir = None;
                    for product in outcome.bodies {
                        let id = store.insert(product.drifted(-s))?;
                        heir.get_or_insert(id);
                    }
                    if let Some(heir) = heir {
                        heirs.insert(first, heir);
                        heirs.insert(second, heir);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Follow the chain of heirs to the body currently standing for `id`
fn heir_of(heirs: &HashMap<BodyId, BodyId>, mut id: BodyId) -> BodyId {
    while let Some(&next) = heirs.get(&id) {
        id = next;
    }
    id
}
