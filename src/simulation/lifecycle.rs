//! Population changes outside collisions: dumping and disk spawning.
//!
//! - Bodies closer to the central body than `low_dumping_threshold` have
//!   fallen in. Their mass and momentum go to the central body, or to the
//!   inner fluid disk when it is simulated.
//! - Bodies farther than `high_dumping_threshold` have escaped. Their mass
//!   leaves the simulation and is recorded as lost.
//! - The inner fluid disk spreads viscously beyond the Roche radius, where
//!   its outflow is turned into new bodies.
//!
//! Every change is counted in [`RunStats`].

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::simulation::collision::{Outcome, OutcomeKind};
use crate::simulation::error::SimError;
use crate::simulation::params::Parameters;
use crate::simulation::states::{radius_from_mass, Body, BodyId, CentralBody, NVec3};
use crate::simulation::store::BodyStore;

/// Counters accumulated over a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub collisions: u64,
    pub bounces: u64,
    pub mergers: u64,
    pub partial_fragmentations: u64,
    pub full_fragmentations: u64,
    pub disruptions: u64,
    pub fallen: u64, // dumped below the low threshold
    pub escaped: u64, // dumped beyond the high threshold
    pub spawned: u64,
    pub absorbed_mass: f64, // mass of the fallen bodies
    pub lost_mass: f64, // mass of the escaped bodies
}

impl RunStats {
    pub fn record_collision(&mut self, outcome: &Outcome) {
        self.collisions += 1;
        match outcome.kind {
            OutcomeKind::Bounce => self.bounces += 1,
            OutcomeKind::Merger => self.mergers += 1,
            OutcomeKind::PartialFragmentation => self.partial_fragmentations += 1,
            OutcomeKind::FullFragmentation => self.full_fragmentations += 1,
        }
        if outcome.disruption {
            self.disruptions += 1;
        }
    }
}

/// Fluid disk inside the Roche radius, co-moving with the central body
#[derive(Debug, Clone)]
pub struct InnerDisk {
    pub mass: f64,
    pub accumulated: f64, // outflow not yet turned into a body
    pub r_roche: f64,
    pub spawned_density: f64,
    pub f_tilde: f64,
}

impl InnerDisk {
    pub fn new(params: &Parameters) -> Self {
        let c = &params.central;
        Self {
            mass: c.inner_mass,
            accumulated: 0.0,
            r_roche: c.r_roche,
            spawned_density: c.spawned_density,
            f_tilde: c.f_tilde,
        }
    }

    /// Surface density, uniform between the central body's surface and the
    /// Roche radius
    pub fn surface_density(&self, central_radius: f64) -> f64 {
        self.mass / (std::f64::consts::PI * (self.r_roche * self.r_roche - central_radius * central_radius))
    }

    /// Keplerian frequency at the Roche radius
    fn omega(&self, G: f64, central_mass: f64) -> f64 {
        (G * (central_mass + self.mass) / self.r_roche.powi(3)).sqrt()
    }

    /// Mass flowing past the Roche radius per unit time
    pub fn outflow_rate(&self, G: f64, central: &CentralBody) -> f64 {
        let sigma = self.surface_density(central.radius);
        let omega = self.omega(G, central.m);
        let nu = 26.0 * G * G * sigma * sigma / omega.powi(3);
        3.0 * std::f64::consts::PI * nu * sigma
    }

    /// Mass of the next spawned body
    pub fn spawn_mass(&self, G: f64, central: &CentralBody) -> f64 {
        let sigma = self.surface_density(central.radius);
        let omega = self.omega(G, central.m);
        let lambda = 4.0 * std::f64::consts::PI.powi(2) * G * sigma / (omega * omega);
        (self.f_tilde * sigma * lambda * lambda).min(self.f_tilde * self.mass)
    }
}

pub struct Lifecycle {
    pub disk: Option<InnerDisk>,
    rng: StdRng,
}

impl Lifecycle {
    pub fn new(disk: Option<InnerDisk>, seed: u64) -> Self {
        Self {
            disk,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn disk_mass(&self) -> f64 {
        self.disk.as_ref().map_or(0.0, |d| d.mass)
    }

    /// Remove the bodies that fell onto the central body or escaped
    pub fn dump(&mut self, store: &mut BodyStore, central: Option<&mut CentralBody>, params: &Parameters, stats: &mut RunStats) {
        let origin = central.as_ref().map_or(NVec3::zeros(), |c| c.x);
        let low = central.as_ref().map(|_| params.low_dumping_threshold);

        let mut fallen: Vec<BodyId> = Vec::new();
        let mut escaped: Vec<BodyId> = Vec::new();
        for b in store.iter() {
            let r = (b.x - origin).norm();
            if low.is_some_and(|low| r < low) {
                fallen.push(b.id);
            } else if r > params.high_dumping_threshold {
                escaped.push(b.id);
            }
        }

        for id in escaped {
            if let Some(b) = store.remove(id) {
                debug!("body {:?} escaped at r = {:.3}, mass {:e} lost", id, (b.x - origin).norm(), b.m);
                stats.escaped += 1;
                stats.lost_mass += b.m;
            }
        }

        let Some(central) = central else {
            return;
        };
        for id in fallen {
            if let Some(b) = store.remove(id) {
                debug!("body {:?} fell onto the central body, mass {:e}", id, b.m);
                stats.fallen += 1;
                stats.absorbed_mass += b.m;

                let held = central.m + self.disk_mass();
                central.v = (held * central.v + b.m * b.v) / (held + b.m);
                match self.disk.as_mut() {
                    Some(disk) => disk.mass += b.m,
                    None => central.m += b.m,
                }
            }
        }
    }

    /// Accumulate the disk outflow over `dt` and spawn a body at the Roche
    /// radius once enough mass has gathered. At most one body per step.
    pub fn spawn(&mut self, store: &mut BodyStore, central: &mut CentralBody, params: &Parameters, stats: &mut RunStats) -> Result<(), SimError> {
        let Some(disk) = self.disk.as_mut() else {
            return Ok(());
        };
        if disk.mass <= 0.0 {
            return Ok(());
        }
        disk.accumulated = (disk.accumulated + disk.outflow_rate(params.G, central) * params.dt).min(disk.mass);

        let m = disk.spawn_mass(params.G, central);
        if m.is_nan() || m <= 0.0 || disk.accumulated < m {
            return Ok(());
        }

        let phi = self.rng.gen_range(0.0..2.0 * std::f64::consts::PI);
        let (s, c) = phi.sin_cos();
        let speed = (params.G * (central.m + disk.mass) / disk.r_roche).sqrt();
        let offset = NVec3::new(c, s, 0.0) * disk.r_roche;
        let w = NVec3::new(-s, c, 0.0) * speed;

        // the body leaves a disk that moved with the central body
        let mut body = Body::new(central.x + offset, central.v + w, m, radius_from_mass(m, disk.spawned_density));
        // Kepler pull until the next walk, for the sweep sphere of the first step
        body.a = -params.G * (central.m + disk.mass) * offset / disk.r_roche.powi(3);
        disk.mass -= m;
        disk.accumulated -= m;
        central.v -= m * w / (central.m + disk.mass);

        let id = store.insert(body)?;
        stats.spawned += 1;
        debug!("spawned {:?} of mass {:e} from the inner disk, {:e} left", id, m, disk.mass);
        Ok(())
    }
}
