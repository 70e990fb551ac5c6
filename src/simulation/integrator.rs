//! Fixed-step time integration of the whole system
//!
//! `Simulation` owns the body store, the central body and every component
//! selected at configuration time, and advances them with a kick–drift–kick
//! leapfrog. Accelerations are cached on the bodies between steps, so each
//! step costs a single walk.
//!
//! One step of length `dt`:
//! 1. half kick with the cached accelerations (bodies, central body, spin)
//! 2. drift
//! 3. resolve the collision candidates found by the previous walk
//! 4. dump fallen and escaped bodies, spawn from the inner disk
//! 5. walk: mutual gravity and the candidates for the next step
//! 6. central-body perturbations
//! 7. half kick with the new accelerations

use log::{debug, error, info};
use rayon::prelude::*;

use crate::simulation::collision::{CollisionModel, Resolver};
use crate::simulation::engine::Engine;
use crate::simulation::error::SimError;
use crate::simulation::forces::{CentralFrame, PerturbationSet};
use crate::simulation::lifecycle::{InnerDisk, Lifecycle, RunStats};
use crate::simulation::params::Parameters;
use crate::simulation::states::{Body, CentralBody, NVec3};
use crate::simulation::store::BodyStore;
use crate::simulation::walk::{walker_for, BruteForceWalk, CollisionCandidate, TreeWalk, WalkOutput, WalkRequest};

pub struct Simulation {
    pub engine: Engine,
    pub params: Parameters,
    pub store: BodyStore,
    pub central: Option<CentralBody>,
    pub lifecycle: Lifecycle,
    pub stats: RunStats,
    pub t: f64,
    pub steps: u64,
    walker: Option<Box<dyn TreeWalk>>,
    resolver: Option<Resolver>,
    perturbations: PerturbationSet,
    candidates: Vec<CollisionCandidate>,
}

impl Simulation {
    /// Set up a run from its initial bodies.
    ///
    /// Bodies are inserted in order, the system is optionally reduced to its
    /// centre-of-mass frame and a first walk fills the cached accelerations.
    pub fn new(engine: Engine, params: Parameters, bodies: Vec<Body>, central: Option<CentralBody>) -> Result<Self, SimError> {
        let mut store = BodyStore::new(params.n_max);
        for b in bodies {
            store.insert(b)?;
        }

        let disk = (engine.central_mass && engine.perturbations.inner_fluid_disk).then(|| InnerDisk::new(&params));
        let lifecycle = Lifecycle::new(disk, params.seed.wrapping_add(1));
        let walker = engine.walk.map(walker_for);
        let resolver = match (engine.collisions, engine.collision_model) {
            (true, Some(kind)) => Some(Resolver::new(CollisionModel::new(kind, &params), engine.one_collision_only)),
            _ => None,
        };
        let perturbations = PerturbationSet::from_flags(engine.central_mass, &engine.perturbations, &params);

        let mut sim = Self {
            engine,
            params,
            store,
            central,
            lifecycle,
            stats: RunStats::default(),
            t: 0.0,
            steps: 0,
            walker,
            resolver,
            perturbations,
            candidates: Vec::new(),
        };

        if sim.engine.reduce_to_com {
            sim.reduce_to_com();
        }
        // the first collision search pads sweep spheres with these
        sim.seed_accelerations();
        sim.compute_accelerations();

        info!(
            "simulation ready: {} bodies, walk {}, perturbations {:?}",
            sim.store.len(),
            sim.walker.as_ref().map_or("none", |w| w.name()),
            sim.perturbations.names()
        );
        Ok(sim)
    }

    /// Advance the system by one timestep
    pub fn step(&mut self) -> Result<(), SimError> {
        let dt = self.params.dt;

        self.kick(0.5 * dt);
        self.drift(dt);

        if let Some(resolver) = &self.resolver {
            let candidates = std::mem::take(&mut self.candidates);
            resolver.resolve_candidates(&mut self.store, &candidates, &mut self.stats)?;
        }

        self.lifecycle.dump(&mut self.store, self.central.as_mut(), &self.params, &mut self.stats);
        if let Some(central) = self.central.as_mut() {
            self.lifecycle.spawn(&mut self.store, central, &self.params, &mut self.stats)?;
        }

        self.t += dt;
        self.steps += 1;

        self.compute_accelerations();
        self.kick(0.5 * dt);
        Ok(())
    }

    /// Run until `t_end`, calling `on_output` at t = 0 and every
    /// `output_step` steps.
    ///
    /// Stops at the first error, which is logged and returned.
    pub fn run<F>(&mut self, mut on_output: F) -> Result<(), SimError>
    where
        F: FnMut(&Simulation) -> Result<(), SimError>,
    {
        let total = self.params.total_steps();
        info!("running {} steps of {} up to t = {}", total, self.params.dt, self.params.t_end);
        on_output(self)?;

        while self.steps < total {
            if let Err(e) = self.step() {
                error!("t = {:.6}: {}", self.t, e);
                return Err(e);
            }
            if self.params.output_step > 0 && self.steps % self.params.output_step == 0 {
                info!(
                    "t = {:.4}: {} bodies, {} collisions so far",
                    self.t,
                    self.store.len(),
                    self.stats.collisions
                );
                on_output(self)?;
            }
        }

        info!("run complete at t = {:.4}: {:?}", self.t, self.stats);
        Ok(())
    }

    pub fn disk_mass(&self) -> f64 {
        self.lifecycle.disk_mass()
    }

    /// Mass moving with the central body (central body and inner disk)
    pub fn central_held_mass(&self) -> f64 {
        self.central.as_ref().map_or(0.0, |c| c.m + self.disk_mass())
    }

    pub fn total_mass(&self) -> f64 {
        self.store.total_mass() + self.central_held_mass()
    }

    pub fn total_momentum(&self) -> NVec3 {
        let bodies: NVec3 = self.store.iter().map(|b| b.momentum()).sum();
        let central = self.central.as_ref().map_or(NVec3::zeros(), |c| c.v * self.central_held_mass());
        bodies + central
    }

    /// Candidates the next step will resolve
    pub fn pending_candidates(&self) -> &[CollisionCandidate] {
        &self.candidates
    }

    // helpers ==============================================================================

    fn kick(&mut self, h: f64) {
        self.store.par_iter_mut().for_each(|b| b.v += h * b.a);
        if let Some(c) = self.central.as_mut() {
            c.v += h * c.a;
            c.spin += h * c.spin_rate;
        }
    }

    fn drift(&mut self, h: f64) {
        self.store.par_iter_mut().for_each(|b| b.x += h * b.v);
        if let Some(c) = self.central.as_mut() {
            c.x += h * c.v;
        }
    }

    /// Shift positions and velocities so that the centre of mass is at rest
    /// at the origin
    fn reduce_to_com(&mut self) {
        let total = self.total_mass();
        if total <= 0.0 {
            return;
        }
        let held = self.central_held_mass();
        let mut x_cm: NVec3 = self.store.iter().map(|b| b.m * b.x).sum();
        let mut v_cm = self.total_momentum();
        if let Some(c) = &self.central {
            x_cm += held * c.x;
        }
        x_cm /= total;
        v_cm /= total;

        for b in self.store.iter_mut() {
            b.x -= x_cm;
            b.v -= v_cm;
        }
        if let Some(c) = self.central.as_mut() {
            c.x -= x_cm;
            c.v -= v_cm;
        }
    }

    /// Perturbations only, cached on the bodies before the first walk
    fn seed_accelerations(&mut self) {
        let snapshot = self.store.snapshot();
        let extra = self.perturbation_accelerations(&snapshot);
        for (b, a) in snapshot.iter().zip(extra) {
            if let Some(body) = self.store.get_mut(b.id) {
                body.a = a;
            }
        }
    }

    /// Perturbation accelerations of `snapshot`; sets the central body's
    /// back reaction
    fn perturbation_accelerations(&mut self, snapshot: &[Body]) -> Vec<NVec3> {
        let mut extra = vec![NVec3::zeros(); snapshot.len()];
        if let Some(central) = self.central.as_mut() {
            let frame = CentralFrame {
                t: self.t,
                central,
                disk_mass: self.lifecycle.disk_mass(),
            };
            let response = self.perturbations.accumulate_accels(&frame, snapshot, &mut extra);
            central.a = response.acceleration;
            central.spin_rate = response.spin_rate;
        }
        extra
    }

    /// Walk and perturbations; caches the accelerations on the bodies and the
    /// candidates for the next step
    fn compute_accelerations(&mut self) {
        let snapshot = self.store.snapshot();
        let n = snapshot.len();
        let request = WalkRequest {
            gravity: self.engine.mutual_gravity,
            collisions: self.engine.collisions && self.resolver.is_some(),
        };

        let output = match &self.walker {
            Some(_) if n < self.params.switch_to_brute_force => BruteForceWalk.walk(&snapshot, request, &self.params),
            Some(walker) => walker.walk(&snapshot, request, &self.params),
            None => WalkOutput {
                accelerations: vec![NVec3::zeros(); n],
                candidates: Vec::new(),
            },
        };

        let extra = self.perturbation_accelerations(&snapshot);

        for ((b, walk_acc), pert_acc) in snapshot.iter().zip(&output.accelerations).zip(&extra) {
            if let Some(body) = self.store.get_mut(b.id) {
                body.a = walk_acc + pert_acc;
            }
        }

        debug!("t = {:.6}: {} bodies, {} candidates", self.t, n, output.candidates.len());
        self.candidates = output.candidates;
    }
}
