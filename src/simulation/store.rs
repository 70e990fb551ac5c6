//! Body store: the authoritative, dynamically sized set of live bodies.
//!
//! Bodies live in an arena of slots. Each slot carries a generation counter
//! that is bumped when its body is retired, so a `BodyId` computed earlier in
//! a timestep (for instance inside a collision candidate) can never resolve to
//! a different body that later reused the slot.

use rayon::prelude::*;

use crate::simulation::error::SimError;
use crate::simulation::states::{Body, BodyId};

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    body: Option<Body>,
}

#[derive(Debug, Clone)]
pub struct BodyStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    max_live: usize,
}

impl BodyStore {
    pub fn new(max_live: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            max_live,
        }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn max_live(&self) -> usize {
        self.max_live
    }

    /// Insert a body, assigning it a fresh id.
    ///
    /// Exceeding the hard maximum is fatal for the run: the body is not
    /// inserted and `SimError::BodyCountExceeded` is returned.
    pub fn insert(&mut self, mut body: Body) -> Result<BodyId, SimError> {
        if self.live + 1 > self.max_live {
            return Err(SimError::BodyCountExceeded {
                live: self.live + 1,
                max: self.max_live,
            });
        }

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot { generation: 0, body: None });
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[index as usize];
        let id = BodyId { index, generation: slot.generation };
        body.id = id;
        slot.body = Some(body);
        self.live += 1;
        Ok(id)
    }

    /// Retire a body. Its id is never valid again.
    pub fn remove(&mut self, id: BodyId) -> Option<Body> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let body = slot.body.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(body)
    }

    pub fn get(&self, id: BodyId) -> Option<&Body> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.body.as_ref()
    }

    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.body.as_mut()
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Body> {
        self.slots.iter().filter_map(|s| s.body.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Body> {
        self.slots.iter_mut().filter_map(|s| s.body.as_mut())
    }

    pub fn par_iter_mut(&mut self) -> impl ParallelIterator<Item = &mut Body> {
        self.slots.par_iter_mut().filter_map(|s| s.body.as_mut())
    }

    /// Dense copy of the live bodies, in slot order.
    ///
    /// The tree and the walkers work on this snapshot; results are written
    /// back through `BodyId`.
    pub fn snapshot(&self) -> Vec<Body> {
        self.iter().cloned().collect()
    }

    pub fn total_mass(&self) -> f64 {
        self.iter().map(|b| b.m).sum()
    }
}
