pub mod simulation;
pub mod configuration;
pub mod output;
pub mod benchmark;

pub use simulation::states::{Body, BodyId, CentralBody, NVec3};
pub use simulation::store::BodyStore;
pub use simulation::error::SimError;
pub use simulation::params::Parameters;
pub use simulation::engine::{CollisionModelKind, Engine, WalkMode};
pub use simulation::tree::Octree;
pub use simulation::walk::{walker_for, CollisionCandidate, TreeWalk, WalkOutput, WalkRequest};
pub use simulation::collision::{CollisionModel, Outcome, OutcomeKind, Resolver};
pub use simulation::fragmentation::FragmentationModel;
pub use simulation::forces::{Perturbation, PerturbationSet};
pub use simulation::lifecycle::{InnerDisk, Lifecycle, RunStats};
pub use simulation::integrator::Simulation;
pub use simulation::scenario::Scenario;

pub use configuration::config::{EngineConfig, ParametersConfig, BodyConfig, ScenarioConfig};
pub use configuration::validate::{validate, ConfigError};

pub use output::writer::{read_init_file, write_init_file, OutputWriter};

pub use benchmark::benchmark::{bench_walks, bench_walk_curve};
