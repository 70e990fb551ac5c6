pub mod states;
pub mod store;
pub mod error;
pub mod params;
pub mod engine;
pub mod multipole;
pub mod tree;
pub mod walk;
pub mod collision;
pub mod fragmentation;
pub mod forces;
pub mod lifecycle;
pub mod elements;
pub mod integrator;
pub mod scenario;
