//! Structures related to the dynamics: rigid-bodies, integration parameters
//! and the contact solver.

pub use self::integration_parameters::IntegrationParameters;
pub use self::rigid_body::RigidBody;

mod integration_parameters;
mod rigid_body;
pub mod solver;
