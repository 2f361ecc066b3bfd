//! Access evaluation
//!
//! - identity: who is asking
//! - evaluator: runs policy conditions for a user
//! - public_graphs: graphs no policy protects, cached with a TTL
//! - controller: `S4acAccessController`, the entry point for callers

pub mod controller;
pub mod evaluator;
pub mod identity;
pub mod public_graphs;

pub use controller::{ControllerSettings, ControllerStores, S4acAccessController};
pub use evaluator::PolicyEvaluator;
pub use identity::UserIdentity;
pub use public_graphs::{compute_public_graphs, PublicGraphCache};
