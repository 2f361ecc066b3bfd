//! Policy module
//!
//! - types: `AccessPolicy`, `AccessPrivilege`, `CombinationMode`
//! - repository: reads and writes S4AC policies in the policy store

pub mod repository;
pub mod types;

pub use repository::{PolicyRepository, PolicyTable};
pub use types::{quote_literal, AccessPolicy, AccessPrivilege, CombinationMode};
