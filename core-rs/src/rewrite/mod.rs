//! SPARQL rewriting
//!
//! - scanner: masked-text helpers shared by the rewriters
//! - query: confines read queries to accessible graphs
//! - update: works out what an update request needs to be allowed

pub mod query;
pub mod scanner;
pub mod update;

pub use query::{dataset_clauses, query_form, DatasetClauses, QueryForm, QueryRestrictor};
pub use scanner::{GraphTerm, ScannedText};
pub use update::{analyze_update, GraphTarget, Requirement, UpdateOperation, UpdateScope};
