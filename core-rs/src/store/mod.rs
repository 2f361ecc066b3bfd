//! Store module
//!
//! - traits: `SparqlBackend`, the seam between access control and the triple store
//! - triple_store: Oxigraph implementation (in-memory, file loading)

pub mod traits;
pub mod triple_store;

pub use traits::{QueryRow, SparqlBackend};
pub use triple_store::{format_for_path, rdf_files_in, TripleStore};
