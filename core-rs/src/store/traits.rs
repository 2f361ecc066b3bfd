//! SPARQL backend trait
//!
//! Defines the interface the access-control layer needs from a triple store.
//! Implementations include:
//! - TripleStore (in-memory Oxigraph)
//! - Future: remote SPARQL endpoints

use crate::errors::Result;
use std::collections::{BTreeSet, HashMap};

/// One solution of a SELECT query: variable name -> plain term value
///
/// IRIs are returned without angle brackets, literals as their lexical form.
pub type QueryRow = HashMap<String, String>;

/// SPARQL backend trait
///
/// The access-control layer never touches storage directly. Everything it needs
/// (policy loading, condition evaluation, graph enumeration) goes through here.
///
/// # Semantics
///
/// - `ask` must only accept ASK queries; other forms are a query error
/// - `named_graphs` returns IRIs of every named graph holding at least one quad
/// - Implementations must be shareable across threads
pub trait SparqlBackend: Send + Sync {
    /// Evaluate an ASK query
    fn ask(&self, query: &str) -> Result<bool>;

    /// Evaluate a SELECT query
    fn select(&self, query: &str) -> Result<Vec<QueryRow>>;

    /// Execute a SPARQL Update request
    fn update(&self, update: &str) -> Result<()>;

    /// Enumerate named graph IRIs
    fn named_graphs(&self) -> Result<BTreeSet<String>>;

    /// Human readable name used in logs
    fn label(&self) -> &str {
        "sparql-backend"
    }
}
