//! # S4AC Core - Graph-level access control for RDF stores
//!
//! Implements the S4AC (Social Semantic SPARQL Security for Access Control)
//! model on top of an Oxigraph store: access policies written as RDF decide
//! which named graphs a user may query or update.
//!
//! ## Core Principle
//!
//! **Policies are data**: a policy is a set of RDF triples naming the graphs it
//! protects, the privileges it grants and the ASK queries a user must satisfy.
//! Changing access means editing triples, not code.
//!
//! ## Key Features
//!
//! - Conjunctive and disjunctive condition sets
//! - CRUD privileges per policy
//! - Public graphs (no policy) cached with a TTL
//! - Fail-closed evaluation: a condition that errors never grants access
//! - Query restriction by splicing `FROM` / `FROM NAMED` clauses
//! - Update authorization per operation and target graph
//! - Policy hot reload from watched files
//!
//! ## Architecture
//!
//! ```text
//!   query + user
//!        │
//!        ▼
//! ┌──────────────────────┐   ASK    ┌──────────────────┐
//! │ S4acAccessController │ ───────► │ evaluation store │
//! │  policies (RwLock)   │          └──────────────────┘
//! │  public graph cache  │  graphs  ┌──────────────────┐
//! │  QueryRestrictor     │ ───────► │    data store    │
//! └──────────────────────┘          └──────────────────┘
//!        │
//!        ▼
//!   query FROM <g1> FROM NAMED <g1> ...
//! ```

pub mod access;
pub mod config;
pub mod daemon;
pub mod errors;
pub mod policy;
pub mod rewrite;
pub mod store;
pub mod vocab;

pub use access::{ControllerSettings, ControllerStores, PolicyEvaluator, PublicGraphCache, S4acAccessController, UserIdentity};
pub use config::{AccessControlConfig, StoreSource};
pub use daemon::PolicyWatcher;
pub use errors::{Result, S4acError};
pub use policy::{AccessPolicy, AccessPrivilege, CombinationMode, PolicyRepository, PolicyTable};
pub use rewrite::{analyze_update, GraphTarget, QueryRestrictor, Requirement, UpdateOperation, UpdateScope};
pub use store::{SparqlBackend, TripleStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default config file name looked up by the CLI
pub const DEFAULT_CONFIG_FILE: &str = "s4ac.yaml";
