//! S4AC vocabulary
//!
//! IRIs of the S4AC access-control ontology (http://ns.inria.fr/s4ac/v2#)
//! used to express policies as RDF.

pub const S4AC_NS: &str = "http://ns.inria.fr/s4ac/v2#";
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

// Classes
pub const ACCESS_POLICY: &str = "http://ns.inria.fr/s4ac/v2#AccessPolicy";
pub const CONJUNCTIVE_ACCESS_POLICY: &str = "http://ns.inria.fr/s4ac/v2#ConjunctiveAccessPolicy";
pub const DISJUNCTIVE_ACCESS_POLICY: &str = "http://ns.inria.fr/s4ac/v2#DisjunctiveAccessPolicy";
pub const ACCESS_CONDITION_SET: &str = "http://ns.inria.fr/s4ac/v2#AccessConditionSet";
pub const CONJUNCTIVE_CONDITION_SET: &str = "http://ns.inria.fr/s4ac/v2#ConjunctiveAccessConditionSet";
pub const DISJUNCTIVE_CONDITION_SET: &str = "http://ns.inria.fr/s4ac/v2#DisjunctiveAccessConditionSet";
pub const ACCESS_CONDITION: &str = "http://ns.inria.fr/s4ac/v2#AccessCondition";

// Properties
pub const APPLIES_TO: &str = "http://ns.inria.fr/s4ac/v2#appliesTo";
pub const HAS_ACCESS_PRIVILEGE: &str = "http://ns.inria.fr/s4ac/v2#hasAccessPrivilege";
pub const HAS_ACCESS_CONDITION_SET: &str = "http://ns.inria.fr/s4ac/v2#hasAccessConditionSet";
pub const HAS_ACCESS_CONDITION: &str = "http://ns.inria.fr/s4ac/v2#hasAccessCondition";
pub const HAS_QUERY_ASK: &str = "http://ns.inria.fr/s4ac/v2#hasQueryAsk";

// Privileges
pub const CREATE: &str = "http://ns.inria.fr/s4ac/v2#Create";
pub const READ: &str = "http://ns.inria.fr/s4ac/v2#Read";
pub const UPDATE: &str = "http://ns.inria.fr/s4ac/v2#Update";
pub const DELETE: &str = "http://ns.inria.fr/s4ac/v2#Delete";

/// SPARQL prologue binding the `s4ac:` and `rdf:` prefixes
pub const PROLOGUE: &str = "PREFIX s4ac: <http://ns.inria.fr/s4ac/v2#>\nPREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>\n";
