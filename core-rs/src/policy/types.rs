//! Core policy types
//!
//! - `AccessPrivilege`: CRUD privilege kinds bound to S4AC IRIs
//! - `CombinationMode`: how a policy's condition queries are combined
//! - `AccessPolicy`: one S4AC policy granting access to a set of named graphs

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::errors::S4acError;
use crate::vocab;

/// S4AC access privilege
///
/// # Examples
///
/// ```
/// use s4ac_core::policy::AccessPrivilege;
///
/// assert_eq!(AccessPrivilege::Read.uri(), "http://ns.inria.fr/s4ac/v2#Read");
/// assert_eq!(AccessPrivilege::from_uri("http://ns.inria.fr/s4ac/v2#Delete"), Some(AccessPrivilege::Delete));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccessPrivilege {
    Create,
    Read,
    Update,
    Delete,
}

impl AccessPrivilege {
    pub const ALL: [AccessPrivilege; 4] = [
        AccessPrivilege::Create,
        AccessPrivilege::Read,
        AccessPrivilege::Update,
        AccessPrivilege::Delete,
    ];

    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::Create => vocab::CREATE,
            Self::Read => vocab::READ,
            Self::Update => vocab::UPDATE,
            Self::Delete => vocab::DELETE,
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.uri() == uri)
    }
}

impl fmt::Display for AccessPrivilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "Create",
            Self::Read => "Read",
            Self::Update => "Update",
            Self::Delete => "Delete",
        };
        f.write_str(name)
    }
}

impl FromStr for AccessPrivilege {
    type Err = S4acError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "read" => Ok(Self::Read),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            _ => Self::from_uri(s)
                .ok_or_else(|| S4acError::InvalidPolicy(format!("Unknown access privilege: {}", s))),
        }
    }
}

/// How the condition queries of a policy are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CombinationMode {
    /// Every condition must hold
    #[default]
    Conjunctive,
    /// One condition suffices
    Disjunctive,
}

impl CombinationMode {
    /// Mode named by a policy class IRI, if any
    pub fn from_policy_class(class: &str) -> Option<Self> {
        match class {
            vocab::CONJUNCTIVE_ACCESS_POLICY => Some(Self::Conjunctive),
            vocab::DISJUNCTIVE_ACCESS_POLICY => Some(Self::Disjunctive),
            _ => None,
        }
    }

    /// Mode named by a condition-set class IRI, if any
    pub fn from_condition_set_class(class: &str) -> Option<Self> {
        match class {
            vocab::CONJUNCTIVE_CONDITION_SET => Some(Self::Conjunctive),
            vocab::DISJUNCTIVE_CONDITION_SET => Some(Self::Disjunctive),
            _ => None,
        }
    }

    pub const fn policy_class(&self) -> &'static str {
        match self {
            Self::Conjunctive => vocab::CONJUNCTIVE_ACCESS_POLICY,
            Self::Disjunctive => vocab::DISJUNCTIVE_ACCESS_POLICY,
        }
    }

    pub const fn condition_set_class(&self) -> &'static str {
        match self {
            Self::Conjunctive => vocab::CONJUNCTIVE_CONDITION_SET,
            Self::Disjunctive => vocab::DISJUNCTIVE_CONDITION_SET,
        }
    }

    /// Combine condition outcomes
    ///
    /// An empty outcome list never grants, whatever the mode.
    pub fn combine(&self, outcomes: &[bool]) -> bool {
        if outcomes.is_empty() {
            return false;
        }
        match self {
            Self::Conjunctive => outcomes.iter().all(|b| *b),
            Self::Disjunctive => outcomes.iter().any(|b| *b),
        }
    }
}

impl fmt::Display for CombinationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conjunctive => f.write_str("conjunctive"),
            Self::Disjunctive => f.write_str("disjunctive"),
        }
    }
}

/// S4AC access policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicy {
    /// Policy IRI
    pub id: String,
    pub mode: CombinationMode,
    /// Named graphs this policy protects and grants
    pub graphs: BTreeSet<String>,
    /// ASK condition queries
    pub asks: Vec<String>,
    pub privileges: BTreeSet<AccessPrivilege>,
}

impl AccessPolicy {
    pub fn new(id: impl Into<String>, mode: CombinationMode) -> Self {
        AccessPolicy {
            id: id.into(),
            mode,
            graphs: BTreeSet::new(),
            asks: Vec::new(),
            privileges: BTreeSet::new(),
        }
    }

    pub fn with_graph(mut self, graph: impl Into<String>) -> Self {
        self.graphs.insert(graph.into());
        self
    }

    pub fn with_ask(mut self, ask: impl Into<String>) -> Self {
        self.asks.push(ask.into());
        self
    }

    pub fn with_privilege(mut self, privilege: AccessPrivilege) -> Self {
        self.privileges.insert(privilege);
        self
    }

    pub fn grants(&self, privilege: AccessPrivilege) -> bool {
        self.privileges.contains(&privilege)
    }

    /// Check the policy can take part in evaluation
    pub fn validate(&self) -> Result<(), S4acError> {
        oxigraph::model::NamedNode::new(self.id.as_str())
            .map_err(|e| S4acError::InvalidPolicy(format!("Policy id '{}' is not an IRI: {}", self.id, e)))?;

        if self.graphs.is_empty() {
            return Err(S4acError::InvalidPolicy(format!("Policy {} applies to no graph", self.id)));
        }

        for graph in &self.graphs {
            oxigraph::model::NamedNode::new(graph.as_str()).map_err(|e| {
                S4acError::InvalidPolicy(format!("Policy {} targets invalid graph '{}': {}", self.id, graph, e))
            })?;
        }

        if self.privileges.is_empty() {
            return Err(S4acError::InvalidPolicy(format!("Policy {} grants no privilege", self.id)));
        }

        Ok(())
    }

    /// Identifier of the condition set node (`<policy>/conditions`)
    pub fn condition_set_id(&self) -> String {
        format!("{}/conditions", self.id.trim_end_matches('/'))
    }

    /// Identifier of the n-th condition node
    pub fn condition_id(&self, index: usize) -> String {
        format!("{}/condition/{}", self.id.trim_end_matches('/'), index + 1)
    }

    /// Render the policy as Turtle triples (no prefix declarations needed)
    pub fn to_turtle(&self) -> String {
        let mut out = String::new();
        let set_id = self.condition_set_id();

        out.push_str(&format!("<{}> <{}> <{}> .\n", self.id, vocab::RDF_TYPE, self.mode.policy_class()));

        for privilege in &self.privileges {
            out.push_str(&format!("<{}> <{}> <{}> .\n", self.id, vocab::HAS_ACCESS_PRIVILEGE, privilege.uri()));
        }

        for graph in &self.graphs {
            out.push_str(&format!("<{}> <{}> <{}> .\n", self.id, vocab::APPLIES_TO, graph));
        }

        out.push_str(&format!("<{}> <{}> <{}> .\n", self.id, vocab::HAS_ACCESS_CONDITION_SET, set_id));
        out.push_str(&format!("<{}> <{}> <{}> .\n", set_id, vocab::RDF_TYPE, self.mode.condition_set_class()));

        for (index, ask) in self.asks.iter().enumerate() {
            let condition_id = self.condition_id(index);
            out.push_str(&format!("<{}> <{}> <{}> .\n", set_id, vocab::HAS_ACCESS_CONDITION, condition_id));
            out.push_str(&format!("<{}> <{}> <{}> .\n", condition_id, vocab::RDF_TYPE, vocab::ACCESS_CONDITION));
            out.push_str(&format!("<{}> <{}> {} .\n", condition_id, vocab::HAS_QUERY_ASK, quote_literal(ask)));
        }

        out
    }
}

/// Quote a string as a SPARQL/Turtle long literal
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"\"\"{}\"\"\"", escaped)
}
