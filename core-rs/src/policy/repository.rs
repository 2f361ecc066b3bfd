//! Policy repository
//!
//! Reads S4AC policies out of the policy store and writes them back.
//! Policies are read from the store's default graph.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::errors::{Result, S4acError};
use crate::policy::types::{AccessPolicy, AccessPrivilege, CombinationMode};
use crate::store::SparqlBackend;
use crate::vocab;

/// Policy id -> policy
pub type PolicyTable = BTreeMap<String, AccessPolicy>;

pub struct PolicyRepository {
    backend: Arc<dyn SparqlBackend>,
}

/// Facts gathered for one policy before validation
#[derive(Default)]
struct PolicyDraft {
    policy_mode: Option<CombinationMode>,
    set_mode: Option<CombinationMode>,
    policy: Option<AccessPolicy>,
}

impl PolicyRepository {
    pub fn new(backend: Arc<dyn SparqlBackend>) -> Self {
        PolicyRepository { backend }
    }

    pub fn backend(&self) -> &Arc<dyn SparqlBackend> {
        &self.backend
    }

    /// Load every valid policy from the store
    ///
    /// Invalid policies (no graph, no privilege, non-IRI id) are skipped with a
    /// warning so one broken policy cannot block the others.
    pub fn load_all(&self) -> Result<PolicyTable> {
        let mut drafts: BTreeMap<String, PolicyDraft> = BTreeMap::new();

        // Policy subjects and their classes
        let rows = self.backend.select(&format!(
            r#"{prologue}
            SELECT ?policy ?class WHERE {{
                ?policy rdf:type ?class .
                FILTER(?class IN (s4ac:AccessPolicy, s4ac:ConjunctiveAccessPolicy, s4ac:DisjunctiveAccessPolicy))
            }}"#,
            prologue = vocab::PROLOGUE
        ))?;

        for row in rows {
            let (Some(id), Some(class)) = (row.get("policy"), row.get("class")) else {
                continue;
            };
            let draft = drafts.entry(id.clone()).or_default();
            draft
                .policy
                .get_or_insert_with(|| AccessPolicy::new(id.clone(), CombinationMode::default()));
            if let Some(mode) = CombinationMode::from_policy_class(class) {
                draft.policy_mode = Some(mode);
            }
        }

        // Target graphs
        for row in self.backend.select(&format!(
            "{}SELECT ?policy ?graph WHERE {{ ?policy s4ac:appliesTo ?graph }}",
            vocab::PROLOGUE
        ))? {
            if let (Some(id), Some(graph)) = (row.get("policy"), row.get("graph")) {
                if let Some(policy) = drafts.get_mut(id).and_then(|d| d.policy.as_mut()) {
                    policy.graphs.insert(graph.clone());
                }
            }
        }

        // Privileges
        for row in self.backend.select(&format!(
            "{}SELECT ?policy ?privilege WHERE {{ ?policy s4ac:hasAccessPrivilege ?privilege }}",
            vocab::PROLOGUE
        ))? {
            if let (Some(id), Some(privilege)) = (row.get("policy"), row.get("privilege")) {
                let Some(policy) = drafts.get_mut(id).and_then(|d| d.policy.as_mut()) else {
                    continue;
                };
                match AccessPrivilege::from_uri(privilege) {
                    Some(p) => {
                        policy.privileges.insert(p);
                    }
                    None => warn!(policy = %id, privilege = %privilege, "unknown access privilege"),
                }
            }
        }

        // Condition set classes
        for row in self.backend.select(&format!(
            r#"{}SELECT ?policy ?setClass WHERE {{
                ?policy s4ac:hasAccessConditionSet ?set .
                OPTIONAL {{ ?set rdf:type ?setClass }}
            }}"#,
            vocab::PROLOGUE
        ))? {
            if let (Some(id), Some(class)) = (row.get("policy"), row.get("setClass")) {
                if let Some(draft) = drafts.get_mut(id) {
                    if let Some(mode) = CombinationMode::from_condition_set_class(class) {
                        draft.set_mode = Some(mode);
                    }
                }
            }
        }

        // Condition queries
        for row in self.backend.select(&format!(
            r#"{}SELECT ?policy ?ask WHERE {{
                ?policy s4ac:hasAccessConditionSet ?set .
                ?set s4ac:hasAccessCondition ?condition .
                ?condition s4ac:hasQueryAsk ?ask .
            }} ORDER BY ?policy ?condition"#,
            vocab::PROLOGUE
        ))? {
            if let (Some(id), Some(ask)) = (row.get("policy"), row.get("ask")) {
                if let Some(policy) = drafts.get_mut(id).and_then(|d| d.policy.as_mut()) {
                    policy.asks.push(ask.clone());
                }
            }
        }

        let mut table = PolicyTable::new();

        for (id, draft) in drafts {
            let Some(mut policy) = draft.policy else {
                continue;
            };
            policy.mode = draft.policy_mode.or(draft.set_mode).unwrap_or_default();

            if let Err(e) = policy.validate() {
                warn!(policy = %id, error = %e, "skipping invalid policy");
                continue;
            }

            if policy.asks.is_empty() {
                warn!(policy = %id, "policy has no condition queries and will never grant access");
            }

            debug!(
                policy = %id,
                mode = %policy.mode,
                graphs = policy.graphs.len(),
                asks = policy.asks.len(),
                "policy loaded"
            );
            table.insert(id, policy);
        }

        info!(store = %self.backend.label(), policies = table.len(), "access policies loaded");
        Ok(table)
    }

    /// True if the store holds any triple about `id`
    pub fn contains(&self, id: &str) -> Result<bool> {
        self.backend.ask(&format!("ASK {{ <{}> ?p ?o }}", checked_iri(id)?))
    }

    /// Write a policy into the store
    pub fn add(&self, policy: &AccessPolicy) -> Result<()> {
        policy.validate()?;

        if self.contains(&policy.id)? {
            return Err(S4acError::InvalidPolicy(format!("Policy already exists: {}", policy.id)));
        }

        self.backend
            .update(&format!("INSERT DATA {{\n{}}}", policy.to_turtle()))?;

        info!(policy = %policy.id, "policy added");
        Ok(())
    }

    /// Delete a policy together with its condition set and conditions
    pub fn remove(&self, id: &str) -> Result<()> {
        let id = checked_iri(id)?;

        if !self.contains(id)? {
            return Err(S4acError::PolicyNotFound(id.to_string()));
        }

        self.backend.update(&format!(
            r#"{prologue}
            DELETE {{ ?condition ?cp ?co }} WHERE {{
                <{id}> s4ac:hasAccessConditionSet ?set .
                ?set s4ac:hasAccessCondition ?condition .
                ?condition ?cp ?co .
            }} ;
            DELETE {{ ?set ?sp ?so }} WHERE {{
                <{id}> s4ac:hasAccessConditionSet ?set .
                ?set ?sp ?so .
            }} ;
            DELETE WHERE {{ <{id}> ?p ?o }}"#,
            prologue = vocab::PROLOGUE,
            id = id
        ))?;

        info!(policy = %id, "policy removed");
        Ok(())
    }
}

fn checked_iri(id: &str) -> Result<&str> {
    oxigraph::model::NamedNode::new(id)
        .map_err(|e| S4acError::InvalidPolicy(format!("Policy id '{}' is not an IRI: {}", id, e)))?;
    Ok(id)
}
