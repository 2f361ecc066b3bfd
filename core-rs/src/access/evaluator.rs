//! Policy evaluation
//!
//! Runs each policy's ASK conditions against the evaluation store with the
//! requesting user bound in, and combines the outcomes per the policy mode.
//!
//! Evaluation fails closed: a policy whose conditions cannot be evaluated is
//! treated as not satisfied.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::access::identity::UserIdentity;
use crate::errors::{Result, S4acError};
use crate::policy::{AccessPolicy, AccessPrivilege, PolicyTable};
use crate::rewrite::scanner::mask;
use crate::store::SparqlBackend;

pub struct PolicyEvaluator {
    backend: Arc<dyn SparqlBackend>,
    user_variable: Regex,
}

impl PolicyEvaluator {
    /// # Arguments
    /// * `backend` - Store the conditions are evaluated against
    /// * `variable` - Name of the variable the user is bound to, without `?`
    pub fn new(backend: Arc<dyn SparqlBackend>, variable: &str) -> Result<Self> {
        if variable.is_empty() || !variable.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(S4acError::Config(format!("Invalid user variable name: '{}'", variable)));
        }

        let user_variable = Regex::new(&format!(r"[?$]{}\b", regex::escape(variable)))?;

        Ok(PolicyEvaluator { backend, user_variable })
    }

    pub fn backend(&self) -> &Arc<dyn SparqlBackend> {
        &self.backend
    }

    /// Replace the user variable of `ask` with the user's IRI
    ///
    /// Occurrences inside literals, IRIs and comments are left alone.
    pub fn bind_user(&self, ask: &str, user: &UserIdentity) -> Result<String> {
        let masked = mask(ask)?;
        let replacement = format!("<{}>", user.iri());

        let mut bound = String::with_capacity(ask.len() + replacement.len());
        let mut cursor = 0;
        for m in self.user_variable.find_iter(&masked) {
            bound.push_str(&ask[cursor..m.start()]);
            bound.push_str(&replacement);
            cursor = m.end();
        }
        bound.push_str(&ask[cursor..]);

        Ok(bound)
    }

    /// True if the user satisfies the policy's conditions
    ///
    /// # Errors
    /// Any condition that fails to bind or evaluate fails the whole policy.
    pub fn evaluate(&self, policy: &AccessPolicy, user: &UserIdentity) -> Result<bool> {
        let mut outcomes = Vec::with_capacity(policy.asks.len());

        for ask in &policy.asks {
            let bound = self.bind_user(ask, user)?;
            outcomes.push(self.backend.ask(&bound)?);
        }

        let granted = policy.mode.combine(&outcomes);
        debug!(
            policy = %policy.id,
            user = %user,
            mode = %policy.mode,
            outcomes = ?outcomes,
            granted,
            "policy evaluated"
        );

        Ok(granted)
    }

    /// Graphs granted to `user` for `privilege` by the satisfied policies
    pub fn granted_graphs(
        &self,
        policies: &PolicyTable,
        user: &UserIdentity,
        privilege: AccessPrivilege,
    ) -> BTreeSet<String> {
        let mut graphs = BTreeSet::new();

        for policy in policies.values().filter(|p| p.grants(privilege)) {
            match self.evaluate(policy, user) {
                Ok(true) => graphs.extend(policy.graphs.iter().cloned()),
                Ok(false) => {}
                Err(e) => {
                    warn!(policy = %policy.id, user = %user, error = %e, "policy evaluation failed; denying");
                }
            }
        }

        graphs
    }
}
