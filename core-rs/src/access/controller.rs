//! S4AC access controller
//!
//! Facade tying the policy table, the condition evaluator, the public graph
//! cache and the rewriters together. Shared across request handlers behind an
//! `Arc`; the policy table sits in an `RwLock` so reloads do not block readers
//! for long.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::access::evaluator::PolicyEvaluator;
use crate::access::identity::UserIdentity;
use crate::access::public_graphs::{compute_public_graphs, PublicGraphCache};
use crate::config::AccessControlConfig;
use crate::errors::{Result, S4acError};
use crate::policy::{AccessPolicy, AccessPrivilege, PolicyRepository, PolicyTable};
use crate::rewrite::{analyze_update, GraphTarget, QueryRestrictor, UpdateScope};
use crate::store::{SparqlBackend, TripleStore};

/// Runtime knobs of the controller
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    pub public_ttl: Duration,
    /// Privileges public graphs are open for
    pub public_privileges: BTreeSet<AccessPrivilege>,
    pub user_variable: String,
    pub user_namespace: Option<String>,
    pub validate_rewrites: bool,
    pub allow_default_graph: bool,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        ControllerSettings {
            public_ttl: Duration::from_secs(60),
            public_privileges: BTreeSet::from([AccessPrivilege::Read]),
            user_variable: "user".to_string(),
            user_namespace: None,
            validate_rewrites: true,
            allow_default_graph: false,
        }
    }
}

impl From<&AccessControlConfig> for ControllerSettings {
    fn from(config: &AccessControlConfig) -> Self {
        let spec = &config.spec;
        ControllerSettings {
            public_ttl: config.public_graph_ttl(),
            public_privileges: spec.public_graphs.privileges.iter().copied().collect(),
            user_variable: spec.user_binding.variable.clone(),
            user_namespace: spec.user_binding.namespace.clone(),
            validate_rewrites: spec.rewrite.validate,
            allow_default_graph: spec.updates.allow_default_graph,
        }
    }
}

/// The three stores the controller works with
///
/// Without a separate evaluation source, conditions run against the policy
/// store itself (the two handles share one dataset).
#[derive(Clone)]
pub struct ControllerStores {
    pub policy: TripleStore,
    pub evaluation: TripleStore,
    pub data: TripleStore,
}

impl ControllerStores {
    /// Load every store listed in the configuration
    pub fn load(config: &AccessControlConfig) -> Result<Self> {
        let base_dir = &config.base_dir;
        let policy = TripleStore::from_source("policy", &config.spec.policy_store, base_dir)?;

        let evaluation = match &config.spec.evaluation_store {
            Some(source) => TripleStore::from_source("evaluation", source, base_dir)?,
            None => policy.clone(),
        };

        let data = TripleStore::from_source("data", &config.spec.data_store, base_dir)?;

        Ok(ControllerStores {
            policy,
            evaluation,
            data,
        })
    }
}

pub struct S4acAccessController {
    repository: PolicyRepository,
    evaluator: PolicyEvaluator,
    data: Arc<dyn SparqlBackend>,
    policies: RwLock<PolicyTable>,
    public_cache: PublicGraphCache,
    restrictor: QueryRestrictor,
    settings: ControllerSettings,
}

impl S4acAccessController {
    /// Build a controller and load its policies
    ///
    /// # Arguments
    /// * `policy` - Store holding the S4AC policy triples
    /// * `evaluation` - Store condition queries run against
    /// * `data` - Store whose named graphs are protected
    pub fn new(
        policy: Arc<dyn SparqlBackend>,
        evaluation: Arc<dyn SparqlBackend>,
        data: Arc<dyn SparqlBackend>,
        settings: ControllerSettings,
    ) -> Result<Self> {
        let repository = PolicyRepository::new(policy);
        let evaluator = PolicyEvaluator::new(evaluation, &settings.user_variable)?;
        let policies = repository.load_all()?;

        info!(
            policies = policies.len(),
            public_ttl_secs = settings.public_ttl.as_secs(),
            "access controller ready"
        );

        Ok(S4acAccessController {
            repository,
            evaluator,
            data,
            policies: RwLock::new(policies),
            public_cache: PublicGraphCache::new(settings.public_ttl),
            restrictor: QueryRestrictor::new(settings.validate_rewrites),
            settings,
        })
    }

    pub fn with_stores(stores: &ControllerStores, settings: ControllerSettings) -> Result<Self> {
        Self::new(
            Arc::new(stores.policy.clone()),
            Arc::new(stores.evaluation.clone()),
            Arc::new(stores.data.clone()),
            settings,
        )
    }

    /// Load the configured stores and build a controller over them
    pub fn from_config(config: &AccessControlConfig) -> Result<Self> {
        let stores = ControllerStores::load(config)?;
        Self::with_stores(&stores, ControllerSettings::from(config))
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Identity for a raw user string, anonymous when absent
    pub fn resolve_user(&self, raw: Option<&str>) -> Result<UserIdentity> {
        match raw {
            Some(raw) => UserIdentity::resolve(raw, self.settings.user_namespace.as_deref()),
            None => Ok(UserIdentity::anonymous()),
        }
    }

    fn read_policies(&self) -> RwLockReadGuard<'_, PolicyTable> {
        self.policies.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Graphs `user` may access with `privilege`
    ///
    /// Granted graphs of every satisfied policy, plus the public graphs when
    /// `privilege` is one public graphs are open for.
    pub fn accessible_graphs(&self, user: &UserIdentity, privilege: AccessPrivilege) -> BTreeSet<String> {
        let mut graphs = {
            let policies = self.read_policies();
            self.evaluator.granted_graphs(&policies, user, privilege)
        };
        let granted = graphs.len();

        if self.settings.public_privileges.contains(&privilege) {
            graphs.extend(self.public_graphs());
        }

        debug!(
            user = %user,
            privilege = %privilege,
            granted,
            accessible = graphs.len(),
            "accessible graphs computed"
        );

        graphs
    }

    /// Cached public graph set; empty if enumeration fails
    pub fn public_graphs(&self) -> BTreeSet<String> {
        self.public_cache.get_or_refresh(|| self.enumerate_public_graphs())
    }

    /// Cached public graph set, reporting enumeration failures
    pub fn try_public_graphs(&self) -> Result<BTreeSet<String>> {
        self.public_cache
            .try_get_or_refresh_at(Instant::now(), || self.enumerate_public_graphs())
    }

    fn enumerate_public_graphs(&self) -> Result<BTreeSet<String>> {
        let policies = self.read_policies();
        compute_public_graphs(self.data.as_ref(), &policies)
    }

    pub fn invalidate_public_graphs(&self) {
        self.public_cache.invalidate();
    }

    pub fn public_cache(&self) -> &PublicGraphCache {
        &self.public_cache
    }

    /// Confine a read query to the graphs `user` may read
    ///
    /// # Errors
    /// `AccessDenied` when the user can read no graph at all, or none of the
    /// graphs the query names.
    pub fn restrict_query(&self, user: &UserIdentity, query: &str) -> Result<String> {
        let graphs = self.accessible_graphs(user, AccessPrivilege::Read);

        if graphs.is_empty() {
            info!(user = %user, "query denied: no readable graph");
            return Err(S4acError::AccessDenied(format!("{} may not read any graph", user)));
        }

        let restricted = self.restrictor.restrict(query, &graphs)?;
        info!(user = %user, graphs = graphs.len(), "query restricted");
        Ok(restricted)
    }

    /// Check that `user` holds every privilege `update` needs
    ///
    /// Returns the analyzed scope when the update is allowed.
    pub fn authorize_update(&self, user: &UserIdentity, update: &str) -> Result<UpdateScope> {
        let scope = analyze_update(update)?;
        let mut accessible: BTreeMap<AccessPrivilege, BTreeSet<String>> = BTreeMap::new();

        for requirement in &scope.requirements {
            let allowed = match &requirement.target {
                GraphTarget::Named(graph) => accessible
                    .entry(requirement.privilege)
                    .or_insert_with(|| self.accessible_graphs(user, requirement.privilege))
                    .contains(graph),
                GraphTarget::Default => self.settings.allow_default_graph,
                GraphTarget::All => false,
            };

            if !allowed {
                info!(user = %user, requirement = %requirement, "update denied");
                return Err(S4acError::AccessDenied(format!("{} lacks {}", user, requirement)));
            }
        }

        info!(user = %user, operations = scope.operations.len(), "update authorized");
        Ok(scope)
    }

    /// Re-read policies from the policy store
    ///
    /// On failure the current table stays in place. Success invalidates the
    /// public graph cache.
    pub fn reload_policies(&self) -> Result<usize> {
        let loaded = match self.repository.load_all() {
            Ok(table) => table,
            Err(e) => {
                warn!(error = %e, "policy reload failed; keeping current policies");
                return Err(e);
            }
        };
        let count = loaded.len();

        *self.policies.write().unwrap_or_else(PoisonError::into_inner) = loaded;
        self.public_cache.invalidate();

        info!(policies = count, "policies reloaded");
        Ok(count)
    }

    /// Snapshot of the policy table
    pub fn policies(&self) -> PolicyTable {
        self.read_policies().clone()
    }

    pub fn policy(&self, id: &str) -> Option<AccessPolicy> {
        self.read_policies().get(id).cloned()
    }

    /// Store a new policy and make it effective
    pub fn add_policy(&self, policy: &AccessPolicy) -> Result<()> {
        self.repository.add(policy)?;
        self.reload_policies()?;
        Ok(())
    }

    /// Delete a policy from the store and stop enforcing it
    pub fn remove_policy(&self, id: &str) -> Result<()> {
        self.repository.remove(id)?;
        self.reload_policies()?;
        Ok(())
    }
}
