// Access Decision Contract Tests
//
// These tests pin down who sees which graphs. A regression here leaks
// protected data or silently locks users out.
//
// **Problem**: A refactor "simplifies" condition combination or error handling
// **Solution**: Contract tests that fix the decision rules

use oxigraph::io::RdfFormat;
use s4ac_core::store::QueryRow;
use s4ac_core::{
    AccessPrivilege, ControllerSettings, PublicGraphCache, Result, S4acAccessController, S4acError, SparqlBackend,
    TripleStore, UserIdentity,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

const POLICIES: &str = r#"
@prefix s4ac: <http://ns.inria.fr/s4ac/v2#> .
@prefix ex: <http://example.org/> .

ex:both a s4ac:ConjunctiveAccessPolicy ;
    s4ac:appliesTo ex:both ;
    s4ac:hasAccessPrivilege s4ac:Read ;
    s4ac:hasAccessConditionSet [
        s4ac:hasAccessCondition
            [ s4ac:hasQueryAsk "ASK { ?user <http://example.org/has> <http://example.org/badge> }" ] ,
            [ s4ac:hasQueryAsk "ASK { ?user <http://example.org/has> <http://example.org/key> }" ]
    ] .

ex:either a s4ac:DisjunctiveAccessPolicy ;
    s4ac:appliesTo ex:either ;
    s4ac:hasAccessPrivilege s4ac:Read ;
    s4ac:hasAccessConditionSet [
        s4ac:hasAccessCondition
            [ s4ac:hasQueryAsk "ASK { ?user <http://example.org/has> <http://example.org/badge> }" ] ,
            [ s4ac:hasQueryAsk "ASK { ?user <http://example.org/has> <http://example.org/key> }" ]
    ] .
"#;

const CONTEXT: &str = r#"
@prefix ex: <http://example.org/> .
ex:holder ex:has ex:badge, ex:key .
ex:badgeOnly ex:has ex:badge .
"#;

const DATA: &str = r#"
@prefix ex: <http://example.org/> .
ex:both { ex:s ex:p "both" . }
ex:either { ex:s ex:p "either" . }
ex:lobby { ex:s ex:p "lobby" . }
"#;

fn store(label: &str, content: &str, format: RdfFormat) -> Arc<TripleStore> {
    let store = TripleStore::new(label).unwrap();
    store.load_str(content, format, None).unwrap();
    Arc::new(store)
}

fn controller() -> S4acAccessController {
    S4acAccessController::new(
        store("policy", POLICIES, RdfFormat::Turtle),
        store("evaluation", CONTEXT, RdfFormat::Turtle),
        store("data", DATA, RdfFormat::TriG),
        ControllerSettings::default(),
    )
    .unwrap()
}

fn user(name: &str) -> UserIdentity {
    UserIdentity::from_iri(&format!("http://example.org/{}", name)).unwrap()
}

fn graphs(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| format!("http://example.org/{}", n)).collect()
}

/// Backend whose every query fails
struct UnreachableBackend;

impl SparqlBackend for UnreachableBackend {
    fn ask(&self, _query: &str) -> Result<bool> {
        Err(S4acError::Store("connection refused".to_string()))
    }

    fn select(&self, _query: &str) -> Result<Vec<QueryRow>> {
        Err(S4acError::Store("connection refused".to_string()))
    }

    fn update(&self, _update: &str) -> Result<()> {
        Err(S4acError::Store("connection refused".to_string()))
    }

    fn named_graphs(&self) -> Result<BTreeSet<String>> {
        Err(S4acError::Store("connection refused".to_string()))
    }
}

/// WHY: Users matching no policy still see unprotected data
/// RULE: accessible(user) == public graphs when no policy is satisfied
/// REASON: Public graphs are the baseline every caller gets
/// BREAKS: Anonymous browsing if public graphs are dropped
/// SACRIFICES: If this fails, either protected graphs leak or public ones vanish
#[test]
fn user_without_policy_sees_only_public_graphs() {
    let controller = controller();

    assert_eq!(controller.public_graphs(), graphs(&["lobby"]));
    assert_eq!(
        controller.accessible_graphs(&user("stranger"), AccessPrivilege::Read),
        graphs(&["lobby"])
    );
    assert_eq!(
        controller.accessible_graphs(&UserIdentity::anonymous(), AccessPrivilege::Read),
        graphs(&["lobby"])
    );
}

/// WHY: Conjunctive policies are the strict form
/// RULE: every condition query must answer true
/// REASON: Policy authors rely on AND to narrow access
/// BREAKS: Confidentiality of graphs guarded by several conditions
/// SACRIFICES: If this fails, one satisfied condition opens a strict policy
#[test]
fn conjunctive_policy_requires_every_condition() {
    let controller = controller();

    let holder = controller.accessible_graphs(&user("holder"), AccessPrivilege::Read);
    let badge_only = controller.accessible_graphs(&user("badgeOnly"), AccessPrivilege::Read);

    assert!(holder.contains("http://example.org/both"));
    assert!(!badge_only.contains("http://example.org/both"));
}

/// WHY: Disjunctive policies are the lenient form
/// RULE: one condition answering true is enough
/// REASON: Policy authors rely on OR to list alternative roles
/// BREAKS: Legitimate access for users holding one of several roles
/// SACRIFICES: If this fails, disjunctive policies behave like conjunctive ones
#[test]
fn disjunctive_policy_requires_one_condition() {
    let controller = controller();

    assert_eq!(
        controller.accessible_graphs(&user("badgeOnly"), AccessPrivilege::Read),
        graphs(&["either", "lobby"])
    );
    assert_eq!(
        controller.accessible_graphs(&user("holder"), AccessPrivilege::Read),
        graphs(&["both", "either", "lobby"])
    );
}

/// WHY: Policies grant specific privileges, not blanket access
/// RULE: a satisfied Read policy grants nothing for Update
/// REASON: CRUD privileges are checked independently
/// BREAKS: Write protection of readable graphs
/// SACRIFICES: If this fails, readers can modify data
#[test]
fn satisfied_policy_grants_only_its_privileges() {
    let controller = controller();

    assert!(controller
        .accessible_graphs(&user("holder"), AccessPrivilege::Update)
        .is_empty());
}

/// WHY: An unreachable condition store must not open graphs
/// RULE: evaluation errors deny; they never grant
/// REASON: Fail-closed is the only safe default for access control
/// BREAKS: Confidentiality during outages of the evaluation store
/// SACRIFICES: If this fails, an outage becomes a data leak
#[test]
fn evaluation_failure_fails_closed() {
    let controller = S4acAccessController::new(
        store("policy", POLICIES, RdfFormat::Turtle),
        Arc::new(UnreachableBackend),
        store("data", DATA, RdfFormat::TriG),
        ControllerSettings::default(),
    )
    .unwrap();

    assert_eq!(
        controller.accessible_graphs(&user("holder"), AccessPrivilege::Read),
        graphs(&["lobby"])
    );
}

/// WHY: Failing graph enumeration must not expose protected graphs
/// RULE: enumeration failure yields no public graph
/// REASON: The public set is computed, never assumed
/// BREAKS: Anonymous access rules if failures default to "everything"
/// SACRIFICES: If this fails, a store hiccup publishes every graph
#[test]
fn public_graph_failure_yields_empty_set() {
    let controller = S4acAccessController::new(
        store("policy", POLICIES, RdfFormat::Turtle),
        store("evaluation", CONTEXT, RdfFormat::Turtle),
        Arc::new(UnreachableBackend),
        ControllerSettings::default(),
    )
    .unwrap();

    assert!(controller.public_graphs().is_empty());
    assert!(controller.try_public_graphs().is_err());
    assert_eq!(
        controller.accessible_graphs(&user("badgeOnly"), AccessPrivilege::Read),
        graphs(&["either"])
    );
}

/// WHY: The public set is cached for a fixed time
/// RULE: within the TTL the cached set is served, even if stale
/// RULE: at or after the TTL the set is recomputed
/// REASON: Graph enumeration is too costly to run per request
/// BREAKS: Endpoint latency if the cache is bypassed; freshness if never refreshed
/// SACRIFICES: If this fails, cache timing semantics changed
#[test]
fn public_cache_is_stale_within_ttl_and_fresh_after() {
    let cache = PublicGraphCache::new(Duration::from_secs(30));
    let t0 = Instant::now();

    let first = cache.get_or_refresh_at(t0, || Ok(graphs(&["lobby"])));
    let stale = cache.get_or_refresh_at(t0 + Duration::from_secs(29), || Ok(graphs(&["lobby", "atrium"])));
    let fresh = cache.get_or_refresh_at(t0 + Duration::from_secs(30), || Ok(graphs(&["lobby", "atrium"])));

    assert_eq!(first, graphs(&["lobby"]));
    assert_eq!(stale, graphs(&["lobby"]));
    assert_eq!(fresh, graphs(&["atrium", "lobby"]));
}

/// WHY: Nothing readable means nothing to query
/// RULE: an empty accessible set is a denial, not an unrestricted query
/// REASON: A query without dataset clauses would see the whole store
/// BREAKS: Every protected graph if the query passes through untouched
/// SACRIFICES: If this fails, users with no access get full access
#[test]
fn empty_accessible_set_denies_query() {
    let controller = S4acAccessController::new(
        store("policy", POLICIES, RdfFormat::Turtle),
        store("evaluation", CONTEXT, RdfFormat::Turtle),
        store("data", "<http://example.org/both> { <http://example.org/s> <http://example.org/p> <http://example.org/o> . }", RdfFormat::TriG),
        ControllerSettings::default(),
    )
    .unwrap();

    let result = controller.restrict_query(&user("stranger"), "SELECT * WHERE { ?s ?p ?o }");

    match result {
        Err(e) => assert!(e.is_denial(), "expected a denial, got {}", e),
        Ok(query) => panic!("query must be denied, got {}", query),
    }
}
