// Query Rewriting Contract Tests
//
// These tests verify the guarantees of query restriction and update
// analysis. The rewritten text is what actually runs against the store, so
// every gap here is a bypass.
//
// **Problem**: A "cleanup" of the splicing logic lets a query escape its graphs
// **Solution**: Contract tests on the rewritten text itself

use s4ac_core::{analyze_update, AccessPrivilege, GraphTarget, QueryRestrictor, Requirement, S4acError};
use std::collections::BTreeSet;

fn graphs(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| format!("http://example.org/{}", n)).collect()
}

/// WHY: Queries pass through rewriting more than once in layered deployments
/// RULE: restrict(restrict(q, A), A) == restrict(q, A)
/// REASON: Rewriting must converge instead of stacking clauses
/// BREAKS: Proxies chaining the same rewrite
/// SACRIFICES: If this fails, repeated rewriting changes query semantics
#[test]
fn rewriting_is_idempotent() {
    let restrictor = QueryRestrictor::default();
    let accessible = graphs(&["a", "b"]);

    let queries = [
        "SELECT ?s WHERE { ?s ?p ?o }",
        "PREFIX ex: <http://example.org/>\nASK { ex:s ?p ?o }",
        "CONSTRUCT { ?s ?p ?o } WHERE { GRAPH ?g { ?s ?p ?o } } LIMIT 10",
        "SELECT * FROM <http://example.org/a> FROM NAMED <http://example.org/c> WHERE { ?s ?p ?o }",
        "DESCRIBE <http://example.org/s>",
    ];

    for query in queries {
        let once = restrictor.restrict(query, &accessible).unwrap();
        let twice = restrictor.restrict(&once, &accessible).unwrap();
        assert_eq!(once, twice, "rewriting changed an already restricted query: {}", query);
    }
}

/// WHY: No accessible graph must never mean "no restriction"
/// RULE: an empty accessible set is an AccessDenied error
/// REASON: A query with no dataset clause reads the whole default dataset
/// BREAKS: Confidentiality of the entire store
/// SACRIFICES: If this fails, the least privileged user becomes the most privileged
#[test]
fn empty_accessible_set_is_denial() {
    let restrictor = QueryRestrictor::default();

    let result = restrictor.restrict("SELECT * WHERE { ?s ?p ?o }", &BTreeSet::new());

    assert!(matches!(result, Err(S4acError::AccessDenied(_))));
}

/// WHY: Explicit dataset clauses are requests, not grants
/// RULE: requested graphs are intersected with the accessible set
/// REASON: A caller naming a graph in FROM must not widen its own access
/// BREAKS: Every policy, by naming protected graphs directly
/// SACRIFICES: If this fails, FROM clauses bypass access control
#[test]
fn explicit_graphs_are_intersected() {
    let restrictor = QueryRestrictor::default();
    let accessible = graphs(&["a"]);

    let query = "SELECT * FROM <http://example.org/a> FROM <http://example.org/secret> WHERE { ?s ?p ?o }";
    let restricted = restrictor.restrict(query, &accessible).unwrap();

    assert!(restricted.contains("FROM <http://example.org/a>"));
    assert!(!restricted.contains("secret"));

    let only_secret = "SELECT * FROM <http://example.org/secret> WHERE { ?s ?p ?o }";
    assert!(matches!(
        restrictor.restrict(only_secret, &accessible),
        Err(S4acError::AccessDenied(_))
    ));
}

/// WHY: SPARQL allows a dataset clause glued to its IRI
/// RULE: `FROM<g>` and `FROM NAMED<g>` are recognized like their spaced forms
/// REASON: An unrecognized clause survives the rewrite and widens the dataset
/// BREAKS: Every protected graph, reachable by dropping one space
/// SACRIFICES: If this fails, whitespace decides who reads what
#[test]
fn glued_dataset_clauses_are_restricted() {
    let restrictor = QueryRestrictor::default();
    let accessible = graphs(&["a"]);

    for query in [
        "SELECT * FROM<http://example.org/secret> WHERE { ?s ?p ?o }",
        "SELECT * FROM NAMED<http://example.org/secret> WHERE { GRAPH ?g { ?s ?p ?o } }",
        "SELECT * from\n<http://example.org/secret> WHERE { ?s ?p ?o }",
    ] {
        let result = restrictor.restrict(query, &accessible);
        assert!(matches!(result, Err(S4acError::AccessDenied(_))), "{} was not denied", query);
    }

    let mixed = "SELECT * FROM<http://example.org/a> FROM<http://example.org/secret> WHERE { ?s ?p ?o }";
    let restricted = restrictor.restrict(mixed, &accessible).unwrap();
    assert_eq!(restricted, "SELECT *\nFROM <http://example.org/a>\nWHERE { ?s ?p ?o }");
}

/// WHY: Query text carries literals and IRIs the rewriter must not misread
/// RULE: keywords inside strings, IRIs and comments are ignored
/// REASON: Splicing at a WHERE inside a literal corrupts the query
/// BREAKS: Queries searching for text such as "where"
/// SACRIFICES: If this fails, user-controlled literals steer the rewrite
#[test]
fn keywords_inside_literals_are_ignored() {
    let restrictor = QueryRestrictor::default();
    let accessible = graphs(&["a"]);

    let query = "SELECT ?s # WHERE in a comment\nWHERE { ?s <http://example.org/where> \"FROM <http://evil> WHERE\" }";
    let restricted = restrictor.restrict(query, &accessible).unwrap();

    assert_eq!(
        restricted,
        "SELECT ?s # WHERE in a comment\n\
         FROM <http://example.org/a>\n\
         FROM NAMED <http://example.org/a>\n\
         WHERE { ?s <http://example.org/where> \"FROM <http://evil> WHERE\" }"
    );
}

/// WHY: Updates are authorized per graph and privilege
/// RULE: every operation maps to (privilege, graph) requirements
/// REASON: Authorization checks exactly these pairs
/// BREAKS: Update authorization if an operation reports no requirement
/// SACRIFICES: If this fails, some update forms skip access checks
#[test]
fn update_requirements_cover_every_operation() {
    let scope = analyze_update(
        "INSERT DATA { GRAPH <http://example.org/a> { <http://example.org/s> <http://example.org/p> 1 } } ;\n\
         DROP GRAPH <http://example.org/b> ;\n\
         COPY <http://example.org/a> TO <http://example.org/c>",
    )
    .unwrap();

    let named = |privilege, graph: &str| Requirement {
        privilege,
        target: GraphTarget::Named(format!("http://example.org/{}", graph)),
    };

    assert_eq!(scope.operations.len(), 3);
    assert!(scope.requirements.contains(&named(AccessPrivilege::Create, "a")));
    assert!(scope.requirements.contains(&named(AccessPrivilege::Delete, "b")));
    assert!(scope.requirements.contains(&named(AccessPrivilege::Read, "a")));
    assert!(scope.requirements.contains(&named(AccessPrivilege::Update, "c")));
}

/// WHY: Some updates cannot be confined to named graphs
/// RULE: DROP ALL and patterns outside GRAPH blocks are reported as such
/// REASON: The controller denies targets it cannot attribute to a graph
/// BREAKS: Store-wide deletes slipping through as "no graph"
/// SACRIFICES: If this fails, CLEAR ALL runs for any user
#[test]
fn store_wide_updates_are_flagged() {
    let drop_all = analyze_update("DROP ALL").unwrap();
    assert!(drop_all.targets().contains(&GraphTarget::All));

    let default = analyze_update("DELETE WHERE { ?s ?p ?o }").unwrap();
    assert!(default.touches_default_graph());
}
