//! Integration tests for policy storage
//!
//! Covers loading policies from files and directories, exporting them as
//! Turtle, and what happens to malformed policies.

use s4ac_core::store::format_for_path;
use s4ac_core::{
    AccessPolicy, AccessPrivilege, CombinationMode, PolicyRepository, StoreSource, TripleStore,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const STAFF_TTL: &str = r#"
@prefix s4ac: <http://ns.inria.fr/s4ac/v2#> .
@prefix ex: <http://example.org/> .

ex:staffPolicy a s4ac:AccessPolicy ;
    s4ac:appliesTo ex:internal, ex:payroll ;
    s4ac:hasAccessPrivilege s4ac:Read ;
    s4ac:hasAccessConditionSet ex:staffSet .
ex:staffSet a s4ac:DisjunctiveAccessConditionSet ;
    s4ac:hasAccessCondition ex:staffCondition .
ex:staffCondition a s4ac:AccessCondition ;
    s4ac:hasQueryAsk "ASK { ?user <http://example.org/memberOf> <http://example.org/staff> }" .
"#;

const ADMIN_NT: &str = "<http://example.org/adminPolicy> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://ns.inria.fr/s4ac/v2#ConjunctiveAccessPolicy> .
<http://example.org/adminPolicy> <http://ns.inria.fr/s4ac/v2#appliesTo> <http://example.org/config> .
<http://example.org/adminPolicy> <http://ns.inria.fr/s4ac/v2#hasAccessPrivilege> <http://ns.inria.fr/s4ac/v2#Delete> .
";

const BROKEN_TTL: &str = r#"
@prefix s4ac: <http://ns.inria.fr/s4ac/v2#> .
<http://example.org/orphanPolicy> a s4ac:AccessPolicy ;
    s4ac:appliesTo <http://example.org/nowhere> .
"#;

fn write_policies(dir: &Path) {
    fs::create_dir_all(dir.join("policies/extra")).unwrap();
    fs::write(dir.join("policies/staff.ttl"), STAFF_TTL).unwrap();
    fs::write(dir.join("policies/extra/admin.nt"), ADMIN_NT).unwrap();
    fs::write(dir.join("policies/extra/broken.ttl"), BROKEN_TTL).unwrap();
    fs::write(dir.join("policies/README.md"), "not rdf").unwrap();
}

fn repository_for(source: &StoreSource, base_dir: &Path) -> PolicyRepository {
    let store = TripleStore::from_source("policy", source, base_dir).unwrap();
    PolicyRepository::new(Arc::new(store))
}

#[test]
fn test_load_policies_from_directory() {
    let temp_dir = TempDir::new().unwrap();
    write_policies(temp_dir.path());

    let source = StoreSource {
        directories: vec!["policies".to_string()],
        ..StoreSource::default()
    };
    let table = repository_for(&source, temp_dir.path()).load_all().unwrap();

    // orphanPolicy grants no privilege and is skipped
    assert_eq!(table.len(), 2);

    let staff = &table["http://example.org/staffPolicy"];
    assert_eq!(staff.mode, CombinationMode::Disjunctive);
    assert_eq!(staff.graphs.len(), 2);
    assert_eq!(staff.asks.len(), 1);

    let admin = &table["http://example.org/adminPolicy"];
    assert_eq!(admin.mode, CombinationMode::Conjunctive);
    assert!(admin.grants(AccessPrivilege::Delete));
    assert!(admin.asks.is_empty(), "policy without conditions still loads");
}

#[test]
fn test_policies_in_named_graph_are_not_read() {
    let temp_dir = TempDir::new().unwrap();
    write_policies(temp_dir.path());

    let source = StoreSource {
        files: vec!["policies/staff.ttl".to_string()],
        directories: Vec::new(),
        graph: Some("http://example.org/policyGraph".to_string()),
    };
    let table = repository_for(&source, temp_dir.path()).load_all().unwrap();

    assert!(table.is_empty());
}

#[test]
fn test_exported_policy_loads_into_fresh_store() {
    let policy = AccessPolicy::new("http://example.org/exported", CombinationMode::Disjunctive)
        .with_graph("http://example.org/g1")
        .with_privilege(AccessPrivilege::Read)
        .with_privilege(AccessPrivilege::Update)
        .with_ask(r#"ASK { ?user <http://example.org/label> """tricky "quoted" \ text""" }"#);

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("exported.ttl");
    fs::write(&path, policy.to_turtle()).unwrap();
    assert!(format_for_path(&path).is_some());

    let store = TripleStore::new("policy").unwrap();
    store.load_file(&path, None).unwrap();
    let table = PolicyRepository::new(Arc::new(store)).load_all().unwrap();

    assert_eq!(table.get(&policy.id), Some(&policy));
}

#[test]
fn test_unsupported_file_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    write_policies(temp_dir.path());

    let store = TripleStore::new("policy").unwrap();
    let result = store.load_file(&temp_dir.path().join("policies/README.md"), None);
    assert!(result.is_err());
}
