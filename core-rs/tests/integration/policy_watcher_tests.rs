//! Integration tests for policy hot reload
//!
//! Drives `PolicyWatcher::check_and_reload` directly and through the watch
//! loop on a background thread.

use s4ac_core::{
    AccessControlConfig, AccessPrivilege, ControllerSettings, ControllerStores, PolicyWatcher, S4acAccessController,
    SparqlBackend, TripleStore, UserIdentity,
};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const CONFIG_YAML: &str = r#"
apiVersion: s4ac/v1
kind: AccessControl
metadata:
  name: hot-reload
spec:
  policyStore:
    files: [policies.ttl]
  evaluationStore:
    files: [users.ttl]
  dataStore:
    files: [data.trig]
"#;

const USERS_TTL: &str = "<http://example.org/alice> <http://example.org/role> <http://example.org/editor> .\n";

const DATA_TRIG: &str = r#"
<http://example.org/drafts> { <http://example.org/doc> <http://example.org/title> "Draft" . }
<http://example.org/news> { <http://example.org/doc> <http://example.org/title> "News" . }
"#;

fn policy_ttl(graph: &str) -> String {
    format!(
        r#"
@prefix s4ac: <http://ns.inria.fr/s4ac/v2#> .
<http://example.org/editors> a s4ac:AccessPolicy ;
    s4ac:appliesTo <http://example.org/{}> ;
    s4ac:hasAccessPrivilege s4ac:Read ;
    s4ac:hasAccessConditionSet [
        s4ac:hasAccessCondition [
            s4ac:hasQueryAsk "ASK {{ ?user <http://example.org/role> <http://example.org/editor> }}"
        ]
    ] .
"#,
        graph
    )
}

struct Deployment {
    config: AccessControlConfig,
    stores: ControllerStores,
    controller: Arc<S4acAccessController>,
}

fn deploy(dir: &Path) -> Deployment {
    fs::write(dir.join("s4ac.yaml"), CONFIG_YAML).unwrap();
    fs::write(dir.join("policies.ttl"), policy_ttl("drafts")).unwrap();
    fs::write(dir.join("users.ttl"), USERS_TTL).unwrap();
    fs::write(dir.join("data.trig"), DATA_TRIG).unwrap();

    let config = AccessControlConfig::load(dir.join("s4ac.yaml")).unwrap();
    let stores = ControllerStores::load(&config).unwrap();
    let controller = Arc::new(S4acAccessController::with_stores(&stores, ControllerSettings::from(&config)).unwrap());

    Deployment {
        config,
        stores,
        controller,
    }
}

fn watcher(deployment: &Deployment) -> PolicyWatcher {
    PolicyWatcher::new(
        deployment.controller.clone(),
        deployment.stores.policy.clone(),
        deployment.config.spec.policy_store.clone(),
        deployment.config.base_dir.clone(),
    )
    .unwrap()
}

fn public(controller: &S4acAccessController) -> Vec<String> {
    controller.public_graphs().into_iter().collect()
}

#[test]
fn test_unchanged_sources_do_not_reload() {
    let temp_dir = TempDir::new().unwrap();
    let deployment = deploy(temp_dir.path());
    let watcher = watcher(&deployment);

    assert!(!watcher.check_and_reload().unwrap());
}

#[test]
fn test_changed_policy_file_is_reloaded() {
    let temp_dir = TempDir::new().unwrap();
    let deployment = deploy(temp_dir.path());
    let watcher = watcher(&deployment);
    let before = watcher.fingerprint();

    assert_eq!(public(&deployment.controller), vec!["http://example.org/news"]);

    fs::write(temp_dir.path().join("policies.ttl"), policy_ttl("news")).unwrap();
    assert!(watcher.check_and_reload().unwrap());
    assert_ne!(watcher.fingerprint(), before);

    assert_eq!(public(&deployment.controller), vec!["http://example.org/drafts"]);
    let alice = UserIdentity::from_iri("http://example.org/alice").unwrap();
    assert!(deployment
        .controller
        .accessible_graphs(&alice, AccessPrivilege::Read)
        .contains("http://example.org/news"));
}

#[test]
fn test_reload_fills_live_store_from_single_parse() {
    let temp_dir = TempDir::new().unwrap();
    let deployment = deploy(temp_dir.path());
    let watcher = watcher(&deployment);

    fs::write(temp_dir.path().join("policies.ttl"), policy_ttl("news")).unwrap();
    assert!(watcher.check_and_reload().unwrap());

    let parsed = TripleStore::from_source("expected", &deployment.config.spec.policy_store, temp_dir.path()).unwrap();
    assert_eq!(deployment.stores.policy.len().unwrap(), parsed.len().unwrap());

    // The live store no longer depends on the files once the reload is done
    fs::write(temp_dir.path().join("policies.ttl"), "").unwrap();
    assert_eq!(deployment.stores.policy.len().unwrap(), parsed.len().unwrap());
    assert!(deployment
        .stores
        .policy
        .ask("ASK { ?p <http://ns.inria.fr/s4ac/v2#appliesTo> <http://example.org/news> }")
        .unwrap());

    let alice = UserIdentity::from_iri("http://example.org/alice").unwrap();
    assert!(deployment
        .controller
        .accessible_graphs(&alice, AccessPrivilege::Read)
        .contains("http://example.org/news"));
}

#[test]
fn test_broken_policy_file_keeps_current_policies() {
    let temp_dir = TempDir::new().unwrap();
    let deployment = deploy(temp_dir.path());
    let watcher = watcher(&deployment);

    fs::write(temp_dir.path().join("policies.ttl"), "this is { not turtle").unwrap();

    assert!(watcher.check_and_reload().is_err());
    assert_eq!(deployment.controller.policies().len(), 1);
    assert!(!deployment.stores.policy.is_empty().unwrap());
}

#[test]
fn test_watch_loop_reloads_and_stops() {
    let temp_dir = TempDir::new().unwrap();
    let deployment = deploy(temp_dir.path());
    let watcher = watcher(&deployment);
    let controller = deployment.controller.clone();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    let handle = std::thread::spawn(move || watcher.start(shutdown_flag));

    // Give the watcher time to register before touching the file
    std::thread::sleep(Duration::from_millis(300));
    fs::write(temp_dir.path().join("policies.ttl"), policy_ttl("news")).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline && public(&controller) != vec!["http://example.org/drafts"] {
        std::thread::sleep(Duration::from_millis(100));
    }

    shutdown.store(true, Ordering::SeqCst);
    handle.join().unwrap().unwrap();

    assert_eq!(public(&controller), vec!["http://example.org/drafts"]);
}
