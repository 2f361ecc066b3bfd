/// Example: Restrict a SPARQL query for a user
///
/// Builds in-memory policy, context and data stores, then shows which graphs
/// each user may read and how a query is rewritten for them.
///
/// Usage:
///   cargo run --example restrict_query
///   cargo run --example restrict_query -- alice "SELECT * WHERE { ?s ?p ?o }"

use oxigraph::io::RdfFormat;
use s4ac_core::{AccessPrivilege, ControllerSettings, S4acAccessController, TripleStore, UserIdentity};
use std::env;
use std::sync::Arc;

const POLICIES: &str = r#"
@prefix s4ac: <http://ns.inria.fr/s4ac/v2#> .
@prefix ex: <http://example.org/> .

ex:hrPolicy a s4ac:DisjunctiveAccessPolicy ;
    s4ac:appliesTo ex:salaries ;
    s4ac:hasAccessPrivilege s4ac:Read ;
    s4ac:hasAccessConditionSet [
        s4ac:hasAccessCondition
            [ s4ac:hasQueryAsk "ASK { ?user <http://example.org/worksIn> <http://example.org/hr> }" ] ,
            [ s4ac:hasQueryAsk "ASK { ?user <http://example.org/role> <http://example.org/director> }" ]
    ] .
"#;

const CONTEXT: &str = r#"
@prefix ex: <http://example.org/> .
ex:alice ex:worksIn ex:hr .
ex:bob ex:worksIn ex:sales .
"#;

const DATA: &str = r#"
@prefix ex: <http://example.org/> .
ex:salaries { ex:alice ex:salary "5200" . ex:bob ex:salary "4100" . }
ex:directory { ex:alice ex:phone "+33 1 00 00 00 01" . }
"#;

fn store(label: &str, content: &str, format: RdfFormat) -> Result<Arc<TripleStore>, Box<dyn std::error::Error>> {
    let store = TripleStore::new(label)?;
    store.load_str(content, format, None)?;
    Ok(Arc::new(store))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let query = args
        .get(2)
        .cloned()
        .unwrap_or_else(|| "SELECT ?who ?value WHERE { ?who ?p ?value }".to_string());

    let controller = S4acAccessController::new(
        store("policy", POLICIES, RdfFormat::Turtle)?,
        store("context", CONTEXT, RdfFormat::Turtle)?,
        store("data", DATA, RdfFormat::TriG)?,
        ControllerSettings {
            user_namespace: Some("http://example.org/".to_string()),
            ..ControllerSettings::default()
        },
    )?;

    let users: Vec<String> = match args.get(1) {
        Some(user) => vec![user.clone()],
        None => vec!["alice".to_string(), "bob".to_string()],
    };

    for name in users {
        let user = controller.resolve_user(Some(&name))?;
        print_user(&controller, &user, &query);
    }

    Ok(())
}

fn print_user(controller: &S4acAccessController, user: &UserIdentity, query: &str) {
    let readable = controller.accessible_graphs(user, AccessPrivilege::Read);
    println!("{} can read {} graph(s):", user, readable.len());
    for graph in &readable {
        println!("  {}", graph);
    }

    match controller.restrict_query(user, query) {
        Ok(restricted) => println!("\nRestricted query:\n{}\n", restricted),
        Err(e) => println!("\nQuery rejected: {}\n", e),
    }
}
