/**
 * triple_store.rs
 * Oxigraph-backed SPARQL backend
 */

use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::{NamedNode, NamedOrBlankNode, Quad, Term};
use oxigraph::sparql::QueryResults;
use oxigraph::store::{StorageError, Store};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::StoreSource;
use crate::errors::{Result, S4acError};
use crate::store::traits::{QueryRow, SparqlBackend};

/// In-memory triple store wrapping an Oxigraph `Store`
///
/// Cloning is cheap and clones share the same underlying dataset.
#[derive(Clone)]
pub struct TripleStore {
    store: Store,
    label: String,
}

impl TripleStore {
    /// Create an empty in-memory store
    pub fn new(label: impl Into<String>) -> Result<Self> {
        let store = Store::new()?;

        Ok(Self {
            store,
            label: label.into(),
        })
    }

    /// Create a store and fill it from a configured source
    pub fn from_source(label: impl Into<String>, source: &StoreSource, base_dir: &Path) -> Result<Self> {
        let store = Self::new(label)?;
        store.load_source(source, base_dir)?;
        Ok(store)
    }

    /// Access the wrapped Oxigraph store
    pub fn inner(&self) -> &Store {
        &self.store
    }

    /// Number of quads in the store
    pub fn len(&self) -> Result<usize> {
        Ok(self.store.len()?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.store.is_empty()?)
    }

    /// Remove every quad
    pub fn clear(&self) -> Result<()> {
        self.store.clear()?;
        Ok(())
    }

    /// Replace the whole content with the quads of `other`
    ///
    /// Runs as one transaction: readers see either the old or the new content,
    /// never an empty store. Returns the number of quads copied.
    pub fn replace_with(&self, other: &TripleStore) -> Result<usize> {
        let quads = other.store.iter().collect::<std::result::Result<Vec<Quad>, _>>()?;

        self.store.transaction(|mut transaction| {
            transaction.clear()?;
            for quad in &quads {
                transaction.insert(quad)?;
            }
            Ok::<_, StorageError>(())
        })?;

        debug!(store = %self.label, from = %other.label, quads = quads.len(), "store content replaced");
        Ok(quads.len())
    }

    /// Load RDF text in the given format
    ///
    /// # Arguments
    /// * `data` - Serialized RDF
    /// * `format` - Serialization format
    /// * `graph` - Target named graph for triples; `None` keeps the default graph
    pub fn load_str(&self, data: &str, format: RdfFormat, graph: Option<&str>) -> Result<()> {
        let parser = Self::parser_for(format, graph)?;

        self.store
            .load_from_reader(parser, data.as_bytes())
            .map_err(|e| S4acError::Load(e.to_string()))
    }

    /// Load one RDF file, format detected from its extension
    pub fn load_file(&self, path: &Path, graph: Option<&str>) -> Result<()> {
        if !path.exists() {
            return Err(S4acError::FileNotFound(path.display().to_string()));
        }

        if path.is_dir() {
            return Err(S4acError::Load(format!("Path is a directory: {}", path.display())));
        }

        let format = format_for_path(path).ok_or_else(|| {
            S4acError::Load(format!("Unsupported RDF file extension: {}", path.display()))
        })?;

        debug!(store = %self.label, file = %path.display(), graph = ?graph, "loading RDF file");

        let content = fs::read_to_string(path)?;
        let parser = Self::parser_for(format, graph)?;

        self.store
            .load_from_reader(parser, content.as_bytes())
            .map_err(|e| S4acError::Load(format!("{}: {}", path.display(), e)))
    }

    /// Load every file and directory listed in a store source
    ///
    /// Relative paths are resolved against `base_dir`. Returns the number of
    /// files loaded.
    pub fn load_source(&self, source: &StoreSource, base_dir: &Path) -> Result<usize> {
        let files = source.resolve_files(base_dir)?;

        for file in &files {
            self.load_file(file, source.graph.as_deref())?;
        }

        info!(store = %self.label, files = files.len(), "store loaded");
        Ok(files.len())
    }

    fn parser_for(format: RdfFormat, graph: Option<&str>) -> Result<RdfParser> {
        let mut parser = RdfParser::from_format(format);

        if let Some(graph) = graph {
            let graph_name = NamedNode::new(graph)
                .map_err(|e| S4acError::Load(format!("Invalid graph IRI '{}': {}", graph, e)))?;
            parser = parser.with_default_graph(graph_name);
        }

        Ok(parser)
    }
}

impl SparqlBackend for TripleStore {
    fn ask(&self, query: &str) -> Result<bool> {
        match self.store.query(query)? {
            QueryResults::Boolean(b) => Ok(b),
            _ => Err(S4acError::Query("Expected an ASK query".to_string())),
        }
    }

    fn select(&self, query: &str) -> Result<Vec<QueryRow>> {
        match self.store.query(query)? {
            QueryResults::Solutions(solutions) => {
                let mut rows = Vec::new();

                for solution in solutions {
                    let solution = solution?;
                    let mut row = QueryRow::new();

                    for (var, term) in solution.iter() {
                        row.insert(var.as_str().to_string(), term_value(term));
                    }

                    rows.push(row);
                }

                Ok(rows)
            }
            _ => Err(S4acError::Query("Expected a SELECT query".to_string())),
        }
    }

    fn update(&self, update: &str) -> Result<()> {
        self.store.update(update)?;
        Ok(())
    }

    fn named_graphs(&self) -> Result<BTreeSet<String>> {
        let mut graphs = BTreeSet::new();

        for graph in self.store.named_graphs() {
            match graph? {
                NamedOrBlankNode::NamedNode(node) => {
                    graphs.insert(node.into_string());
                }
                NamedOrBlankNode::BlankNode(node) => {
                    warn!(store = %self.label, graph = %node, "ignoring blank-node graph name");
                }
            }
        }

        Ok(graphs)
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// Plain value of a term: IRI without brackets, literal lexical form
fn term_value(term: &Term) -> String {
    #[allow(unreachable_patterns)]
    match term {
        Term::NamedNode(node) => node.as_str().to_string(),
        Term::BlankNode(node) => format!("_:{}", node.as_str()),
        Term::Literal(literal) => literal.value().to_string(),
        other => other.to_string(),
    }
}

/// RDF format from a file extension (ttl, trig, nt, nq, rdf, owl)
pub fn format_for_path(path: &Path) -> Option<RdfFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();

    match ext.as_str() {
        "owl" => Some(RdfFormat::RdfXml),
        other => RdfFormat::from_extension(other),
    }
}

/// Collect RDF files below a directory, sorted for deterministic load order
pub fn rdf_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| S4acError::Load(format!("Failed to walk {}: {}", dir.display(), e)))?;

        if entry.file_type().is_file() && format_for_path(entry.path()).is_some() {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}
