//! Query restriction
//!
//! Confines a SPARQL query to a set of named graphs by splicing dataset
//! clauses (`FROM <g>` / `FROM NAMED <g>`) into the query text just before its
//! `WHERE` keyword. Explicit dataset clauses already present are intersected
//! with the accessible set and replaced.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use tracing::debug;

use crate::errors::{Result, S4acError};
use crate::rewrite::scanner::{keyword_matches, keyword_regex, GraphTerm, ScannedText};

static QUERY_FORM: Lazy<Regex> = Lazy::new(|| keyword_regex("SELECT|ASK|CONSTRUCT|DESCRIBE"));

// `FROM` may be glued to its IRI (`FROM<g>`)
static DATASET_CLAUSE: Lazy<Regex> = Lazy::new(|| keyword_regex(r"FROM(\s+NAMED)?"));

static FROM_KEYWORD: Lazy<Regex> = Lazy::new(|| keyword_regex("FROM"));

static WHERE_KEYWORD: Lazy<Regex> = Lazy::new(|| keyword_regex("WHERE"));

static SOLUTION_MODIFIER: Lazy<Regex> =
    Lazy::new(|| keyword_regex(r"GROUP\s+BY|HAVING|ORDER\s+BY|LIMIT|OFFSET|VALUES"));

/// SPARQL query form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryForm {
    Select,
    Ask,
    Construct,
    Describe,
}

impl QueryForm {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_uppercase().as_str() {
            "SELECT" => Some(Self::Select),
            "ASK" => Some(Self::Ask),
            "CONSTRUCT" => Some(Self::Construct),
            "DESCRIBE" => Some(Self::Describe),
            _ => None,
        }
    }
}

/// Dataset clauses found in a query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetClauses {
    /// `FROM <g>`
    pub default_graphs: BTreeSet<String>,
    /// `FROM NAMED <g>`
    pub named_graphs: BTreeSet<String>,
    /// Byte ranges of the clauses, trailing whitespace included
    spans: Vec<(usize, usize)>,
}

impl DatasetClauses {
    pub fn is_empty(&self) -> bool {
        self.default_graphs.is_empty() && self.named_graphs.is_empty()
    }
}

/// Rewrites queries so they only see accessible graphs
#[derive(Debug, Clone)]
pub struct QueryRestrictor {
    validate: bool,
}

impl Default for QueryRestrictor {
    fn default() -> Self {
        QueryRestrictor { validate: true }
    }
}

impl QueryRestrictor {
    /// # Arguments
    /// * `validate` - parse the rewritten text with Oxigraph and reject it if invalid
    pub fn new(validate: bool) -> Self {
        QueryRestrictor { validate }
    }

    /// Restrict `query` to `accessible` graphs
    ///
    /// # Errors
    /// - `AccessDenied` when the accessible set is empty or shares no graph
    ///   with the graphs the query explicitly asks for
    /// - `Rewrite` when the query text cannot be rewritten
    pub fn restrict(&self, query: &str, accessible: &BTreeSet<String>) -> Result<String> {
        if accessible.is_empty() {
            return Err(S4acError::AccessDenied("no accessible graphs".to_string()));
        }

        let scanned = ScannedText::new(query)?;
        let (form, form_pos) = query_form(&scanned)?;
        let explicit = dataset_clauses(&scanned, form_pos)?;

        let (default_graphs, named_graphs) = if explicit.is_empty() {
            (accessible.clone(), accessible.clone())
        } else {
            (
                explicit.default_graphs.intersection(accessible).cloned().collect(),
                explicit.named_graphs.intersection(accessible).cloned().collect::<BTreeSet<_>>(),
            )
        };

        if default_graphs.is_empty() && named_graphs.is_empty() {
            return Err(S4acError::AccessDenied(
                "none of the requested graphs is accessible".to_string(),
            ));
        }

        let stripped = strip_spans(query, &explicit.spans);
        let scanned = ScannedText::new(&stripped)?;
        if let Some(leftover) = keyword_matches(&FROM_KEYWORD, &scanned.masked).into_iter().next() {
            return Err(S4acError::AccessDenied(format!(
                "unrecognized dataset clause at offset {}",
                leftover.start()
            )));
        }
        let insert_at = insertion_point(&scanned, form)?;

        let mut clauses = String::new();
        for graph in &default_graphs {
            clauses.push_str(&format!("FROM <{}>\n", graph));
        }
        for graph in &named_graphs {
            clauses.push_str(&format!("FROM NAMED <{}>\n", graph));
        }

        let before = stripped[..insert_at].trim_end();
        let after = &stripped[insert_at..];
        let rewritten = format!("{}\n{}{}", before, clauses, after);

        if self.validate {
            oxigraph::sparql::Query::parse(&rewritten, None)
                .map_err(|e| S4acError::Rewrite(format!("rewritten query does not parse: {}", e)))?;
        }

        debug!(
            from = default_graphs.len(),
            from_named = named_graphs.len(),
            "query restricted"
        );

        Ok(rewritten)
    }
}

/// Locate the query form keyword
pub fn query_form(scanned: &ScannedText<'_>) -> Result<(QueryForm, usize)> {
    let m = keyword_matches(&QUERY_FORM, &scanned.masked)
        .into_iter()
        .next()
        .ok_or_else(|| S4acError::Rewrite("not a SPARQL query: no SELECT, ASK, CONSTRUCT or DESCRIBE".to_string()))?;

    let form = QueryForm::from_keyword(m.as_str())
        .ok_or_else(|| S4acError::Rewrite(format!("unknown query form '{}'", m.as_str())))?;

    Ok((form, m.start()))
}

/// Collect top-level `FROM` / `FROM NAMED` clauses following the query form
pub fn dataset_clauses(scanned: &ScannedText<'_>, form_pos: usize) -> Result<DatasetClauses> {
    let mut clauses = DatasetClauses::default();

    for caps in DATASET_CLAUSE.captures_iter(&scanned.masked[form_pos..]) {
        let Some(m) = caps.get(1) else {
            continue;
        };
        let start = form_pos + m.start();
        if scanned.depth_between(form_pos, start) != 0 {
            continue;
        }

        let named = caps.get(2).is_some();
        let (term, term_end) = scanned.read_term(scanned.skip_ws(form_pos + m.end()))?;

        let iri = match term {
            GraphTerm::Iri(iri) => iri,
            GraphTerm::Variable(v) => {
                return Err(S4acError::Rewrite(format!("variable ?{} is not allowed in a dataset clause", v)));
            }
        };

        if named {
            clauses.named_graphs.insert(iri);
        } else {
            clauses.default_graphs.insert(iri);
        }

        clauses.spans.push((start, scanned.skip_ws(term_end)));
    }

    Ok(clauses)
}

fn strip_spans(text: &str, spans: &[(usize, usize)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for (start, end) in spans {
        out.push_str(&text[cursor..*start]);
        cursor = *end;
    }
    out.push_str(&text[cursor..]);

    out
}

/// Where dataset clauses go: before top-level `WHERE`, else before the group
/// pattern (first brace, second for CONSTRUCT), else (DESCRIBE) before any
/// solution modifier or at the end
fn insertion_point(scanned: &ScannedText<'_>, form: QueryForm) -> Result<usize> {
    let (_, form_pos) = query_form(scanned)?;

    for m in keyword_matches(&WHERE_KEYWORD, &scanned.masked[form_pos..]) {
        let pos = form_pos + m.start();
        if scanned.depth_between(form_pos, pos) == 0 {
            return Ok(pos);
        }
    }

    let brace = match form {
        QueryForm::Select | QueryForm::Ask | QueryForm::Describe => scanned.nth_top_level_brace(form_pos, 1),
        QueryForm::Construct => scanned.nth_top_level_brace(form_pos, 2),
    };

    if let Some(pos) = brace {
        return Ok(pos);
    }

    match form {
        QueryForm::Describe => {
            let modifier = keyword_matches(&SOLUTION_MODIFIER, &scanned.masked[form_pos..])
                .into_iter()
                .map(|m| form_pos + m.start())
                .find(|pos| scanned.depth_between(form_pos, *pos) == 0);
            Ok(modifier.unwrap_or_else(|| scanned.original.trim_end().len()))
        }
        _ => Err(S4acError::Rewrite(format!(
            "cannot find the graph pattern of this {:?} query",
            form
        ))),
    }
}
