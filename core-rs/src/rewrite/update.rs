//! Update authorization scope
//!
//! Works out which privilege a SPARQL Update request needs on which graph.
//! The request is first validated with Oxigraph, then each operation is
//! classified and its target graphs are read from the text:
//!
//! | Operation                       | Requirement                                  |
//! |---------------------------------|----------------------------------------------|
//! | `INSERT DATA`, `LOAD`, `CREATE` | Create on the written graph                  |
//! | `DELETE DATA`, `CLEAR`, `DROP`  | Delete on the cleared graph                  |
//! | `DELETE`/`INSERT` ... `WHERE`   | Update on template graphs, Read on WHERE     |
//! | `ADD`, `COPY`                   | Read on the source, Update on the target     |
//! | `MOVE`                          | as `COPY`, plus Delete on the source         |
//!
//! `GRAPH ?var`, `NAMED` and `ALL` resolve to [`GraphTarget::All`], which no
//! finite set of accessible graphs can cover.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

use crate::errors::{Result, S4acError};
use crate::policy::AccessPrivilege;
use crate::rewrite::scanner::{keyword_matches, keyword_regex, GraphTerm, ScannedText};

static OPERATION: Lazy<Regex> = Lazy::new(|| {
    keyword_regex(r"INSERT\s+DATA|DELETE\s+DATA|DELETE\s+WHERE|LOAD|CLEAR|DROP|CREATE|ADD|MOVE|COPY|WITH|DELETE|INSERT")
});

static GRAPH_KEYWORD: Lazy<Regex> = Lazy::new(|| keyword_regex("GRAPH"));

/// Graph touched by an update operation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GraphTarget {
    Named(String),
    Default,
    /// Every named graph, or a graph chosen at evaluation time
    All,
}

impl fmt::Display for GraphTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphTarget::Named(iri) => write!(f, "<{}>", iri),
            GraphTarget::Default => write!(f, "DEFAULT"),
            GraphTarget::All => write!(f, "ALL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateOperation {
    InsertData,
    DeleteData,
    DeleteWhere,
    Modify,
    Load,
    Clear,
    Drop,
    Create,
    Add,
    Move,
    Copy,
}

/// One privilege needed on one graph
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Requirement {
    pub privilege: AccessPrivilege,
    pub target: GraphTarget,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.privilege, self.target)
    }
}

/// What an update request reads and writes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateScope {
    pub operations: Vec<UpdateOperation>,
    pub requirements: BTreeSet<Requirement>,
}

impl UpdateScope {
    fn require(&mut self, privilege: AccessPrivilege, target: GraphTarget) {
        self.requirements.insert(Requirement { privilege, target });
    }

    fn require_all<'a>(&mut self, privilege: AccessPrivilege, targets: impl IntoIterator<Item = &'a GraphTarget>) {
        for target in targets {
            self.require(privilege, target.clone());
        }
    }

    pub fn targets(&self) -> BTreeSet<&GraphTarget> {
        self.requirements.iter().map(|r| &r.target).collect()
    }

    pub fn touches_default_graph(&self) -> bool {
        self.requirements.iter().any(|r| r.target == GraphTarget::Default)
    }
}

/// Classify every operation of `update` and collect its requirements
///
/// # Errors
/// `Rewrite` when the request is not valid SPARQL Update.
pub fn analyze_update(update: &str) -> Result<UpdateScope> {
    oxigraph::sparql::Update::parse(update, None)
        .map_err(|e| S4acError::Rewrite(format!("invalid SPARQL update: {}", e)))?;

    let scanned = ScannedText::new(update)?;
    let mut scope = UpdateScope::default();

    for (start, end) in operation_spans(&scanned) {
        // Segments without an operation keyword only hold prologue or whitespace
        let Some(m) = keyword_matches(&OPERATION, &scanned.masked[start..end]).into_iter().next() else {
            continue;
        };

        let keyword = m.as_str().split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase();
        let mut parser = OperationParser {
            scanned: &scanned,
            keyword_start: start + m.start(),
            pos: start + m.end(),
            end,
        };

        let operation = parser.analyze(&keyword, &mut scope)?;
        scope.operations.push(operation);
    }

    debug!(
        operations = scope.operations.len(),
        requirements = scope.requirements.len(),
        "update analyzed"
    );

    Ok(scope)
}

/// Byte ranges of the `;`-separated operations
fn operation_spans(scanned: &ScannedText<'_>) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut depth = 0i64;
    let mut start = 0;

    for (offset, b) in scanned.masked.bytes().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => depth -= 1,
            b';' if depth == 0 => {
                spans.push((start, offset));
                start = offset + 1;
            }
            _ => {}
        }
    }
    spans.push((start, scanned.masked.len()));

    spans
}

struct OperationParser<'s, 'a> {
    scanned: &'s ScannedText<'a>,
    keyword_start: usize,
    pos: usize,
    end: usize,
}

impl<'s, 'a> OperationParser<'s, 'a> {
    fn analyze(&mut self, keyword: &str, scope: &mut UpdateScope) -> Result<UpdateOperation> {
        use AccessPrivilege::*;

        let default = [GraphTarget::Default];
        let all = [GraphTarget::All];

        let operation = match keyword {
            "INSERT DATA" => {
                let (open, close) = self.block()?;
                scope.require_all(Create, &self.block_targets(open, close, &default, &all)?);
                UpdateOperation::InsertData
            }
            "DELETE DATA" => {
                let (open, close) = self.block()?;
                scope.require_all(Delete, &self.block_targets(open, close, &default, &all)?);
                UpdateOperation::DeleteData
            }
            "DELETE WHERE" => {
                let (open, close) = self.block()?;
                let targets = self.block_targets(open, close, &default, &all)?;
                scope.require_all(Update, &targets);
                scope.require_all(Read, &targets);
                UpdateOperation::DeleteWhere
            }
            "WITH" => {
                let with = self.graph_ref()?;
                self.modify(Some(with), scope)?;
                UpdateOperation::Modify
            }
            "DELETE" | "INSERT" => {
                self.pos = self.keyword_start;
                self.modify(None, scope)?;
                UpdateOperation::Modify
            }
            "LOAD" => {
                self.eat("SILENT");
                self.source_iri()?;
                let target = if self.eat("INTO") {
                    self.graph_ref()?
                } else {
                    GraphTarget::Default
                };
                scope.require(Create, target);
                UpdateOperation::Load
            }
            "CLEAR" | "DROP" => {
                self.eat("SILENT");
                scope.require(Delete, self.graph_ref()?);
                if keyword == "CLEAR" {
                    UpdateOperation::Clear
                } else {
                    UpdateOperation::Drop
                }
            }
            "CREATE" => {
                self.eat("SILENT");
                scope.require(Create, self.graph_ref()?);
                UpdateOperation::Create
            }
            "ADD" | "MOVE" | "COPY" => {
                self.eat("SILENT");
                let source = self.graph_ref()?;
                if !self.eat("TO") {
                    return Err(self.unexpected("TO"));
                }
                let target = self.graph_ref()?;

                scope.require(Read, source.clone());
                scope.require(Update, target);
                match keyword {
                    "ADD" => UpdateOperation::Add,
                    "COPY" => UpdateOperation::Copy,
                    _ => {
                        scope.require(Delete, source);
                        UpdateOperation::Move
                    }
                }
            }
            other => return Err(S4acError::Rewrite(format!("unsupported update operation '{}'", other))),
        };

        Ok(operation)
    }

    /// `[DELETE {..}] [INSERT {..}] (USING [NAMED] iri)* WHERE {..}`
    fn modify(&mut self, with: Option<GraphTarget>, scope: &mut UpdateScope) -> Result<()> {
        use AccessPrivilege::*;

        let template_default = [with.unwrap_or(GraphTarget::Default)];
        let all = [GraphTarget::All];

        let mut templates = 0;
        for keyword in ["DELETE", "INSERT"] {
            if self.eat(keyword) {
                let (open, close) = self.block()?;
                scope.require_all(Update, &self.block_targets(open, close, &template_default, &all)?);
                templates += 1;
            }
        }
        if templates == 0 {
            return Err(self.unexpected("DELETE or INSERT template"));
        }

        let mut using = Vec::new();
        let mut using_named = Vec::new();
        while self.eat("USING") {
            let named = self.eat("NAMED");
            let graph = self.named_graph()?;
            if named {
                using_named.push(graph);
            } else {
                using.push(graph);
            }
        }

        if !self.eat("WHERE") {
            return Err(self.unexpected("WHERE"));
        }

        // USING replaces the dataset, WITH only the default graph
        let where_default = if using.is_empty() && using_named.is_empty() {
            template_default.to_vec()
        } else {
            using.clone()
        };
        let where_variables = if using.is_empty() && using_named.is_empty() {
            all.to_vec()
        } else {
            using_named.clone()
        };

        let (open, close) = self.block()?;
        scope.require_all(Read, &self.block_targets(open, close, &where_default, &where_variables)?);
        scope.require_all(Read, using.iter().chain(using_named.iter()));

        Ok(())
    }

    fn ws(&mut self) {
        self.pos = self.scanned.skip_ws(self.pos).min(self.end);
    }

    /// Consume `keyword` (case-insensitive) if it comes next
    fn eat(&mut self, keyword: &str) -> bool {
        self.ws();
        let rest = &self.scanned.masked[self.pos..self.end];

        let matches = rest.len() >= keyword.len()
            && rest.as_bytes()[..keyword.len()].eq_ignore_ascii_case(keyword.as_bytes())
            && rest[keyword.len()..]
                .chars()
                .next()
                .map_or(true, |c| !(c.is_alphanumeric() || c == '_' || c == ':'));

        if matches {
            self.pos += keyword.len();
        }
        matches
    }

    /// `DEFAULT | NAMED | ALL | [GRAPH] iri`
    fn graph_ref(&mut self) -> Result<GraphTarget> {
        if self.eat("DEFAULT") {
            return Ok(GraphTarget::Default);
        }
        if self.eat("NAMED") || self.eat("ALL") {
            return Ok(GraphTarget::All);
        }
        self.eat("GRAPH");
        self.named_graph()
    }

    fn named_graph(&mut self) -> Result<GraphTarget> {
        self.ws();
        let (term, end) = self.scanned.read_term(self.pos)?;
        self.pos = end;
        Ok(match term {
            GraphTerm::Iri(iri) => GraphTarget::Named(iri),
            GraphTerm::Variable(_) => GraphTarget::All,
        })
    }

    fn source_iri(&mut self) -> Result<()> {
        self.ws();
        let (_, end) = self.scanned.read_term(self.pos)?;
        self.pos = end;
        Ok(())
    }

    /// Consume a `{ .. }` block, returning the offsets of both braces
    fn block(&mut self) -> Result<(usize, usize)> {
        self.ws();
        if self.scanned.masked.as_bytes().get(self.pos) != Some(&b'{') {
            return Err(self.unexpected("'{'"));
        }
        let open = self.pos;
        let close = self
            .scanned
            .matching_brace(open)
            .ok_or_else(|| S4acError::Rewrite(format!("unbalanced braces at offset {}", open)))?;
        self.pos = close + 1;
        Ok((open, close))
    }

    /// Graphs addressed inside a block
    ///
    /// `GRAPH <g> {..}` adds `<g>`, `GRAPH ?var {..}` adds `variables`, and
    /// patterns outside any GRAPH block add `defaults`.
    fn block_targets(
        &self,
        open: usize,
        close: usize,
        defaults: &[GraphTarget],
        variables: &[GraphTarget],
    ) -> Result<BTreeSet<GraphTarget>> {
        let masked = &self.scanned.masked;
        let mut targets = BTreeSet::new();
        let mut outside = String::new();
        let mut cursor = open + 1;

        for m in keyword_matches(&GRAPH_KEYWORD, &masked[open + 1..close]) {
            let at = open + 1 + m.start();
            if at < cursor {
                continue;
            }
            outside.push_str(&masked[cursor..at]);

            let term_pos = self.scanned.skip_ws(open + 1 + m.end());
            let (term, term_end) = self.scanned.read_term(term_pos)?;
            let brace = self.scanned.skip_ws(term_end);
            if masked.as_bytes().get(brace) != Some(&b'{') {
                return Err(S4acError::Rewrite(format!("expected '{{' after GRAPH at offset {}", at)));
            }
            let inner_close = self
                .scanned
                .matching_brace(brace)
                .ok_or_else(|| S4acError::Rewrite(format!("unbalanced braces at offset {}", brace)))?;

            match term {
                GraphTerm::Iri(iri) => {
                    targets.insert(GraphTarget::Named(iri));
                }
                GraphTerm::Variable(_) => targets.extend(variables.iter().cloned()),
            }
            cursor = inner_close + 1;
        }
        outside.push_str(&masked[cursor.min(close)..close]);

        if has_patterns(&outside) {
            targets.extend(defaults.iter().cloned());
        }

        Ok(targets)
    }

    fn unexpected(&self, expected: &str) -> S4acError {
        S4acError::Rewrite(format!("expected {} at offset {}", expected, self.pos))
    }
}

/// True if `text` holds anything besides group structure
fn has_patterns(text: &str) -> bool {
    text.split(|c: char| c.is_whitespace() || "{}.;,".contains(c))
        .filter(|token| !token.is_empty())
        .any(|token| !matches!(token.to_ascii_uppercase().as_str(), "UNION" | "OPTIONAL" | "MINUS"))
}
