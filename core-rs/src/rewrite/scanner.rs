//! Lexical helpers for substring-based SPARQL rewriting
//!
//! Rewriting works on the query text directly. To keep keyword and brace
//! searches from matching inside literals, IRIs or comments, a *masked* copy of
//! the text is produced first: same byte length, with the contents of those
//! regions replaced by spaces. Offsets found in the masked copy are valid in the
//! original text.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::errors::{Result, S4acError};

static PREFIX_DECL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bPREFIX\s+([A-Za-z][\w.\-]*)?:\s*<").expect("valid prefix regex"));

static PREFIXED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z][\w.\-]*)?:([\w\-.:%]*)").expect("valid prefixed name regex"));

static VARIABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[?$]\w+").expect("valid variable regex"));

/// Regex matching whole SPARQL keywords; capture group 1 is the keyword
///
/// Keywords glued to `:`, `?` or `$` (prefixed names, variables) do not match.
pub(crate) fn keyword_regex(alternatives: &str) -> Regex {
    Regex::new(&format!(r"(?i)(?:^|[^\w:?$])({})(?:[^\w:]|$)", alternatives)).expect("valid keyword regex")
}

/// Keyword occurrences (capture group 1) of `re` in `text`
pub fn keyword_matches<'t>(re: &Regex, text: &'t str) -> Vec<regex::Match<'t>> {
    re.captures_iter(text).filter_map(|caps| caps.get(1)).collect()
}

/// A graph reference read from the text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphTerm {
    Iri(String),
    Variable(String),
}

/// Query text together with its masked copy and prefix map
pub struct ScannedText<'a> {
    pub original: &'a str,
    pub masked: String,
    pub prefixes: HashMap<String, String>,
}

impl<'a> ScannedText<'a> {
    pub fn new(original: &'a str) -> Result<Self> {
        let masked = mask(original)?;
        let prefixes = prefixes(original, &masked);
        Ok(ScannedText {
            original,
            masked,
            prefixes,
        })
    }

    /// Read a graph term (IRI, prefixed name or variable) starting at `pos`
    ///
    /// Returns the term and the offset just past it.
    pub fn read_term(&self, pos: usize) -> Result<(GraphTerm, usize)> {
        let rest = &self.original[pos..];

        if rest.starts_with('<') {
            let end = rest
                .find('>')
                .ok_or_else(|| S4acError::Rewrite(format!("Unterminated IRI at offset {}", pos)))?;
            return Ok((GraphTerm::Iri(rest[1..end].to_string()), pos + end + 1));
        }

        if let Some(m) = VARIABLE.find(rest) {
            return Ok((GraphTerm::Variable(m.as_str()[1..].to_string()), pos + m.end()));
        }

        if let Some(caps) = PREFIXED_NAME.captures(rest) {
            let prefix = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let local = caps.get(2).map(|m| m.as_str()).unwrap_or("").trim_end_matches('.');
            let namespace = self.prefixes.get(prefix).ok_or_else(|| {
                S4acError::Rewrite(format!("Undeclared prefix '{}:' at offset {}", prefix, pos))
            })?;
            let consumed = prefix.len() + 1 + local.len();
            return Ok((GraphTerm::Iri(format!("{}{}", namespace, local)), pos + consumed));
        }

        Err(S4acError::Rewrite(format!("Expected a graph IRI at offset {}", pos)))
    }

    /// Brace depth at `pos` counted from `from`
    pub fn depth_between(&self, from: usize, pos: usize) -> i64 {
        self.masked[from..pos].bytes().fold(0i64, |depth, b| match b {
            b'{' => depth + 1,
            b'}' => depth - 1,
            _ => depth,
        })
    }

    /// Offset of the `n`-th (1-based) opening brace at depth 0 after `from`
    pub fn nth_top_level_brace(&self, from: usize, n: usize) -> Option<usize> {
        let mut depth = 0i64;
        let mut seen = 0;

        for (offset, b) in self.masked[from..].bytes().enumerate() {
            match b {
                b'{' => {
                    if depth == 0 {
                        seen += 1;
                        if seen == n {
                            return Some(from + offset);
                        }
                    }
                    depth += 1;
                }
                b'}' => depth -= 1,
                _ => {}
            }
        }

        None
    }

    /// Offset of the brace closing the one opened at `open`
    pub fn matching_brace(&self, open: usize) -> Option<usize> {
        let mut depth = 0i64;

        for (offset, b) in self.masked[open..].bytes().enumerate() {
            match b {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(open + offset);
                    }
                }
                _ => {}
            }
        }

        None
    }

    /// First non-whitespace offset at or after `pos`
    pub fn skip_ws(&self, pos: usize) -> usize {
        let rest = &self.masked[pos..];
        pos + (rest.len() - rest.trim_start().len())
    }
}

/// Blank out string literals, IRI contents and comments
///
/// IRIs keep their angle brackets so terms can still be located; `<` only opens
/// an IRI when a `>` follows before any whitespace or forbidden character,
/// which keeps comparison operators intact.
pub fn mask(text: &str) -> Result<String> {
    let bytes = text.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'#' => {
                let end = bytes[i..]
                    .iter()
                    .position(|b| *b == b'\n')
                    .map(|p| i + p)
                    .unwrap_or(bytes.len());
                blank(&mut out, i, end);
                i = end;
            }
            b'<' => match iri_end(bytes, i) {
                Some(end) => {
                    blank(&mut out, i + 1, end);
                    i = end + 1;
                }
                None => i += 1,
            },
            quote @ (b'"' | b'\'') => {
                let long = bytes[i..].starts_with(&[quote, quote, quote]);
                let end = string_end(bytes, i, quote, long).ok_or_else(|| {
                    S4acError::Rewrite(format!("Unterminated string literal at offset {}", i))
                })?;
                blank(&mut out, i, end);
                i = end;
            }
            _ => i += 1,
        }
    }

    String::from_utf8(out).map_err(|e| S4acError::Rewrite(e.to_string()))
}

fn blank(out: &mut [u8], start: usize, end: usize) {
    for b in &mut out[start..end] {
        if *b != b'\n' {
            *b = b' ';
        }
    }
}

fn iri_end(bytes: &[u8], start: usize) -> Option<usize> {
    for (offset, b) in bytes[start + 1..].iter().copied().enumerate() {
        match b {
            b'>' => return Some(start + 1 + offset),
            b'<' | b'"' | b'{' | b'}' | b'|' | b'^' | b'`' | b'\\' => return None,
            b if b.is_ascii_whitespace() => return None,
            _ => {}
        }
    }
    None
}

/// Offset just past the closing quote(s)
fn string_end(bytes: &[u8], start: usize, quote: u8, long: bool) -> Option<usize> {
    let mut i = start + if long { 3 } else { 1 };

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => {
                if !long {
                    return Some(i + 1);
                }
                if bytes[i..].starts_with(&[quote, quote, quote]) {
                    // A long literal may end with up to two extra quotes
                    let mut end = i + 3;
                    while end < bytes.len() && bytes[end] == quote && end < i + 5 {
                        end += 1;
                    }
                    return Some(end);
                }
                i += 1;
            }
            b'\n' if !long => return None,
            _ => i += 1,
        }
    }

    None
}

/// PREFIX declarations of the text, prefix -> namespace IRI
fn prefixes(original: &str, masked: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();

    for caps in PREFIX_DECL.captures_iter(masked) {
        let (Some(whole), prefix) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let iri_start = whole.end();
        if let Some(len) = original[iri_start..].find('>') {
            let prefix = prefix.map(|m| m.as_str()).unwrap_or("").to_string();
            map.insert(prefix, original[iri_start..iri_start + len].to_string());
        }
    }

    map
}
