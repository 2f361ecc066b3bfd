//! Requesting user identity
//!
//! Condition queries bind the user as an IRI. Plain user names are resolved
//! against a namespace; anonymous requests get a random `urn:uuid:` IRI that
//! cannot appear in any evaluation data, so conditions about the user never
//! hold for them.

use oxigraph::model::NamedNode;
use std::fmt;
use uuid::Uuid;

use crate::errors::{Result, S4acError};

const ANONYMOUS_PREFIX: &str = "urn:uuid:";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserIdentity {
    iri: String,
    anonymous: bool,
}

impl UserIdentity {
    /// Identity from an absolute IRI
    pub fn from_iri(iri: impl Into<String>) -> Result<Self> {
        let iri = iri.into();
        NamedNode::new(iri.as_str())
            .map_err(|e| S4acError::InvalidIdentity(format!("'{}' is not an IRI: {}", iri, e)))?;

        Ok(UserIdentity { iri, anonymous: false })
    }

    /// Identity from an IRI or a plain name
    ///
    /// A value that does not parse as an IRI is appended to `namespace`.
    pub fn resolve(raw: &str, namespace: Option<&str>) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(S4acError::InvalidIdentity("empty user identity".to_string()));
        }

        if NamedNode::new(raw).is_ok() {
            return Self::from_iri(raw);
        }

        match namespace {
            Some(ns) => Self::from_iri(format!("{}{}", ns, raw)),
            None => Err(S4acError::InvalidIdentity(format!(
                "'{}' is not an IRI and no user namespace is configured",
                raw
            ))),
        }
    }

    pub fn anonymous() -> Self {
        UserIdentity {
            iri: format!("{}{}", ANONYMOUS_PREFIX, Uuid::new_v4()),
            anonymous: true,
        }
    }

    pub fn iri(&self) -> &str {
        &self.iri
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.anonymous {
            write!(f, "anonymous ({})", self.iri)
        } else {
            write!(f, "<{}>", self.iri)
        }
    }
}
