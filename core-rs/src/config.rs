/**
 * config.rs
 * Parser for access-control configuration files (YAML format)
 *
 * Format:
 * ```yaml
 * apiVersion: s4ac/v1
 * kind: AccessControl
 * metadata:
 *   name: museum-endpoint
 * spec:
 *   policyStore:
 *     files: [policies/policies.ttl]
 *   evaluationStore:
 *     directories: [context]
 *   dataStore:
 *     files: [data/collection.trig]
 *   publicGraphs:
 *     ttlSeconds: 60
 *     privileges: [Read]
 *   userBinding:
 *     variable: user
 *     namespace: http://example.org/users/
 *   rewrite:
 *     validate: true
 *   updates:
 *     allowDefaultGraph: false
 * ```
 */

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{Result, S4acError};
use crate::policy::AccessPrivilege;
use crate::store::rdf_files_in;

pub const API_VERSION: &str = "s4ac/v1";
pub const KIND: &str = "AccessControl";

/// Access-control configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessControlConfig {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: Spec,

    /// Directory relative paths resolve against (set on load)
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Where a store's RDF comes from
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreSource {
    /// Individual RDF files
    #[serde(default)]
    pub files: Vec<String>,
    /// Directories scanned recursively for RDF files
    #[serde(default)]
    pub directories: Vec<String>,
    /// Named graph receiving triples (quads keep their own graph)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<String>,
}

/// Public-graph cache settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicGraphSettings {
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Privileges public graphs are open for
    #[serde(default = "default_public_privileges")]
    pub privileges: Vec<AccessPrivilege>,
}

impl Default for PublicGraphSettings {
    fn default() -> Self {
        PublicGraphSettings {
            ttl_seconds: default_ttl_seconds(),
            privileges: default_public_privileges(),
        }
    }
}

/// How the requesting user is bound into condition queries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserBinding {
    #[serde(default = "default_user_variable")]
    pub variable: String,
    /// Prefix for identities that are plain names rather than IRIs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl Default for UserBinding {
    fn default() -> Self {
        UserBinding {
            variable: default_user_variable(),
            namespace: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RewriteSettings {
    #[serde(default = "default_true")]
    pub validate: bool,
}

impl Default for RewriteSettings {
    fn default() -> Self {
        RewriteSettings { validate: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettings {
    #[serde(default)]
    pub allow_default_graph: bool,
}

/// Body of the configuration (`spec:` key)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Spec {
    pub policy_store: StoreSource,
    /// Store condition queries run against; defaults to the policy store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_store: Option<StoreSource>,
    pub data_store: StoreSource,
    #[serde(default)]
    pub public_graphs: PublicGraphSettings,
    #[serde(default)]
    pub user_binding: UserBinding,
    #[serde(default)]
    pub rewrite: RewriteSettings,
    #[serde(default)]
    pub updates: UpdateSettings,
}

fn default_ttl_seconds() -> u64 {
    60
}

fn default_public_privileges() -> Vec<AccessPrivilege> {
    vec![AccessPrivilege::Read]
}

fn default_user_variable() -> String {
    "user".to_string()
}

fn default_true() -> bool {
    true
}

impl StoreSource {
    /// Source made of plain file paths
    pub fn from_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StoreSource {
            files: files.into_iter().map(Into::into).collect(),
            directories: Vec::new(),
            graph: None,
        }
    }

    /// Every RDF file of this source, relative paths resolved against `base_dir`
    pub fn resolve_files(&self, base_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut resolved = Vec::new();

        for file in &self.files {
            resolved.push(resolve_path(base_dir, file));
        }

        for dir in &self.directories {
            let dir = resolve_path(base_dir, dir);
            if !dir.is_dir() {
                return Err(S4acError::FileNotFound(dir.display().to_string()));
            }
            resolved.extend(rdf_files_in(&dir)?);
        }

        Ok(resolved)
    }

    /// Paths a watcher should observe (files and directories as configured)
    pub fn watch_paths(&self, base_dir: &Path) -> Vec<PathBuf> {
        self.files
            .iter()
            .chain(self.directories.iter())
            .map(|p| resolve_path(base_dir, p))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.directories.is_empty()
    }
}

fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let path = PathBuf::from(path.strip_prefix("file://").unwrap_or(path));
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

impl AccessControlConfig {
    /// Build a config in memory
    pub fn new(name: impl Into<String>, policy_store: StoreSource, data_store: StoreSource) -> Self {
        AccessControlConfig {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: Metadata {
                name: name.into(),
                description: None,
            },
            spec: Spec {
                policy_store,
                evaluation_store: None,
                data_store,
                public_graphs: PublicGraphSettings::default(),
                user_binding: UserBinding::default(),
                rewrite: RewriteSettings::default(),
                updates: UpdateSettings::default(),
            },
            base_dir: PathBuf::from("."),
        }
    }

    /// Load config from a YAML file
    ///
    /// # Arguments
    /// * `path` - Path to the config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(S4acError::FileNotFound(path.to_string_lossy().to_string()));
        }

        let content = fs::read_to_string(path)?;

        let mut config: AccessControlConfig = serde_yaml::from_str(&content)
            .map_err(|e| S4acError::Config(format!("Invalid config YAML: {}", e)))?;

        config.base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        config.validate()?;

        Ok(config)
    }

    /// Save config as YAML
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate config structure
    ///
    /// Ensures:
    /// - apiVersion is "s4ac/v1" and kind is "AccessControl"
    /// - metadata.name is non-empty
    /// - the policy store has at least one source
    /// - the cache TTL is positive
    /// - the user variable and namespace are usable
    pub fn validate(&self) -> Result<()> {
        if self.api_version != API_VERSION {
            return Err(S4acError::Config(format!(
                "Invalid apiVersion: expected '{}', got '{}'",
                API_VERSION, self.api_version
            )));
        }

        if self.kind != KIND {
            return Err(S4acError::Config(format!(
                "Invalid kind: expected '{}', got '{}'",
                KIND, self.kind
            )));
        }

        if self.metadata.name.is_empty() {
            return Err(S4acError::Config("metadata.name cannot be empty".to_string()));
        }

        if self.spec.policy_store.is_empty() {
            return Err(S4acError::Config(
                "spec.policyStore must list at least one file or directory".to_string(),
            ));
        }

        if self.spec.public_graphs.ttl_seconds == 0 {
            return Err(S4acError::Config(
                "spec.publicGraphs.ttlSeconds must be greater than zero".to_string(),
            ));
        }

        let variable = &self.spec.user_binding.variable;
        if variable.is_empty() || !variable.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(S4acError::Config(format!(
                "spec.userBinding.variable is not a valid SPARQL variable name: '{}'",
                variable
            )));
        }

        if let Some(namespace) = &self.spec.user_binding.namespace {
            oxigraph::model::NamedNode::new(namespace.as_str()).map_err(|e| {
                S4acError::Config(format!("spec.userBinding.namespace is not an IRI: {}", e))
            })?;
        }

        Ok(())
    }

    pub fn public_graph_ttl(&self) -> Duration {
        Duration::from_secs(self.spec.public_graphs.ttl_seconds)
    }

    /// Source of the condition-evaluation store
    pub fn evaluation_source(&self) -> &StoreSource {
        self.spec
            .evaluation_store
            .as_ref()
            .unwrap_or(&self.spec.policy_store)
    }
}
