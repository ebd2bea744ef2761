// src/manifest/mod.rs

//! LibPack manifest model
//!
//! The manifest is a JSON document naming the product version, the LibPack
//! version and the ordered list of packages to bundle:
//!
//! ```json
//! {
//!   "FreeCAD-version": "1.0.0",
//!   "LibPack-version": "3.0.0",
//!   "content": [
//!     {"name": "qt", "install-directory": "C:/Qt/6.8.0/msvc2022_64"},
//!     {"name": "boost", "git-repo": "https://github.com/boostorg/boost", "git-ref": "boost-1.86.0"},
//!     {"name": "zlib", "url": "https://zlib.net/zlib-1.3.1.tar.gz", "patches": ["zlib.patch"]}
//!   ]
//! }
//! ```
//!
//! Each entry has at most one acquisition method: a git repository, a
//! download URL (optionally per architecture), or nothing at all. Keys the
//! model does not know about are kept in [`PackageEntry::options`] for the
//! package's build procedure.

mod arch;

pub use arch::{DEFAULT_ARCH_KEY, HostArch, select_arch_url};

use crate::error::{Error, Result};
use crate::filesystem::check_dir_name;
use crate::pipeline::LOG_DIR;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Working-directory entries that are not package directories
const RESERVED_NAMES: &[&str] = &[LOG_DIR];

/// The parsed manifest document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Version of the product the LibPack is built for
    #[serde(rename = "FreeCAD-version", alias = "productVersion")]
    pub product_version: String,

    /// Version of the LibPack itself
    #[serde(rename = "LibPack-version", alias = "libpackVersion")]
    pub libpack_version: String,

    /// Packages in build order
    #[serde(default)]
    pub content: Vec<PackageEntry>,

    /// Directory that relative patch paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// One package in the manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageEntry {
    /// Directory name and build procedure key
    pub name: String,

    #[serde(rename = "git-repo", default, skip_serializing_if = "Option::is_none")]
    pub git_repo: Option<String>,

    /// Branch or tag to check out while cloning
    #[serde(rename = "git-ref", default, skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,

    /// Commit to move to after cloning
    #[serde(rename = "git-hash", default, skip_serializing_if = "Option::is_none")]
    pub git_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Download URLs keyed by architecture, with an optional `default` key
    #[serde(rename = "url-arch", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub url_arch: BTreeMap<String, String>,

    /// Patch documents, relative to the manifest's directory
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<String>,

    /// Everything else, interpreted only by the package's build procedure
    #[serde(flatten)]
    pub options: BTreeMap<String, serde_json::Value>,
}

/// How a package's source tree is obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    Git {
        repo: String,
        reference: Option<String>,
        hash: Option<String>,
    },
    Download {
        url: String,
    },
    /// Only the directory is created
    Bare,
}

impl PackageEntry {
    /// Create a bare entry
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the git repository and optional ref
    pub fn with_git(mut self, repo: impl Into<String>, reference: Option<&str>) -> Self {
        self.git_repo = Some(repo.into());
        self.git_ref = reference.map(String::from);
        self
    }

    /// Set the download URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set a build option
    pub fn with_option(mut self, key: &str, value: serde_json::Value) -> Self {
        self.options.insert(key.to_string(), value);
        self
    }

    /// Check the per-entry invariants
    pub fn validate(&self) -> Result<()> {
        check_dir_name(&self.name)
            .map_err(|e| Error::ConfigError(format!("Invalid package name '{}': {}", self.name, e)))?;

        if RESERVED_NAMES.contains(&self.name.as_str()) {
            return Err(Error::ConfigError(format!(
                "Package name '{}' is reserved for the working directory",
                self.name
            )));
        }

        if self.git_repo.is_none() && (self.git_ref.is_some() || self.git_hash.is_some()) {
            return Err(Error::ConfigError(format!(
                "Package '{}' has a git-ref or git-hash but no git-repo",
                self.name
            )));
        }

        if self.git_repo.is_some() && (self.url.is_some() || !self.url_arch.is_empty()) {
            return Err(Error::ConfigError(format!(
                "Package '{}' has both a git-repo and a download URL",
                self.name
            )));
        }

        Ok(())
    }

    /// Resolve the acquisition method for the given host architecture
    ///
    /// URL precedence: `url-arch[host]`, then `url-arch["default"]`, then `url`.
    pub fn acquisition(&self, host: Option<HostArch>) -> Result<Acquisition> {
        self.validate()?;

        if let Some(repo) = &self.git_repo {
            return Ok(Acquisition::Git {
                repo: repo.clone(),
                reference: self.git_ref.clone(),
                hash: self.git_hash.clone(),
            });
        }

        if let Some(url) = select_arch_url(&self.url_arch, host).or(self.url.as_deref()) {
            return Ok(Acquisition::Download {
                url: url.to_string(),
            });
        }

        if !self.url_arch.is_empty() {
            return Err(Error::ConfigError(format!(
                "Package '{}' has no download URL for {} and no '{}' entry",
                self.name,
                host.map(|h| h.as_str()).unwrap_or("this architecture"),
                DEFAULT_ARCH_KEY
            )));
        }

        Ok(Acquisition::Bare)
    }

    /// Option keys that look like a misspelled acquisition key
    ///
    /// Such keys land in `options` and leave the entry without a source,
    /// e.g. `git-rep` instead of `git-repo`.
    pub fn suspicious_options(&self) -> Vec<&str> {
        self.options
            .keys()
            .map(String::as_str)
            .filter(|k| k.starts_with("git-") || k.starts_with("url"))
            .collect()
    }

    /// String-valued build option
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(|v| v.as_str())
    }

    /// List-valued build option
    ///
    /// Accepts either a JSON array of strings or a single whitespace-separated
    /// string.
    pub fn option_list(&self, key: &str) -> Vec<String> {
        match self.options.get(key) {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            Some(serde_json::Value::String(s)) => {
                s.split_whitespace().map(String::from).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl Manifest {
    /// Create an empty manifest
    pub fn new(product_version: impl Into<String>, libpack_version: impl Into<String>) -> Self {
        Self {
            product_version: product_version.into(),
            libpack_version: libpack_version.into(),
            content: Vec::new(),
            base_dir: PathBuf::from("."),
        }
    }

    /// Add a package entry
    pub fn with_entry(mut self, entry: PackageEntry) -> Self {
        self.content.push(entry);
        self
    }

    /// Parse a manifest from JSON text
    pub fn parse(json: &str) -> Result<Self> {
        let mut manifest: Manifest = serde_json::from_str(json)
            .map_err(|e| Error::ConfigError(format!("Invalid manifest: {}", e)))?;
        manifest.base_dir = PathBuf::from(".");
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load and validate a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read manifest {}: {}", path.display(), e))
        })?;

        let mut manifest = Self::parse(&content)?;
        manifest.base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        debug!(
            "Loaded manifest {} with {} packages",
            path.display(),
            manifest.content.len()
        );
        Ok(manifest)
    }

    /// Check versions, entry invariants and name uniqueness
    pub fn validate(&self) -> Result<()> {
        if self.product_version.trim().is_empty() || self.libpack_version.trim().is_empty() {
            return Err(Error::ConfigError(
                "Manifest versions must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for entry in &self.content {
            entry.validate()?;
            for key in entry.suspicious_options() {
                warn!(
                    "Package '{}' has unknown key '{}'; it is passed to the build as an option",
                    entry.name, key
                );
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(Error::ConfigError(format!(
                    "Package '{}' is listed more than once",
                    entry.name
                )));
            }
        }
        Ok(())
    }

    /// Absolute or manifest-relative paths of an entry's patch documents
    pub fn patch_paths(&self, entry: &PackageEntry) -> Vec<PathBuf> {
        entry
            .patches
            .iter()
            .map(|p| {
                let path = Path::new(p);
                if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    self.base_dir.join(path)
                }
            })
            .collect()
    }

    /// Pretty-printed `content` array, as written into the finished LibPack
    pub fn content_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.content)
            .map_err(|e| Error::IoError(format!("Failed to serialize manifest: {}", e)))
    }
}
