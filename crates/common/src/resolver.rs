//! Static path resolution
//!
//! A [`StaticResolver`] maps logical asset paths (`css/app.css`) to their
//! hashed public paths and SRI tokens, and maps public request paths back to
//! files on disk. Two implementations exist:
//!
//! - [`DirectResolver`] hashes the source tree on every call, so edits show up
//!   immediately during development. Requests carrying a stale digest still
//!   resolve to the current file.
//! - [`ManifestResolver`] answers from the build manifest and serves the
//!   compiled directory, falling back to the source directory.
//!
//! Every lookup goes through [`confine`] before touching the filesystem. A
//! path that would leave its root is reported exactly like a missing file.

use crate::digest::{hashed_name, strip_hash, ContentDigest};
use crate::manifest::Manifest;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, Metadata};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which resolver to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaticMode {
    #[default]
    Development,
    Manifest,
}

impl fmt::Display for StaticMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaticMode::Development => write!(f, "development"),
            StaticMode::Manifest => write!(f, "manifest"),
        }
    }
}

impl FromStr for StaticMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(StaticMode::Development),
            "manifest" | "production" | "prod" => Ok(StaticMode::Manifest),
            other => Err(Error::InvalidConfig(format!(
                "unknown static mode '{}' (expected development or manifest)",
                other
            ))),
        }
    }
}

/// A file found on disk for a public path
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    pub path: PathBuf,
    pub metadata: Metadata,
}

/// Resolution of logical and public static paths
pub trait StaticResolver: Send + Sync {
    /// Hashed public path for a logical asset path
    fn hash_path(&self, logical_path: &str) -> Option<String>;

    /// On-disk file for a public request path
    fn hashed_path_to_file(&self, public_path: &str) -> Option<ResolvedFile>;

    /// SRI token for a logical asset path
    fn sri_for(&self, logical_path: &str) -> Option<String>;

    /// Directories searched by `hashed_path_to_file`, in priority order
    fn serving_directories(&self) -> Vec<&Path>;

    fn mode(&self) -> StaticMode;
}

/// Build the resolver for `mode`.
///
/// In manifest mode this loads the manifest and fails when it is missing or
/// malformed, so a misconfigured deployment stops at startup.
pub fn resolver_for(
    mode: StaticMode,
    static_dir: &Path,
    serving_dir: &Path,
) -> Result<Arc<dyn StaticResolver>> {
    Ok(match mode {
        StaticMode::Development => Arc::new(DirectResolver::new(static_dir)),
        StaticMode::Manifest => Arc::new(ManifestResolver::load(static_dir, serving_dir)?),
    })
}

/// Normalize a request path into a relative path that cannot leave its root.
///
/// `.` segments are dropped and `..` segments are applied lexically. Returns
/// `None` for absolute paths, drive prefixes, empty paths, and any path whose
/// `..` segments climb above the root.
pub fn confine(request_path: &str) -> Option<PathBuf> {
    let mut parts = Vec::new();
    for component in Path::new(request_path).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.into_iter().collect())
}

/// `/`-joined form of a confined relative path
fn to_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// True when `path` still lies under `root` once symlinks are resolved
fn within_root(root: &Path, path: &Path) -> bool {
    match (root.canonicalize(), path.canonicalize()) {
        (Ok(root), Ok(path)) => path.starts_with(root),
        _ => false,
    }
}

/// Metadata of a regular file at `root/relative`, if it stays inside `root`
fn regular_file(root: &Path, relative: &Path) -> Option<(PathBuf, Metadata)> {
    let disk_path = root.join(relative);
    if !within_root(root, &disk_path) {
        debug!("No static file inside {:?} for the requested path", root);
        return None;
    }
    let metadata = fs::metadata(&disk_path).ok()?;
    if !metadata.is_file() {
        return None;
    }
    Some((disk_path, metadata))
}

/// First candidate that exists as a regular file, searching directories in
/// order.
fn lookup_path(directories: &[&Path], candidates: &[PathBuf]) -> Option<ResolvedFile> {
    for directory in directories {
        for candidate in candidates {
            if let Some((path, metadata)) = regular_file(directory, candidate) {
                return Some(ResolvedFile { path, metadata });
            }
        }
    }
    None
}

/// Development resolver working straight from the source asset tree
#[derive(Debug, Clone)]
pub struct DirectResolver {
    static_dir: PathBuf,
}

impl DirectResolver {
    pub fn new(static_dir: impl Into<PathBuf>) -> Self {
        Self {
            static_dir: static_dir.into(),
        }
    }

    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }

    /// Relative key of an existing asset, or `None`
    fn resolve_path(&self, logical_path: &str) -> Option<String> {
        let relative = confine(logical_path)?;
        regular_file(&self.static_dir, &relative)?;
        Some(to_key(&relative))
    }

    fn digest(&self, logical_path: &str) -> Option<(String, ContentDigest)> {
        let key = self.resolve_path(logical_path)?;
        match ContentDigest::of_file(&self.static_dir, &key) {
            Ok(digest) => Some((key, digest)),
            Err(e) => {
                warn!("Failed to hash static file {}: {}", key, e);
                None
            }
        }
    }
}

impl StaticResolver for DirectResolver {
    fn hash_path(&self, logical_path: &str) -> Option<String> {
        let (key, digest) = self.digest(logical_path)?;
        Some(hashed_name(&key, &digest.hex()))
    }

    fn hashed_path_to_file(&self, public_path: &str) -> Option<ResolvedFile> {
        let relative = confine(public_path)?;
        let mut candidates = vec![relative.clone()];
        if let Some(stripped) = strip_hash(&to_key(&relative)) {
            candidates.push(PathBuf::from(stripped));
        }
        lookup_path(&[self.static_dir.as_path()], &candidates)
    }

    fn sri_for(&self, logical_path: &str) -> Option<String> {
        let (_, digest) = self.digest(logical_path)?;
        Some(digest.sri())
    }

    fn serving_directories(&self) -> Vec<&Path> {
        vec![self.static_dir.as_path()]
    }

    fn mode(&self) -> StaticMode {
        StaticMode::Development
    }
}

/// Production resolver answering from the build manifest
#[derive(Debug, Clone)]
pub struct ManifestResolver {
    static_dir: PathBuf,
    serving_dir: PathBuf,
    manifest: Arc<Manifest>,
}

impl ManifestResolver {
    /// Load the manifest of `serving_dir` (once per process) and build the
    /// resolver around it.
    pub fn load(static_dir: impl Into<PathBuf>, serving_dir: impl Into<PathBuf>) -> Result<Self> {
        let serving_dir = serving_dir.into();
        let manifest = Manifest::load_cached(&serving_dir)?;
        Ok(Self {
            static_dir: static_dir.into(),
            serving_dir,
            manifest,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }
}

impl StaticResolver for ManifestResolver {
    fn hash_path(&self, logical_path: &str) -> Option<String> {
        self.manifest
            .get(logical_path)
            .map(|entry| entry.hashed_path.clone())
    }

    fn hashed_path_to_file(&self, public_path: &str) -> Option<ResolvedFile> {
        let relative = confine(public_path)?;
        lookup_path(&self.serving_directories(), &[relative])
    }

    fn sri_for(&self, logical_path: &str) -> Option<String> {
        self.manifest
            .get(logical_path)
            .map(|entry| entry.sri_hash.clone())
    }

    fn serving_directories(&self) -> Vec<&Path> {
        vec![self.serving_dir.as_path(), self.static_dir.as_path()]
    }

    fn mode(&self) -> StaticMode {
        StaticMode::Manifest
    }
}
