//! Static manifest: build-time table from asset path to hashed path and SRI
//!
//! `build` walks the source asset tree, copies every file to its content
//! hashed name under the destination directory and writes
//! `.staticmanifest.json` next to the copies. The serving side loads that file
//! through [`Manifest::load_cached`], which parses each manifest at most once
//! per process.

use crate::digest::{hashed_name, ContentDigest};
use crate::{Error, Result};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Manifest filename inside the serving directory
pub const MANIFEST_FILENAME: &str = ".staticmanifest.json";

/// A single manifest record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub hashed_path: String,
    pub sri_hash: String,
}

/// Original relative path → hashed path and SRI token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, ManifestEntry>,
}

/// Summary of a `build` run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub files: usize,
    pub bytes: u64,
    pub manifest_path: PathBuf,
}

static MANIFEST_CACHE: Lazy<Mutex<HashMap<PathBuf, Arc<Manifest>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

impl Manifest {
    pub fn get(&self, relative_path: &str) -> Option<&ManifestEntry> {
        self.entries.get(relative_path)
    }

    pub fn insert(&mut self, relative_path: impl Into<String>, entry: ManifestEntry) {
        self.entries.insert(relative_path.into(), entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ManifestEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Path of the manifest file for a serving directory
    pub fn path_in(serving_dir: &Path) -> PathBuf {
        serving_dir.join(MANIFEST_FILENAME)
    }

    /// Read and parse a manifest file, bypassing the process cache
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::ManifestLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| Error::ManifestLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load the manifest of `serving_dir`, parsing it only on first use.
    ///
    /// The cache lock is held while parsing so that concurrent first callers
    /// wait for a single parse. Failed loads are not cached.
    pub fn load_cached(serving_dir: &Path) -> Result<Arc<Self>> {
        let path = Self::path_in(serving_dir);
        let mut cache = MANIFEST_CACHE.lock();
        if let Some(manifest) = cache.get(&path) {
            return Ok(manifest.clone());
        }

        let manifest = Arc::new(Self::read(&path)?);
        info!("Loaded static manifest {:?} ({} entries)", path, manifest.len());
        cache.insert(path, manifest.clone());
        Ok(manifest)
    }

    /// Serialize as pretty JSON and atomically replace `path`
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let json = serde_json::to_string_pretty(self)?;

        let (tmp_path, mut file) = tempfile_in(dir, path)?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| Error::build(&tmp_path, e))?;
        drop(file);
        fs::rename(&tmp_path, path).map_err(|e| Error::build(path, e))?;
        Ok(())
    }
}

/// Create `<dir>/<name>.tmp` for writing
fn tempfile_in(dir: &Path, target: &Path) -> Result<(PathBuf, fs::File)> {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| MANIFEST_FILENAME.to_string());
    let tmp_path = dir.join(format!("{}.tmp", name));
    let file = fs::File::create(&tmp_path).map_err(|e| Error::build(&tmp_path, e))?;
    Ok((tmp_path, file))
}

/// Relative path of `path` under `root`, joined with `/`
fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// True when `link` resolves to a regular file under the canonical `root`
fn links_to_file_within(root: &Path, link: &Path) -> bool {
    match link.canonicalize() {
        Ok(target) => target.starts_with(root) && target.is_file(),
        Err(_) => false,
    }
}

/// Hash and copy every file of `source_root` into `dest_root`, then write the
/// manifest.
///
/// Running twice over an unchanged tree yields identical output. Nothing is
/// written to the manifest path unless every file was processed.
pub fn build(source_root: &Path, dest_root: &Path) -> Result<BuildReport> {
    info!("Compiling static files {:?} -> {:?}", source_root, dest_root);

    fs::create_dir_all(dest_root).map_err(|e| Error::build(dest_root, e))?;
    let source_canon = source_root
        .canonicalize()
        .map_err(|e| Error::build(source_root, e))?;

    // Keep the output out of the walk when it lives inside the source tree.
    let skip = match dest_root.canonicalize() {
        Ok(dest) if dest.starts_with(&source_canon) && dest != source_canon => dest
            .strip_prefix(&source_canon)
            .ok()
            .map(|rel| source_root.join(rel)),
        _ => None,
    };

    let mut manifest = Manifest::default();
    let mut report = BuildReport::default();

    let walker = WalkDir::new(source_root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| skip.as_deref() != Some(entry.path()));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source_root).to_path_buf();
            Error::build(path, e.into())
        })?;
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            if !links_to_file_within(&source_canon, entry.path()) {
                warn!(
                    "Skipping {:?}: symlink does not resolve to a file inside {:?}",
                    entry.path(),
                    source_root
                );
                continue;
            }
        } else if !file_type.is_file() {
            continue;
        }

        let Some(key) = relative_key(source_root, entry.path()) else {
            continue;
        };

        let data = fs::read(entry.path()).map_err(|e| Error::build(entry.path(), e))?;
        let digest = ContentDigest::of(&data);
        let hashed_path = hashed_name(&key, &digest.hex());

        let target = dest_root.join(&hashed_path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::build(parent, e))?;
        }
        fs::write(&target, &data).map_err(|e| Error::build(&target, e))?;
        debug!("{} -> {}", key, hashed_path);

        report.files += 1;
        report.bytes += data.len() as u64;
        manifest.insert(
            key,
            ManifestEntry {
                hashed_path,
                sri_hash: digest.sri(),
            },
        );
    }

    report.manifest_path = Manifest::path_in(dest_root);
    manifest.write_atomic(&report.manifest_path)?;

    info!(
        "Compiled {} static files ({} bytes), manifest at {:?}",
        report.files, report.bytes, report.manifest_path
    );
    Ok(report)
}
