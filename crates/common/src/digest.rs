//! Content hashing for static assets
//!
//! Every asset is addressed by the SHA-256 of its bytes. The hex digest is
//! embedded in the served filename for cache-busting, and the raw digest is
//! base64-encoded into a Subresource-Integrity token:
//!
//! - `app.css` → `app.<64 hex chars>.css`
//! - `sha256-<base64 of raw digest>` for the `integrity` attribute

use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Length of the hex digest embedded in hashed filenames.
pub const HASH_HEX_LEN: usize = 64;

/// Prefix of SRI tokens produced by [`ContentDigest::sri`].
pub const SRI_ALGORITHM: &str = "sha256";

/// SHA-256 digest of an asset's content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Hash a byte slice
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Hash the file at `root/relative_path`
    pub fn of_file(root: &Path, relative_path: &str) -> Result<Self> {
        let data = std::fs::read(root.join(relative_path)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::asset_not_found(relative_path)
            } else {
                Error::Io(e)
            }
        })?;
        Ok(Self::of(&data))
    }

    /// Lowercase hex encoding, used in filenames
    pub fn hex(&self) -> String {
        hex::encode(self.0)
    }

    /// SRI token, e.g. `sha256-fJgECl...`
    pub fn sri(&self) -> String {
        format!("{}-{}", SRI_ALGORITHM, STANDARD.encode(self.0))
    }
}

/// `<stem>.<digest><suffix>` where the suffix is at most one extension
static HASHED_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(.+)\.[0-9a-f]{{{}}}(\.[^.]*)?$", HASH_HEX_LEN))
        .expect("hashed name pattern is valid")
});

/// Hex digest of the file at `root/relative_path`
pub fn hash_file(root: &Path, relative_path: &str) -> Result<String> {
    Ok(ContentDigest::of_file(root, relative_path)?.hex())
}

/// SRI token of the file at `root/relative_path`
pub fn sri_token(root: &Path, relative_path: &str) -> Result<String> {
    Ok(ContentDigest::of_file(root, relative_path)?.sri())
}

/// Insert `digest` between the stem and the suffix of the last path component.
///
/// Only the final extension counts as the suffix, so `site.min.css` becomes
/// `site.min.<digest>.css`. Names without an extension, and dotfiles, get the
/// digest appended.
pub fn hashed_name(relative_path: &str, digest: &str) -> String {
    let (dir, file) = match relative_path.rfind('/') {
        Some(pos) => relative_path.split_at(pos + 1),
        None => ("", relative_path),
    };

    match file.rfind('.') {
        Some(dot) if dot > 0 => {
            format!("{}{}.{}{}", dir, &file[..dot], digest, &file[dot..])
        }
        _ => format!("{}{}.{}", dir, file, digest),
    }
}

/// Remove one embedded digest from the last path component.
///
/// Inverse of [`hashed_name`]: `css/app.<digest>.css` → `css/app.css`.
/// Returns `None` when the name carries no digest segment.
pub fn strip_hash(public_path: &str) -> Option<String> {
    let (dir, file) = match public_path.rfind('/') {
        Some(pos) => public_path.split_at(pos + 1),
        None => ("", public_path),
    };
    let caps = HASHED_NAME_REGEX.captures(file)?;
    let stem = caps.get(1)?.as_str();
    let suffix = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    Some(format!("{}{}{}", dir, stem, suffix))
}

/// True when the last path component carries a digest segment
pub fn is_hashed(public_path: &str) -> bool {
    let file = public_path.rsplit('/').next().unwrap_or(public_path);
    HASHED_NAME_REGEX.is_match(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const BODY_HEX: &str = "7c98040a541657584690ae2a1cc3b42a8b53b159cc60c5d3abbfecbaeac6c94a";

    #[test]
    fn test_known_digest() {
        let digest = ContentDigest::of(b"body{}");
        assert_eq!(digest.hex(), BODY_HEX);
        assert_eq!(digest.hex().len(), HASH_HEX_LEN);
        assert_eq!(
            digest.sri(),
            "sha256-fJgEClQWV1hGkK4qHMO0KotTsVnMYMXTq7/suurGyUo="
        );
    }

    #[test]
    fn test_empty_file_digest() {
        assert_eq!(
            ContentDigest::of(b"").sri(),
            "sha256-47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
    }

    #[test]
    fn test_hash_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("css")).unwrap();
        std::fs::write(tmp.path().join("css/app.css"), b"body{}").unwrap();

        assert_eq!(hash_file(tmp.path(), "css/app.css").unwrap(), BODY_HEX);
        assert!(sri_token(tmp.path(), "css/app.css")
            .unwrap()
            .starts_with("sha256-"));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = hash_file(tmp.path(), "missing.js").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_hashed_name() {
        assert_eq!(hashed_name("foo.js", "abc"), "foo.abc.js");
        assert_eq!(hashed_name("css/site.min.css", "abc"), "css/site.min.abc.css");
        assert_eq!(hashed_name("LICENSE", "abc"), "LICENSE.abc");
        assert_eq!(hashed_name("img/.hidden", "abc"), "img/.hidden.abc");
        assert_eq!(hashed_name("v1.2/logo", "abc"), "v1.2/logo.abc");
    }

    #[test]
    fn test_strip_hash() {
        let hashed = hashed_name("css/site.min.css", BODY_HEX);
        assert_eq!(strip_hash(&hashed).as_deref(), Some("css/site.min.css"));

        let bare = hashed_name("LICENSE", BODY_HEX);
        assert_eq!(strip_hash(&bare).as_deref(), Some("LICENSE"));

        // Only one segment is removed per call.
        let twice = hashed_name(&hashed_name("app.js", BODY_HEX), BODY_HEX);
        assert_eq!(strip_hash(&twice), Some(hashed_name("app.js", BODY_HEX)));
    }

    #[test]
    fn test_strip_hash_requires_full_digest() {
        assert_eq!(strip_hash("app.css"), None);
        assert_eq!(strip_hash("app.other.css"), None);
        assert_eq!(strip_hash(&format!("app.{}.css", &BODY_HEX[..63])), None);
        assert_eq!(strip_hash(&format!("app.{}.css", BODY_HEX.to_uppercase())), None);
        assert_eq!(strip_hash(&format!(".{}.css", BODY_HEX)), None);
    }

    #[test]
    fn test_is_hashed() {
        assert!(is_hashed(&format!("css/app.{}.css", BODY_HEX)));
        assert!(is_hashed(&format!("LICENSE.{}", BODY_HEX)));
        assert!(!is_hashed("css/app.css"));
        assert!(!is_hashed(".staticmanifest.json"));
        assert!(!is_hashed(&format!("{}/app.css", BODY_HEX)));
    }
}
