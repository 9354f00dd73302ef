//! orgahome Common Library
//!
//! Content-hashed static assets: digests, the build manifest and the
//! resolvers the web server uses to map asset paths to files.

pub mod digest;
pub mod error;
pub mod manifest;
pub mod resolver;

// Re-export commonly used types
pub use digest::{
    hash_file, hashed_name, is_hashed, sri_token, strip_hash, ContentDigest, HASH_HEX_LEN,
};
pub use error::{Error, Result};
pub use manifest::{build, BuildReport, Manifest, ManifestEntry, MANIFEST_FILENAME};
pub use resolver::{
    confine, resolver_for, DirectResolver, ManifestResolver, ResolvedFile, StaticMode,
    StaticResolver,
};

/// orgahome version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

