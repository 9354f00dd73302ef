//! Static file serving

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use orgahome_common::{is_hashed, StaticMode, StaticResolver};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::debug;

/// Hashed URLs never change content once the manifest is built.
const CACHE_IMMUTABLE: &str = "public, max-age=31536000, immutable";

/// Unhashed URLs, and every URL in development.
const CACHE_REVALIDATE: &str = "no-cache";

/// Static file handler
#[derive(Clone)]
pub struct StaticFiles {
    resolver: Arc<dyn StaticResolver>,
}

impl StaticFiles {
    pub fn new(resolver: Arc<dyn StaticResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Arc<dyn StaticResolver> {
        &self.resolver
    }

    /// Serve a static file by its public (hashed) path
    pub async fn serve(&self, path: &str, request: Request) -> Response {
        let Some(file) = self.resolver.hashed_path_to_file(path) else {
            debug!("No static file for {}", path);
            return not_found();
        };
        debug!(
            "Serving {} from {:?} ({} bytes)",
            path,
            file.path,
            file.metadata.len()
        );

        let mut response = match ServeFile::new(&file.path).oneshot(request).await {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        };

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_MODIFIED {
            let cache_control = self.cache_control(path);
            response
                .headers_mut()
                .insert(header::CACHE_CONTROL, HeaderValue::from_static(cache_control));
        }
        response
    }

    /// Only digest-carrying URLs from a built manifest are immutable
    fn cache_control(&self, path: &str) -> &'static str {
        match self.resolver.mode() {
            StaticMode::Manifest if is_hashed(path) => CACHE_IMMUTABLE,
            StaticMode::Manifest | StaticMode::Development => CACHE_REVALIDATE,
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}
