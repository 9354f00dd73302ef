//! Request base URL, honoring `X-Forwarded-*` when running behind nginx

use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header, request::Parts, HeaderMap};
use std::convert::Infallible;

/// Whether forwarded headers from the fronting proxy are trusted
#[derive(Debug, Clone, Copy, Default)]
pub struct ProxyHeaders {
    pub trusted: bool,
}

/// Scheme, host and path prefix the client used to reach us
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBase {
    pub scheme: String,
    pub host: String,
    pub prefix: String,
}

impl Default for RequestBase {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            prefix: String::new(),
        }
    }
}

/// First comma-separated value of a header
fn first_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?;
    let first = value.split(',').next()?.trim();
    if first.is_empty() {
        None
    } else {
        Some(first.to_string())
    }
}

impl RequestBase {
    pub fn from_headers(headers: &HeaderMap, proxy: ProxyHeaders) -> Self {
        let mut base = Self::default();

        if let Some(host) = first_value(headers, header::HOST.as_str()) {
            base.host = host;
        }

        if proxy.trusted {
            if let Some(proto) = first_value(headers, "x-forwarded-proto") {
                base.scheme = proto.to_ascii_lowercase();
            }
            if let Some(host) = first_value(headers, "x-forwarded-host") {
                base.host = host;
            }
            if let Some(prefix) = first_value(headers, "x-forwarded-prefix") {
                let prefix = prefix.trim_end_matches('/');
                if !prefix.is_empty() {
                    base.prefix = if prefix.starts_with('/') {
                        prefix.to_string()
                    } else {
                        format!("/{}", prefix)
                    };
                }
            }
        }

        base
    }

    /// Absolute URL for an application path (`/machines`)
    pub fn url(&self, path: &str) -> String {
        format!("{}://{}{}{}", self.scheme, self.host, self.prefix, path)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestBase
where
    S: Send + Sync,
    ProxyHeaders: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers, ProxyHeaders::from_ref(state)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn test_plain_host() {
        let h = headers(&[("host", "example.org:5000"), ("x-forwarded-proto", "https")]);
        let base = RequestBase::from_headers(&h, ProxyHeaders { trusted: false });
        assert_eq!(base.url("/machines"), "http://example.org:5000/machines");
    }

    #[test]
    fn test_forwarded_headers_trusted() {
        let h = headers(&[
            ("host", "127.0.0.1:5000"),
            ("x-forwarded-proto", "HTTPS, http"),
            ("x-forwarded-host", "home.example.org"),
            ("x-forwarded-prefix", "orga/"),
        ]);
        let base = RequestBase::from_headers(&h, ProxyHeaders { trusted: true });
        assert_eq!(base.scheme, "https");
        assert_eq!(
            base.url("/static/app.css"),
            "https://home.example.org/orga/static/app.css"
        );
    }

    #[test]
    fn test_missing_host() {
        let base = RequestBase::from_headers(&HeaderMap::new(), ProxyHeaders::default());
        assert_eq!(base.url("/"), "http://localhost/");
    }
}
