//! HTML rendering helpers
//!
//! Pages are assembled from small string builders. Asset references go
//! through [`Templates::static_url_for`] and [`Templates::static_sri_hash`] so
//! that every `<link>` and `<script>` carries a content-hashed URL and an
//! `integrity` attribute.

use crate::forwarded::RequestBase;
use axum::response::Html;
use orgahome_common::StaticResolver;
use std::sync::Arc;
use tracing::warn;

/// Escape text for HTML element and attribute content
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Template helpers bound to the active static resolver
#[derive(Clone)]
pub struct Templates {
    resolver: Arc<dyn StaticResolver>,
    static_prefix: String,
}

impl Templates {
    pub fn new(resolver: Arc<dyn StaticResolver>, static_prefix: impl Into<String>) -> Self {
        Self {
            resolver,
            static_prefix: static_prefix.into(),
        }
    }

    /// Fully-qualified URL of a static asset.
    ///
    /// Unknown assets keep their logical path, so the browser gets a 404 for
    /// that one file instead of the whole page failing.
    pub fn static_url_for(&self, base: &RequestBase, path: &str) -> String {
        let public = match self.resolver.hash_path(path) {
            Some(hashed) => hashed,
            None => {
                warn!("No static asset for {}", path);
                path.trim_start_matches('/').to_string()
            }
        };
        let encoded: Vec<String> = public
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        base.url(&format!("{}/{}", self.static_prefix, encoded.join("/")))
    }

    /// SRI token of a static asset, empty when the asset is unknown
    pub fn static_sri_hash(&self, path: &str) -> String {
        self.resolver.sri_for(path).unwrap_or_default()
    }

    fn integrity_attr(&self, path: &str) -> String {
        let sri = self.static_sri_hash(path);
        if sri.is_empty() {
            String::new()
        } else {
            format!(r#" integrity="{}" crossorigin="anonymous""#, escape_html(&sri))
        }
    }

    /// `<link rel="stylesheet">` for a static asset
    pub fn stylesheet(&self, base: &RequestBase, path: &str) -> String {
        format!(
            r#"<link rel="stylesheet" href="{}"{}>"#,
            escape_html(&self.static_url_for(base, path)),
            self.integrity_attr(path)
        )
    }

    /// Deferred `<script>` for a static asset
    pub fn script(&self, base: &RequestBase, path: &str) -> String {
        format!(
            r#"<script defer src="{}"{}></script>"#,
            escape_html(&self.static_url_for(base, path)),
            self.integrity_attr(path)
        )
    }

    /// Wrap page content in the site layout
    pub fn page(&self, base: &RequestBase, title: &str, head_extra: &str, body: &str) -> Html<String> {
        Html(format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} · orgahome</title>
    <link rel="icon" href="{favicon}">
    {stylesheet}
    {head_extra}
</head>
<body>
    <header class="site-header">
        <a class="site-title" href="{home}">orgahome</a>
        <nav>
            <a href="{machines}">Machines</a>
        </nav>
    </header>
    <main>
{body}
    </main>
</body>
</html>
"#,
            title = escape_html(title),
            favicon = escape_html(&self.static_url_for(base, "img/favicon.svg")),
            stylesheet = self.stylesheet(base, "css/main.css"),
            head_extra = head_extra,
            home = escape_html(&base.url("/")),
            machines = escape_html(&base.url("/machines")),
            body = body,
        ))
    }
}
