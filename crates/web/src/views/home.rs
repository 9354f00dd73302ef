//! Landing page

use axum::extract::State;
use axum::response::IntoResponse;
use std::sync::Arc;

use crate::forwarded::RequestBase;
use crate::server::WebServerState;
use crate::templates::escape_html;

pub async fn home_handler(
    State(state): State<Arc<WebServerState>>,
    base: RequestBase,
) -> impl IntoResponse {
    let body = format!(
        r#"        <section class="intro">
            <h1>Hello.</h1>
            <p>This is a small homepage. The interesting bits live on the
            <a href="{machines}">machines</a> page, which lists the hosts
            known to PuppetDB.</p>
        </section>"#,
        machines = escape_html(&base.url("/machines")),
    );
    state.templates.page(&base, "Home", "", &body)
}
