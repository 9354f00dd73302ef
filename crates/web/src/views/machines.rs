//! Machines inventory page

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

use crate::forwarded::RequestBase;
use crate::puppetdb::{EmfPuppetInfo, PuppetDbClient, PuppetInventoryHost, PuppetNode};
use crate::server::WebServerState;
use crate::templates::{escape_html, Templates};

/// Everything known about one machine
#[derive(Debug, Clone, Serialize)]
pub struct CombinedInfo {
    pub inventory: PuppetInventoryHost,
    pub emf_info: Option<EmfPuppetInfo>,
    pub node: Option<PuppetNode>,
}

/// Query PuppetDB concurrently and join the results by certname, sorted by
/// certname.
pub async fn collect_machines(client: &dyn PuppetDbClient) -> anyhow::Result<Vec<CombinedInfo>> {
    let (mut inventory, emf_info, nodes) = tokio::try_join!(
        client.query_inventory(),
        client.query_emf_info(),
        client.query_nodes()
    )?;

    let nodes: HashMap<String, PuppetNode> = nodes
        .into_iter()
        .map(|node| (node.certname.clone(), node))
        .collect();

    inventory.sort_by(|a, b| a.certname.cmp(&b.certname));
    Ok(inventory
        .into_iter()
        .map(|host| CombinedInfo {
            emf_info: emf_info.get(&host.certname).cloned(),
            node: nodes.get(&host.certname).cloned(),
            inventory: host,
        })
        .collect())
}

fn format_time(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "never".to_string())
}

fn operating_system(host: &PuppetInventoryHost) -> String {
    match (host.fact_text("os.name"), host.fact_text("os.release.full")) {
        (Some(name), Some(release)) => format!("{} {}", name, release),
        (Some(name), None) => name,
        _ => "unknown".to_string(),
    }
}

fn status_class(node: Option<&PuppetNode>) -> &'static str {
    match node {
        None => "status-unknown",
        Some(n) if n.deactivated.is_some() || n.expired.is_some() => "status-inactive",
        Some(n) => match n.latest_report_status.as_deref() {
            Some("failed") => "status-failed",
            Some("changed") => "status-changed",
            Some("unchanged") => "status-ok",
            _ => "status-unknown",
        },
    }
}

fn render_emf(info: Option<&EmfPuppetInfo>) -> String {
    let Some(info) = info else {
        return String::new();
    };
    let items: Vec<String> = info
        .fields
        .keys()
        .filter_map(|key| {
            info.get(key).map(|value| {
                format!(
                    "<dt>{}</dt><dd>{}</dd>",
                    escape_html(key),
                    escape_html(&value)
                )
            })
        })
        .collect();
    if items.is_empty() {
        String::new()
    } else {
        format!(r#"<dl class="emf">{}</dl>"#, items.join(""))
    }
}

fn render_row(machine: &CombinedInfo) -> String {
    let host = &machine.inventory;
    let node = machine.node.as_ref();
    let status = node
        .and_then(|n| n.latest_report_status.as_deref())
        .unwrap_or("unknown");

    format!(
        r#"            <tr class="{class}" data-certname="{certname}">
                <td class="certname">{certname}</td>
                <td>{environment}</td>
                <td>{os}</td>
                <td>{emf}</td>
                <td>{status}</td>
                <td>{report}</td>
            </tr>"#,
        class = status_class(node),
        certname = escape_html(&host.certname),
        environment = escape_html(host.environment.as_deref().unwrap_or("")),
        os = escape_html(&operating_system(host)),
        emf = render_emf(machine.emf_info.as_ref()),
        status = escape_html(status),
        report = escape_html(&format_time(node.and_then(|n| n.report_timestamp))),
    )
}

/// Render the machines table
pub fn render_machines(templates: &Templates, base: &RequestBase, machines: &[CombinedInfo]) -> String {
    let rows: Vec<String> = machines.iter().map(render_row).collect();
    let body = format!(
        r#"        <h1>Machines</h1>
        <p class="summary">{count} machines</p>
        <input type="search" id="machine-filter" placeholder="Filter by certname">
        <table class="machines">
            <thead>
                <tr><th>Certname</th><th>Environment</th><th>OS</th><th>EMF</th><th>Last report</th><th>Reported at</th></tr>
            </thead>
            <tbody>
{rows}
            </tbody>
        </table>"#,
        count = machines.len(),
        rows = rows.join("\n"),
    );
    let script = templates.script(base, "js/machines.js");
    templates.page(base, "Machines", &script, &body).0
}

pub async fn machines_handler(
    State(state): State<Arc<WebServerState>>,
    base: RequestBase,
) -> Response {
    match collect_machines(state.puppetdb.as_ref()).await {
        Ok(machines) => {
            axum::response::Html(render_machines(&state.templates, &base, &machines)).into_response()
        }
        Err(e) => {
            error!("Failed to query PuppetDB: {:#}", e);
            let body = r#"        <h1>Machines</h1>
        <p class="error">The machine inventory is unavailable right now.</p>"#;
            (
                StatusCode::BAD_GATEWAY,
                state.templates.page(&base, "Machines", "", body),
            )
                .into_response()
        }
    }
}
