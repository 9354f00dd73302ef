//! PuppetDB client
//!
//! The machines page combines three PuppetDB datasets: the inventory (facts
//! per certname), node status (last report times) and the `emf` custom fact.
//! Queries use PQL against the `/pdb/query/v4` root endpoint.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::PuppetDbConfig;

const INVENTORY_QUERY: &str = "inventory[certname, timestamp, environment, facts, trusted] {}";
const NODES_QUERY: &str = "nodes[certname, deactivated, expired, catalog_timestamp, facts_timestamp, report_timestamp, latest_report_status, latest_report_noop] {}";
const EMF_FACT_QUERY: &str = r#"facts[certname, value] { name = "emf" }"#;

/// One row of the inventory endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PuppetInventoryHost {
    pub certname: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub facts: serde_json::Map<String, Value>,
    #[serde(default)]
    pub trusted: serde_json::Map<String, Value>,
}

impl PuppetInventoryHost {
    /// Look up a structured fact by dotted path, e.g. `os.release.full`
    pub fn fact(&self, dotted: &str) -> Option<&Value> {
        let mut parts = dotted.split('.');
        let mut current = self.facts.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Fact rendered as display text
    pub fn fact_text(&self, dotted: &str) -> Option<String> {
        self.fact(dotted).and_then(value_text)
    }
}

/// Node status as reported by the nodes endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PuppetNode {
    pub certname: String,
    #[serde(default)]
    pub deactivated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expired: Option<DateTime<Utc>>,
    #[serde(default)]
    pub catalog_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub facts_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub report_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub latest_report_status: Option<String>,
    #[serde(default)]
    pub latest_report_noop: Option<bool>,
}

/// Value of the `emf` custom fact for one machine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmfPuppetInfo {
    pub fields: BTreeMap<String, Value>,
}

impl EmfPuppetInfo {
    pub fn get(&self, key: &str) -> Option<String> {
        self.fields.get(key).and_then(value_text)
    }
}

/// Scalars as text; arrays joined with commas; objects and null skipped
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(value_text).collect();
            if parts.is_empty() { None } else { Some(parts.join(", ")) }
        }
        Value::Null | Value::Object(_) => None,
    }
}

#[derive(Debug, Deserialize)]
struct FactRow {
    certname: String,
    value: Value,
}

/// Key `emf` fact rows by certname, dropping rows whose value is not an object
fn emf_by_certname(rows: Vec<FactRow>) -> HashMap<String, EmfPuppetInfo> {
    rows.into_iter()
        .filter_map(|row| match row.value {
            Value::Object(map) => Some((
                row.certname,
                EmfPuppetInfo {
                    fields: map.into_iter().collect(),
                },
            )),
            other => {
                debug!("Ignoring non-object emf fact on {}: {}", row.certname, other);
                None
            }
        })
        .collect()
}

/// Queries needed by the machines page
#[async_trait]
pub trait PuppetDbClient: Send + Sync {
    async fn query_inventory(&self) -> anyhow::Result<Vec<PuppetInventoryHost>>;
    async fn query_emf_info(&self) -> anyhow::Result<HashMap<String, EmfPuppetInfo>>;
    async fn query_nodes(&self) -> anyhow::Result<Vec<PuppetNode>>;
}

/// PuppetDB over HTTP
pub struct HttpPuppetDb {
    client: reqwest::Client,
    query_url: Url,
}

impl HttpPuppetDb {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut base = Url::parse(base_url)
            .with_context(|| format!("invalid PuppetDB URL {}", base_url))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let query_url = base.join("pdb/query/v4")?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, query_url })
    }

    pub fn query_url(&self) -> &Url {
        &self.query_url
    }

    async fn query<T: DeserializeOwned>(&self, pql: &str) -> anyhow::Result<Vec<T>> {
        debug!("PuppetDB query: {}", pql);
        let response = self
            .client
            .get(self.query_url.clone())
            .query(&[("query", pql)])
            .send()
            .await
            .context("PuppetDB request failed")?
            .error_for_status()
            .context("PuppetDB returned an error")?;
        response
            .json()
            .await
            .context("PuppetDB response was not valid JSON")
    }
}

#[async_trait]
impl PuppetDbClient for HttpPuppetDb {
    async fn query_inventory(&self) -> anyhow::Result<Vec<PuppetInventoryHost>> {
        self.query(INVENTORY_QUERY).await
    }

    async fn query_emf_info(&self) -> anyhow::Result<HashMap<String, EmfPuppetInfo>> {
        Ok(emf_by_certname(self.query(EMF_FACT_QUERY).await?))
    }

    async fn query_nodes(&self) -> anyhow::Result<Vec<PuppetNode>> {
        self.query(NODES_QUERY).await
    }
}

/// Canned query results read from a JSON file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FixturePuppetDb {
    pub inventory: Vec<PuppetInventoryHost>,
    pub nodes: Vec<PuppetNode>,
    pub emf: HashMap<String, EmfPuppetInfo>,
}

impl FixturePuppetDb {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read PuppetDB fixture {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse PuppetDB fixture {:?}", path))
    }
}

#[async_trait]
impl PuppetDbClient for FixturePuppetDb {
    async fn query_inventory(&self) -> anyhow::Result<Vec<PuppetInventoryHost>> {
        Ok(self.inventory.clone())
    }

    async fn query_emf_info(&self) -> anyhow::Result<HashMap<String, EmfPuppetInfo>> {
        Ok(self.emf.clone())
    }

    async fn query_nodes(&self) -> anyhow::Result<Vec<PuppetNode>> {
        Ok(self.nodes.clone())
    }
}

/// Client for the configured backend: HTTP when a URL is set, else the
/// fixture file, else an empty inventory.
pub fn client_for(config: &PuppetDbConfig) -> anyhow::Result<Arc<dyn PuppetDbClient>> {
    if let Some(url) = &config.url {
        info!("Using PuppetDB at {}", url);
        return Ok(Arc::new(HttpPuppetDb::new(
            url,
            Duration::from_secs(config.timeout_secs),
        )?));
    }
    if let Some(path) = &config.fixture {
        info!("Using PuppetDB fixture {:?}", path);
        return Ok(Arc::new(FixturePuppetDb::load(path)?));
    }
    info!("No PuppetDB configured, machines inventory will be empty");
    Ok(Arc::new(FixturePuppetDb::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn host() -> PuppetInventoryHost {
        serde_json::from_value(json!({
            "certname": "web01.example.org",
            "timestamp": "2024-05-01T12:00:00.000Z",
            "environment": "production",
            "facts": {
                "os": {"name": "Debian", "release": {"full": "12.5", "major": "12"}},
                "processors": {"count": 8},
                "is_virtual": true
            },
            "trusted": {"certname": "web01.example.org"}
        }))
        .unwrap()
    }

    #[test]
    fn test_structured_fact_lookup() {
        let host = host();
        assert_eq!(host.fact_text("os.name").as_deref(), Some("Debian"));
        assert_eq!(host.fact_text("os.release.full").as_deref(), Some("12.5"));
        assert_eq!(host.fact_text("processors.count").as_deref(), Some("8"));
        assert_eq!(host.fact_text("is_virtual").as_deref(), Some("true"));
        assert_eq!(host.fact_text("os"), None);
        assert_eq!(host.fact_text("os.missing"), None);
    }

    #[test]
    fn test_node_parse_with_nulls() {
        let node: PuppetNode = serde_json::from_value(json!({
            "certname": "web01.example.org",
            "deactivated": null,
            "expired": null,
            "report_timestamp": "2024-05-01T11:55:00.000Z",
            "latest_report_status": "changed",
            "latest_report_noop": false
        }))
        .unwrap();
        assert!(node.deactivated.is_none());
        assert_eq!(node.latest_report_status.as_deref(), Some("changed"));
        assert!(node.report_timestamp.is_some());
    }

    #[test]
    fn test_emf_rows_keyed_by_certname() {
        let rows: Vec<FactRow> = serde_json::from_value(json!([
            {"certname": "a", "value": {"owner": "infra", "rack": 4}},
            {"certname": "b", "value": "not-an-object"}
        ]))
        .unwrap();
        let emf = emf_by_certname(rows);
        assert_eq!(emf.len(), 1);
        assert_eq!(emf["a"].get("owner").as_deref(), Some("infra"));
        assert_eq!(emf["a"].get("rack").as_deref(), Some("4"));
    }

    #[test]
    fn test_query_url() {
        let db = HttpPuppetDb::new("http://puppetdb:8080", Duration::from_secs(1)).unwrap();
        assert_eq!(db.query_url().as_str(), "http://puppetdb:8080/pdb/query/v4");

        let db = HttpPuppetDb::new("https://pdb.example.org/proxy", Duration::from_secs(1)).unwrap();
        assert_eq!(
            db.query_url().as_str(),
            "https://pdb.example.org/proxy/pdb/query/v4"
        );

        assert!(HttpPuppetDb::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_fixture_client() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("puppetdb.json");
        std::fs::write(
            &path,
            json!({
                "inventory": [{"certname": "db01"}],
                "emf": {"db01": {"owner": "data"}}
            })
            .to_string(),
        )
        .unwrap();

        let client = FixturePuppetDb::load(&path).unwrap();
        assert_eq!(client.query_inventory().await.unwrap().len(), 1);
        assert!(client.query_nodes().await.unwrap().is_empty());
        assert_eq!(
            client.query_emf_info().await.unwrap()["db01"].get("owner").as_deref(),
            Some("data")
        );
    }
}
