//! `orgahome serve`

use anyhow::Context;
use clap::Args;
use orgahome_web::{WebServer, WebServerConfig};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing::info;

use super::StaticLocation;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(short = 'H', long, default_value = "[::]")]
    pub host: String,

    /// Port to bind
    #[arg(short, long, default_value_t = 5000)]
    pub port: u16,

    /// Runtime worker threads (default: 2 x CPUs + 1)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Trust X-Forwarded-* headers from nginx
    #[arg(long)]
    pub behind_nginx: bool,

    /// TOML configuration file
    #[arg(long, env = "ORGAHOME_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub location: StaticLocation,

    /// PuppetDB base URL
    #[arg(long)]
    pub puppetdb_url: Option<String>,

    /// JSON file with canned PuppetDB results
    #[arg(long)]
    pub puppetdb_fixture: Option<PathBuf>,
}

impl ServeArgs {
    /// Socket address from `--host` and `--port`; IPv6 hosts may be bracketed
    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        let host = self.host.trim_start_matches('[').trim_end_matches(']');
        let ip: IpAddr = host
            .parse()
            .with_context(|| format!("invalid bind address '{}'", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn worker_threads(&self) -> usize {
        self.workers.filter(|&n| n > 0).unwrap_or_else(default_workers)
    }

    /// Config file, then `ORGAHOME_*` environment, then flags
    pub fn web_config(&self) -> anyhow::Result<WebServerConfig> {
        let config = match &self.config {
            Some(path) => WebServerConfig::load(path)
                .with_context(|| format!("failed to load config {:?}", path))?,
            None => WebServerConfig::default(),
        };
        let mut config = config.with_env()?;

        self.location.apply(&mut config);
        if self.behind_nginx {
            config.behind_nginx = true;
        }
        if let Some(url) = &self.puppetdb_url {
            config.puppetdb.url = Some(url.clone());
        }
        if let Some(fixture) = &self.puppetdb_fixture {
            config.puppetdb.fixture = Some(fixture.clone());
        }
        Ok(config)
    }
}

fn default_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cpus * 2 + 1
}

pub async fn execute(args: ServeArgs) -> anyhow::Result<()> {
    let addr = args.addr()?;
    let config = args.web_config()?;
    info!(
        "Starting orgahome ({} static files, behind nginx: {})",
        config.static_mode, config.behind_nginx
    );

    WebServer::new(config)?.serve(addr).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgahome_common::StaticMode;

    fn args(host: &str) -> ServeArgs {
        ServeArgs {
            host: host.to_string(),
            port: 5000,
            workers: None,
            behind_nginx: false,
            config: None,
            location: StaticLocation::default(),
            puppetdb_url: None,
            puppetdb_fixture: None,
        }
    }

    #[test]
    fn test_addr() {
        assert_eq!(args("[::]").addr().unwrap().to_string(), "[::]:5000");
        assert_eq!(args("127.0.0.1").addr().unwrap().to_string(), "127.0.0.1:5000");
        assert!(args("localhost:80").addr().is_err());
    }

    #[test]
    fn test_worker_threads() {
        let mut a = args("::");
        assert!(a.worker_threads() >= 3);
        a.workers = Some(4);
        assert_eq!(a.worker_threads(), 4);
        a.workers = Some(0);
        assert!(a.worker_threads() >= 3);
    }

    #[test]
    fn test_flags_override_config_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("orgahome.toml");
        std::fs::write(
            &path,
            "static_mode = \"manifest\"\nserving_dir = \"/srv/dist\"\n\n[puppetdb]\nurl = \"http://file:8080\"\n",
        )
        .unwrap();

        let mut a = args("::");
        a.config = Some(path);
        a.behind_nginx = true;
        a.location.static_mode = Some(StaticMode::Development);
        a.puppetdb_url = Some("http://flag:8080".to_string());

        let config = a.web_config().unwrap();
        assert_eq!(config.static_mode, StaticMode::Development);
        assert_eq!(config.serving_dir, PathBuf::from("/srv/dist"));
        assert!(config.behind_nginx);
        assert_eq!(config.puppetdb.url.as_deref(), Some("http://flag:8080"));
    }
}
