//! orgahome Web
//!
//! Homepage server: landing page, PuppetDB machines inventory and
//! content-hashed static files.

pub mod config;
pub mod forwarded;
pub mod puppetdb;
pub mod server;
pub mod static_files;
pub mod templates;
pub mod views;

pub use config::{PuppetDbConfig, WebServerConfig};
pub use puppetdb::{FixturePuppetDb, HttpPuppetDb, PuppetDbClient};
pub use server::WebServer;
pub use static_files::StaticFiles;
pub use templates::Templates;
