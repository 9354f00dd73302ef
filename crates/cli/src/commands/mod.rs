//! CLI Commands

pub mod serve;
pub mod static_files;

use clap::Args;
use orgahome_common::StaticMode;
use orgahome_web::WebServerConfig;
use std::path::PathBuf;

/// Static asset location flags shared by `serve` and `static resolve`
#[derive(Args, Debug, Clone, Default)]
pub struct StaticLocation {
    /// Static resolver: development or manifest
    #[arg(long)]
    pub static_mode: Option<StaticMode>,

    /// Source asset directory
    #[arg(long)]
    pub static_dir: Option<PathBuf>,

    /// Compiled asset directory containing the manifest
    #[arg(long)]
    pub serving_dir: Option<PathBuf>,
}

impl StaticLocation {
    /// Override configured values with the flags that were given
    pub fn apply(&self, config: &mut WebServerConfig) {
        if let Some(mode) = self.static_mode {
            config.static_mode = mode;
        }
        if let Some(dir) = &self.static_dir {
            config.static_dir = dir.clone();
        }
        if let Some(dir) = &self.serving_dir {
            config.serving_dir = dir.clone();
        }
    }
}
