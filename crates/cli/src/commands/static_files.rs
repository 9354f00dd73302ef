//! `orgahome static`: compile and inspect content-hashed assets

use anyhow::Context;
use clap::{Args, Subcommand};
use orgahome_common::{build, Manifest, StaticResolver};
use orgahome_web::config::{DEFAULT_SERVING_DIR, DEFAULT_STATIC_DIR};
use orgahome_web::WebServerConfig;
use serde::Serialize;
use std::path::PathBuf;

use super::StaticLocation;
use crate::output::{self, OutputFormat, TableDisplay};

#[derive(Subcommand, Debug)]
pub enum StaticCommands {
    /// Copy assets to their hashed names and write the manifest
    Compile(CompileArgs),

    /// List the entries of a compiled manifest
    Show(ShowArgs),

    /// Show how a logical asset path resolves
    Resolve(ResolveArgs),
}

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Source asset directory
    #[arg(long, default_value = DEFAULT_STATIC_DIR)]
    pub source: PathBuf,

    /// Output directory
    #[arg(long, default_value = DEFAULT_SERVING_DIR)]
    pub dest: PathBuf,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Compiled asset directory
    #[arg(long, default_value = DEFAULT_SERVING_DIR)]
    pub serving_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Logical asset path, e.g. css/main.css
    pub path: String,

    #[command(flatten)]
    pub location: StaticLocation,
}

/// One manifest entry as printed by `static show`
#[derive(Debug, Serialize)]
pub struct ManifestRow {
    pub path: String,
    pub hashed_path: String,
    pub sri_hash: String,
}

impl TableDisplay for ManifestRow {
    fn headers() -> Vec<&'static str> {
        vec!["Path", "Hashed path", "SRI"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.path.clone(),
            self.hashed_path.clone(),
            self.sri_hash.clone(),
        ]
    }
}

/// Result of `static resolve`
#[derive(Debug, Serialize)]
pub struct Resolution {
    pub mode: String,
    pub path: String,
    pub hashed_path: Option<String>,
    pub sri_hash: Option<String>,
    pub file: Option<PathBuf>,
}

impl TableDisplay for Resolution {
    fn headers() -> Vec<&'static str> {
        vec!["Mode", "Path", "Hashed path", "SRI", "File"]
    }

    fn row(&self) -> Vec<String> {
        let or_dash = |v: Option<&str>| v.unwrap_or("-").to_string();
        vec![
            self.mode.clone(),
            self.path.clone(),
            or_dash(self.hashed_path.as_deref()),
            or_dash(self.sri_hash.as_deref()),
            self.file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]
    }
}

pub async fn execute(cmd: StaticCommands, format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        StaticCommands::Compile(args) => execute_compile(args, format),
        StaticCommands::Show(args) => output::print_list(&manifest_rows(&args)?, format),
        StaticCommands::Resolve(args) => {
            let resolution = resolve(&args)?;
            if resolution.hashed_path.is_none() {
                output::print_warning(&format!("No static asset for {}", args.path));
            }
            output::print_item(&resolution, format)
        }
    }
}

fn execute_compile(args: CompileArgs, format: OutputFormat) -> anyhow::Result<()> {
    let report = build(&args.source, &args.dest)
        .with_context(|| format!("failed to compile static files from {:?}", args.source))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&report)?),
        OutputFormat::Table | OutputFormat::Plain => output::print_success(&format!(
            "Compiled {} files ({} bytes), manifest at {}",
            report.files,
            report.bytes,
            report.manifest_path.display()
        )),
    }
    Ok(())
}

pub fn manifest_rows(args: &ShowArgs) -> anyhow::Result<Vec<ManifestRow>> {
    let manifest = Manifest::read(&Manifest::path_in(&args.serving_dir))?;
    Ok(manifest
        .iter()
        .map(|(path, entry)| ManifestRow {
            path: path.clone(),
            hashed_path: entry.hashed_path.clone(),
            sri_hash: entry.sri_hash.clone(),
        })
        .collect())
}

pub fn resolve(args: &ResolveArgs) -> anyhow::Result<Resolution> {
    let mut config = WebServerConfig::from_env()?;
    args.location.apply(&mut config);
    let resolver = config.resolver()?;
    Ok(resolve_with(resolver.as_ref(), &args.path))
}

fn resolve_with(resolver: &dyn StaticResolver, path: &str) -> Resolution {
    let hashed_path = resolver.hash_path(path);
    let file = hashed_path
        .as_deref()
        .and_then(|hashed| resolver.hashed_path_to_file(hashed))
        .map(|resolved| resolved.path);
    Resolution {
        mode: resolver.mode().to_string(),
        path: path.to_string(),
        sri_hash: resolver.sri_for(path),
        hashed_path,
        file,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgahome_common::{DirectResolver, ManifestResolver};
    use tempfile::TempDir;

    const CSS_HEX: &str = "7c98040a541657584690ae2a1cc3b42a8b53b159cc60c5d3abbfecbaeac6c94a";

    fn assets() -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("static/css")).unwrap();
        std::fs::write(tmp.path().join("static/css/main.css"), b"body{}").unwrap();
        tmp
    }

    #[test]
    fn test_compile_then_show() {
        let tmp = assets();
        let dest = tmp.path().join("dist");
        execute_compile(
            CompileArgs {
                source: tmp.path().join("static"),
                dest: dest.clone(),
            },
            OutputFormat::Json,
        )
        .unwrap();

        let rows = manifest_rows(&ShowArgs { serving_dir: dest }).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, "css/main.css");
        assert_eq!(rows[0].hashed_path, format!("css/main.{}.css", CSS_HEX));
        assert!(rows[0].sri_hash.starts_with("sha256-"));
    }

    #[test]
    fn test_show_without_manifest_fails() {
        let tmp = TempDir::new().unwrap();
        assert!(manifest_rows(&ShowArgs {
            serving_dir: tmp.path().to_path_buf()
        })
        .is_err());
    }

    #[test]
    fn test_resolve_development() {
        let tmp = assets();
        let resolver = DirectResolver::new(tmp.path().join("static"));

        let found = resolve_with(&resolver, "css/main.css");
        assert_eq!(found.mode, "development");
        assert_eq!(found.hashed_path, Some(format!("css/main.{}.css", CSS_HEX)));
        assert_eq!(found.file, Some(tmp.path().join("static/css/main.css")));

        let missing = resolve_with(&resolver, "css/none.css");
        assert!(missing.hashed_path.is_none());
        assert!(missing.sri_hash.is_none());
        assert_eq!(missing.row()[2], "-");
    }

    #[test]
    fn test_resolve_manifest_prefers_compiled_copy() {
        let tmp = assets();
        let source = tmp.path().join("static");
        let dest = tmp.path().join("dist");
        build(&source, &dest).unwrap();

        let resolver = ManifestResolver::load(&source, &dest).unwrap();
        let found = resolve_with(&resolver, "css/main.css");
        assert_eq!(found.mode, "manifest");
        assert_eq!(
            found.file,
            Some(dest.join(format!("css/main.{}.css", CSS_HEX)))
        );
    }
}
