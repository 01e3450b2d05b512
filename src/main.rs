use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use deferscript_bundle::{Bundler, FsAssetStore, HttpFetcher};
use deferscript_config::{BundleFailurePolicy, ScriptManifest};

/// File the bundle manifest is written to, inside the output directory.
const BUNDLE_MANIFEST_FILE: &str = "bundle-manifest.json";

/// deferscript - third-party script loading with deferred triggers
#[derive(Parser)]
#[command(name = "deferscript")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Fetch scripts marked `bundle` and write them to the output directory
  Bundle {
    /// Path to the script manifest (JSON)
    manifest_file: PathBuf,

    /// Output directory (overrides the manifest)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Public path prefix the output directory is served under
    #[arg(long)]
    public_prefix: Option<String>,

    /// Keep the remote locator when a fetch fails instead of aborting
    #[arg(long)]
    fallback: bool,

    /// Refetch scripts that are already bundled
    #[arg(long)]
    force: bool,
  },

  /// Validate a manifest and print its scripts
  Check {
    /// Path to the script manifest (JSON)
    manifest_file: PathBuf,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  match cli.command {
    Some(Commands::Bundle {
      manifest_file,
      out_dir,
      public_prefix,
      fallback,
      force,
    }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(bundle(
        manifest_file,
        out_dir,
        public_prefix,
        fallback,
        force,
      ))?;
    }
    Some(Commands::Check { manifest_file }) => {
      check(&manifest_file)?;
    }
    None => {
      println!("deferscript - use --help to see available commands");
    }
  }

  Ok(())
}

fn read_manifest(manifest_file: &Path) -> Result<ScriptManifest> {
  let content = std::fs::read_to_string(manifest_file)
    .with_context(|| format!("failed to read manifest: {}", manifest_file.display()))?;

  ScriptManifest::from_json(&content)
    .with_context(|| format!("invalid manifest: {}", manifest_file.display()))
}

async fn bundle(
  manifest_file: PathBuf,
  out_dir: Option<PathBuf>,
  public_prefix: Option<String>,
  fallback: bool,
  force: bool,
) -> Result<()> {
  let manifest = read_manifest(&manifest_file)?;

  let mut config = manifest.bundle.clone();
  if let Some(out_dir) = out_dir {
    config.output_dir = out_dir;
  }
  if let Some(prefix) = public_prefix {
    config.public_prefix = prefix;
  }
  if fallback {
    config.on_fetch_error = BundleFailurePolicy::FallbackToRemote;
  }
  config.force |= force;

  eprintln!(
    "Bundling {} script(s) into {}",
    manifest.bundled().count(),
    config.output_dir.display()
  );

  let output_dir = config.output_dir.clone();
  let fetcher = HttpFetcher::new().context("failed to create HTTP client")?;
  let store = FsAssetStore::new(&output_dir);
  let bundler = Bundler::new(Arc::new(fetcher), Arc::new(store), config);

  let output = bundler
    .bundle(&manifest)
    .await
    .context("bundling failed")?;

  tokio::fs::create_dir_all(&output_dir)
    .await
    .with_context(|| format!("failed to create output directory: {}", output_dir.display()))?;

  let manifest_path = output_dir.join(BUNDLE_MANIFEST_FILE);
  let json = serde_json::to_string_pretty(&output)?;
  tokio::fs::write(&manifest_path, json)
    .await
    .with_context(|| format!("failed to write bundle manifest: {}", manifest_path.display()))?;

  eprintln!(
    "Bundled {} script(s), {} fallback(s)",
    output.scripts.len(),
    output.fallbacks.len()
  );
  println!("{}", manifest_path.display());

  Ok(())
}

fn check(manifest_file: &Path) -> Result<()> {
  let manifest = read_manifest(manifest_file)?;

  let scripts: Vec<serde_json::Value> = manifest
    .scripts
    .iter()
    .map(|def| {
      serde_json::json!({
        "key": def.key(),
        "src": def.src,
        "bundle": def.bundle,
        "trigger": def.trigger,
      })
    })
    .collect();

  eprintln!("Manifest OK: {} script(s)", scripts.len());
  println!("{}", serde_json::to_string_pretty(&scripts)?);

  Ok(())
}
