use clap::{Parser, Subcommand};
use gallery_ingest::config::{self, Policy};
use gallery_ingest::output;
use gallery_ingest::pipeline::Gallery;
use gallery_ingest::registry::{AssetId, AssetRegistrar, JsonRegistrar, OwnerId};
use gallery_ingest::storage::LocalStore;
use gallery_ingest::upload::UploadRequest;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gallery-ingest")]
#[command(version)]
#[command(about = "Ingest gallery images: validate, de-duplicate, resize, store")]
#[command(long_about = "\
Ingest gallery images: validate, de-duplicate, resize, store

Uploads are checked against the policy in gallery.toml, hashed, decoded and
re-encoded in their own format, then written under the upload root:

  uploads/
  ├── .gallery-index.json        # Asset registry
  └── 12/                        # One directory per owner
      ├── 3f9c…e1.jpg            # Re-encoded original
      ├── 3f9c…e1_lg.jpg         # One file per configured variant
      ├── 3f9c…e1_md.jpg
      └── 3f9c…e1_sm.jpg

Set RUST_LOG (e.g. RUST_LOG=gallery_ingest=debug) for logs on stderr.

Run 'gallery-ingest gen-config' to generate a documented gallery.toml.")]
struct Cli {
    /// Configuration file (missing file = defaults)
    #[arg(long, default_value = "gallery.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a local image file for an owner
    Upload {
        #[arg(long)]
        owner: OwnerId,
        /// Image file to ingest
        file: PathBuf,
        /// Filename to report as the client's (defaults to the file's name)
        #[arg(long)]
        name: Option<String>,
    },
    /// List an owner's images and their variants
    List {
        #[arg(long)]
        owner: OwnerId,
    },
    /// Delete one image and all its files
    Delete {
        #[arg(long)]
        owner: OwnerId,
        #[arg(long)]
        asset: AssetId,
    },
    /// Delete every image of an owner
    Purge {
        #[arg(long)]
        owner: OwnerId,
    },
    /// Print a stock gallery.toml with all options documented
    GenConfig,
}

/// Load and validate the config, then wire the CLI's gallery.
///
/// An invalid config is fatal: nothing is ingested or deleted with it.
fn open(
    config_path: &Path,
) -> Result<(Gallery<LocalStore, JsonRegistrar>, Policy), Box<dyn std::error::Error>> {
    let cfg = config::load_config(config_path)?;
    let policy = cfg.policy.to_policy()?;
    let gallery = Gallery::new(
        LocalStore::new(&cfg.upload_root),
        JsonRegistrar::new(cfg.index_path()),
    );
    Ok((gallery, policy))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Upload { owner, file, name } => {
            let (gallery, policy) = open(&cli.config)?;
            let claimed = match name {
                Some(n) => n,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            };
            let size = std::fs::metadata(&file)?.len();
            let request = UploadRequest::new(&file, claimed.clone(), i64::try_from(size)?);
            let outcome = gallery.upload_for_owner(owner, &request, &policy);
            output::print_upload_outcome(&claimed, &outcome);
            if !outcome.ok {
                std::process::exit(1);
            }
        }
        Command::List { owner } => {
            let (gallery, _) = open(&cli.config)?;
            let assets = gallery.registrar().assets_for_owner(owner)?;
            output::print_asset_list(owner, &assets);
        }
        Command::Delete { owner, asset } => {
            let (gallery, _) = open(&cli.config)?;
            let deleted = gallery.delete_image_for_owner(owner, asset);
            output::print_delete_result(owner, asset, deleted);
            if !deleted {
                std::process::exit(1);
            }
        }
        Command::Purge { owner } => {
            let (gallery, _) = open(&cli.config)?;
            let files = gallery.delete_all_for_owner(owner)?;
            output::print_purge_result(owner, files);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
