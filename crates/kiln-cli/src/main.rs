use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kiln_cli::{CartItem, FsAssetStore};
use kiln_studio::{ListedType, Setting, Studio, StudioError, StudioOptions};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kiln", about = "Browse, queue and create asset types")]
struct Cli {
    /// Directory searched for `*.type.json` manifests (repeatable)
    #[arg(long = "types", value_name = "DIR", global = true)]
    type_roots: Vec<PathBuf>,

    /// Directory assets are created in
    #[arg(long, value_name = "DIR", default_value = ".", global = true)]
    assets: PathBuf,

    /// Configuration document (defaults to the platform config directory)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every creatable type
    Types,
    /// Filter the catalog by identity or name
    Search { text: String },
    /// Queue `TYPE[xN][@PATH]` items and create them in one batch
    CartCreate {
        #[arg(required = true, value_name = "ITEM")]
        items: Vec<CartItem>,
    },
    /// Create one instance at the default location
    Quick { type_id: String },
    Favorite { type_id: String },
    Unfavorite { type_id: String },
    /// Recently created types, most recent first
    History,
    /// Favorite types, most recent first
    Favorites,
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },
    ClearHistory,
    ClearFavorites,
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    Show,
    Set { key: String, value: String },
    Reset,
}

fn print_listing(listing: &[ListedType]) {
    for entry in listing {
        let marker = if entry.interactive { "" } else { " (disabled)" };
        println!("{}\t{}{}", entry.descriptor.key(), entry.descriptor.name(), marker);
    }
}

fn print_settings(studio: &Studio) {
    let record = studio.settings().record();
    println!("history_capacity = {}", record.history_capacity);
    println!("favorites_capacity = {}", record.favorites_capacity);
    println!("overwrite_existing = {}", record.overwrite_existing);
    println!("ping_on_create = {}", record.ping_on_create);
    println!(
        "single_instance_visibility = {}",
        record.single_instance_visibility
    );
}

fn report_ping(studio: &Studio) {
    if let Some(path) = studio.take_ping() {
        println!("ping {}", path.display());
    }
}

fn run(studio: &mut Studio, store: &mut FsAssetStore, command: Command) -> Result<()> {
    match command {
        Command::Types => {
            for descriptor in studio.catalog().snapshot().iter() {
                let mut flags = String::new();
                if descriptor.is_single_instance() {
                    flags.push_str(" [single-instance]");
                    if studio.is_locked(descriptor) {
                        flags.push_str(" (instantiated)");
                    }
                }
                println!("{}\t{}{}", descriptor.key(), descriptor.name(), flags);
            }
        }
        Command::Search { text } => {
            for hit in studio.search_now(text) {
                let marker = if hit.disabled { " (disabled)" } else { "" };
                println!("{}\t{}{}", hit.descriptor.key(), hit.descriptor.name(), marker);
            }
        }
        Command::CartCreate { items } => {
            for item in &items {
                studio.add_units_to_cart(&item.type_id, item.quantity)?;
                if let Some(path) = &item.path {
                    studio.set_cart_path(&item.type_id, path)?;
                }
            }
            let report = studio.create_cart(store);
            for asset in &report.created {
                println!("created {}", asset.path.display());
            }
            report_ping(studio);
            for failure in &report.failures {
                eprintln!("failed {}: {}", failure.descriptor.key(), failure.error);
            }
            if !report.is_clean() {
                bail!("{} of {} creations failed", report.failures.len(), report.failures.len() + report.created.len());
            }
        }
        Command::Quick { type_id } => {
            let asset = studio.quick_create(&type_id, store)?;
            println!("created {}", asset.path.display());
            report_ping(studio);
        }
        Command::Favorite { type_id } => {
            studio.favorite(&type_id)?;
        }
        Command::Unfavorite { type_id } => {
            if !studio.unfavorite(&type_id)? {
                eprintln!("{type_id} was not a favorite");
            }
        }
        Command::History => print_listing(&studio.history_listing()),
        Command::Favorites => print_listing(&studio.favorites_listing()),
        Command::Settings { action } => match action.unwrap_or(SettingsAction::Show) {
            SettingsAction::Show => print_settings(studio),
            SettingsAction::Set { key, value } => {
                let setting =
                    Setting::from_key(&key).ok_or_else(|| StudioError::UnknownSetting(key.clone()))?;
                studio.settings().set_from_str(setting, &value)?;
                print_settings(studio);
            }
            SettingsAction::Reset => {
                studio.settings().reset();
                print_settings(studio);
            }
        },
        Command::ClearHistory => studio.clear_history(),
        Command::ClearFavorites => studio.clear_favorites(),
    }
    Ok(())
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    let cli = Cli::parse();
    let options = StudioOptions {
        config_path: cli.config,
        manifest_roots: cli.type_roots,
        ..StudioOptions::default()
    };
    let mut store = FsAssetStore::new(cli.assets);
    let mut studio = Studio::open(&options, &store);

    let outcome = run(&mut studio, &mut store, cli.command);
    studio.close().context("failed to save configuration")?;
    outcome
}
