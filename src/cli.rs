//! Command-line arguments for the `pda-assist` binary.

use clap::{Args, Parser, Subcommand, ValueEnum};
use pda_assist::Address;
use pda_assist::statics;
use pda_assist::gateway::{FactionSource, FavoriteCategory};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pda-assist",
    version,
    about = "Inspect and edit the OBody NG preset distribution config through the PDA backend",
    long_about = "Talks to the local PDA backend over HTTP.\n\n\
                  Every command loads the current config and favorites first, applies one \
                  change and waits until it has been pushed back."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (default: platform config directory).
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL (overrides the config file).
    #[arg(long, value_name = "URL", global = true)]
    pub url: Option<String>,

    /// More logging (-v debug, -vv trace). `RUST_LOG` still wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Backend liveness, drift state and collection sizes.
    Status,

    /// List top-level sections with their shape.
    Sections,

    /// Print a section, or one entry of it, as pretty JSON.
    Show(TargetArgs),

    /// Add to a section. With --key the section is a map; without it, a list.
    Add(AddArgs),

    /// Delete a section or one of its entries (needs --yes to apply).
    Delete(DeleteArgs),

    /// Replace a value with raw JSON/JSON5 text, keeping its shape.
    Edit(EditArgs),

    /// Toggle favorites.
    #[command(subcommand)]
    Favorite(FavoriteCommand),

    /// Search the faction library.
    Factions(FactionArgs),

    /// Keep polling and print notices until Ctrl-C.
    Watch,
}

#[derive(Args)]
pub struct TargetArgs {
    pub section: String,

    /// Map key inside the section.
    #[arg(long, conflicts_with = "index")]
    pub key: Option<String>,

    /// List index inside the section.
    #[arg(long)]
    pub index: Option<usize>,
}

impl TargetArgs {
    pub fn address(&self) -> Address {
        match (&self.key, self.index) {
            (Some(key), _) => Address::Key(key.clone()),
            (None, Some(index)) => Address::Index(index),
            (None, None) => Address::Whole,
        }
    }
}

#[derive(Args)]
pub struct AddArgs {
    pub section: String,

    #[arg(long)]
    pub key: Option<String>,

    /// JSON/JSON5 value. For lists, an array adds each element.
    pub value: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Apply the deletion instead of only showing what would go.
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct EditArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Replacement text.
    pub text: String,

    /// Turn manual edit mode on for this run.
    #[arg(long)]
    pub enable: bool,
}

#[derive(Subcommand)]
pub enum FavoriteCommand {
    /// Toggle a preset name.
    Preset { name: String },

    /// Toggle an NPC by plugin and form id.
    Npc { plugin: String, form_id: String },

    /// Toggle an equipment item.
    Equipment {
        plugin: String,
        /// armors, outfits or weapons.
        #[arg(value_parser = statics::EQUIPMENT_CATEGORIES)]
        category: String,
        form_id: String,
    },

    /// Favorite (or with --off, unfavorite) everything a plugin provides.
    Plugin {
        domain: PluginDomain,
        plugin: String,
        #[arg(long)]
        off: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PluginDomain {
    Npcs,
    Equipment,
}

impl From<PluginDomain> for FavoriteCategory {
    fn from(domain: PluginDomain) -> Self {
        match domain {
            PluginDomain::Npcs => FavoriteCategory::Npcs,
            PluginDomain::Equipment => FavoriteCategory::Equipment,
        }
    }
}

#[derive(Args)]
pub struct FactionArgs {
    /// Case-insensitive search term; empty lists everything.
    #[arg(default_value = "")]
    pub term: String,

    /// `live` or `reference`.
    #[arg(long, default_value = "reference")]
    pub source: FactionSource,
}
