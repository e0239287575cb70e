//! PDA Assist command-line front end.

mod cli;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Cli, Command, FavoriteCommand};
use pda_assist::favorites::PresetToggle;
use pda_assist::gateway::{CatalogKind, FavoriteCategory};
use pda_assist::{
    AssistConfig, ConfigValue, HttpGateway, Notice, Session, SessionEvents, statics,
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match AssistConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config, cli.verbose);

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins; otherwise `-v` flags, otherwise the config file filter.
fn init_logging(config: &AssistConfig, verbose: u8) {
    let fallback = match verbose {
        0 => config.logging.filter.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_notices(notices: Vec<Notice>) {
    for notice in notices {
        eprintln!("{notice}");
    }
}

async fn run(cli: Cli, mut config: AssistConfig) -> Result<()> {
    if let Some(url) = cli.url {
        config.server.base_url = url;
    }
    let gateway = HttpGateway::new(&config.server.base_url, config.server.request_timeout())
        .context("failed to set up the HTTP client")?;
    let (mut session, mut events) = Session::new(Arc::new(gateway), &config);

    if let Err(err) = session.bootstrap().await {
        print_notices(session.drain_notices());
        return Err(err).with_context(|| format!("backend at {}", config.server.base_url));
    }

    let outcome = execute(cli.command, &mut session, &mut events).await;
    session.settle(&mut events).await;
    print_notices(session.drain_notices());
    outcome
}

async fn execute(
    command: Command,
    session: &mut Session<HttpGateway>,
    events: &mut SessionEvents,
) -> Result<()> {
    match command {
        Command::Status => {
            let favorites = session.favorites();
            println!("{}", statics::EN_APP_TITLE);
            println!("backend:   {}", session.gateway().base_url());
            println!("liveness:  {}", session.liveness());
            println!("drift:     {:?}", session.drift_state());
            println!("sections:  {}", session.store().section_names().count());
            println!("presets:   {}", favorites.presets.len());
            println!("npcs:      {}", favorites.npcs.len());
            println!("equipment: {}", favorites.equipment.len());
            println!(
                "catalogs:  {} npc plugins, {} equipment plugins",
                favorites.catalog(CatalogKind::Npcs).plugins().count(),
                favorites.catalog(CatalogKind::Equipment).plugins().count()
            );
        }
        Command::Sections => {
            let store = session.store();
            for name in store.section_names() {
                if let Some(value) = store.section(name) {
                    println!("{name}\t{}\t{}", value.section_shape(), value.len());
                }
            }
        }
        Command::Show(target) => {
            let address = target.address();
            let Some(value) = session.store().value_at(&target.section, &address) else {
                bail!("{} {address} does not exist", target.section);
            };
            println!("{}", value.to_pretty_text());
        }
        Command::Add(args) => {
            let value = ConfigValue::parse_json5(&args.value)?;
            let changed = match args.key {
                Some(key) => session.add_map_entry(&args.section, &key, value)?,
                None => {
                    let values = match value {
                        ConfigValue::Array(values) => values,
                        single => vec![single],
                    };
                    session.add_list_entries(&args.section, values)?
                }
            };
            println!("{}", if changed { "added" } else { "already present" });
        }
        Command::Delete(args) => {
            let address = args.target.address();
            let pending = session.stage_deletion(&args.target.section, address, "")?;
            if args.yes {
                let audit = session.commit_deletion()?;
                println!("{}", audit.describe());
            } else {
                session.cancel_deletion();
                println!("would delete {}; re-run with --yes", pending.label);
            }
        }
        Command::Edit(args) => {
            if args.enable {
                session.set_manual_edit(true);
            }
            session.open_section(&args.target.section);
            session.select(args.target.address())?;
            session.manual_edit(&args.text)?;
        }
        Command::Favorite(favorite) => favorite_command(favorite, session)?,
        Command::Factions(args) => {
            session.switch_faction_source(args.source).await?;
            for (id, info) in session.search_factions(&args.term) {
                println!("{id}\t{}", info.name);
            }
        }
        Command::Watch => {
            session
                .run(
                    events,
                    async {
                        if let Err(err) = tokio::signal::ctrl_c().await {
                            tracing::warn!(%err, "cannot listen for Ctrl-C");
                            std::future::pending::<()>().await;
                        }
                    },
                    |notice| eprintln!("{notice}"),
                )
                .await;
        }
    }
    Ok(())
}

fn favorite_command(command: FavoriteCommand, session: &mut Session<HttpGateway>) -> Result<()> {
    match command {
        FavoriteCommand::Preset { name } => match session.toggle_preset(&name) {
            PresetToggle::Added => println!("{name}: favorited"),
            PresetToggle::Removed => println!("{name}: removed"),
            PresetToggle::Pinned => println!("{name}: pinned, always a favorite"),
        },
        FavoriteCommand::Npc { plugin, form_id } => {
            let now = session.toggle_npc(&plugin, &form_id)?;
            print_membership(&plugin, &form_id, now, session.favorites().npcs.all_selected(&plugin));
        }
        FavoriteCommand::Equipment {
            plugin,
            category,
            form_id,
        } => {
            let now = session.toggle_equipment(&plugin, &category, &form_id)?;
            print_membership(
                &plugin,
                &form_id,
                now,
                session.favorites().equipment.all_selected(&plugin),
            );
        }
        FavoriteCommand::Plugin {
            domain,
            plugin,
            off,
        } => {
            let category = FavoriteCategory::from(domain);
            let count = session.set_plugin_all(category, &plugin, !off)?;
            println!("{plugin}: {count} {category} favorited");
        }
    }
    Ok(())
}

fn print_membership(plugin: &str, form_id: &str, now: bool, all_selected: bool) {
    let state = if now { "favorited" } else { "removed" };
    println!("{plugin} {form_id}: {state} (all selected: {all_selected})");
}

#[cfg(test)]
mod tests {
    use super::cli::Cli;
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn equipment_category_must_be_known() {
        let parse = |category: &str| {
            Cli::try_parse_from(["pda-assist", "favorite", "equipment", "Armor.esp", category, "0x900"])
        };
        assert!(parse("weapons").is_ok());
        assert!(parse("shields").is_err());
    }
}
