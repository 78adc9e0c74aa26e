//! Refl Editor CLI
//!
//! Command-line interface for the reflectometry editor core.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;

use refl_editor::cli::commands;
use refl_editor::cli::{Cli, Commands};
use refl_editor::EditorConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Refl Editor v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => EditorConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EditorConfig::default(),
    };

    match cli.command {
        Some(cmd) => handle_command(&config, cmd),
        None => {
            println!("Refl Editor v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(config: &EditorConfig, cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::New { path, name } => commands::new_project(config, &path, name.as_deref())?,
        Commands::Show { project } => commands::show(config, &project)?,
        Commands::SetType {
            project,
            item,
            kind,
        } => commands::set_type(config, &project, item, kind.into())?,
        Commands::SetLayer {
            project,
            item,
            layer,
            field,
            value,
            free,
        } => commands::set_layer(config, &project, item, layer, field.into(), value, free)?,
        Commands::LoadData { project, file } => commands::load_data(config, &project, &file)?,
        Commands::Fit {
            project,
            engine,
            method,
        } => commands::fit(config, &project, engine.as_deref(), method.as_deref())?,
        Commands::Examples { dir } => commands::list_examples(&dir)?,
    }
    Ok(())
}
