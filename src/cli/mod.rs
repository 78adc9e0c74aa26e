//! CLI Module
//!
//! Command-line front end over the editing facade. Each invocation loads a
//! project, applies one operation and saves it back.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::sample::{ItemKind, LayerField};

/// Refl Editor - reflectometry sample editing and fitting
#[derive(Parser, Debug)]
#[command(name = "refl-editor")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Editor config file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new project with the default sample
    #[command(name = "new")]
    New {
        /// Directory for the new project
        path: PathBuf,

        /// Project name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Print the sample, minimizer and project info
    #[command(name = "show")]
    Show {
        /// Project directory or project.json
        project: PathBuf,
    },

    /// Switch an item between simple and repeating
    #[command(name = "set-type")]
    SetType {
        project: PathBuf,

        /// Item index
        #[arg(short, long)]
        item: usize,

        #[arg(short, long, value_enum)]
        kind: KindArg,
    },

    /// Set a layer thickness or roughness
    #[command(name = "set-layer")]
    SetLayer {
        project: PathBuf,

        #[arg(short, long)]
        item: usize,

        #[arg(short, long, default_value_t = 0)]
        layer: usize,

        #[arg(short, long, value_enum)]
        field: FieldArg,

        value: f64,

        /// Also mark the parameter free for fitting
        #[arg(long)]
        free: bool,
    },

    /// Attach experimental data (3 or 4 whitespace-separated columns)
    #[command(name = "load-data")]
    LoadData { project: PathBuf, file: PathBuf },

    /// Fit the free parameters against the attached data
    #[command(name = "fit")]
    Fit {
        project: PathBuf,

        #[arg(short, long)]
        engine: Option<String>,

        #[arg(short, long)]
        method: Option<String>,
    },

    /// List projects found under a directory
    #[command(name = "examples")]
    Examples { dir: PathBuf },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum KindArg {
    Simple,
    Repeating,
}

impl From<KindArg> for ItemKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Simple => ItemKind::Simple,
            KindArg::Repeating => ItemKind::Repeating,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum FieldArg {
    Thickness,
    Roughness,
}

impl From<FieldArg> for LayerField {
    fn from(field: FieldArg) -> Self {
        match field {
            FieldArg::Thickness => LayerField::Thickness,
            FieldArg::Roughness => LayerField::Roughness,
        }
    }
}
