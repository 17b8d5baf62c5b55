use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "quill",
    about = "Quill: append-only plain-text object store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Store root directory (overrides the config file)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new object, optionally seeded with fields
    Create(CreateArgs),
    /// Print an object's current state
    Get(GetArgs),
    /// Print an object's raw changelog
    Log(LogArgs),
    /// Set one field on an object
    Set(SetArgs),
    /// Add to or read a side index
    Index(IndexArgs),
    /// Rebuild this store from another store's audit log
    Recover(RecoverArgs),
}

#[derive(Args)]
pub struct CreateArgs {
    /// Initial field as `name=value`; the value is JSON, or a plain string
    #[arg(short, long = "field", value_name = "NAME=VALUE")]
    pub fields: Vec<String>,
}

#[derive(Args)]
pub struct GetArgs {
    pub id: String,
}

#[derive(Args)]
pub struct LogArgs {
    pub id: String,
}

#[derive(Args)]
pub struct SetArgs {
    pub id: String,
    pub field: String,
    /// JSON value, or a plain string
    pub value: String,
}

#[derive(Args)]
pub struct IndexArgs {
    #[command(subcommand)]
    pub action: IndexAction,
}

#[derive(Subcommand)]
pub enum IndexAction {
    /// Append an object id under one or more keys
    Add {
        id: String,
        /// Keys, or JSON arrays of keys such as '["a", ["b"]]'
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// List every id recorded under a key
    Get { key: String },
}

#[derive(Args)]
pub struct RecoverArgs {
    /// Root of the store whose audit log is replayed
    #[arg(long)]
    pub from: PathBuf,
}
