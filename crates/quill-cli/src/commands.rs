use anyhow::Context;
use colored::Colorize;
use quill_store::{
    flatten_keys, partition, IndexKey, LogEntry, ObjectId, ObjectState, Recovery, Seed, Store,
    StoreConfig,
};
use serde_json::{json, Value};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let store = open_store(&cli).await?;
    let format = cli.format;
    match cli.command {
        Command::Create(args) => cmd_create(&store, args, format).await,
        Command::Get(args) => cmd_get(&store, args, format).await,
        Command::Log(args) => cmd_log(&store, args, format).await,
        Command::Set(args) => cmd_set(&store, args, format).await,
        Command::Index(args) => match args.action {
            IndexAction::Add { id, keys } => cmd_index_add(&store, id, keys, format).await,
            IndexAction::Get { key } => cmd_index_get(&store, key, format).await,
        },
        Command::Recover(args) => cmd_recover(&store, args, format).await,
    }
}

async fn open_store(cli: &Cli) -> anyhow::Result<Store> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => StoreConfig::default(),
    };
    if let Some(root) = &cli.root {
        config = config.with_root(root);
    }
    let root = config.root.clone();
    Store::open(config)
        .await
        .with_context(|| format!("opening store at {}", root.display()))
}

async fn cmd_create(store: &Store, args: CreateArgs, format: OutputFormat) -> anyhow::Result<()> {
    let fields = args
        .fields
        .iter()
        .map(String::as_str)
        .map(parse_field)
        .collect::<anyhow::Result<Vec<_>>>()?;
    let seed = if fields.is_empty() {
        Seed::Empty
    } else {
        Seed::FromFields(fields)
    };
    let handle = store.create(seed).await?;

    match format {
        OutputFormat::Json => print_json(&json!({ "id": handle.id() }))?,
        OutputFormat::Text => {
            println!("{} Created {}", "✓".green().bold(), handle.id().as_str().yellow());
            println!("  Path: {}", handle.path().display());
        }
    }
    Ok(())
}

async fn cmd_get(store: &Store, args: GetArgs, format: OutputFormat) -> anyhow::Result<()> {
    let id = ObjectId::new(args.id)?;
    let state = store.read(&id).await?;
    match format {
        OutputFormat::Json => print_json(&json!(state))?,
        OutputFormat::Text => print_state(&id, &state),
    }
    Ok(())
}

async fn cmd_log(store: &Store, args: LogArgs, format: OutputFormat) -> anyhow::Result<()> {
    let id = ObjectId::new(args.id)?;
    let entries = store.log(&id).await?;
    match format {
        OutputFormat::Json => print_json(&json!(entries))?,
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("No changes recorded for {}.", id.as_str().yellow());
            }
            for entry in &entries {
                match entry {
                    LogEntry::Change(change) => println!(
                        "{}  {} = {}",
                        change.time.to_string().dimmed(),
                        change.field.bold(),
                        change.value
                    ),
                    LogEntry::Raw(line) => println!("{}  {}", "unreadable".red(), line),
                }
            }
        }
    }
    Ok(())
}

async fn cmd_set(store: &Store, args: SetArgs, format: OutputFormat) -> anyhow::Result<()> {
    let id = ObjectId::new(args.id)?;
    let change = store.update(&id, &args.field, parse_value(&args.value)).await?;
    match format {
        OutputFormat::Json => print_json(&json!(change))?,
        OutputFormat::Text => println!(
            "{} {}.{} = {}",
            "✓".green().bold(),
            id.as_str().yellow(),
            change.field.bold(),
            change.value
        ),
    }
    Ok(())
}

async fn cmd_index_add(
    store: &Store,
    id: String,
    keys: Vec<String>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let id = ObjectId::new(id)?;
    let keys = parse_keys(&keys)?;
    store.index_append_all(&id, &keys).await?;

    match format {
        OutputFormat::Json => print_json(&json!({ "id": id, "keys": keys }))?,
        OutputFormat::Text => {
            for key in &keys {
                println!("  {} {} → {}", "indexed:".green(), id.as_str().yellow(), key.as_str().cyan());
            }
        }
    }
    Ok(())
}

async fn cmd_index_get(store: &Store, key: String, format: OutputFormat) -> anyhow::Result<()> {
    let key = IndexKey::new(key)?;
    let ids = store.index_lookup(&key).await?;
    match format {
        OutputFormat::Json => print_json(&json!(ids))?,
        OutputFormat::Text => {
            if ids.is_empty() {
                println!("No entries under {}.", key.as_str().cyan());
            }
            for id in &ids {
                println!("{}", id.as_str().yellow());
            }
        }
    }
    Ok(())
}

async fn cmd_recover(store: &Store, args: RecoverArgs, format: OutputFormat) -> anyhow::Result<()> {
    let audit_dir = partition::log_dir(&args.from);
    let report = Recovery::rebuild(&audit_dir, store)
        .await
        .with_context(|| format!("replaying audit log in {}", audit_dir.display()))?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "files": report.files,
            "object_records": report.object_records,
            "index_records": report.index_records,
            "skipped": report.skipped,
        }))?,
        OutputFormat::Text => {
            println!("{} Recovered into {}", "✓".green().bold(), store.root().display());
            println!("  Audit files: {}", report.files.to_string().bold());
            println!("  Object changes: {}", report.object_records);
            println!("  Index entries: {}", report.index_records);
            if report.skipped > 0 {
                println!("  Skipped lines: {}", report.skipped.to_string().red());
            }
        }
    }
    Ok(())
}

fn print_state(id: &ObjectId, state: &ObjectState) {
    println!("Object {}", id.as_str().yellow().bold());
    if state.is_empty() {
        println!("  (no fields)");
    }
    for (field, value) in state {
        println!("  {}: {}", field.bold(), value);
    }
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Command-line values are JSON when they parse as JSON, otherwise a string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn parse_field(raw: &str) -> anyhow::Result<(String, Value)> {
    let (name, value) = raw
        .split_once('=')
        .with_context(|| format!("field `{raw}` must be written as NAME=VALUE"))?;
    Ok((name.to_string(), parse_value(value)))
}

/// Key arguments are plain keys, or JSON arrays (possibly nested) of keys.
fn parse_keys(raw: &[String]) -> anyhow::Result<Vec<IndexKey>> {
    let mut keys = Vec::new();
    for arg in raw {
        if arg.starts_with('[') {
            let value: Value = serde_json::from_str(arg)
                .with_context(|| format!("key list `{arg}` is not valid JSON"))?;
            keys.extend(flatten_keys(&value)?);
        } else {
            keys.push(IndexKey::new(arg.as_str())?);
        }
    }
    Ok(keys)
}
