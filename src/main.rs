//! relmap CLI - Command line interface for relmap
//!
//! Every data command acts for one user (`--user` or `RELMAP_USER`) and prints
//! a single document on stdout, JSON by default or indented `key: value`
//! text. Logs go to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use relmap::{
    Config, Database, EntityId, GraphExport, ImportMode, NewEntity, NewRelation, RelationId,
    TypeKind, UserId, VersionId,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relmap")]
#[command(about = "A versioned, multi-tenant entity relation map")]
#[command(version)]
struct Cli {
    /// Path to the database file (overrides the config file)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// User to act as; required by every command except `init`
    #[arg(short, long, env = "RELMAP_USER")]
    user: Option<UserId>,

    /// Output format (json or text)
    #[arg(short, long, default_value = "json")]
    format: OutputFormat,

    /// Config file (defaults to the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" (RUST_LOG takes precedence)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum KindArg {
    Entity,
    Relation,
}

impl From<KindArg> for TypeKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Entity => TypeKind::Entity,
            KindArg::Relation => TypeKind::Relation,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new database
    Init,

    /// Manage entities
    #[command(subcommand)]
    Entity(EntityCommand),

    /// Manage relations
    #[command(subcommand)]
    Relation(RelationCommand),

    /// Manage entity and relation types
    Type {
        /// Which vocabulary to act on
        #[arg(short, long, value_enum, default_value = "entity", global = true)]
        kind: KindArg,

        #[command(subcommand)]
        command: TypeCommand,
    },

    /// Version history and restore
    #[command(subcommand)]
    Version(VersionCommand),

    /// Export the graph as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a JSON export
    Import {
        /// File produced by `export`
        file: PathBuf,
        /// Wipe the graph before importing
        #[arg(long)]
        replace: bool,
    },

    /// Delete all entities, relations and types (history is kept)
    Reset,

    /// Print the current graph snapshot
    Snapshot,
}

#[derive(Subcommand)]
enum EntityCommand {
    /// Create an entity
    Add {
        name: String,
        #[arg(short = 't', long = "type")]
        entity_type: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Get an entity by id
    Get { id: EntityId },
    /// List entities
    List {
        #[arg(long, default_value = "0")]
        skip: usize,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Update an entity; omitted fields keep their value
    Update {
        id: EntityId,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short = 't', long = "type")]
        entity_type: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete an entity and its relations
    Delete { id: EntityId },
}

#[derive(Subcommand)]
enum RelationCommand {
    /// Create a relation
    Add {
        source: EntityId,
        target: EntityId,
        #[arg(short = 't', long = "type")]
        relation_type: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Get a relation by id
    Get { id: RelationId },
    /// List relations
    List {
        #[arg(long, default_value = "0")]
        skip: usize,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Update a relation; omitted fields keep their value
    Update {
        id: RelationId,
        #[arg(long)]
        source: Option<EntityId>,
        #[arg(long)]
        target: Option<EntityId>,
        #[arg(short = 't', long = "type")]
        relation_type: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete a relation
    Delete { id: RelationId },
}

#[derive(Subcommand)]
enum TypeCommand {
    /// List type names
    List,
    /// Add a type
    Add { name: String },
    /// Rename a type and every row using it
    Rename { from: String, to: String },
    /// Delete a type; fails while rows use it unless `--cascade` is given
    Delete {
        name: String,
        /// Also delete the entities or relations carrying this type
        #[arg(long)]
        cascade: bool,
    },
}

#[derive(Subcommand)]
enum VersionCommand {
    /// List versions, newest first
    List,
    /// Show one version including its snapshot
    Show { id: VersionId },
    /// Record the current graph as a version
    Checkpoint { description: Option<String> },
    /// Restore the graph from a version
    Restore {
        id: VersionId,
        /// Skip the "Backup before restore" version
        #[arg(long)]
        no_backup: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = cli.format;

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let kind = err
                .downcast_ref::<relmap::Error>()
                .map(relmap::Error::kind)
                .unwrap_or("error");
            tracing::error!(error = %format!("{:#}", err), "command failed");
            // Best-effort: stdout may already be gone
            let _ = output(
                format,
                &json!({
                    "status": "error",
                    "kind": kind,
                    "message": format!("{:#}", err),
                }),
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    init_tracing(cli.log_level.as_deref().unwrap_or(&config.log_filter));

    let path = cli.database.clone().unwrap_or_else(|| config.database.clone());
    let format = cli.format;
    let user = || {
        cli.user.ok_or_else(|| {
            relmap::Error::Validation("no user given; pass --user or set RELMAP_USER".into())
        })
    };

    match cli.command {
        Commands::Init => {
            let db = Database::create(&path)?;
            db.sync()?;
            output(
                format,
                &json!({
                    "status": "ok",
                    "message": format!("Created database at {}", path.display())
                }),
            )?;
        }

        Commands::Entity(command) => {
            let user = user()?;
            let db = open_db(&path)?;
            entity_command(&db, user, format, command)?;
        }

        Commands::Relation(command) => {
            let user = user()?;
            let db = open_db(&path)?;
            relation_command(&db, user, format, command)?;
        }

        Commands::Type { kind, command } => {
            let user = user()?;
            let db = open_db(&path)?;
            let kind = TypeKind::from(kind);
            match command {
                TypeCommand::List => {
                    let names = db.list_types(user, kind)?;
                    output(
                        format,
                        &json!({ "kind": kind, "count": names.len(), "types": names }),
                    )?;
                }
                TypeCommand::Add { name } => {
                    let record = db.create_type(user, kind, &name)?;
                    output(format, &json!({ "status": "ok", "kind": kind, "type": record }))?;
                }
                TypeCommand::Rename { from, to } => {
                    let rewritten = db.rename_type(user, kind, &from, &to)?;
                    output(
                        format,
                        &json!({
                            "status": "ok",
                            "kind": kind,
                            "from": from,
                            "to": to,
                            "rewritten": rewritten
                        }),
                    )?;
                }
                TypeCommand::Delete { name, cascade: false } => {
                    db.delete_type(user, kind, &name)?;
                    output(format, &json!({ "status": "ok", "kind": kind, "deleted": name }))?;
                }
                TypeCommand::Delete {
                    name,
                    cascade: true,
                } => {
                    let removed = db.delete_type_cascade(user, kind, &name)?;
                    output(
                        format,
                        &json!({
                            "status": "ok",
                            "kind": kind,
                            "deleted": name,
                            "deleted_entities": removed.entities,
                            "deleted_relations": removed.relations
                        }),
                    )?;
                }
            }
        }

        Commands::Version(command) => {
            let user = user()?;
            let db = open_db(&path)?;
            version_command(&db, user, format, command, config.backup_on_restore)?;
        }

        Commands::Export { output: file } => {
            let user = user()?;
            let db = open_db(&path)?;
            let json = db.export(user).to_json()?;
            match file {
                Some(file) => {
                    std::fs::write(&file, json)
                        .with_context(|| format!("writing export to {}", file.display()))?;
                    output(
                        format,
                        &json!({ "status": "ok", "path": file.display().to_string() }),
                    )?;
                }
                None => println!("{}", json),
            }
        }

        Commands::Import { file, replace } => {
            let user = user()?;
            let db = open_db(&path)?;
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let data = GraphExport::from_json(&content)?;
            let mode = if replace {
                ImportMode::Replace
            } else {
                ImportMode::Merge
            };
            let report = db.import(user, &data, mode)?;
            output(format, &json!({ "status": "ok", "import": report }))?;
        }

        Commands::Reset => {
            let user = user()?;
            let db = open_db(&path)?;
            let counts = db.reset(user)?;
            output(
                format,
                &json!({
                    "status": "ok",
                    "entities": counts.entities,
                    "relations": counts.relations,
                    "entity_types": counts.entity_types,
                    "relation_types": counts.relation_types
                }),
            )?;
        }

        Commands::Snapshot => {
            let user = user()?;
            let db = open_db(&path)?;
            output(format, &serde_json::to_value(db.snapshot(user))?)?;
        }
    }

    Ok(())
}

fn entity_command(
    db: &Database,
    user: UserId,
    format: OutputFormat,
    command: EntityCommand,
) -> anyhow::Result<()> {
    match command {
        EntityCommand::Add {
            name,
            entity_type,
            description,
        } => {
            let entity = db.create_entity(
                user,
                NewEntity {
                    name,
                    entity_type,
                    description,
                },
            )?;
            output(format, &json!({ "status": "ok", "entity": entity }))
        }
        EntityCommand::Get { id } => output(format, &serde_json::to_value(db.get_entity(user, id)?)?),
        EntityCommand::List { skip, limit } => {
            let entities = db.list_entities(user, skip, limit);
            output(format, &json!({ "count": entities.len(), "entities": entities }))
        }
        EntityCommand::Update {
            id,
            name,
            entity_type,
            description,
        } => {
            let current = db.get_entity(user, id)?;
            let entity = db.update_entity(
                user,
                id,
                NewEntity {
                    name: name.unwrap_or(current.name),
                    entity_type: entity_type.unwrap_or(current.entity_type),
                    description: description.or(current.description),
                },
            )?;
            output(format, &json!({ "status": "ok", "entity": entity }))
        }
        EntityCommand::Delete { id } => {
            let entity = db.delete_entity(user, id)?;
            output(format, &json!({ "status": "ok", "id": entity.id }))
        }
    }
}

fn relation_command(
    db: &Database,
    user: UserId,
    format: OutputFormat,
    command: RelationCommand,
) -> anyhow::Result<()> {
    match command {
        RelationCommand::Add {
            source,
            target,
            relation_type,
            description,
        } => {
            let relation = db.create_relation(
                user,
                NewRelation {
                    source_id: source,
                    target_id: target,
                    relation_type,
                    description,
                },
            )?;
            output(format, &json!({ "status": "ok", "relation": relation }))
        }
        RelationCommand::Get { id } => {
            output(format, &serde_json::to_value(db.get_relation(user, id)?)?)
        }
        RelationCommand::List { skip, limit } => {
            let relations = db.list_relations(user, skip, limit);
            output(format, &json!({ "count": relations.len(), "relations": relations }))
        }
        RelationCommand::Update {
            id,
            source,
            target,
            relation_type,
            description,
        } => {
            let current = db.get_relation(user, id)?;
            let relation = db.update_relation(
                user,
                id,
                NewRelation {
                    source_id: source.unwrap_or(current.source_id),
                    target_id: target.unwrap_or(current.target_id),
                    relation_type: relation_type.unwrap_or(current.relation_type),
                    description: description.or(current.description),
                },
            )?;
            output(format, &json!({ "status": "ok", "relation": relation }))
        }
        RelationCommand::Delete { id } => {
            let relation = db.delete_relation(user, id)?;
            output(format, &json!({ "status": "ok", "id": relation.id }))
        }
    }
}

fn version_command(
    db: &Database,
    user: UserId,
    format: OutputFormat,
    command: VersionCommand,
    backup_on_restore: bool,
) -> anyhow::Result<()> {
    match command {
        VersionCommand::List => {
            let versions = db.list_versions(user);
            output(format, &json!({ "count": versions.len(), "versions": versions }))
        }
        VersionCommand::Show { id } => {
            let version = db
                .get_version(user, id)?
                .ok_or_else(|| relmap::Error::NotFound(format!("Version {} not found", id)))?;
            output(
                format,
                &json!({
                    "id": version.id,
                    "version_number": version.version_number,
                    "created_at": version.created_at,
                    "description": version.description,
                    "created_by": version.created_by,
                    "snapshot_hash": version.snapshot_hash.to_hex(),
                    "snapshot": version.snapshot
                }),
            )
        }
        VersionCommand::Checkpoint { description } => {
            let version = db.checkpoint(user, description.as_deref())?;
            output(format, &json!({ "status": "ok", "version": version.summary() }))
        }
        VersionCommand::Restore { id, no_backup } => {
            let version = db.restore_version(user, id, backup_on_restore && !no_backup)?;
            output(format, &json!({ "status": "ok", "version": version.summary() }))
        }
    }
}

fn open_db(path: &Path) -> anyhow::Result<Database> {
    Database::open_or_create(path)
        .with_context(|| format!("opening database {}", path.display()))
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn output(format: OutputFormat, value: &Value) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
        OutputFormat::Text => {
            let mut text = String::new();
            render_text(value, 0, &mut text);
            print!("{}", text);
        }
    }
    Ok(())
}

/// Indented `key: value` lines; list items start with `-`
fn render_text(value: &Value, depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    match value {
        Value::Object(map) => {
            for (key, item) in map {
                if is_nested(item) {
                    out.push_str(&format!("{}{}:\n", pad, key));
                    render_text(item, depth + 1, out);
                } else {
                    out.push_str(&format!("{}{}: {}\n", pad, key, scalar_text(item)));
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                if is_nested(item) {
                    out.push_str(&format!("{}-\n", pad));
                    render_text(item, depth + 1, out);
                } else {
                    out.push_str(&format!("{}- {}\n", pad, scalar_text(item)));
                }
            }
        }
        _ => out.push_str(&format!("{}{}\n", pad, scalar_text(value))),
    }
}

fn is_nested(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => false,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        Value::Array(_) | Value::Object(_) => "(none)".to_string(),
        other => other.to_string(),
    }
}
