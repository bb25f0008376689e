//! Command-line front-end for project annotations.
//!
//! Every command opens the SQLite-backed store, loads the selected project and
//! prints JSON on stdout.

use anyhow::{bail, Context, Result};
use bimnote_core::config::DEFAULT_PROJECT_ID;
use bimnote_core::project::{projects_under, validate_project_id};
use bimnote_core::{
    core_version, default_log_level, init_logging, Anchor, AnnotationKind, AnnotationPatch,
    AnnotationService, AnnotationStatus, CoreConfig, KvStore, LoadOutcome, NewAnnotation,
    PersistOutcome, ProjectLayout, Severity, SqliteKvStore, Vec3,
};
use clap::{Args, Parser, Subcommand};
use log::info;
use serde_json::json;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_DB_FILE_NAME: &str = "bimnote.sqlite3";

#[derive(Debug, Parser)]
#[command(name = "bimnote")]
#[command(about = "Manage BIM model annotations")]
pub struct Cli {
    /// SQLite database holding annotation blobs.
    #[arg(long, global = true, env = "BIMNOTE_DB", default_value = DEFAULT_DB_FILE_NAME)]
    db: PathBuf,
    /// JSON config file; defaults apply when omitted or absent.
    #[arg(long, global = true, env = "BIMNOTE_CONFIG")]
    config: Option<PathBuf>,
    /// Absolute directory for rotating log files; logging is off when unset.
    #[arg(long, global = true, env = "BIMNOTE_LOG_DIR")]
    log_dir: Option<String>,
    #[arg(long, global = true, env = "BIMNOTE_LOG_LEVEL")]
    log_level: Option<String>,
    /// Project whose annotations are addressed.
    #[arg(long, short, global = true, default_value = DEFAULT_PROJECT_ID)]
    project: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create an annotation.
    Add(AddArgs),
    /// Patch fields of an existing annotation.
    Update(UpdateArgs),
    /// Delete an annotation.
    Delete { id: String },
    /// Print one annotation.
    Get { id: String },
    /// Print all annotations of the project.
    List,
    /// Write the project's annotations as pretty JSON.
    Export {
        /// Output file; defaults to the configured export file name.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Merge annotations from an exported JSON file.
    Import { file: PathBuf },
    /// List projects with stored annotations and converted models.
    Projects,
    /// Show converted model paths and metadata for the project.
    Layout,
    /// Print CLI version.
    Version,
}

#[derive(Debug, Args)]
struct AnchorArgs {
    /// Anchor to a viewer object id.
    #[arg(long, conflicts_with = "world")]
    object_id: Option<String>,
    /// Anchor to a world position `x,y,z`.
    #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true)]
    world: Option<Vec3>,
}

impl AnchorArgs {
    fn into_anchor(self) -> Option<Anchor> {
        match (self.object_id, self.world) {
            (Some(object_id), _) => Some(Anchor::object(object_id)),
            (None, Some(world_pos)) => Some(Anchor::world(world_pos)),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Args)]
struct AddArgs {
    #[arg(long, default_value = "text")]
    kind: AnnotationKind,
    #[command(flatten)]
    anchor: AnchorArgs,
    #[arg(long, default_value = "")]
    author: String,
    #[arg(long, default_value = "")]
    comment: String,
    #[arg(long, default_value = "info")]
    severity: Severity,
    #[arg(long, default_value = "open")]
    status: AnnotationStatus,
}

#[derive(Debug, Args)]
struct UpdateArgs {
    id: String,
    #[command(flatten)]
    anchor: AnchorArgs,
    #[arg(long)]
    author: Option<String>,
    #[arg(long)]
    comment: Option<String>,
    #[arg(long)]
    severity: Option<Severity>,
    #[arg(long)]
    status: Option<AnnotationStatus>,
    /// Remove the stored camera viewpoint.
    #[arg(long)]
    clear_viewpoint: bool,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or_else(|| default_log_level());
        init_logging(level, log_dir).map_err(anyhow::Error::msg)?;
    }

    if matches!(cli.command, Commands::Version) {
        println!("{}", core_version());
        return Ok(());
    }

    validate_project_id(&cli.project)?;
    let config = match cli.config.as_deref() {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };

    if matches!(cli.command, Commands::Layout) {
        return run_layout(&config, &cli.project);
    }

    let backend = SqliteKvStore::open(&cli.db)
        .with_context(|| format!("failed to open database {}", cli.db.display()))?
        .with_quota(config.max_blob_bytes);
    let mut service = AnnotationService::with_config(backend, &config);
    let project = cli.project.as_str();

    match service.load_from_durable_storage(project) {
        LoadOutcome::Malformed => {
            eprintln!("warning: stored annotations for `{project}` are unreadable; starting empty");
        }
        LoadOutcome::Unavailable => {
            eprintln!("warning: could not read stored annotations for `{project}`");
        }
        LoadOutcome::Missing | LoadOutcome::Loaded { .. } => {}
    }
    info!("event=cli_command module=cli project={project}");

    match cli.command {
        Commands::Add(args) => {
            let Some(anchor) = args.anchor.into_anchor() else {
                bail!("add requires --object-id or --world");
            };
            let created = service.add(
                project,
                NewAnnotation {
                    kind: args.kind,
                    anchor,
                    author: args.author,
                    comment: args.comment,
                    severity: args.severity,
                    status: args.status,
                    viewpoint: None,
                },
            );
            ensure_persisted(&service)?;
            print_json(&created)
        }
        Commands::Update(args) => {
            let id = args.id.clone();
            let patch = AnnotationPatch {
                anchor: args.anchor.into_anchor(),
                author: args.author,
                comment: args.comment,
                severity: args.severity,
                status: args.status,
                viewpoint: args.clear_viewpoint.then_some(None),
            };
            let updated = service.update(project, &id, patch);
            ensure_persisted(&service)?;
            let Some(updated) = updated else {
                bail!("annotation not found: {id}");
            };
            print_json(&updated)
        }
        Commands::Delete { id } => {
            let deleted = service.delete(project, &id);
            ensure_persisted(&service)?;
            if !deleted {
                bail!("annotation not found: {id}");
            }
            print_json(&json!({ "deleted": id }))
        }
        Commands::Get { id } => match service.get(project, &id) {
            Some(annotation) => print_json(annotation),
            None => bail!("annotation not found: {id}"),
        },
        Commands::List => {
            let mut annotations = service.list();
            annotations.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            print_json(&annotations)
        }
        Commands::Export { output } => {
            let output = output.unwrap_or_else(|| PathBuf::from(&config.export_file_name));
            let exported = service.export_json()?;
            write_file(&output, &exported)?;
            println!("{}", output.display());
            Ok(())
        }
        Commands::Import { file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let summary = service
                .import_json(project, &raw)
                .with_context(|| format!("failed to import {}", file.display()))?;
            ensure_persisted(&service)?;
            print_json(&json!({
                "inserted": summary.inserted,
                "replaced": summary.replaced,
            }))
        }
        Commands::Projects => print_json(&json!({
            "annotated": service.stored_projects(),
            "converted": projects_under(&config.data_root),
        })),
        Commands::Layout | Commands::Version => Ok(()),
    }
}

fn run_layout(config: &CoreConfig, project: &str) -> Result<()> {
    let layout = ProjectLayout::new(&config.data_root, project)?;
    print_json(&json!({
        "projectId": layout.project_id(),
        "modelPath": layout.model_path(),
        "metadataPath": layout.metadata_path(),
        "hasModel": layout.has_model(),
        "metadata": layout.load_metadata(),
    }))
}

/// Surfaces a failed write-through to the shell; the service itself only logs.
fn ensure_persisted<S: KvStore>(service: &AnnotationService<S>) -> Result<()> {
    match service.last_persist() {
        Some(PersistOutcome::Failed { reason }) => bail!("annotations not saved: {reason}"),
        _ => Ok(()),
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn parse_vec3(value: &str) -> Result<Vec3, String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    let [x, y, z] = parts.as_slice() else {
        return Err(format!("expected `x,y,z`, got `{value}`"));
    };
    let parse = |part: &str| {
        part.parse::<f64>()
            .map_err(|err| format!("invalid coordinate `{part}`: {err}"))
    };
    Vec3::new(parse(x)?, parse(y)?, parse(z)?).map_err(|err| err.to_string())
}
