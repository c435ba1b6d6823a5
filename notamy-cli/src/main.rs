//! `notamy`: keep tagged, hierarchical notes in a single compressed file.

mod editor;
mod prompt;
mod settings;

use clap::{Args, Parser, Subcommand, ValueEnum};
use notamy_core::{
    backup, hash_password, render_note, render_outline, verify_password, DateRange,
    DeleteStrategy, MatchField, NodeKey, NoteChanges, NoteRecord, Notebook, NotamyError,
    OutlineEntry, RenderStyle, Session, TagSpec,
};
use settings::AppSettings;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// NotaMy note keeper.
#[derive(Parser)]
#[command(name = "notamy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Note file to use instead of the configured one
    #[arg(global = true, long, value_name = "PATH")]
    store: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a note; `-t child>parent` places it under an existing tag
    Add(FieldArgs),

    /// Show every note, or the outline of tags
    View {
        #[arg(value_enum)]
        target: ViewTarget,
        #[command(flatten)]
        display: DisplayArgs,
    },

    /// Search by tag, hash, date range or keywords
    Find {
        #[command(flatten)]
        key: FindKey,
        #[command(flatten)]
        display: DisplayArgs,
    },

    /// Change the fields of the note with the given hash
    Modify {
        hash: String,
        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Move a note under another note, or one place `up` / `down`
    Organize { hash: String, destination: String },

    /// Remove a note and everything below it
    Remove {
        #[command(flatten)]
        key: RemoveKey,
        /// Keep the children, moving them up one level
        #[arg(long)]
        promote: bool,
    },

    /// List registered note files, or register one
    Files {
        #[arg(long, value_name = "PATH")]
        add: Option<String>,
        #[arg(short, long, default_value = "")]
        comment: String,
    },

    /// Switch to the registered note file at INDEX
    Setting { index: usize },

    /// Set the body editor (`nul` reads standard input)
    Editor { name: String },

    /// Copy the note file to `<file>_Backup`
    Backup,
}

#[derive(Args, Debug, Default)]
struct FieldArgs {
    #[arg(short, long)]
    tag: Option<String>,
    #[arg(short, long)]
    comment: Option<String>,
    #[arg(short, long)]
    keywords: Option<String>,
    /// Path of a file linked to the note
    #[arg(short = 'f', long = "file")]
    link_file: Option<String>,
    /// Write a body with the configured editor
    #[arg(short, long)]
    body: bool,
    /// Read the body from standard input
    #[arg(short = 'i', long = "input")]
    stdin: bool,
    /// Encrypt comment, linked file and body
    #[arg(short, long)]
    protect: bool,
}

#[derive(Args, Debug, Default)]
struct DisplayArgs {
    /// Include hashes, dates and linked files
    #[arg(short, long)]
    extended: bool,
    /// Show every field and the body
    #[arg(long)]
    full: bool,
    /// Ask for the password and open protected notes
    #[arg(short = 'p', long = "password")]
    unlock: bool,
}

impl DisplayArgs {
    fn style(&self) -> RenderStyle {
        if self.full {
            RenderStyle::Full
        } else if self.extended {
            RenderStyle::Extended
        } else {
            RenderStyle::Summary
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ViewTarget {
    Notes,
    Tags,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct FindKey {
    /// Tag prefix; append `+` for the subtree or `-` for direct children
    #[arg(short, long)]
    tag: Option<String>,
    /// Hash prefix, with the same `+` / `-` suffixes
    #[arg(short = 'H', long)]
    hash: Option<String>,
    /// `3D`, `2M`, `2025-07`, `2025-07-01 to 2025-07-15`, ...
    #[arg(short, long)]
    date: Option<String>,
    /// Words that must each prefix one of the note's keywords
    #[arg(short, long)]
    keywords: Option<String>,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct RemoveKey {
    #[arg(short = 'H', long)]
    hash: Option<String>,
    #[arg(short, long)]
    tag: Option<String>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] NotamyError),

    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("cannot capture body: {0}")]
    Body(#[from] std::io::Error),

    #[error("{0}")]
    Settings(String),
}

impl CliError {
    fn user_message(&self) -> String {
        match self {
            Self::Core(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("command failed: {e:?}");
            eprintln!("notamy: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut settings = settings::load_settings();
    let store = cli
        .store
        .unwrap_or_else(|| PathBuf::from(&settings.note_file));

    match cli.command {
        Commands::Files { add, comment } => files(&mut settings, add, comment),
        Commands::Setting { index } => {
            let entry = settings.select_file(index).map_err(CliError::Settings)?;
            println!("using {}", entry.path);
            settings::save_settings(&settings).map_err(CliError::Settings)
        }
        Commands::Editor { name } => {
            settings.editor = name;
            settings::save_settings(&settings).map_err(CliError::Settings)?;
            println!("editor set to {}", settings.editor);
            Ok(())
        }
        Commands::Backup => {
            let target = backup(&store)?;
            println!("backup written to {}", target.display());
            Ok(())
        }
        command => with_notebook(&store, |notebook| {
            execute(notebook, command, &mut settings)
        }),
    }
}

/// Opens the working copy of `store`, runs `f`, and closes the session.
///
/// On error the session is dropped unclosed, leaving `store` untouched.
fn with_notebook<F>(store: &Path, f: F) -> Result<(), CliError>
where
    F: FnOnce(&mut Notebook) -> Result<(), CliError>,
{
    let session = Session::open(store)?;
    let mut notebook = Notebook::open(session.working_path())?;
    f(&mut notebook)?;
    let rewritten = session.close()?;
    tracing::debug!("closed {} (rewritten: {rewritten})", store.display());
    Ok(())
}

fn execute(
    notebook: &mut Notebook,
    command: Commands,
    settings: &mut AppSettings,
) -> Result<(), CliError> {
    match command {
        Commands::Add(fields) => add(notebook, &fields, settings),
        Commands::View { target, display } => {
            let password = unlock(settings, display.unlock)?;
            match target {
                ViewTarget::Tags => print!("{}", render_outline(notebook.tree(), display.extended)),
                ViewTarget::Notes => {
                    print_entries(&notebook.view_all(password.as_deref())?, display.style())
                }
            }
            Ok(())
        }
        Commands::Find { key, display } => {
            let password = unlock(settings, display.unlock)?;
            let password = password.as_deref();
            let entries = if let Some(tag) = &key.tag {
                notebook.find_by_key(tag, MatchField::Tag, password)?
            } else if let Some(hash) = &key.hash {
                notebook.find_by_key(hash, MatchField::Hash, password)?
            } else if let Some(date) = &key.date {
                notebook.find_by_date(&DateRange::parse(date)?, password)?
            } else if let Some(words) = &key.keywords {
                notebook.find_by_keywords(words, password)?
            } else {
                Vec::new()
            };
            if entries.is_empty() {
                println!("no matching notes");
            } else {
                print_entries(&entries, display.style());
            }
            Ok(())
        }
        Commands::Modify { hash, fields } => modify(notebook, &hash, &fields, settings),
        Commands::Organize { hash, destination } => {
            notebook.organize(&hash, &destination)?;
            println!("moved {hash}");
            Ok(())
        }
        Commands::Remove { key, promote } => {
            let strategy = if promote {
                DeleteStrategy::PromoteChildren
            } else {
                DeleteStrategy::DeleteAll
            };
            let node_key = match (key.hash, key.tag) {
                (Some(hash), _) => NodeKey::Hash(hash),
                (None, Some(tag)) => NodeKey::Tag(tag),
                (None, None) => {
                    let message = "a tag or hash is required".to_string();
                    return Err(NotamyError::ValidationFailed(message).into());
                }
            };
            match disambiguate(node_key, |k| notebook.remove(k, strategy))? {
                Some(result) => {
                    println!("removed {} note(s)", result.deleted_count);
                    for hash in &result.affected_hashes {
                        println!("  {hash}");
                    }
                }
                None => println!("nothing removed"),
            }
            Ok(())
        }
        Commands::Files { .. }
        | Commands::Setting { .. }
        | Commands::Editor { .. }
        | Commands::Backup => Ok(()),
    }
}

fn add(
    notebook: &mut Notebook,
    fields: &FieldArgs,
    settings: &mut AppSettings,
) -> Result<(), CliError> {
    let spec = fields.tag.as_deref().map(TagSpec::parse).transpose()?;
    let password = unlock(settings, fields.protect)?;
    let body = capture(settings, fields, "")?;

    let draft = NoteRecord {
        tag: spec.as_ref().map(|s| s.tag.clone()).unwrap_or_default(),
        comment: fields.comment.clone().unwrap_or_default(),
        keywords: fields.keywords.clone().unwrap_or_default(),
        link_file: fields.link_file.clone().unwrap_or_default(),
        body: body.filter(|b| !b.is_empty()),
        ..NoteRecord::default()
    };

    let added = match spec.and_then(|s| s.parent) {
        Some(parent) => disambiguate(NodeKey::Tag(parent), |k| {
            notebook.add_note(draft.clone(), Some(k), password.as_deref())
        })?,
        None => Some(notebook.add_note(draft, None, password.as_deref())?),
    };
    match added {
        Some(hash) => println!("{hash}"),
        None => println!("nothing added"),
    }
    Ok(())
}

fn modify(
    notebook: &mut Notebook,
    hash: &str,
    fields: &FieldArgs,
    settings: &mut AppSettings,
) -> Result<(), CliError> {
    let password = unlock(settings, fields.protect)?;

    // Seed the editor with the current body when it can be read.
    let initial = if fields.body && !fields.stdin && !settings.uses_stdin() {
        let id = notebook.resolve(&NodeKey::Hash(hash.to_string()))?;
        let view = notebook.note_view(id, password.as_deref())?;
        if view.record.protected && password.is_none() {
            String::new()
        } else {
            view.record.body.unwrap_or_default()
        }
    } else {
        String::new()
    };

    let changes = NoteChanges {
        tag: fields.tag.clone(),
        comment: fields.comment.clone(),
        keywords: fields.keywords.clone(),
        link_file: fields.link_file.clone(),
        body: capture(settings, fields, &initial)?,
    };
    notebook.modify(hash, &changes, password.as_deref())?;
    println!("modified {hash}");
    Ok(())
}

fn files(settings: &mut AppSettings, add: Option<String>, comment: String) -> Result<(), CliError> {
    if let Some(path) = add {
        settings.register_file(path, comment);
        settings::save_settings(settings).map_err(CliError::Settings)?;
    }
    for (index, entry) in settings.note_files.iter().enumerate() {
        let active = if entry.path == settings.note_file { "*" } else { " " };
        println!("{active}{index:>3}  {}  {}", entry.path, entry.comment);
    }
    Ok(())
}

fn print_entries(entries: &[OutlineEntry], style: RenderStyle) {
    for entry in entries {
        print!("{}", render_note(&entry.view, &entry.flags, style));
    }
}

fn capture(
    settings: &AppSettings,
    fields: &FieldArgs,
    initial: &str,
) -> Result<Option<String>, CliError> {
    if !fields.body && !fields.stdin {
        return Ok(None);
    }
    let from_stdin = fields.stdin || settings.uses_stdin();
    Ok(Some(editor::capture_body(&settings.editor, from_stdin, initial)?))
}

/// Reads and checks the protection password when `wanted`.
///
/// The first password ever entered becomes the stored one.
fn unlock(settings: &mut AppSettings, wanted: bool) -> Result<Option<String>, CliError> {
    if !wanted {
        return Ok(None);
    }
    let first_use = settings.password_hash.is_empty();
    let password = prompt::read_password(first_use)?;
    if first_use {
        settings.password_hash = hash_password(&password);
        settings::save_settings(settings).map_err(CliError::Settings)?;
    } else if !verify_password(&password, &settings.password_hash) {
        return Err(NotamyError::WrongPassword.into());
    }
    Ok(Some(password))
}

/// Runs `op` with `key`; if a tag is ambiguous, asks for a hash and runs it
/// again. `None` means the user declined to choose.
fn disambiguate<T>(
    key: NodeKey,
    mut op: impl FnMut(&NodeKey) -> notamy_core::Result<T>,
) -> Result<Option<T>, CliError> {
    match op(&key) {
        Err(NotamyError::Ambiguous { key, candidates }) => {
            match prompt::choose_hash(&key, &candidates)? {
                Some(hash) => Ok(Some(op(&NodeKey::Hash(hash))?)),
                None => Ok(None),
            }
        }
        other => Ok(Some(other?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add_with_parent() {
        let args = ["notamy", "add", "-t", "db>work", "-c", "notes", "-i", "-p"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Add(fields) => {
                assert_eq!(fields.tag.as_deref(), Some("db>work"));
                assert!(fields.stdin);
                assert!(fields.protect);
                assert!(!fields.body);
            }
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn test_find_needs_exactly_one_key() {
        assert!(Cli::try_parse_from(["notamy", "find"]).is_err());
        assert!(Cli::try_parse_from(["notamy", "find", "-t", "a", "-k", "b"]).is_err());
        let cli = Cli::try_parse_from(["notamy", "find", "-d", "3D", "-e"]).unwrap();
        match cli.command {
            Commands::Find { key, display } => {
                assert_eq!(key.date.as_deref(), Some("3D"));
                assert_eq!(display.style(), RenderStyle::Extended);
            }
            _ => panic!("expected find"),
        }
    }

    #[test]
    fn test_parse_remove_and_view() {
        let args = ["notamy", "--verbose", "remove", "-t", "old", "--promote"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Remove { promote: true, .. }));

        let cli = Cli::try_parse_from(["notamy", "view", "tags", "--store", "/tmp/n.X"]).unwrap();
        assert_eq!(cli.store, Some(PathBuf::from("/tmp/n.X")));
        assert!(matches!(cli.command, Commands::View { target: ViewTarget::Tags, .. }));
    }

    #[test]
    fn test_with_notebook_compresses_on_change() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = dir.path().join("notes.X");
        with_notebook(&store, |notebook| {
            notebook.add_note(
                NoteRecord {
                    tag: "first".into(),
                    comment: "hello".into(),
                    ..NoteRecord::default()
                },
                None,
                None,
            )?;
            Ok(())
        })
        .unwrap();

        let raw = std::fs::read(&store).unwrap();
        assert!(raw.starts_with(b"HUFF"));

        with_notebook(&store, |notebook| {
            let id = notebook.resolve(&NodeKey::Tag("first".into()))?;
            assert_eq!(notebook.read_note(id)?.comment, "hello");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_failed_command_leaves_store_untouched() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = dir.path().join("notes.X");
        with_notebook(&store, |notebook| {
            let draft = NoteRecord {
                tag: "a".into(),
                ..NoteRecord::default()
            };
            notebook.add_note(draft, None, None)?;
            Ok(())
        })
        .unwrap();
        let before = std::fs::read(&store).unwrap();

        let result = with_notebook(&store, |notebook| {
            notebook.organize("ffffffff", "up")?;
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(std::fs::read(&store).unwrap(), before);
    }
}
