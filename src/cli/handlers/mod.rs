use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::recovery::{self, read_recovery_entries, recovery_log_path};
use crate::model::note::NoteUpdate;
use crate::model::notebook::{NoteRef, Notebook};
use crate::model::record::{Record, normalize_color};
use crate::ops::reconcile::DeletePolicy;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let dir = notebook_dir(cli.dir.as_deref())?;
    debug!("notebook directory: {}", dir.display());

    match cli.command {
        Commands::Refresh => cmd_refresh(&dir, json),

        // Read commands
        Commands::List(args) => cmd_list(&dir, args, json),
        Commands::Show(args) => cmd_show(&dir, args, json),
        Commands::Tags => cmd_tags(&dir, json),
        Commands::Labels => cmd_labels(&dir, json),

        // Write commands
        Commands::Add(args) => cmd_add(&dir, args, json),
        Commands::Edit(args) => cmd_edit(&dir, args),
        Commands::Delete(args) => cmd_delete(&dir, args),
        Commands::Swap(args) => cmd_swap(&dir, args),

        Commands::Recovery(args) => cmd_recovery(&dir, args, json),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn notebook_dir(dir: Option<&str>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match dir {
        Some(dir) => {
            let path = PathBuf::from(dir);
            if !path.is_dir() {
                return Err(format!("not a directory: {}", dir).into());
            }
            Ok(path)
        }
        None => Ok(std::env::current_dir()?),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `--color` value; an unusable token is an error
fn color_arg(color: &str) -> Result<String, Box<dyn std::error::Error>> {
    normalize_color(color).ok_or_else(|| format!("invalid color: {:?}", color).into())
}

/// A creation timestamp no other note has: now, or the next free second
fn fresh_timestamp(notebook: &Notebook) -> i64 {
    let mut ts = Utc::now().timestamp();
    while notebook.find(ts).is_some() {
        ts += 1;
    }
    ts
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

fn cmd_refresh(dir: &Path, json: bool) -> CmdResult {
    let mut notebook = Notebook::new(dir, crate::io::load_config(dir)?);
    let report = notebook.refresh()?;
    if json {
        print_json(&refresh_to_json(&report))
    } else {
        println!("{}", format_refresh(&report));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(dir: &Path, args: ListArgs, json: bool) -> CmdResult {
    let notebook = Notebook::load(dir)?;
    let query = args.query.join(" ");
    let filtered = notebook.filter(&query);

    if json {
        let notes = filtered
            .notes
            .iter()
            .map(|n| note_to_json(n, notebook.position(n.timestamp()).unwrap_or(0) + 1))
            .collect();
        return print_json(&NoteListJson {
            notes,
            query_error: filtered.error.map(|e| e.to_string()),
        });
    }

    if let Some(ref e) = filtered.error {
        eprintln!("warning: query not applied: {}", e);
    }
    let width = notebook.config().display.preview_width;
    for note in &filtered.notes {
        if args.full {
            let position = notebook.position(note.timestamp()).unwrap_or(0) + 1;
            for line in format_note_detail(note, position) {
                println!("{}", line);
            }
            println!();
        } else {
            println!("{}", format_note_line(note, width));
        }
    }
    Ok(())
}

fn cmd_show(dir: &Path, args: ShowArgs, json: bool) -> CmdResult {
    let notebook = Notebook::load(dir)?;
    let idx = notebook.resolve(NoteRef::Timestamp(args.timestamp))?;
    let note = &notebook.notes()[idx];
    if json {
        return print_json(&note_to_json(note, idx + 1));
    }
    for line in format_note_detail(note, idx + 1) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_tags(dir: &Path, json: bool) -> CmdResult {
    let notebook = Notebook::load(dir)?;
    if json {
        return print_json(&counts_to_json(notebook.tags()));
    }
    for line in format_counts(notebook.tags()) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_labels(dir: &Path, json: bool) -> CmdResult {
    let notebook = Notebook::load(dir)?;
    let flat = notebook.labels_flatten();
    if json {
        return print_json(&counts_to_json(&flat));
    }
    for line in format_counts(&flat) {
        println!("{}", line);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_add(dir: &Path, args: AddArgs, json: bool) -> CmdResult {
    let mut notebook = Notebook::open(dir)?;
    let ts = fresh_timestamp(&notebook);

    let mut record = Record::new(ts, args.text.trim_end())
        .with_tags(&args.tags)
        .with_labels(&args.labels);
    if let Some(color) = args.color {
        record = record.with_color(color_arg(&color)?);
    }
    notebook.add_note(record, true)?;
    notebook.refresh()?;

    if json {
        let idx = notebook.resolve(NoteRef::Timestamp(ts))?;
        return print_json(&note_to_json(&notebook.notes()[idx], idx + 1));
    }
    println!("{}", ts);
    Ok(())
}

fn cmd_edit(dir: &Path, args: EditArgs) -> CmdResult {
    let mut update = NoteUpdate::new();
    if let Some(content) = args.content {
        update = update.content(content.trim_end());
    }
    if args.clear_tags {
        update = update.tags(Vec::<String>::new());
    } else if !args.tags.is_empty() {
        update = update.tags(args.tags);
    }
    if args.clear_labels {
        update = update.labels(Vec::<String>::new());
    } else if !args.labels.is_empty() {
        update = update.labels(args.labels);
    }
    if args.clear_color {
        update = update.color(None);
    } else if let Some(color) = args.color {
        update = update.color(Some(color_arg(&color)?));
    }
    if update.is_empty() {
        return Err("nothing to change (see cardbox edit --help)".into());
    }

    let mut notebook = Notebook::open(dir)?;
    notebook.update_note(NoteRef::Timestamp(args.timestamp), update, true)?;
    notebook.refresh()?;
    Ok(())
}

fn cmd_delete(dir: &Path, args: DeleteArgs) -> CmdResult {
    let mut notebook = Notebook::open(dir)?;
    notebook.mark_deleted(args.timestamp)?;
    // Pending deletes do not outlive the process
    notebook.refresh_with(DeletePolicy::Purge)?;
    Ok(())
}

fn cmd_swap(dir: &Path, args: SwapArgs) -> CmdResult {
    let mut notebook = Notebook::open(dir)?;
    notebook.swap(NoteRef::Timestamp(args.a), NoteRef::Timestamp(args.b))?;
    notebook.refresh()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Recovery log
// ---------------------------------------------------------------------------

fn cmd_recovery(dir: &Path, args: RecoveryCmd, json: bool) -> CmdResult {
    match args.action {
        Some(RecoveryAction::Path) => {
            println!("{}", recovery_log_path(dir).display());
            Ok(())
        }
        Some(RecoveryAction::Prune(prune)) => {
            let before = match prune.before {
                Some(ref s) => Some(
                    DateTime::parse_from_rfc3339(s)
                        .map_err(|e| format!("invalid --before '{}': {}", s, e))?
                        .with_timezone(&Utc),
                ),
                None => None,
            };
            let removed = recovery::prune_recovery(dir, before, prune.all)?;
            println!("pruned {} entries", removed);
            Ok(())
        }
        None => {
            let entries = read_recovery_entries(dir, Some(args.limit.unwrap_or(10)));
            if json {
                return print_json(&entries);
            }
            if entries.is_empty() {
                println!("recovery log is empty");
            }
            for entry in &entries {
                print!("{}", entry.display());
            }
            Ok(())
        }
    }
}
