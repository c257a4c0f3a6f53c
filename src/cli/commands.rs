use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cardbox", about = concat!("cardbox v", env!("CARGO_PKG_VERSION"), " - notes in plain day files"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Notebook directory (default: current directory)
    #[arg(short = 'C', long = "dir", global = true)]
    pub dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load the day files and write back pending changes
    Refresh,
    /// List notes, optionally filtered by a query
    List(ListArgs),
    /// Show one note
    Show(ShowArgs),
    /// Add a note
    Add(AddArgs),
    /// Edit a note
    Edit(EditArgs),
    /// Delete a note
    Delete(DeleteArgs),
    /// Exchange the positions of two notes
    Swap(SwapArgs),
    /// List tags with their note counts
    Tags,
    /// List label paths with their note counts
    Labels,
    /// View or manage the recovery log
    Recovery(RecoveryCmd),
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListArgs {
    /// Query, e.g. `tag work and not label home`
    pub query: Vec<String>,
    /// Print full content instead of a one-line preview
    #[arg(long)]
    pub full: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Note timestamp
    pub timestamp: i64,
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddArgs {
    /// Note content
    pub text: String,
    /// Tag (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// Label path (repeatable)
    #[arg(long = "label")]
    pub labels: Vec<String>,
    /// Display color
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args)]
pub struct EditArgs {
    /// Note timestamp
    pub timestamp: i64,
    /// Replace the content
    #[arg(long)]
    pub content: Option<String>,
    /// Replace the tags (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// Remove all tags
    #[arg(long, conflicts_with = "tags")]
    pub clear_tags: bool,
    /// Replace the labels (repeatable)
    #[arg(long = "label")]
    pub labels: Vec<String>,
    /// Remove all labels
    #[arg(long, conflicts_with = "labels")]
    pub clear_labels: bool,
    /// Set the display color
    #[arg(long)]
    pub color: Option<String>,
    /// Remove the display color
    #[arg(long, conflicts_with = "color")]
    pub clear_color: bool,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Note timestamp
    pub timestamp: i64,
}

#[derive(Args)]
pub struct SwapArgs {
    /// Timestamp of the first note
    pub a: i64,
    /// Timestamp of the second note
    pub b: i64,
}

// ---------------------------------------------------------------------------
// Recovery log
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct RecoveryCmd {
    #[command(subcommand)]
    pub action: Option<RecoveryAction>,
    /// Maximum number of entries to show (default: 10)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand)]
pub enum RecoveryAction {
    /// Remove old entries
    Prune(RecoveryPruneArgs),
    /// Print the path to the recovery log
    Path,
}

#[derive(Args)]
pub struct RecoveryPruneArgs {
    /// Remove entries older than this timestamp (RFC 3339, default: 30 days ago)
    #[arg(long)]
    pub before: Option<String>,
    /// Remove all entries
    #[arg(long)]
    pub all: bool,
}
