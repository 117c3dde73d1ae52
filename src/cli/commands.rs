use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gk", about = concat!("goalkeeper v", env!("CARGO_PKG_VERSION"), " - goals ranked by priority and cost"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different directory
    #[arg(short = 'C', long = "project-dir", global = true)]
    pub project_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List goals in display order
    List(ListArgs),
    /// Add a goal
    Add(AddArgs),
    /// Change the goal shown at a position
    Edit(EditArgs),
    /// Delete the goal shown at a position
    Delete(DeleteArgs),
    /// Show or set the saved sort order
    Sort(SortArgs),
    /// Show or change display options
    Set(SetArgs),
    /// Validate the goal file
    Check,
    /// View the recovery log
    Recovery(RecoveryCmd),
}

// ---------------------------------------------------------------------------
// View selection
// ---------------------------------------------------------------------------

/// Filters and ordering shared by every command that shows or addresses
/// goals by position. Positions always refer to the view these select.
#[derive(Args, Default, Clone)]
pub struct ViewArgs {
    /// Sort order for this run only, e.g. `pdna` (field n/p/c/u, then a/d)
    #[arg(long)]
    pub sort: Option<String>,
    /// Only goals whose name matches this regex
    #[arg(long)]
    pub name: Option<String>,
    /// Only goals with exactly this priority
    #[arg(long)]
    pub priority: Option<i32>,
    /// Only goals with exactly this completion
    #[arg(long)]
    pub completion: Option<i32>,
    /// Only goals with exactly this unit cost
    #[arg(long)]
    pub cost: Option<f64>,
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub view: ViewArgs,
    /// Page to show when paging is on (1-based)
    #[arg(long, default_value_t = 1)]
    pub page: usize,
    /// Show every goal, ignoring paging
    #[arg(long)]
    pub all: bool,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddArgs {
    /// Goal name (must be unique)
    pub name: String,
    /// Priority, 0-100
    #[arg(long, short = 'p', default_value_t = 0)]
    pub priority: i32,
    /// Percent complete, 0-100
    #[arg(long, short = 'c', default_value_t = 0)]
    pub completion: i32,
    /// Hours per percent of completion, 0 or more
    #[arg(long, short = 'u', default_value_t = 0.0)]
    pub cost: f64,
    /// Rewrite the goal file even if it only loaded in part
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct EditArgs {
    /// Position in the listing (1-based)
    pub slot: usize,
    /// New name
    #[arg(long = "set-name")]
    pub new_name: Option<String>,
    /// New priority
    #[arg(long = "set-priority")]
    pub new_priority: Option<i32>,
    /// New completion
    #[arg(long = "set-completion")]
    pub new_completion: Option<i32>,
    /// New unit cost
    #[arg(long = "set-cost")]
    pub new_cost: Option<f64>,
    /// Rewrite the goal file even if it only loaded in part
    #[arg(long)]
    pub force: bool,
    #[command(flatten)]
    pub view: ViewArgs,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Position in the listing (1-based)
    pub slot: usize,
    /// Rewrite the goal file even if it only loaded in part
    #[arg(long)]
    pub force: bool,
    #[command(flatten)]
    pub view: ViewArgs,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct SortArgs {
    /// New sort order, e.g. `pdna`; `-` clears it
    pub prefs: Option<String>,
}

#[derive(Args)]
pub struct SetArgs {
    /// Print the header and summary lines
    #[arg(long)]
    pub verbose: Option<bool>,
    /// Split listings into pages
    #[arg(long)]
    pub paging: Option<bool>,
    /// Number the rows of a listing
    #[arg(long)]
    pub numbers: Option<bool>,
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
    /// Print the path to the recovery log
    Path,
}
