use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kb", about = concat!("kb v", env!("CARGO_PKG_VERSION"), " - a knowledge base in plain markdown"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different project directory
    #[arg(short = 'C', long = "project-dir", global = true)]
    pub project_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List entries, newest first
    List(ListArgs),
    /// Show one entry
    Show(ShowArgs),
    /// Delete an entry and its screenshot or attachment
    Delete(DeleteArgs),
    /// Move an entry to a kanban column
    Status(StatusArgs),
    /// List known topics
    Topics,
    /// List known people
    People,
}

#[derive(Args)]
pub struct ListArgs {
    /// Only entries of this type (link, note, screenshot, ...)
    #[arg(long = "type")]
    pub entry_type: Option<String>,
    /// Only entries classified as this entity (project, task, knowledge)
    #[arg(long)]
    pub entity: Option<String>,
    /// Show at most this many entries
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Entry timestamp (YYYY-MM-DD HH:MM:SS)
    pub timestamp: String,
    /// Print the entry re-serialized in the current file format
    #[arg(long)]
    pub raw: bool,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Entry timestamp (YYYY-MM-DD HH:MM:SS)
    pub timestamp: String,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Entry timestamp (YYYY-MM-DD HH:MM:SS)
    pub timestamp: String,
    /// Kanban column id (e.g. not-started, in-progress, done)
    pub status: String,
}
