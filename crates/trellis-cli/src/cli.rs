use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "trellis",
    about = "Trellis: manage event, sponsor, lecture, notification, roster and user records",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (default: ./trellis.toml when present)
    #[arg(short, long, global = true)]
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
    /// Manage sponsors (keyed by tier)
    Sponsors(RecordArgs),
    /// Manage lectures (keyed by track)
    Lectures(RecordArgs),
    /// Manage notifications (keyed by audience)
    Notifications(RecordArgs),
    /// Manage users (keyed by role)
    Users(RecordArgs),
    /// Manage events (summary and detail projections)
    Events(RecordArgs),
    /// Manage team rosters
    Roster(RosterArgs),
    /// List, replay or discard unfinished two-step writes
    Intents(IntentArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct RecordArgs {
    #[command(subcommand)]
    pub action: RecordAction,
}

#[derive(Subcommand)]
pub enum RecordAction {
    /// List records, optionally for one category
    List {
        #[arg(long)]
        category: Option<String>,
    },
    Get {
        category: String,
        id: String,
    },
    Create(FieldArgs),
    Update {
        category: String,
        id: String,
        #[command(flatten)]
        fields: FieldArgs,
    },
    Delete {
        category: String,
        id: String,
    },
}

/// Record fields given on the command line.
#[derive(Args, Clone, Debug, Default)]
pub struct FieldArgs {
    /// A field as key=value; values that parse as JSON are stored as JSON
    #[arg(short, long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,
    /// A JSON mapping of fields, applied before --set
    #[arg(long, value_name = "JSON")]
    pub json: Option<String>,
    /// Image file to upload into the entity's asset field
    #[arg(long, value_name = "FILE")]
    pub asset: Option<PathBuf>,
}

#[derive(Args)]
pub struct RosterArgs {
    #[command(subcommand)]
    pub action: RosterAction,
}

#[derive(Subcommand)]
pub enum RosterAction {
    /// List team names
    Teams,
    /// List members of a team with their current indices
    List { team: String },
    Get { team: String, index: usize },
    Add {
        team: String,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Update the member at INDEX, or the member with --member-id
    Update {
        team: String,
        index: Option<usize>,
        #[arg(long, conflicts_with = "index")]
        member_id: Option<String>,
        /// Refuse if the roster changed since this version was listed
        #[arg(long, requires = "index")]
        expect_version: Option<String>,
        #[command(flatten)]
        fields: FieldArgs,
    },
    Remove {
        team: String,
        index: Option<usize>,
        #[arg(long, conflicts_with = "index")]
        member_id: Option<String>,
        #[arg(long, requires = "index")]
        expect_version: Option<String>,
    },
}

#[derive(Args)]
pub struct IntentArgs {
    #[command(subcommand)]
    pub action: Option<IntentAction>,
}

#[derive(Subcommand)]
pub enum IntentAction {
    List,
    /// Run both steps of an intent again and clear it
    Replay { id: String },
    /// Clear an intent without running it
    Discard { id: String },
}
