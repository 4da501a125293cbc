use clap::{Parser, Subcommand};

use crate::types::{Muscle, RestDelta};

#[derive(Parser)]
#[command(name = "setwise", version, about = "Workout session tracker")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Emit machine-readable JSON instead of colorful text.
    #[arg(global = true, long)]
    pub json: bool,

    /// Act as this user instead of the configured one.
    #[arg(global = true, long)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Session-scoped commands
    #[command(subcommand, visible_alias = "s")]
    Session(SessionCmd),

    /// Workout plan management
    #[command(subcommand, visible_alias = "p")]
    Plan(PlanCmd),

    /// Exercise management
    #[command(subcommand, visible_alias = "ex")]
    Exercise(ExerciseCmd),

    /// Show personal records
    #[command(visible_alias = "pr")]
    Records {
        /// Only records for this exercise
        #[arg(short, long)]
        exercise: Option<String>,
    },

    /// View or edit setwise config
    #[command(subcommand)]
    Config(ConfigCmd),
}

#[derive(Subcommand)]
pub enum SessionCmd {
    /// Start a session from a plan
    #[command(visible_alias = "s")]
    Start {
        /// Plan index (from `plan list`) or exact name
        plan: String,
    },

    /// Show the active session
    #[command(visible_alias = "i")]
    Show,

    /// Follow the active session live until it ends or Ctrl-C
    #[command(visible_alias = "w")]
    Watch,

    /// Pause the session clock
    Pause,

    /// Resume a paused session
    Resume,

    /// End the running rest now
    #[command(visible_alias = "sr")]
    SkipRest,

    /// Lengthen or shorten the running rest - Usage: session rest <+|-|SECONDS>
    #[command(override_usage = "session rest <+|-|SECONDS>")]
    Rest {
        #[arg(value_name = "DELTA", allow_hyphen_values = true)]
        delta: RestDelta,
    },

    /// Log the current set - Usage: session done WEIGHT REPS
    #[command(visible_alias = "d")]
    #[command(override_usage = "session done <WEIGHT> <REPS>")]
    Done {
        /// Weight in kg
        #[arg(value_name = "WEIGHT", allow_hyphen_values = true)]
        weight: String,

        /// Number of reps
        #[arg(value_name = "REPS", allow_hyphen_values = true)]
        reps: String,
    },

    /// Skip the current set
    Skip,

    /// Append a set to the current exercise
    AddSet,

    /// Drop the last set of the current exercise
    RemoveSet,

    /// Finish the session
    #[command(visible_alias = "f")]
    Finish,

    /// Abandon the session
    Abandon,

    /// Show past sessions
    #[command(visible_alias = "l")]
    Log {
        /// How many sessions to show
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },
}

#[derive(Subcommand)]
pub enum PlanCmd {
    /// Import one or more plans
    #[command(visible_alias = "i")]
    Import { files: Vec<String> },

    /// List plans
    #[command(visible_alias = "l")]
    List,

    /// Show a single plan in detail
    #[command(visible_alias = "s")]
    Show {
        /// Plan index (from `plan list`) or exact name
        plan: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ExerciseCmd {
    /// Add a new exercise
    #[command(visible_alias = "a")]
    Add {
        /// Exercise name
        name: String,

        /// Primary muscle group
        #[arg(short, long)]
        muscle: String,

        /// Exercise description
        #[arg(short, long)]
        desc: Option<String>,
    },

    /// Import exercises from a TOML file
    #[command(visible_alias = "i")]
    Import {
        /// Path to TOML file
        file: String,
    },

    /// List all exercises
    #[command(visible_alias = "l")]
    List {
        /// Filter by muscle group
        #[arg(short, long, value_enum)]
        muscle: Option<Muscle>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Show all config keys
    List,

    /// Get the value of a key
    Get { key: String },

    /// Set or override a key
    Set { key: String, val: String },

    /// Reset a key to its default
    Unset { key: String },
}
