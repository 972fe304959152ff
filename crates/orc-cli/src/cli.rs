use clap::{Parser, Subcommand};
use orc_core::{FailureClass, StepName};

#[derive(Parser)]
#[command(name = "orc", version)]
#[command(about = "Drives the code-generation orchestrator's workflow engine and learning store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum StartModeArg {
    Fresh,
    Resume,
    Auto,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start or resume a generation run for a project (Session API: start)
    Start {
        /// Project identifier
        #[arg(long)]
        project: String,

        /// Natural-language project description (required unless resuming)
        #[arg(long)]
        description: Option<String>,

        /// fresh clears prior progress; resume requires a paused/failed session; auto picks whichever applies
        #[arg(long, value_enum, default_value = "auto")]
        mode: StartModeArg,
    },

    /// Run the single currently eligible step for a session
    Advance {
        /// Session ULID
        #[arg(long)]
        session: String,
    },

    /// Start (or resume) a project and advance it to a terminal state
    Run {
        #[arg(long)]
        project: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, value_enum, default_value = "auto")]
        mode: StartModeArg,
    },

    /// Request a pause at the next step boundary (Session API: pause)
    Pause {
        #[arg(long)]
        session: String,
    },

    /// Resume a paused or failed session, optionally with operator guidance (Session API: resume)
    Resume {
        #[arg(long)]
        session: String,

        /// Folded into the current step's retry prompt as operator guidance
        #[arg(long)]
        message: Option<String>,
    },

    /// Report a project's progress (Session API: progress)
    Progress {
        #[arg(long)]
        project: String,
    },

    /// Discard a project's latest session so the next start begins clean (Session API: clear-progress)
    ClearProgress {
        #[arg(long)]
        project: String,
    },

    /// List every persisted session
    Sessions,

    /// Inspect the learning store (the only sanctioned reader)
    Learning {
        #[command(subcommand)]
        cmd: LearningCommands,
    },
}

#[derive(Subcommand)]
pub enum LearningCommands {
    /// List failure records, most recent first
    List {
        /// Filter by originating session (run_id)
        #[arg(long)]
        run: Option<String>,

        /// Filter by step
        #[arg(long, value_enum)]
        step: Option<StepName>,

        /// Filter by canon class
        #[arg(long, value_enum)]
        class: Option<FailureClass>,
    },

    /// Report context drift between stored and current interpretation context hashes
    Drift {
        /// Restrict to one step; all steps with recorded failures if omitted
        #[arg(long, value_enum)]
        step: Option<StepName>,
    },
}
