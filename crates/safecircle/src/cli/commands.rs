//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::contact::{ContactId, NewContact};

/// Contact fields shared by `signup`, `contacts add` and `contacts edit`.
#[derive(Debug, Clone, Args)]
pub struct ContactArgs {
    /// Contact's name
    #[arg(id = "contact_name", long = "contact-name", value_name = "NAME")]
    pub name: String,

    /// Relationship to you (e.g. Mother, Friend)
    #[arg(short, long)]
    pub relationship: String,

    /// Contact's email address
    #[arg(short, long)]
    pub email: String,
}

impl From<ContactArgs> for NewContact {
    fn from(args: ContactArgs) -> Self {
        NewContact::new(args.name, args.relationship, args.email)
    }
}

/// Signup command arguments.
#[derive(Debug, Args)]
pub struct SignupCommand {
    /// Your name, used in alert messages
    #[arg(short, long)]
    pub name: String,

    /// Your first emergency contact
    #[command(flatten)]
    pub contact: ContactArgs,
}

/// Profile commands.
#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Show the signed-in user
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Change your display name
    Rename {
        /// The new name
        name: String,
    },
}

/// Contact management commands.
#[derive(Debug, Subcommand)]
pub enum ContactsCommand {
    /// List default and personal contacts
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Add a personal contact
    Add(ContactArgs),

    /// Replace a personal contact's details
    Edit {
        /// Id of the contact to edit
        id: ContactId,

        /// New details
        #[command(flatten)]
        contact: ContactArgs,
    },

    /// Delete a personal contact
    Delete {
        /// Id of the contact to delete
        id: ContactId,
    },
}

/// SOS command arguments.
#[derive(Debug, Args)]
pub struct SosCommand {
    /// Release the control after this many milliseconds; without it the
    /// control is held until the alert fires
    #[arg(long, value_name = "MS")]
    pub hold_ms: Option<u64>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Chat command arguments.
#[derive(Debug, Args)]
pub struct ChatCommand {
    /// Send a single message and exit; without it, read messages from stdin
    #[arg(short, long)]
    pub message: Option<String>,
}

/// Route assessment arguments.
#[derive(Debug, Args)]
pub struct RouteCommand {
    /// Starting point
    #[arg(long, requires = "to", conflicts_with = "description")]
    pub from: Option<String>,

    /// Destination
    #[arg(long, requires = "from")]
    pub to: Option<String>,

    /// Free-form route description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Campus security reports (defaults to a sample)
    #[arg(long)]
    pub campus_reports: Option<String>,

    /// Police blotter data (defaults to a sample)
    #[arg(long)]
    pub police_blotter: Option<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Text-to-speech arguments.
#[derive(Debug, Args)]
pub struct SpeakCommand {
    /// Text to speak
    pub text: String,

    /// Write the WAV file here instead of printing a data URI
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Resources command arguments.
#[derive(Debug, Args)]
pub struct ResourcesCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Formatted table
    #[default]
    Table,
    /// JSON output
    Json,
}
