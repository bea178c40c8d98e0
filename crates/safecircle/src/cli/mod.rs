//! Command-line interface for safecircle.
//!
//! This module provides the CLI structure for the `safecircle` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{
    ChatCommand, ConfigCommand, ContactArgs, ContactsCommand, OutputFormat, ProfileCommand,
    ResourcesCommand, RouteCommand, SignupCommand, SosCommand, SpeakCommand, StatusCommand,
};

/// safecircle - Campus safety companion
///
/// Raise an SOS alert to your emergency contacts, manage those contacts,
/// and ask an AI safety advisor about situations and routes.
#[derive(Debug, Parser)]
#[command(name = "safecircle")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create your profile with a first emergency contact
    Signup(SignupCommand),

    /// View or change your profile
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Manage emergency contacts
    #[command(subcommand)]
    Contacts(ContactsCommand),

    /// Hold the SOS control and send an alert
    Sos(SosCommand),

    /// Talk to the safety assistant
    Chat(ChatCommand),

    /// Assess the safety of a walking route
    Route(RouteCommand),

    /// Read text aloud
    Speak(SpeakCommand),

    /// List emergency phone numbers
    Resources(ResourcesCommand),

    /// Show profile, storage and advisor status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::ContactId;
    use clap::CommandFactory;

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "safecircle");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_flags() {
        let cli = Cli::try_parse_from(["safecircle", "-vv", "status"]).unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Trace);

        let cli = Cli::try_parse_from(["safecircle", "-q", "status"]).unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Quiet);
    }

    #[test]
    fn test_parse_signup() {
        let cli = Cli::try_parse_from([
            "safecircle",
            "signup",
            "--name",
            "Alex",
            "--contact-name",
            "Mom",
            "--relationship",
            "Mother",
            "--email",
            "mom@example.com",
        ])
        .unwrap();
        let Command::Signup(signup) = cli.command else {
            panic!("expected signup");
        };
        assert_eq!(signup.name, "Alex");
        assert_eq!(signup.contact.email, "mom@example.com");
    }

    #[test]
    fn test_parse_contacts_delete() {
        let cli = Cli::try_parse_from(["safecircle", "contacts", "delete", "1712345678901"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Contacts(ContactsCommand::Delete { id }) if id == ContactId(1_712_345_678_901)
        ));
    }

    #[test]
    fn test_parse_contacts_edit() {
        let cli = Cli::try_parse_from([
            "safecircle",
            "contacts",
            "edit",
            "42",
            "--contact-name",
            "Dad",
            "-r",
            "Father",
            "-e",
            "dad@example.com",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Contacts(ContactsCommand::Edit { id, .. }) if id == ContactId(42)
        ));
    }

    #[test]
    fn test_parse_contacts_list_json() {
        let cli = Cli::try_parse_from(["safecircle", "contacts", "list", "-f", "json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Contacts(ContactsCommand::List {
                format: OutputFormat::Json
            })
        ));
    }

    #[test]
    fn test_parse_sos_hold() {
        let cli = Cli::try_parse_from(["safecircle", "sos", "--hold-ms", "500"]).unwrap();
        let Command::Sos(sos) = cli.command else {
            panic!("expected sos");
        };
        assert_eq!(sos.hold_ms, Some(500));
    }

    #[test]
    fn test_parse_route_requires_both_ends() {
        assert!(Cli::try_parse_from(["safecircle", "route", "--from", "Gym"]).is_err());
        assert!(
            Cli::try_parse_from(["safecircle", "route", "--from", "Gym", "--to", "Library"]).is_ok()
        );
    }

    #[test]
    fn test_parse_route_description_conflicts_with_from() {
        let result = Cli::try_parse_from([
            "safecircle",
            "route",
            "--from",
            "Gym",
            "--to",
            "Library",
            "-d",
            "Walking past the lake",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_with_config() {
        let cli =
            Cli::try_parse_from(["safecircle", "-c", "/custom/config.toml", "resources"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_config_validate() {
        let cli = Cli::try_parse_from(["safecircle", "config", "validate", "--file", "x.toml"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { file: Some(_) })
        ));
    }
}
