//! `safecircle` - CLI for the campus safety companion
//!
//! This binary wires the library together: local storage, the contact book,
//! the SOS controller with a simulated mailer, and the AI advisory gateway.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use safecircle::cli::{
    ChatCommand, Cli, Command, ConfigCommand, ContactsCommand, OutputFormat, ProfileCommand,
    RouteCommand, SignupCommand, SosCommand, SpeakCommand,
};
use safecircle::contacts::next_contact_id;
use safecircle::sos::Redirect;
use safecircle::{
    init_logging, ChatSession, Config, ContactBook, EmailAlertDispatcher, Error, ProfileStore,
    RouteInsightsForm, SosController, SosOutcome, Storage, StoredProfileStore,
    UserProfile, EMERGENCY_RESOURCES,
};

/// Opened local state shared by the handlers.
struct App {
    config: Config,
    storage: Arc<Storage>,
    store: Arc<StoredProfileStore>,
}

impl App {
    fn open(config: Config) -> anyhow::Result<Self> {
        let path = config.database_path();
        let storage = Arc::new(
            Storage::open(&path)
                .with_context(|| format!("opening local storage at {}", path.display()))?,
        );
        let store = Arc::new(StoredProfileStore::new(storage.clone()));
        Ok(Self {
            config,
            storage,
            store,
        })
    }

    fn contact_book(&self) -> ContactBook {
        ContactBook::with_defaults(self.store.clone(), self.config.contacts.defaults.clone())
    }

    fn require_profile(&self) -> anyhow::Result<UserProfile> {
        Ok(self.store.load()?.ok_or(Error::NotSignedIn)?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Config(cmd) => handle_config(&config, cmd),
        Command::Resources(cmd) => handle_resources(cmd.json),
        Command::Chat(cmd) => handle_chat(&config, cmd).await,
        Command::Route(cmd) => handle_route(&config, cmd).await,
        Command::Speak(cmd) => handle_speak(&config, cmd).await,
        Command::Signup(cmd) => handle_signup(&App::open(config)?, cmd),
        Command::Profile(cmd) => handle_profile(&App::open(config)?, cmd),
        Command::Contacts(cmd) => handle_contacts(&App::open(config)?, cmd),
        Command::Sos(cmd) => handle_sos(&App::open(config)?, cmd).await,
        Command::Status(cmd) => handle_status(&App::open(config)?, cmd.json),
    }
}

fn handle_signup(app: &App, cmd: SignupCommand) -> anyhow::Result<()> {
    let taken = app.config.contacts.defaults.iter().map(|c| c.id);
    let id = next_contact_id(Utc::now().timestamp_millis(), taken);

    let profile = UserProfile::signup(&cmd.name, cmd.contact.into(), id)?;
    app.store.save(&profile)?;

    println!("Welcome, {}! Your profile has been created.", profile.name);
    if let Some(contact) = profile.emergency_contacts.first() {
        println!("Emergency contact: {} <{}>", contact.name, contact.email);
    }
    Ok(())
}

fn handle_profile(app: &App, cmd: ProfileCommand) -> anyhow::Result<()> {
    match cmd {
        ProfileCommand::Show { json } => {
            let profile = app.require_profile()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&profile)?);
            } else {
                println!("Name:               {}", profile.name);
                println!(
                    "Personal contacts:  {}",
                    profile.emergency_contacts.len()
                );
            }
        }
        ProfileCommand::Rename { name } => {
            UserProfile::validate_name(&name)?;
            let mut profile = app.require_profile()?;
            profile.name = name.trim().to_string();
            app.store.save(&profile)?;
            println!("Profile updated. You are now {}.", profile.name);
        }
    }
    Ok(())
}

fn handle_contacts(app: &App, cmd: ContactsCommand) -> anyhow::Result<()> {
    let book = app.contact_book();
    match cmd {
        ContactsCommand::List { format } => {
            let entries = book.list()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
                OutputFormat::Table => {
                    println!(
                        "{:<15} {:<26} {:<14} {:<30} KIND",
                        "ID", "NAME", "RELATIONSHIP", "EMAIL"
                    );
                    for entry in &entries {
                        let c = &entry.contact;
                        println!(
                            "{:<15} {:<26} {:<14} {:<30} {}",
                            c.id.to_string(),
                            c.name,
                            c.relationship,
                            c.email,
                            entry.kind
                        );
                    }
                }
            }
        }
        ContactsCommand::Add(args) => {
            let contact = book.add(args.into())?;
            println!(
                "Contact added: {} <{}> (id {})",
                contact.name, contact.email, contact.id
            );
        }
        ContactsCommand::Edit { id, contact } => {
            let contact = book.update(id, contact.into())?;
            println!("Contact {} updated: {} <{}>", id, contact.name, contact.email);
        }
        ContactsCommand::Delete { id } => {
            let removed = book.delete(id)?;
            println!("Contact removed: {} <{}>", removed.name, removed.email);
        }
    }
    Ok(())
}

async fn handle_sos(app: &App, cmd: SosCommand) -> anyhow::Result<()> {
    let timing = app.config.sos_timing();
    let controller = SosController::new(
        app.contact_book(),
        app.config.geolocator(),
        Arc::new(EmailAlertDispatcher::console()),
        timing,
    );

    if !cmd.json {
        eprintln!(
            "{} (hold for {} ms)",
            safecircle::SosStatus::Arming.label(),
            timing.hold_duration.as_millis()
        );
    }
    controller.press();

    // Without --hold-ms the control is held until it fires.
    if let Some(ms) = cmd.hold_ms {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        if controller.release() {
            if cmd.json {
                println!("{}", serde_json::json!({ "status": "cancelled" }));
            } else {
                println!("SOS cancelled: released before the alert was armed.");
            }
            return Ok(());
        }
    }

    let Some(outcome) = controller.wait_for_outcome().await else {
        bail!("SOS controller stopped without a result");
    };

    match outcome {
        SosOutcome::Sent { recipients } => {
            if cmd.json {
                let report = serde_json::json!({ "status": "sent", "recipients": recipients });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("SOS Alert Activated!");
                println!("{}", SosOutcome::confirmation(&recipients));
            }
            Ok(())
        }
        SosOutcome::Failed(failure) => {
            let notice = failure.notice();
            if cmd.json {
                let report = serde_json::json!({
                    "status": "error",
                    "error": failure.to_string(),
                    "notice": notice,
                    "redirect": failure.redirect(),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                eprintln!("{}: {}", notice.title, notice.description);
                match failure.redirect() {
                    Some(Redirect::Signup) => eprintln!("Run `safecircle signup` to create a profile."),
                    Some(Redirect::Contacts) => {
                        eprintln!("Run `safecircle contacts add` to add a contact.");
                    }
                    None => {}
                }
            }
            Err(failure.into())
        }
    }
}

async fn handle_chat(config: &Config, cmd: ChatCommand) -> anyhow::Result<()> {
    let mut session = ChatSession::new(config.gateway()?);

    if let Some(message) = cmd.message {
        if let Some(reply) = session.send(&message).await {
            println!("{}", reply.text);
        }
        return Ok(());
    }

    if let Some(greeting) = session.messages().first() {
        println!("assistant> {}", greeting.text);
    }
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(reply) = session.send(&line).await {
            println!("assistant> {}", reply.text);
        }
    }
    Ok(())
}

async fn handle_route(config: &Config, cmd: RouteCommand) -> anyhow::Result<()> {
    let mut form = match (cmd.from, cmd.to, cmd.description) {
        (Some(from), Some(to), _) => RouteInsightsForm::between(&from, &to),
        (_, _, Some(description)) => RouteInsightsForm::for_route(description),
        _ => bail!("describe the route with --from/--to or --description"),
    };
    if let Some(reports) = cmd.campus_reports {
        form.campus_security_reports = reports;
    }
    if let Some(blotter) = cmd.police_blotter {
        form.police_blotter_data = blotter;
    }

    let request = form.into_request()?;
    let gateway = config.gateway()?;
    let assessment = gateway
        .assess_route(&request)
        .await
        .context("failed to get safety insights")?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&assessment)?);
    } else {
        println!("Route:            {}", request.route_description);
        println!("Risk level:       {}", assessment.risk_level);
        println!("Risk factors:     {}", assessment.risk_factors);
        println!("Recommendations:  {}", assessment.recommendations);
    }
    Ok(())
}

async fn handle_speak(config: &Config, cmd: SpeakCommand) -> anyhow::Result<()> {
    let audio = config.gateway()?.text_to_speech(&cmd.text).await?;

    match cmd.output {
        Some(path) => {
            let wav = audio.wav_bytes()?;
            tokio::fs::write(&path, &wav)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            println!(
                "Wrote {} bytes ({} Hz) to {}",
                wav.len(),
                audio.sample_rate,
                path.display()
            );
        }
        None => println!("{}", audio.data_uri()),
    }
    Ok(())
}

fn handle_resources(json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(EMERGENCY_RESOURCES)?);
        return Ok(());
    }

    println!("Emergency Resources");
    println!("===================");
    for resource in EMERGENCY_RESOURCES {
        println!();
        println!("{}", resource.name);
        println!("  {}", resource.description);
        println!("  Call: {} ({})", resource.phone, resource.tel_uri());
    }
    Ok(())
}

fn handle_status(app: &App, json: bool) -> anyhow::Result<()> {
    let profile = app.store.load()?;
    let stats = app.storage.stats()?;
    let contacts = app.contact_book().list()?.len();
    let advisor_configured = app.config.api_key().is_some();
    let location = app.config.fixed_position();

    if json {
        let status = serde_json::json!({
            "signed_in": profile.is_some(),
            "user": profile.as_ref().map(|p| &p.name),
            "contacts": contacts,
            "database_path": app.storage.path(),
            "stored_items": stats.total_items,
            "last_updated": stats.last_updated,
            "db_size_bytes": stats.db_size_bytes,
            "advisor_configured": advisor_configured,
            "advisor_model": app.config.ai.model,
            "location": location,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("safecircle status");
        println!("-----------------");
        match &profile {
            Some(p) => println!("User:          {}", p.name),
            None => println!("User:          not signed in"),
        }
        println!("Contacts:      {contacts}");
        println!("Database:      {}", app.storage.path().display());
        println!("Stored items:  {}", stats.total_items);
        println!("DB size:       {} bytes", stats.db_size_bytes);
        println!(
            "Advisor:       {}",
            if advisor_configured {
                app.config.ai.model.as_str()
            } else {
                "not configured"
            }
        );
        match location {
            Some(position) => println!("Location:      {position}"),
            None => println!("Location:      not configured"),
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = config.redacted();
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[SOS]");
                println!("  Hold duration (ms): {}", config.sos.hold_duration_ms);
                println!("  Tick interval (ms): {}", config.sos.tick_interval_ms);
                println!("  Reset after (ms):   {}", config.sos.reset_after_ms);
                println!();
                println!("[Location]");
                match config.fixed_position() {
                    Some(position) => println!("  Fixed position:     {position}"),
                    None => println!("  Fixed position:     none"),
                }
                println!("  Timeout (ms):       {}", config.location.timeout_ms);
                println!();
                println!("[Contacts]");
                for contact in &config.contacts.defaults {
                    println!("  {:<20} {}", contact.name, contact.email);
                }
                println!();
                println!("[AI]");
                println!("  Model:              {}", config.ai.model);
                println!("  Speech model:       {}", config.ai.speech_model);
                println!("  Voice:              {}", config.ai.voice);
                println!(
                    "  API key:            {}",
                    if config.api_key().is_some() { "set" } else { "not set" }
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            Config::load_from(Some(path)).context("configuration is invalid")?;
            println!("Configuration is valid.");
        }
    }
    Ok(())
}
