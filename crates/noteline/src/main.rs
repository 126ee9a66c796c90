//! `noteline` - CLI for noteline
//!
//! This binary logs users in and manages their notes and images from the
//! command line.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;

use noteline::cli::{Cli, Command, ConfigCommand, ImageCommand, NoteAction, NotesCommand};
use noteline::{init_logging, Config, Error, Note, NoteDraft, NoteId, Services, UserId};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    let ephemeral = cli.ephemeral;
    match cli.command {
        // Config commands report load errors themselves
        Command::Config(config_cmd) => handle_config(cli.config, config_cmd),
        Command::Login(login) => {
            let services = open_services(cli.config, ephemeral)?;
            handle_login(&services, &login.id).await
        }
        Command::Notes(notes) => {
            let services = open_services(cli.config, ephemeral)?;
            handle_notes(&services, notes).await
        }
        Command::Image(ImageCommand::Store { file }) => {
            let services = open_services(cli.config, ephemeral)?;
            let stored = services.blobs.store_file(&file)?;
            println!("{}", stored.display());
            Ok(())
        }
    }
}

fn open_services(config_path: Option<PathBuf>, ephemeral: bool) -> anyhow::Result<Services> {
    let config = Config::load_from(config_path).context("loading configuration")?;
    Ok(Services::from_config(&config, ephemeral)?)
}

async fn handle_login(services: &Services, id: &str) -> anyhow::Result<()> {
    let admission = services.identity.admit(id).await?;
    if admission.is_new() {
        println!("Registered new user {}", admission.user());
    } else {
        println!("Welcome back, {}", admission.user());
    }
    Ok(())
}

async fn handle_notes(services: &Services, cmd: NotesCommand) -> anyhow::Result<()> {
    let user = services.identity.admit(&cmd.user).await?.into_user();
    let notes = &services.notes;

    match cmd.action {
        NoteAction::List { json } => {
            let collection = notes.list(&user).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&collection)?);
            } else if collection.is_empty() {
                println!("No notes for user {user}.");
            } else {
                for note in &collection {
                    print_summary(note);
                }
            }
        }
        NoteAction::Show { note, json } => {
            let id = NoteId::parse(&note)?;
            let note = notes.get(&user, &id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&note)?);
            } else {
                print_note(&note);
            }
        }
        NoteAction::Add {
            title,
            content,
            image,
        } => {
            let mut draft = NoteDraft::new(title, content);
            if let Some(image) = image {
                draft.image_path = store_image(services, &image)?;
            }
            let id = notes.create(&user, &draft).await?;
            println!("{id}");
        }
        NoteAction::Edit {
            note,
            title,
            content,
            image,
            clear_image,
        } => {
            let id = NoteId::parse(&note)?;
            let mut draft = match notes.get(&user, &id).await {
                Ok(existing) => existing.to_draft(),
                Err(Error::NotFound { .. }) => NoteDraft::default(),
                Err(e) => return Err(e.into()),
            };
            if let Some(title) = title {
                draft.title = title;
            }
            if let Some(content) = content {
                draft.content = content;
            }
            if clear_image {
                draft.image_path.clear();
            } else if let Some(image) = image {
                draft.image_path = store_image(services, &image)?;
            }
            notes.update(&user, &id, &draft).await?;
            println!("Updated {id}");
        }
        NoteAction::Delete { note } => {
            let id = NoteId::parse(&note)?;
            notes.delete(&user, &id).await?;
            println!("Deleted {id}");
        }
        NoteAction::Watch { json } => watch_notes(services, &user, json).await?,
    }
    Ok(())
}

fn store_image(services: &Services, source: &Path) -> anyhow::Result<String> {
    let stored = services
        .blobs
        .store_file(source)
        .with_context(|| format!("attaching image {}", source.display()))?;
    Ok(stored.to_string_lossy().into_owned())
}

async fn watch_notes(services: &Services, user: &UserId, json: bool) -> anyhow::Result<()> {
    let mut subscription = services.notes.subscribe(user)?;

    loop {
        tokio::select! {
            snapshot = subscription.next() => match snapshot {
                Some(Ok(collection)) => {
                    if json {
                        println!("{}", serde_json::to_string(&collection)?);
                    } else {
                        println!("--- {} note(s) ---", collection.len());
                        for note in &collection {
                            print_summary(note);
                        }
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                subscription.cancel();
                break;
            }
        }
    }
    Ok(())
}

fn print_summary(note: &Note) {
    let marker = if note.has_image() { " [image]" } else { "" };
    println!("{}  {}{}", note.id, note.title, marker);
}

fn print_note(note: &Note) {
    println!("Id:      {}", note.id);
    println!("Title:   {}", note.title);
    if note.has_image() {
        println!("Image:   {}", note.image_path);
    }
    println!();
    println!("{}", note.content);
}

fn handle_config(path: Option<PathBuf>, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Store]");
                println!("  Backend:            {:?}", config.store.backend);
                println!("  Database path:      {}", config.database_path().display());
                println!(
                    "  Request timeout:    {} ms",
                    config.store.request_timeout_ms
                );
                println!();
                println!("[Blobs]");
                println!("  Directory:          {}", config.image_dir().display());
                println!("  Extension:          {}", config.blobs.extension);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.or(path).unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
