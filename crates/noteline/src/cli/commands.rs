//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Login command arguments.
#[derive(Debug, Args)]
pub struct LoginCommand {
    /// Four-digit user id; unknown ids are registered
    pub id: String,
}

/// Note command arguments.
#[derive(Debug, Args)]
pub struct NotesCommand {
    /// Four-digit user id owning the notes
    #[arg(short, long, value_name = "ID")]
    pub user: String,

    /// The note action to perform
    #[command(subcommand)]
    pub action: NoteAction,
}

/// Actions on a user's notes.
#[derive(Debug, Subcommand)]
pub enum NoteAction {
    /// List all notes
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show one note
    Show {
        /// Note id
        note: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Create a note
    Add {
        /// Note title
        #[arg(short, long)]
        title: String,

        /// Note body
        #[arg(long, default_value = "")]
        content: String,

        /// Image file to attach
        #[arg(short, long, value_name = "FILE")]
        image: Option<PathBuf>,
    },

    /// Replace a note's fields; unspecified fields keep their current value
    Edit {
        /// Note id
        note: String,

        /// New title
        #[arg(short, long)]
        title: Option<String>,

        /// New body
        #[arg(long)]
        content: Option<String>,

        /// New image file to attach
        #[arg(short, long, value_name = "FILE", conflicts_with = "clear_image")]
        image: Option<PathBuf>,

        /// Detach the current image
        #[arg(long)]
        clear_image: bool,
    },

    /// Delete a note
    Delete {
        /// Note id
        note: String,
    },

    /// Print a fresh snapshot whenever the notes change
    Watch {
        /// Output snapshots as JSON lines
        #[arg(short, long)]
        json: bool,
    },
}

/// Image commands.
#[derive(Debug, Subcommand)]
pub enum ImageCommand {
    /// Copy an image into the blob directory and print its new path
    Store {
        /// Image file to copy
        file: PathBuf,
    },
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
