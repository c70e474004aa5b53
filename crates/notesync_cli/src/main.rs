//! notesync CLI
//!
//! Command-line notes client that works offline and syncs when it can.
//!
//! # Commands
//!
//! - `register`, `login`, `logout`, `whoami` - account management
//! - `list`, `show` - read the local copy
//! - `add`, `edit`, `delete` - change the local copy, then sync
//! - `sync` - push local changes and pull the server's

mod commands;
mod context;
mod error;
mod session;

use clap::{Parser, Subcommand};
use context::Context;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Offline-first notes client.
#[derive(Parser)]
#[command(name = "notesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the session, credentials and local notes
    #[arg(global = true, short, long)]
    data_dir: Option<PathBuf>,

    /// Server base URL (remembered for later commands)
    #[arg(global = true, short, long)]
    server: Option<String>,

    /// Do not sync after changing a note
    #[arg(global = true, long)]
    no_sync: bool,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Register {
        /// Account email
        email: String,

        /// Account password
        #[arg(short, long)]
        password: String,
    },

    /// Log in and bind the local store to the account
    Login {
        /// Account email
        email: String,

        /// Account password
        #[arg(short, long)]
        password: String,
    },

    /// Forget credentials and unbind the local store
    Logout,

    /// Show the logged-in account
    Whoami,

    /// List notes, most recently updated first
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show one note
    Show {
        /// Note id or unique id prefix
        id: String,
    },

    /// Add a note
    Add {
        /// Note title
        title: String,

        /// Note body
        #[arg(short, long, default_value = "")]
        content: String,
    },

    /// Edit a note
    Edit {
        /// Note id or unique id prefix
        id: String,

        /// New title
        #[arg(short, long)]
        title: Option<String>,

        /// New body
        #[arg(short, long)]
        content: Option<String>,
    },

    /// Delete a note
    Delete {
        /// Note id or unique id prefix
        id: String,
    },

    /// Push local changes and pull the server's
    Sync,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut ctx = Context::load(cli.data_dir, cli.server)?;
    let sync_after = !cli.no_sync;

    match cli.command {
        Commands::Register { email, password } => {
            commands::account::register(&ctx, &email, &password)?;
        }
        Commands::Login { email, password } => {
            commands::account::login(&mut ctx, &email, &password)?;
        }
        Commands::Logout => commands::account::logout(&mut ctx)?,
        Commands::Whoami => commands::account::whoami(&ctx)?,
        Commands::List { format } => commands::notes::list(&ctx, &format)?,
        Commands::Show { id } => commands::notes::show(&ctx, &id)?,
        Commands::Add { title, content } => {
            commands::notes::add(&ctx, &title, &content, sync_after)?;
        }
        Commands::Edit { id, title, content } => {
            commands::notes::edit(&ctx, &id, title, content, sync_after)?;
        }
        Commands::Delete { id } => commands::notes::delete(&ctx, &id, sync_after)?,
        Commands::Sync => commands::sync::run(&ctx)?,
    }

    Ok(())
}
