//! CLI argument parsing for the event-guest-worker binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "event-guest-worker", about = "Guest import/export worker for the event back-office")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Import a guest CSV file into the database and print the report
    Import {
        /// Path to the CSV file
        #[arg(long)]
        file: PathBuf,
    },
    /// Write the empty import template
    Template {
        /// Output path
        #[arg(long)]
        out: PathBuf,
    },
    /// Export all guests in the import file format
    Export {
        /// Output path
        #[arg(long)]
        out: PathBuf,
    },
}
