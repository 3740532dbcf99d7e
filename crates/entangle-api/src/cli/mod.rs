//! CLI command definitions for the `entangle` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod chat;

use clap::{Parser, Subcommand};

/// Multi-participant chat with an AI member.
#[derive(Parser)]
#[command(name = "entangle", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true, env = "ENTANGLE_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on (overrides `[server] port`).
        #[arg(long, env = "ENTANGLE_PORT")]
        port: Option<u16>,

        /// Host address to bind to (overrides `[server] host`).
        #[arg(long, env = "ENTANGLE_HOST")]
        host: Option<String>,
    },

    /// Submit one turn and print the resulting transcript.
    Send {
        /// Chat to post into; created on first use.
        chat_id: String,

        /// Participant sending the message.
        sender_id: String,

        /// Message text.
        content: String,
    },

    /// Print a chat transcript.
    Show {
        /// Chat to display.
        chat_id: String,
    },
}
