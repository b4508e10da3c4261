//! CLI module for Minne.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Minne - Video Archive with Grounded Answers
///
/// A local-first tool that ingests screen recordings, transcribes and
/// indexes them, and answers questions with timestamp citations. The name
/// "Minne" comes from the Norwegian word for "memory."
#[derive(Parser, Debug)]
#[command(name = "minne")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest an MKV recording into the archive
    Add {
        /// Path to the .mkv file
        file: PathBuf,

        /// Title of the recording
        #[arg(short, long)]
        title: String,

        /// Recording date (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<String>,

        /// Participant names (repeatable)
        #[arg(short, long)]
        participants: Vec<String>,

        /// Free-form context notes
        #[arg(short, long)]
        notes: Option<String>,

        /// Run the processing pipeline immediately after ingesting
        #[arg(long)]
        run: bool,
    },

    /// Run the processing pipeline for an ingested video
    Run {
        /// Video ID to process
        video_id: Uuid,
    },

    /// Show the pipeline status of a single video
    Status {
        /// Video ID to inspect
        video_id: Uuid,
    },

    /// List videos in the archive
    List,

    /// Search the archive for relevant moments
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Ask a question and get a cited answer from the archive
    Ask {
        /// The question to ask
        question: String,
    },

    /// Generate a summary document from transcripts
    Doc {
        /// What the document should cover
        request: String,

        /// Restrict to specific video IDs (repeatable; all videos if omitted)
        #[arg(short, long)]
        videos: Vec<Uuid>,
    },

    /// Show or manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
}
