use camsync::CameraId;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "camsync")]
#[command(author, version, about = "Synchronized multi-camera recording playback")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the recorded segments of one camera for a date
    Segments {
        /// Camera id (e.g. 1 or cam1)
        #[arg(long)]
        camera: CameraId,

        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Fetch each manifest and report its duration
        #[arg(long)]
        durations: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve every camera to a segment and seek offset at one instant
    Resolve {
        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Time of day (HH:MM[:SS[.mmm]])
        #[arg(long)]
        time: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Drive synchronized playback from commands on stdin
    ///
    /// Each line is a time of day to scrub to, or one of: play, pause,
    /// date YYYY-MM-DD, toggle N, status, quit.
    Play {
        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Initial time of day (defaults to midnight)
        #[arg(long)]
        time: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
