//! Command-line interface for chunkwave
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Chunked, order-preserving audio processing
#[derive(Parser, Debug)]
#[command(
    name = "chunkwave",
    version,
    about = "Chunked, order-preserving audio processing"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress log output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process a WAV file in-process and print JSON-lines events to stdout
    Process {
        /// WAV file to process
        file: PathBuf,

        /// Resolution: fine, medium or coarse (default from config)
        #[arg(long, short = 'r', value_name = "RESOLUTION")]
        resolution: Option<String>,

        /// Transform override: waveform or spectrum
        #[arg(long, short = 't', value_name = "KIND")]
        transform: Option<String>,

        /// Worker thread count override
        #[arg(long, short = 'w', value_name = "N")]
        workers: Option<usize>,
    },

    /// Start the daemon (foreground process)
    Daemon {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/chunkwave.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Submit a WAV file to the daemon
    Submit {
        /// WAV file to process (resolved to an absolute path)
        file: PathBuf,

        /// Resolution: fine, medium or coarse (default from daemon config)
        #[arg(long, short = 'r', value_name = "RESOLUTION")]
        resolution: Option<String>,

        /// Follow the submitted task's events until it ends
        #[arg(long, short = 'f')]
        follow: bool,

        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/chunkwave.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Request cancellation of a running task
    Stop {
        /// Task identifier printed by submit
        task_id: String,

        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/chunkwave.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// List running tasks
    Status {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/chunkwave.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Print every task event from the daemon as JSON lines
    Follow {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/chunkwave.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Ask the daemon to shut down
    Shutdown {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/chunkwave.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}
