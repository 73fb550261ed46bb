//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "syscim",
    version,
    author = "neur0map",
    about = "Parse syslog lines into records with canonical field names",
    long_about = "syscim parses raw syslog lines from heterogeneous devices, extracts \
                  program-specific fields with ordered grammars, and renames vendor-specific \
                  field names onto a shared taxonomy."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/syscim/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Device time zone (IANA name or UTC offset), overrides the config file
    #[arg(long, global = true, value_name = "ZONE")]
    pub time_zone: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse syslog lines into JSON records, one per line
    Parse {
        /// Input file (defaults to stdin)
        file: Option<PathBuf>,

        /// Stop at the first message that cannot be parsed
        #[arg(long)]
        fail_fast: bool,

        /// Emit records without taxonomy normalization
        #[arg(long)]
        raw_fields: bool,
    },

    /// Rename aliased fields in JSON objects (one object per line)
    Normalize {
        /// Input file (defaults to stdin)
        file: Option<PathBuf>,

        /// Keep suppressed aliases as null instead of removing them
        #[arg(long)]
        tombstone: bool,
    },

    /// Check field names of JSON objects (one object per line) against the taxonomy
    Validate {
        /// Input file (defaults to stdin)
        file: Option<PathBuf>,

        /// Accept field names the taxonomy does not know
        #[arg(long)]
        allow_unknown: bool,

        /// Canonical field that must be present (repeatable)
        #[arg(short, long = "require", value_name = "FIELD")]
        required: Vec<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show effective configuration
    Show {
        /// Show only a specific section
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration and a copy of the bundled taxonomy
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
