use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rescene")]
#[command(
    author,
    version,
    about = "Rebuild scene RAR volumes and media samples from SRR/SRS files"
)]
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
    /// Rebuild RAR volumes from an SRR file and the original files
    Rar {
        /// SRR file describing the archive
        #[arg(required = true)]
        srr: PathBuf,

        /// Directory searched for the original files (default: the SRR's directory)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Directory to write the volumes to
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Accept source files whose size differs from the archived size
        #[arg(long)]
        skip_validation: bool,
    },

    /// Rebuild a sample from an SRS file and the full-length media file
    Sample {
        /// SRS file describing the sample
        #[arg(required = true)]
        srs: PathBuf,

        /// Full-length MKV or AVI the sample was cut from
        #[arg(required = true)]
        source: PathBuf,

        /// Directory to write the sample to
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail instead of zero-filling when track data is missing
        #[arg(long)]
        strict: bool,
    },

    /// Show the contents of an SRR or SRS file
    Info {
        /// SRR or SRS file
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the files stored inside an SRR (NFO, SFV, ...)
    Extract {
        /// SRR file
        #[arg(required = true)]
        srr: PathBuf,

        /// Directory to write the files to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
