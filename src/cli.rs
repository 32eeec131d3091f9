//! CLI argument parsing

use crate::links;
use clap::{Args, Parser, Subcommand};
use multiflash_core::flash::FlashConfig;
use std::path::PathBuf;

/// Generate dynamic help text for the link argument
fn link_help() -> String {
    format!(
        "Debug link, name[:key=value,...] [available: {}]",
        links::link_names_short()
    )
}

#[derive(Parser)]
#[command(name = "multiflash")]
#[command(author, version, about = "Drag-and-drop field programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Settings file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Volume directory option shared across commands
#[derive(Args, Debug, Clone, Default)]
pub struct VolumeArgs {
    /// Directory acting as the programmer's USB drive
    #[arg(short = 'd', long)]
    pub volume: Option<PathBuf>,
}

/// Options controlling a programming attempt
#[derive(Args, Debug, Clone, Default)]
pub struct FlashArgs {
    /// Debug link to use
    #[arg(short, long, help = link_help())]
    pub link: Option<String>,

    /// Link clock in kHz
    #[arg(long)]
    pub clock: Option<u32>,

    /// Erase the whole flash before programming
    #[arg(long)]
    pub erase: bool,

    /// Leave the boot region unprotected afterwards
    #[arg(long)]
    pub no_protect: bool,

    /// Draw plain percentage lines instead of progress bars
    #[arg(long)]
    pub plain: bool,
}

impl FlashArgs {
    /// Apply the flag overrides on top of the configured values
    pub fn apply(&self, mut config: FlashConfig) -> FlashConfig {
        if let Some(khz) = self.clock {
            config.clock_khz = khz;
        }
        if self.erase {
            config.erase_before_program = true;
        }
        if self.no_protect {
            config.protect_after = false;
        }
        config
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan the volume once and show the images found
    Scan {
        #[command(flatten)]
        volume: VolumeArgs,
    },

    /// Scan the volume once and program the target
    Flash {
        #[command(flatten)]
        volume: VolumeArgs,

        #[command(flatten)]
        flash: FlashArgs,
    },

    /// Watch the volume and program on request (Enter flashes, q quits)
    Run {
        #[command(flatten)]
        volume: VolumeArgs,

        #[command(flatten)]
        flash: FlashArgs,

        /// Quiet time after the last change before rescanning, in ms
        #[arg(long)]
        settle_ms: Option<u64>,
    },

    /// List available debug links
    ListLinks,

    /// List supported targets
    ListTargets,
}
