//! multiflash - drag-and-drop field programmer
//!
//! A programmer that shows up as a USB drive: drop a `boot*.bin` (and
//! optionally an `app*.bin`) onto it, press the button, and the images are
//! written into the target over its debug link.
//!
//! # Architecture
//!
//! The logic lives in `multiflash-core` and is shared with the firmware
//! build. This binary supplies the host pieces around it:
//! - a directory standing in for the USB drive's backing store
//! - debug link backends selected with `name:key=value,...`
//! - a console status sink
//! - the control loop that watches the drive and reacts to requests

mod cli;
mod commands;
mod config;
mod console;
mod links;
mod volume;

use clap::Parser;
use cli::{Cli, Commands};
use config::Settings;
use console::{ConsoleSink, ProgressMode};
use multiflash_core::status::{LogSink, SinkList, StatusSink};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Scan { volume } => {
            let volume = settings.volume(volume.volume)?;
            let mut console = ConsoleSink::stdout(ProgressMode::detect());
            with_sinks(&mut console, cli.verbose, |sink| {
                commands::run_scan(&volume, sink)
            })
        }
        Commands::Flash { volume, flash } => {
            let volume = settings.volume(volume.volume)?;
            let link_spec = settings.link(flash.link.clone())?;
            let config = flash.apply(settings.flash);
            let mut link = links::open_link(&link_spec)?;

            let mut console = ConsoleSink::stdout(progress_mode(flash.plain));
            with_sinks(&mut console, cli.verbose, |sink| {
                commands::run_flash(&volume, &mut link, &config, sink)
            })
        }
        Commands::Run {
            volume,
            flash,
            settle_ms,
        } => {
            let volume = settings.volume(volume.volume)?;
            let link_spec = settings.link(flash.link.clone())?;
            let config = flash.apply(settings.flash);
            let settle_ms = settings.settle_ms(settle_ms);
            let link = links::open_link(&link_spec)?;

            let dir = volume::DirVolume::open(&volume)
                .map_err(|e| format!("Failed to open volume {}: {}", volume.display(), e))?;
            log::info!(
                "Watching {} (settle window {} ms)",
                dir.root().display(),
                settle_ms
            );
            let mut session = commands::Session::new(dir, link, config, settle_ms);

            let mut console = ConsoleSink::stdout(progress_mode(flash.plain));
            with_sinks(&mut console, cli.verbose, |sink| {
                commands::run_loop(&mut session, sink)
            })
        }
        Commands::ListLinks => {
            commands::list_links();
            Ok(())
        }
        Commands::ListTargets => {
            commands::list_targets();
            Ok(())
        }
    }
}

fn progress_mode(plain: bool) -> ProgressMode {
    if plain {
        ProgressMode::Text
    } else {
        ProgressMode::detect()
    }
}

/// Run `f` with the console sink, mirrored into the log when verbose
fn with_sinks<R>(
    console: &mut ConsoleSink,
    verbose: u8,
    f: impl FnOnce(&mut dyn StatusSink) -> R,
) -> R {
    let mut log_sink = LogSink;
    let mut sinks = SinkList::new();
    sinks.push(console);
    if verbose > 0 {
        sinks.push(&mut log_sink);
    }
    f(&mut sinks)
}
