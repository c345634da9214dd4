//! spimem - Serial memory manager and flat filesystem
//!
//! Runs against an emulated bus described by a TOML file: every line of
//! the bus is probed, one device is leased from the registry and a flat
//! filesystem is mounted on it.
//!
//! # Architecture
//!
//! - `spimem-core` identifies NOR, SPI-NAND and PSRAM chips and drives them
//!   through one `MemDevice` trait
//! - `spimem-manager` keeps the detected-device table and its leases
//! - `spimem-fs` puts an append-only directory log and a data region on
//!   any `MemDevice`

mod cli;
mod commands;
mod config;
mod error;

use clap::Parser;
use cli::{Cli, Commands};
use config::BusConfig;
use spimem_core::bus::SharedBus;
use spimem_manager::Manager;

use crate::commands::{files, with_fs};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logger; -v/-vv override RUST_LOG
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = verbosity_filter(cli.verbose) {
        logger.filter_level(level);
    }
    logger.init();

    let config = match &cli.config {
        Some(path) => BusConfig::from_file(path)?,
        None => BusConfig::default(),
    };

    let bus = SharedBus::new(config.build_bus()?);
    let mut mgr = Manager::with_config(bus.clone(), config.manager_config());
    let found = mgr.scan(&config.scan_lines());
    log::debug!("{} device(s) on the bus", found);

    let family = cli.family;
    let result = match cli.command {
        Commands::Scan => commands::cmd_scan(&mgr),
        Commands::Ls => with_fs(&mut mgr, family, true, files::cmd_ls),
        Commands::Put {
            input,
            name,
            no_replace,
        } => with_fs(&mut mgr, family, true, |fs| {
            files::cmd_put(fs, &input, name.as_deref(), no_replace)
        }),
        Commands::Get { name, output } => {
            with_fs(&mut mgr, family, true, |fs| files::cmd_get(fs, &name, &output))
        }
        Commands::Cat {
            name,
            offset,
            length,
        } => with_fs(&mut mgr, family, true, |fs| {
            files::cmd_cat(fs, &name, offset, length)
        }),
        Commands::Rm { name } => with_fs(&mut mgr, family, true, |fs| files::cmd_rm(fs, &name)),
        Commands::Info { name } => {
            with_fs(&mut mgr, family, true, |fs| files::cmd_info(fs, &name))
        }
        Commands::Slot {
            name,
            reserve,
            input,
        } => with_fs(&mut mgr, family, true, |fs| {
            files::cmd_slot(fs, &name, reserve, input.as_deref())
        }),
        Commands::Rewrite {
            name,
            input,
            realloc,
        } => with_fs(&mut mgr, family, true, |fs| {
            files::cmd_rewrite(fs, &name, &input, realloc)
        }),
        Commands::Format => with_fs(&mut mgr, family, false, files::cmd_format),
        Commands::Wipe => with_fs(&mut mgr, family, false, files::cmd_wipe),
        Commands::Usage => with_fs(&mut mgr, family, true, files::cmd_usage),
    };

    // Keep whatever was written, even if the command failed halfway
    config.save_images(&bus.borrow())?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

/// Log level forced by `-v` flags, `None` leaves `RUST_LOG` in charge
fn verbosity_filter(verbose: u8) -> Option<log::LevelFilter> {
    match verbose {
        0 => None,
        1 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_filter() {
        assert_eq!(verbosity_filter(0), None);
        assert_eq!(verbosity_filter(1), Some(log::LevelFilter::Debug));
        assert_eq!(verbosity_filter(3), Some(log::LevelFilter::Trace));
    }
}
