//! CLI argument parsing

use clap::{Parser, Subcommand, ValueEnum};
use spimem_core::chip::DeviceFamily;
use std::path::PathBuf;

use crate::config::{parse_number, parse_size};

#[derive(Parser)]
#[command(name = "spimem")]
#[command(author, version, about = "Serial memory manager and flat filesystem", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Bus description (TOML); one chip of each family if omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Device family to operate on
    #[arg(short, long, value_enum, default_value_t = FamilyArg::Auto, global = true)]
    pub family: FamilyArg,

    #[command(subcommand)]
    pub command: Commands,
}

/// Device selection on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FamilyArg {
    /// First free device, PSRAM before NOR before SPI-NAND
    Auto,
    /// Serial NOR flash
    Nor,
    /// SPI-NAND flash
    Nand,
    /// PSRAM
    Psram,
}

impl FamilyArg {
    /// The family to open, `None` for automatic selection
    pub fn family(self) -> Option<DeviceFamily> {
        match self {
            Self::Auto => None,
            Self::Nor => Some(DeviceFamily::Nor),
            Self::Nand => Some(DeviceFamily::SpiNand),
            Self::Psram => Some(DeviceFamily::Psram),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe every chip-select line and list detected devices
    Scan,

    /// List files
    Ls,

    /// Store a host file
    Put {
        /// Host file to store
        input: PathBuf,

        /// Name on the device (defaults to the host file name)
        #[arg(short, long)]
        name: Option<String>,

        /// Fail if the name already exists
        #[arg(long)]
        no_replace: bool,
    },

    /// Copy a file to the host
    Get {
        /// Name on the device
        name: String,

        /// Host file to write
        output: PathBuf,
    },

    /// Print a file to stdout
    Cat {
        /// Name on the device
        name: String,

        /// Start offset (hex or decimal)
        #[arg(long, value_parser = parse_number, default_value = "0")]
        offset: u32,

        /// Bytes to print (hex, decimal or size like "4 KiB")
        #[arg(long, value_parser = parse_size)]
        length: Option<u32>,
    },

    /// Delete a file
    Rm {
        /// Name on the device
        name: String,
    },

    /// Show address, size and slot capacity of a file
    Info {
        /// Name on the device
        name: String,
    },

    /// Reserve an in-place rewritable slot
    Slot {
        /// Name on the device
        name: String,

        /// Bytes to reserve (hex, decimal or size like "4 KiB")
        #[arg(value_parser = parse_size)]
        reserve: u32,

        /// Initial contents
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Rewrite a slot in place
    Rewrite {
        /// Name on the device
        name: String,

        /// New contents
        input: PathBuf,

        /// Move the file if it no longer fits its slot
        #[arg(long)]
        realloc: bool,
    },

    /// Erase the directory and forget every file
    Format,

    /// Erase the whole device
    Wipe,

    /// Show directory and data region usage
    Usage,
}
