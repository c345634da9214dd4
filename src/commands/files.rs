//! File commands

use std::fs;
use std::io::Write;
use std::path::Path;

use spimem_core::device::MemDevice;
use spimem_fs::{FsError, Usage, WriteMode};

use super::progress::IndicatifProgress;
use super::Fs;
use crate::error::{CliError, Result};

/// List live files with region usage
pub fn cmd_ls(fs: &mut Fs) -> Result<()> {
    let dev = fs.device();
    let usage = fs.usage();
    println!(
        "Files ({}, CS={}, {} bytes total; FS data={} bytes)",
        dev.family(),
        dev.chip_select(),
        dev.capacity(),
        usage.data_size
    );
    print_usage(&usage);

    for file in fs.list_files() {
        if file.is_folder() {
            println!("- {}\t (folder)", file.name);
            continue;
        }
        println!(
            "- {}\t size={}\t addr=0x{:08X}\t cap={}\t slotSafe={}",
            file.name,
            file.size,
            file.addr,
            file.capacity,
            if file.slot_safe { "Y" } else { "N" }
        );
    }
    Ok(())
}

/// Store a host file
pub fn cmd_put(fs: &mut Fs, input: &Path, name: Option<&str>, no_replace: bool) -> Result<()> {
    let data = fs::read(input)?;
    let name = match name {
        Some(n) => n.to_string(),
        None => input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or(CliError::Fs(FsError::InvalidName))?,
    };
    let mode = if no_replace {
        WriteMode::FailIfExists
    } else {
        WriteMode::ReplaceIfExists
    };

    fs.write_file(&name, &data, mode)?;
    let info = fs.file_info(&name)?;
    println!("Stored {} ({} bytes) at 0x{:08X}", name, info.size, info.addr);
    Ok(())
}

fn read_all(fs: &mut Fs, name: &str) -> Result<Vec<u8>> {
    let mut data = vec![0u8; fs.file_size(name)? as usize];
    let n = fs.read_file(name, &mut data)?;
    data.truncate(n);
    Ok(data)
}

/// Copy a file to the host
pub fn cmd_get(fs: &mut Fs, name: &str, output: &Path) -> Result<()> {
    let data = read_all(fs, name)?;
    fs::write(output, &data)?;
    println!("Wrote {} bytes to {}", data.len(), output.display());
    Ok(())
}

/// Print a file, or part of it, to stdout
pub fn cmd_cat(fs: &mut Fs, name: &str, offset: u32, length: Option<u32>) -> Result<()> {
    let size = fs.file_size(name)?;
    let len = length.unwrap_or(u32::MAX).min(size.saturating_sub(offset));
    let mut buf = vec![0u8; len as usize];
    let n = fs.read_file_range(name, offset, &mut buf)?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&buf[..n])?;
    stdout.flush()?;
    Ok(())
}

/// Delete a file
pub fn cmd_rm(fs: &mut Fs, name: &str) -> Result<()> {
    fs.delete_file(name)?;
    println!("Deleted {}", name);
    Ok(())
}

/// Show where a file lives
pub fn cmd_info(fs: &mut Fs, name: &str) -> Result<()> {
    let info = fs.file_info(name)?;
    println!("Name:      {}", info.name);
    println!("Address:   0x{:08X}", info.addr);
    println!("Size:      {} bytes", info.size);
    println!("Capacity:  {} bytes", info.capacity);
    println!("Slot safe: {}", if info.slot_safe { "yes" } else { "no" });
    println!("Sequence:  {}", info.seq);
    Ok(())
}

/// Reserve a slot
pub fn cmd_slot(fs: &mut Fs, name: &str, reserve: u32, input: Option<&Path>) -> Result<()> {
    let init = match input {
        Some(path) => fs::read(path)?,
        None => Vec::new(),
    };
    fs.create_slot(name, reserve, &init)?;
    let info = fs.file_info(name)?;
    println!(
        "Reserved {} bytes for {} at 0x{:08X}",
        info.capacity, name, info.addr
    );
    Ok(())
}

/// Rewrite a slot
pub fn cmd_rewrite(fs: &mut Fs, name: &str, input: &Path, realloc: bool) -> Result<()> {
    let data = fs::read(input)?;
    let before = fs.file_info(name)?.addr;
    fs.write_in_place(name, &data, realloc)?;
    let after = fs.file_info(name)?.addr;

    if after == before {
        println!("Rewrote {} in place ({} bytes)", name, data.len());
    } else {
        println!(
            "Moved {} from 0x{:08X} to 0x{:08X} ({} bytes)",
            name,
            before,
            after,
            data.len()
        );
    }
    Ok(())
}

/// Erase the directory
pub fn cmd_format(fs: &mut Fs) -> Result<()> {
    fs.format()?;
    println!("Formatted directory ({} bytes)", fs.layout().dir_size);
    Ok(())
}

/// Erase the whole device
pub fn cmd_wipe(fs: &mut Fs) -> Result<()> {
    let mut progress = IndicatifProgress::default();
    fs.wipe_with_progress(&mut progress)?;
    println!("Wiped {} bytes", fs.capacity());
    Ok(())
}

/// Show region usage
pub fn cmd_usage(fs: &mut Fs) -> Result<()> {
    print_usage(&fs.usage());
    println!("Next data address: 0x{:08X}", fs.next_data_addr());
    Ok(())
}

fn print_usage(usage: &Usage) {
    println!(
        "Usage: data used={} ({})  data free={} ({})",
        usage.data_used,
        percent(usage.data_used, usage.data_size),
        usage.data_free(),
        percent(usage.data_free(), usage.data_size)
    );
    println!(
        "       dir used={} ({})  dir free={} ({})",
        usage.dir_used,
        percent(usage.dir_used, usage.dir_size),
        usage.dir_free(),
        percent(usage.dir_free(), usage.dir_size)
    );
}

/// Percentage with two rounded decimals
fn percent(num: u32, den: u32) -> String {
    if den == 0 {
        return "n/a".to_string();
    }
    let scaled = (num as u64 * 10_000 + den as u64 / 2) / den as u64;
    format!("{}.{:02}%", scaled / 100, scaled % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::FamilyArg;
    use crate::commands::with_fs;
    use crate::config::BusConfig;
    use spimem_core::bus::SharedBus;
    use spimem_manager::Manager;

    fn manager() -> Manager<crate::commands::Bus> {
        let config = BusConfig::default();
        let bus = config.build_bus().unwrap();
        let mut mgr = Manager::with_config(SharedBus::new(bus), config.manager_config());
        mgr.scan(&config.scan_lines());
        mgr
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(1, 3), "33.33%");
        assert_eq!(percent(2, 3), "66.67%");
        assert_eq!(percent(0, 0), "n/a");
    }

    #[test]
    fn test_commands_share_one_device() {
        let mut mgr = manager();
        let dir = std::env::temp_dir().join(format!("spimem-cli-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let input = dir.join("cfg.bin");
        fs::write(&input, [0xBB; 20]).unwrap();

        with_fs(&mut mgr, FamilyArg::Nor, true, |fs| {
            cmd_slot(fs, "cfg", 4096, None)?;
            cmd_rewrite(fs, "cfg", &input, false)
        })
        .unwrap();
        assert_eq!(mgr.reserved_count(), 0);

        let output = dir.join("out.bin");
        with_fs(&mut mgr, FamilyArg::Nor, true, |fs| cmd_get(fs, "cfg", &output)).unwrap();
        assert_eq!(fs::read(&output).unwrap(), vec![0xBB; 20]);

        let missing = with_fs(&mut mgr, FamilyArg::Psram, true, |fs| cmd_rm(fs, "cfg"));
        assert!(matches!(missing, Err(CliError::Fs(FsError::NotFound))));
        assert_eq!(mgr.reserved_count(), 0);

        fs::remove_dir_all(&dir).unwrap();
    }
}
