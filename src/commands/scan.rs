//! Scan command

use spimem_manager::Manager;

use super::Bus;
use crate::error::Result;

/// Print the detected device table
pub fn cmd_scan(mgr: &Manager<Bus>) -> Result<()> {
    if mgr.is_empty() {
        println!("No devices found on CS {:?}", mgr.cs_list());
        return Ok(());
    }

    println!(
        "{:<5} {:<4} {:<9} {:<12} {:>12}  {:<24} Part",
        "Index", "CS", "Family", "Vendor", "Capacity", "ID"
    );
    println!("{}", "-".repeat(80));
    for (index, info) in mgr.detected().iter().enumerate() {
        let id: Vec<String> = info.id.iter().map(|b| format!("{:02X}", b)).collect();
        println!(
            "{:<5} {:<4} {:<9} {:<12} {:>12}  {:<24} {}",
            index,
            info.chip_select,
            info.family.name(),
            info.vendor_name,
            format_size(info.capacity_bytes),
            id.join(" "),
            info.part_hint.unwrap_or("-")
        );
    }
    Ok(())
}

/// Human-readable byte count
pub fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
