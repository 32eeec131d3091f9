//! List commands implementation

use crate::links;
use multiflash_core::target::{self, TARGETS};

/// List all available debug links
pub fn list_links() {
    let links = links::available_links();
    if links.is_empty() {
        println!("{}", links::link_help());
        return;
    }

    println!("Available debug links:");
    println!();
    for l in &links {
        let aliases = if l.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", l.aliases.join(", "))
        };
        println!("  {:8} - {}{}", l.name, l.description, aliases);
    }
}

/// List all supported targets
pub fn list_targets() {
    println!("Supported targets:");
    println!();
    println!("{:<12} {:>10} {:>12}", "Name", "Flash", "Device ID");
    println!("{}", "-".repeat(36));

    for t in TARGETS {
        println!(
            "{:<12} {:>10} {:>#12x}",
            t.name,
            format_size(t.flash_size),
            t.device_id
        );
    }

    println!();
    println!(
        "Revision bits are ignored when matching (mask {:#010x})",
        target::DEVICE_ID_MASK
    );
}

fn format_size(bytes: u32) -> String {
    if bytes >= 1024 * 1024 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
