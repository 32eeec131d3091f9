//! Static target table

use super::TargetDevice;

/// Mask applied to a raw identity before lookup (clears DSU DID.REVISION)
pub const DEVICE_ID_MASK: u32 = 0xFFFF_F0FF;

const KIB: u32 = 1024;

/// Known targets
pub static TARGETS: &[TargetDevice] = &[
    TargetDevice { device_id: 0x1001_0000, name: "SAMD21J18A", flash_size: 256 * KIB },
    TargetDevice { device_id: 0x1001_0001, name: "SAMD21J17A", flash_size: 128 * KIB },
    TargetDevice { device_id: 0x1001_0002, name: "SAMD21J16A", flash_size: 64 * KIB },
    TargetDevice { device_id: 0x1001_0003, name: "SAMD21J15A", flash_size: 32 * KIB },
    TargetDevice { device_id: 0x1001_0005, name: "SAMD21G18A", flash_size: 256 * KIB },
    TargetDevice { device_id: 0x1001_0006, name: "SAMD21G17A", flash_size: 128 * KIB },
    TargetDevice { device_id: 0x1001_0007, name: "SAMD21G16A", flash_size: 64 * KIB },
    TargetDevice { device_id: 0x1001_0008, name: "SAMD21G15A", flash_size: 32 * KIB },
    TargetDevice { device_id: 0x1001_000A, name: "SAMD21E18A", flash_size: 256 * KIB },
    TargetDevice { device_id: 0x1001_000B, name: "SAMD21E17A", flash_size: 128 * KIB },
    TargetDevice { device_id: 0x1001_000C, name: "SAMD21E16A", flash_size: 64 * KIB },
    TargetDevice { device_id: 0x1001_000D, name: "SAMD21E15A", flash_size: 32 * KIB },
];

/// Look up a target by its raw identity register value
pub fn find_by_device_id(raw: u32) -> Option<&'static TargetDevice> {
    let id = raw & DEVICE_ID_MASK;
    TARGETS.iter().find(|t| t.device_id == id)
}

/// Look up a target by name (case-insensitive)
pub fn find_by_name(name: &str) -> Option<&'static TargetDevice> {
    TARGETS.iter().find(|t| t.name.eq_ignore_ascii_case(name))
}
