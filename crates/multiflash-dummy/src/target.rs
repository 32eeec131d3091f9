//! Emulated SAM D21 behind a debug link

use alloc::collections::VecDeque;
use alloc::vec;
use alloc::vec::Vec;

use maybe_async::maybe_async;
use multiflash_core::fuse::{BootProt, UserRow};
use multiflash_core::link::{
    DebugLink, Diagnostic, LinkError, LinkFault, LinkOp, LinkResult, TransferConfig, BLOCK_SIZE,
};
use multiflash_core::target;

/// Number of lock regions the flash is split into
const LOCK_REGIONS: u32 = 16;

/// Configuration for the emulated target
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Identity returned by target selection; 0 means nothing is attached
    pub device_id: u32,
    /// Flash size in bytes
    pub flash_size: u32,
    /// First address handed to the orchestrator
    pub program_start: u32,
    /// User row contents at power-up
    pub user_row: UserRow,
    /// Row writes are accepted but never take effect
    pub stuck_protection: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            device_id: 0x1001_0305, // SAMD21G18A rev D
            flash_size: 256 * 1024,
            program_start: 0,
            user_row: UserRow::factory_default(),
            stuck_protection: false,
        }
    }
}

/// Operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DummyStats {
    /// Successful connects
    pub connects: u32,
    /// Target hardware resets
    pub resets: u32,
    /// User row writes accepted
    pub row_writes: u32,
    /// Chip erases
    pub erases: u32,
    /// Blocks read
    pub blocks_read: u32,
    /// Blocks programmed
    pub blocks_programmed: u32,
}

/// An emulated target
///
/// User row writes go to the stored row and take effect on the next
/// hardware reset, like on the real part. Programming honours the
/// boot-protect size and region lock bits of the row in effect.
pub struct DummyTarget {
    config: DummyConfig,
    flash: Vec<u8>,
    stored_row: UserRow,
    active_row: UserRow,
    connected: bool,
    prepared: bool,
    selected: bool,
    clock_khz: u32,
    transfer: Option<TransferConfig>,
    faults: Vec<(LinkOp, LinkFault)>,
    corrupt_blocks: Vec<u32>,
    diagnostics: VecDeque<Diagnostic>,
    ops: Vec<LinkOp>,
    stats: DummyStats,
}

impl DummyTarget {
    /// Create a target with erased flash
    pub fn new(config: DummyConfig) -> Self {
        let flash = vec![0xFF; config.flash_size as usize];
        let row = config.user_row;
        Self {
            config,
            flash,
            stored_row: row,
            active_row: row,
            connected: false,
            prepared: false,
            selected: false,
            clock_khz: 0,
            transfer: None,
            faults: Vec::new(),
            corrupt_blocks: Vec::new(),
            diagnostics: VecDeque::new(),
            ops: Vec::new(),
            stats: DummyStats::default(),
        }
    }

    /// Create a default SAMD21G18A with factory user row
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Flash contents
    pub fn flash(&self) -> &[u8] {
        &self.flash
    }

    /// Mutable flash contents
    pub fn flash_mut(&mut self) -> &mut [u8] {
        &mut self.flash
    }

    /// Row as stored in NVM (what a read returns)
    pub fn stored_row(&self) -> UserRow {
        self.stored_row
    }

    /// Row latched at the last reset (what protection enforcement uses)
    pub fn active_row(&self) -> UserRow {
        self.active_row
    }

    /// Link clock last set
    pub fn clock_khz(&self) -> u32 {
        self.clock_khz
    }

    /// Transfer parameters last configured
    pub fn transfer_config(&self) -> Option<TransferConfig> {
        self.transfer
    }

    /// Every link step seen so far, failed ones included
    pub fn ops(&self) -> &[LinkOp] {
        &self.ops
    }

    /// Operation counters
    pub fn stats(&self) -> DummyStats {
        self.stats
    }

    /// Forget the operation log and counters
    pub fn clear_log(&mut self) {
        self.ops.clear();
        self.stats = DummyStats::default();
    }

    /// Whether the link is currently open
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Fail the next `op` with `fault` and queue a diagnostic for it
    pub fn inject_fault(&mut self, op: LinkOp, fault: LinkFault) {
        self.faults.push((op, fault));
    }

    /// Flip a bit in every read-back of the block at `addr`
    pub fn corrupt_readback(&mut self, addr: u32) {
        self.corrupt_blocks.push(addr);
    }

    /// Queue a diagnostic as if the transport had printed it
    pub fn push_diagnostic(&mut self, text: &str) {
        let mut msg = Diagnostic::new();
        for c in text.chars() {
            if msg.push(c).is_err() {
                break;
            }
        }
        self.diagnostics.push_back(msg);
    }

    fn step(&mut self, op: LinkOp) -> LinkResult<()> {
        self.ops.push(op);
        log::trace!("dummy: {}", op);

        if let Some(i) = self.faults.iter().position(|&(o, _)| o == op) {
            let (_, fault) = self.faults.remove(i);
            self.push_fault_diagnostic(fault);
            return Err(LinkError::new(op, fault));
        }
        Ok(())
    }

    fn push_fault_diagnostic(&mut self, fault: LinkFault) {
        let mut msg = Diagnostic::new();
        // Longest fault text fits comfortably
        let _ = core::fmt::Write::write_fmt(&mut msg, format_args!("{}", fault));
        self.diagnostics.push_back(msg);
    }

    fn require(&self, op: LinkOp, ready: bool) -> LinkResult<()> {
        if ready {
            Ok(())
        } else {
            Err(LinkError::new(op, LinkFault::NoAck))
        }
    }

    fn block_range(&self, op: LinkOp, addr: u32) -> LinkResult<core::ops::Range<usize>> {
        let end = addr as usize + BLOCK_SIZE;
        if addr as usize % BLOCK_SIZE != 0 || end > self.flash.len() {
            return Err(LinkError::new(op, LinkFault::Fault));
        }
        Ok(addr as usize..end)
    }

    fn is_write_protected(&self, addr: u32) -> bool {
        if addr < self.active_row.boot_prot().protected_bytes() {
            return true;
        }
        let region_size = (self.config.flash_size / LOCK_REGIONS).max(1);
        self.active_row.region_locked(addr / region_size)
    }
}

#[maybe_async(AFIT)]
impl DebugLink for DummyTarget {
    async fn connect(&mut self) -> LinkResult<()> {
        self.step(LinkOp::Connect)?;
        self.connected = true;
        self.stats.connects += 1;
        Ok(())
    }

    async fn configure_transfer(&mut self, config: TransferConfig) -> LinkResult<()> {
        self.step(LinkOp::ConfigureTransfer)?;
        self.require(LinkOp::ConfigureTransfer, self.connected)?;
        self.transfer = Some(config);
        Ok(())
    }

    async fn configure_link_mode(&mut self, _turnaround: u8) -> LinkResult<()> {
        self.step(LinkOp::ConfigureLinkMode)?;
        self.require(LinkOp::ConfigureLinkMode, self.connected)
    }

    async fn reset_link(&mut self) -> LinkResult<()> {
        self.step(LinkOp::ResetLink)?;
        self.require(LinkOp::ResetLink, self.connected)
    }

    async fn set_clock(&mut self, khz: u32) -> LinkResult<()> {
        self.step(LinkOp::SetClock)?;
        self.require(LinkOp::SetClock, self.connected)?;
        self.clock_khz = khz;
        Ok(())
    }

    async fn reset_target_hardware(&mut self) -> LinkResult<()> {
        self.step(LinkOp::ResetTarget)?;
        self.require(LinkOp::ResetTarget, self.connected)?;
        self.active_row = self.stored_row;
        self.prepared = false;
        self.selected = false;
        self.stats.resets += 1;
        log::debug!("dummy: reset, user row {}", self.active_row);
        Ok(())
    }

    async fn prepare_target(&mut self) -> LinkResult<()> {
        self.step(LinkOp::PrepareTarget)?;
        self.require(LinkOp::PrepareTarget, self.connected)?;
        self.prepared = true;
        Ok(())
    }

    async fn select_target(&mut self) -> LinkResult<Option<u32>> {
        self.step(LinkOp::SelectTarget)?;
        self.require(LinkOp::SelectTarget, self.prepared)?;
        if self.config.device_id == 0 {
            return Ok(None);
        }
        self.selected = target::find_by_device_id(self.config.device_id).is_some();
        Ok(Some(self.config.device_id))
    }

    async fn read_protection_row(&mut self) -> LinkResult<UserRow> {
        self.step(LinkOp::ReadProtectionRow)?;
        self.require(LinkOp::ReadProtectionRow, self.selected)?;
        Ok(self.stored_row)
    }

    async fn write_protection_row(&mut self, row: &UserRow) -> LinkResult<()> {
        self.step(LinkOp::WriteProtectionRow)?;
        self.require(LinkOp::WriteProtectionRow, self.selected)?;
        self.stats.row_writes += 1;
        if self.config.stuck_protection {
            log::debug!("dummy: ignoring row write {}", row);
        } else {
            self.stored_row = *row;
        }
        Ok(())
    }

    async fn erase_all(&mut self) -> LinkResult<()> {
        self.step(LinkOp::EraseAll)?;
        self.require(LinkOp::EraseAll, self.selected)?;
        self.flash.fill(0xFF);
        self.stats.erases += 1;
        Ok(())
    }

    async fn read_block(&mut self, addr: u32, buf: &mut [u8; BLOCK_SIZE]) -> LinkResult<()> {
        self.step(LinkOp::ReadBlock)?;
        self.require(LinkOp::ReadBlock, self.selected)?;
        let range = self.block_range(LinkOp::ReadBlock, addr)?;
        buf.copy_from_slice(&self.flash[range]);
        if self.corrupt_blocks.contains(&addr) {
            buf[0] ^= 0x01;
        }
        self.stats.blocks_read += 1;
        Ok(())
    }

    async fn program_block(&mut self, addr: u32, data: &[u8; BLOCK_SIZE]) -> LinkResult<()> {
        self.step(LinkOp::ProgramBlock)?;
        self.require(LinkOp::ProgramBlock, self.selected)?;
        let range = self.block_range(LinkOp::ProgramBlock, addr)?;
        if self.is_write_protected(addr) {
            log::debug!("dummy: {:#010x} is write protected", addr);
            return Err(LinkError::new(LinkOp::ProgramBlock, LinkFault::Fault));
        }
        self.flash[range].copy_from_slice(data);
        self.stats.blocks_programmed += 1;
        Ok(())
    }

    fn program_start_address(&self) -> u32 {
        self.config.program_start
    }

    async fn deselect(&mut self) -> LinkResult<()> {
        self.step(LinkOp::Deselect)?;
        self.selected = false;
        Ok(())
    }

    async fn disconnect(&mut self) -> LinkResult<()> {
        self.step(LinkOp::Disconnect)?;
        self.connected = false;
        self.prepared = false;
        self.selected = false;
        Ok(())
    }

    fn take_diagnostic(&mut self) -> Option<Diagnostic> {
        self.diagnostics.pop_front()
    }
}

/// Build a [`DummyConfig`] from `key=value` link options
///
/// Recognised keys: `device` (identity, hex with `0x` or a part name from
/// the target table, `none` for no target), `flash_kib`, `start`,
/// `locked` and `stuck`.
#[cfg(feature = "std")]
pub fn parse_options(options: &[(&str, &str)]) -> Result<DummyConfig, String> {
    use alloc::format;
    use alloc::string::String;

    let mut config = DummyConfig::default();
    let mut flash_set = false;

    for (key, value) in options {
        match *key {
            "device" => {
                if value.eq_ignore_ascii_case("none") {
                    config.device_id = 0;
                } else if let Some(t) = target::find_by_name(value) {
                    config.device_id = t.device_id;
                    if !flash_set {
                        config.flash_size = t.flash_size;
                    }
                } else {
                    let hex = value.trim_start_matches("0x").trim_start_matches("0X");
                    config.device_id = u32::from_str_radix(hex, 16)
                        .map_err(|_| format!("Invalid device value: {}", value))?;
                    if let Some(t) = target::find_by_device_id(config.device_id) {
                        if !flash_set {
                            config.flash_size = t.flash_size;
                        }
                    }
                }
            }
            "flash_kib" => {
                let kib: u32 = value
                    .parse()
                    .map_err(|_| format!("Invalid flash_kib value: {}", value))?;
                if kib == 0 {
                    return Err(String::from("flash_kib must be at least 1"));
                }
                config.flash_size = kib
                    .checked_mul(1024)
                    .ok_or_else(|| format!("Invalid flash_kib value: {}", value))?;
                flash_set = true;
            }
            "start" => {
                let hex = value.trim_start_matches("0x").trim_start_matches("0X");
                let start = u32::from_str_radix(hex, 16)
                    .map_err(|_| format!("Invalid start value: {}", value))?;
                if start as usize % BLOCK_SIZE != 0 {
                    return Err(format!("start must be a multiple of {}", BLOCK_SIZE));
                }
                config.program_start = start;
            }
            "locked" => {
                if parse_bool(key, value)? {
                    let mut row = UserRow::factory_default();
                    row.set_boot_prot(BootProt::WIDEST);
                    row.set_lock(0x0000);
                    config.user_row = row;
                }
            }
            "stuck" => config.stuck_protection = parse_bool(key, value)?,
            _ => {
                log::warn!("dummy: Unknown option: {}={}", key, value);
            }
        }
    }

    if config.program_start >= config.flash_size {
        return Err(format!(
            "start {:#x} is beyond the end of flash ({} KiB)",
            config.program_start,
            config.flash_size / 1024
        ));
    }

    Ok(config)
}

#[cfg(feature = "std")]
fn parse_bool(key: &str, value: &str) -> Result<bool, String> {
    match value {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(alloc::format!("Invalid {} value: {}", key, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemVolume;
    use multiflash_core::flash::{flash_image, FlashConfig, FlashState, Flasher, NoYield};
    use multiflash_core::image::{discover, CompositeImage, ImageSource, SegmentKind};
    use multiflash_core::status::{announce_discovery, Phase, StatusSink};
    use multiflash_core::Error;

    #[derive(Default)]
    struct Events(Vec<String>);

    impl StatusSink for Events {
        fn on_start(&mut self, label: &str) {
            self.0.push(format!("start: {label}"));
        }

        fn on_status(&mut self, text: &str) {
            self.0.push(format!("status: {text}"));
        }

        fn on_error(&mut self, text: &str) {
            self.0.push(format!("error: {text}"));
        }

        fn on_clear(&mut self) {
            self.0.push("clear".into());
        }

        fn on_images_discovered(&mut self, images: &multiflash_core::image::ImageSummary<'_>) {
            self.0.push(format!(
                "images: {} {} / {} {}",
                images.boot_name, images.boot_size, images.app_name, images.app_size
            ));
        }

        fn on_progress(&mut self, phase: Phase, done: u32, total: u32) {
            if phase == Phase::Complete {
                self.0.push(format!("complete: {done}/{total}"));
            }
        }
    }

    impl Events {
        fn errors(&self) -> Vec<&str> {
            self.0
                .iter()
                .filter_map(|e| e.strip_prefix("error: "))
                .collect()
        }
    }

    fn bytes(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(13) ^ seed).collect()
    }

    fn volume(boot: &[u8], app: &[u8]) -> MemVolume {
        MemVolume::new()
            .with_file("boot.bin", boot)
            .with_file("app.bin", app)
    }

    fn image(vol: &mut MemVolume) -> CompositeImage<crate::MemFile> {
        discover(vol).unwrap().image
    }

    #[test]
    fn test_full_cycle() {
        let boot = bytes(8 * 1024, 0x5A);
        let app = bytes(3000, 0xA5);
        let mut vol = volume(&boot, &app);
        let mut image = image(&mut vol);
        let mut target = DummyTarget::new_default();
        let mut events = Events::default();

        flash_image(
            &mut target,
            &mut image,
            &mut events,
            &mut NoYield,
            &FlashConfig::default(),
        )
        .unwrap();

        assert_eq!(&target.flash()[..8192], &boot[..]);
        assert_eq!(&target.flash()[8192..8192 + 3000], &app[..]);
        assert!(target.flash()[8192 + 3000..].iter().all(|&b| b == 0xFF));

        // Factory row protects the bootloader, so one unlock pass was needed
        assert_eq!(target.stats().connects, 2);
        assert_eq!(target.stored_row().boot_prot(), BootProt::NARROWEST);
        assert_eq!(target.stored_row().lock(), 0xFFFF);
        assert_eq!(target.active_row().boot_prot(), BootProt::NARROWEST);
        assert_eq!(target.clock_khz(), 50);
        assert_eq!(target.transfer_config(), Some(TransferConfig::default()));
        assert!(!target.is_connected());

        assert_eq!(
            events.0,
            [
                "start: Flashing",
                "status: ->SAMD21G18A, 256k",
                "status: NVRAM now unprotected, resetting",
                "status: ->SAMD21G18A, 256k",
                "complete: 11192/11192",
            ]
        );
    }

    #[test]
    fn test_reflash_skips_identical_blocks() {
        let mut vol = volume(&bytes(1024, 1), &bytes(1000, 2));
        let mut image = image(&mut vol);
        let mut target = DummyTarget::new_default();
        let config = FlashConfig::default();

        flash_image(&mut target, &mut image, &mut Events::default(), &mut NoYield, &config)
            .unwrap();
        assert_eq!(target.stats().blocks_programmed, 8);

        target.clear_log();
        flash_image(&mut target, &mut image, &mut Events::default(), &mut NoYield, &config)
            .unwrap();
        assert_eq!(target.stats().blocks_programmed, 0);
        assert_eq!(target.stats().blocks_read, 16);
    }

    #[test]
    fn test_corrupted_readback() {
        let mut vol = volume(&bytes(1024, 3), &bytes(512, 4));
        let mut image = image(&mut vol);
        let mut target = DummyTarget::new_default();
        target.corrupt_readback(0x400);
        let mut events = Events::default();

        let err = flash_image(
            &mut target,
            &mut image,
            &mut events,
            &mut NoYield,
            &FlashConfig::default(),
        )
        .unwrap_err();

        assert_eq!(err, Error::VerifyMismatch { addr: 0x400 });
        assert_eq!(events.errors(), ["mismatch @00000400"]);
        // Left unprotected, no rollback
        assert_eq!(target.stored_row().boot_prot(), BootProt::NONE);
        assert_eq!(target.ops().last(), Some(&LinkOp::Disconnect));
    }

    #[test]
    fn test_stuck_protection() {
        let config = DummyConfig {
            stuck_protection: true,
            ..DummyConfig::default()
        };
        let mut target = DummyTarget::new(config);
        let mut vol = volume(&bytes(512, 5), &[]);
        let mut image = image(&mut vol);
        let mut events = Events::default();

        let err = flash_image(
            &mut target,
            &mut image,
            &mut events,
            &mut NoYield,
            &FlashConfig::default(),
        )
        .unwrap_err();

        assert_eq!(err, Error::UnprotectFailed);
        assert_eq!(target.stats().row_writes, 1);
        assert_eq!(target.stats().connects, 2);
        assert_eq!(target.stats().blocks_programmed, 0);
        assert_eq!(events.errors(), ["unprotection failed"]);
    }

    #[test]
    fn test_fully_locked_target() {
        let mut target = DummyTarget::new(parse_options(&[("locked", "true")]).unwrap());
        assert!(target.active_row().region_locked(3));

        let mut vol = volume(&bytes(40 * 1024, 6), &[]);
        let mut image = image(&mut vol);

        flash_image(
            &mut target,
            &mut image,
            &mut Events::default(),
            &mut NoYield,
            &FlashConfig::default(),
        )
        .unwrap();
        assert_eq!(target.stats().row_writes, 2);
        assert_eq!(target.stored_row().lock(), 0xFFFF);
    }

    #[test]
    fn test_protected_region_refuses_writes() {
        let mut target = DummyTarget::new_default();
        target.connect().unwrap();
        target.prepare_target().unwrap();
        target.select_target().unwrap();

        let data = [0u8; BLOCK_SIZE];
        // Factory row protects the first 8 KiB
        let err = target.program_block(0x1F00, &data).unwrap_err();
        assert_eq!(err, LinkError::new(LinkOp::ProgramBlock, LinkFault::Fault));
        target.program_block(0x2000, &data).unwrap();

        // Misaligned and out of range
        assert!(target.program_block(0x2010, &data).is_err());
        assert!(target.program_block(256 * 1024, &data).is_err());
    }

    #[test]
    fn test_no_target_and_unknown_device() {
        let mut vol = volume(&bytes(256, 7), &[]);
        let mut image = image(&mut vol);

        let mut target = DummyTarget::new(parse_options(&[("device", "none")]).unwrap());
        let mut events = Events::default();
        let err = flash_image(&mut target, &mut image, &mut events, &mut NoYield, &FlashConfig::default())
            .unwrap_err();
        assert_eq!(err, Error::NoTarget);
        assert_eq!(events.errors(), ["No target device connected"]);

        let mut target = DummyTarget::new(parse_options(&[("device", "0x10810219")]).unwrap());
        let mut events = Events::default();
        let err = flash_image(&mut target, &mut image, &mut events, &mut NoYield, &FlashConfig::default())
            .unwrap_err();
        assert_eq!(err, Error::UnknownDevice(0x1081_0219));
        assert_eq!(events.errors(), ["Unknown device 0x10810219"]);
    }

    #[test]
    fn test_injected_fault_reports_diagnostic() {
        let mut vol = volume(&bytes(2048, 8), &[]);
        let mut image = image(&mut vol);
        let mut target = DummyTarget::new_default();
        target.push_diagnostic("stale");
        target.inject_fault(LinkOp::ProgramBlock, LinkFault::Wait);
        let mut events = Events::default();

        let err = flash_image(
            &mut target,
            &mut image,
            &mut events,
            &mut NoYield,
            &FlashConfig::default(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            Error::Link(LinkError::new(LinkOp::ProgramBlock, LinkFault::Wait))
        );
        assert_eq!(
            events.errors(),
            [
                "link error: WAIT retries exhausted",
                "link error: program block failed: WAIT retries exhausted",
            ]
        );
        assert!(target.take_diagnostic().is_none());
    }

    #[test]
    fn test_image_too_large_for_small_part() {
        let mut target = DummyTarget::new(parse_options(&[("device", "SAMD21E15A")]).unwrap());
        let mut vol = volume(&bytes(16 * 1024, 9), &bytes(20 * 1024, 10));
        let mut image = image(&mut vol);

        let err = flash_image(
            &mut target,
            &mut image,
            &mut Events::default(),
            &mut NoYield,
            &FlashConfig::default(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            Error::ImageTooLarge {
                size: 36 * 1024,
                capacity: 32 * 1024
            }
        );
        assert_eq!(target.stats().blocks_read, 0);
    }

    #[test]
    fn test_erase_before_program() {
        let mut target = DummyTarget::new_default();
        target.flash_mut()[0x3000] = 0x00;
        let mut vol = volume(&bytes(300, 11), &[]);
        let mut image = image(&mut vol);
        let config = FlashConfig {
            erase_before_program: true,
            protect_after: false,
            ..FlashConfig::default()
        };

        flash_image(&mut target, &mut image, &mut Events::default(), &mut NoYield, &config)
            .unwrap();

        assert_eq!(target.stats().erases, 1);
        assert_eq!(target.flash()[0x3000], 0xFF);
        assert_eq!(target.stored_row().boot_prot(), BootProt::NONE);
    }

    #[test]
    fn test_unreadable_boot_aborts_before_programming() {
        let mut vol = volume(&bytes(1024, 6), &bytes(256, 7));
        vol.fail_reads_of("boot.bin");
        let mut image = image(&mut vol);
        let mut target = DummyTarget::new_default();
        let mut events = Events::default();

        let err = flash_image(
            &mut target,
            &mut image,
            &mut events,
            &mut NoYield,
            &FlashConfig::default(),
        )
        .unwrap_err();

        let Error::ImageRead(e) = err else {
            panic!("unexpected error {:?}", err);
        };
        assert_eq!(e.segment, SegmentKind::Boot);
        let errors = events.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("error reading binaries"));
        assert!(!events.0.iter().any(|e| e.starts_with("complete")));

        // Nothing programmed or read back, link torn down
        assert!(!target.ops().contains(&LinkOp::ProgramBlock));
        assert_eq!(target.stats().blocks_programmed, 0);
        assert_eq!(target.stats().blocks_read, 0);
        assert_eq!(target.ops().last(), Some(&LinkOp::Disconnect));
        assert!(!target.is_connected());
    }

    #[test]
    fn test_missing_boot_is_rejected_without_link_traffic() {
        let mut source = ImageSource::new(MemVolume::new().with_file("app.bin", &[1; 64]));
        let report = source.rescan();
        let mut events = Events::default();
        announce_discovery(&mut events, source.image(), report);

        let mut target = DummyTarget::new_default();
        let mut sched = NoYield;
        let mut flasher = Flasher::new(
            &mut target,
            source.image_mut(),
            &mut events,
            &mut sched,
            FlashConfig::default(),
        );
        assert_eq!(flasher.run(), Err(Error::NoBootImage));
        assert_eq!(flasher.state(), FlashState::Failed);

        assert!(target.ops().is_empty());
        assert_eq!(
            events.0,
            [
                "clear",
                "error: no boot .bin file found",
                "images:  0 / app.bin 64",
                "error: no boot .bin file found",
            ]
        );
    }

    #[test]
    fn test_parse_options() {
        let c = parse_options(&[("device", "samd21j17a"), ("stuck", "yes")]).unwrap();
        assert_eq!(c.device_id, 0x1001_0001);
        assert_eq!(c.flash_size, 128 * 1024);
        assert!(c.stuck_protection);

        let c = parse_options(&[("flash_kib", "64"), ("device", "0x10010305")]).unwrap();
        assert_eq!(c.flash_size, 64 * 1024);

        assert!(parse_options(&[("device", "nope")]).is_err());
        assert!(parse_options(&[("locked", "maybe")]).is_err());
        assert!(parse_options(&[("start", "0x80")]).is_err());
        assert!(parse_options(&[("flash_kib", "0")]).is_err());
        assert_eq!(
            parse_options(&[("flash_kib", "4194304")]).unwrap_err(),
            "Invalid flash_kib value: 4194304"
        );
    }
}
