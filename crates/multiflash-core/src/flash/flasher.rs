//! The programming state machine

use maybe_async::maybe_async;

use crate::error::{Error, Result};
use crate::fuse::UserRow;
use crate::image::{CompositeImage, SegmentFile};
use crate::link::{DebugLink, LinkResult, BLOCK_SIZE};
use crate::status::{Phase, StatusSink, StatusSinkExt};
use crate::target::{self, TargetDevice};

use super::{FlashConfig, Scheduler};

/// Value used to pad a short final block
const PAD_BYTE: u8 = 0xFF;

/// Label passed to [`StatusSink::on_start`] for every attempt
const START_LABEL: &str = "Flashing";

/// Where an attempt currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlashState {
    /// Initial state, link not opened yet
    Disconnected,
    /// Link open, reading the target identity
    Selecting,
    /// Checking and releasing the protection row
    Negotiating,
    /// Writing blocks
    Programming,
    /// Reading blocks back
    Verifying,
    /// Re-protecting the boot region
    Protecting,
    /// Attempt succeeded
    Complete,
    /// Attempt failed
    Failed,
}

impl FlashState {
    /// Whether the attempt has finished, successfully or not
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// One programming attempt
///
/// The flasher owns the link for its lifetime and borrows the image. Link
/// diagnostics queued while the attempt runs are forwarded to the attempt's
/// own sink; once teardown begins they are dropped.
pub struct Flasher<'a, L: ?Sized, F, Y: ?Sized> {
    link: &'a mut L,
    image: &'a mut CompositeImage<F>,
    sink: &'a mut dyn StatusSink,
    scheduler: &'a mut Y,
    config: FlashConfig,
    state: FlashState,
    target: Option<&'static TargetDevice>,
    route_diagnostics: bool,
}

impl<'a, L, F, Y> Flasher<'a, L, F, Y>
where
    L: DebugLink + ?Sized,
    F: SegmentFile,
    Y: Scheduler + ?Sized,
{
    /// Prepare an attempt; nothing touches the link until [`Flasher::run`]
    pub fn new(
        link: &'a mut L,
        image: &'a mut CompositeImage<F>,
        sink: &'a mut dyn StatusSink,
        scheduler: &'a mut Y,
        config: FlashConfig,
    ) -> Self {
        Self {
            link,
            image,
            sink,
            scheduler,
            config,
            state: FlashState::Disconnected,
            target: None,
            route_diagnostics: false,
        }
    }

    /// Current state
    pub fn state(&self) -> FlashState {
        self.state
    }

    /// Target identified during selection
    pub fn target(&self) -> Option<&'static TargetDevice> {
        self.target
    }

    /// Run the whole attempt to a terminal state
    ///
    /// Every failure is reported to the sink before returning. The link is
    /// torn down on both paths, except when the image has no boot segment:
    /// then the attempt is rejected without any link traffic.
    #[maybe_async]
    pub async fn run(&mut self) -> Result<()> {
        if !self.image.is_ready() {
            self.fail(Error::NoBootImage);
            return Err(Error::NoBootImage);
        }

        self.sink.on_start(START_LABEL);

        let result = self.attempt().await;
        match result {
            Ok(()) => {
                let total = self.image.total_size();
                self.state = FlashState::Complete;
                log::info!("Flash complete ({} bytes)", total);
                self.sink.on_progress(Phase::Complete, total, total);
            }
            Err(e) => self.fail(e),
        }

        self.teardown().await;
        result
    }

    #[maybe_async]
    async fn attempt(&mut self) -> Result<()> {
        self.start().await?;
        self.program().await?;
        self.verify().await?;
        self.protect().await
    }

    /// Connect, identify the target and release its protection bits
    ///
    /// An unlock write only takes effect after a reset, so the connect
    /// sequence runs a second time after writing the row. If the bits are
    /// still set on that second pass the attempt fails.
    #[maybe_async]
    pub async fn start(&mut self) -> Result<()> {
        if !self.image.is_ready() {
            return Err(Error::NoBootImage);
        }

        // Anything queued before this attempt belongs to someone else
        while let Some(stale) = self.link.take_diagnostic() {
            log::debug!("Discarding stale link diagnostic: {}", stale);
        }
        self.route_diagnostics = true;

        let mut unlock_written = false;
        loop {
            self.connect().await?;
            self.select().await?;

            self.state = FlashState::Negotiating;
            let r = self.link.read_protection_row().await;
            let mut row = self.check(r)?;
            log::debug!("User row: {}", row);

            if row.is_erased() {
                log::info!("User row erased, starting from factory default");
                row = UserRow::factory_default();
            }

            if row.is_unlocked() {
                return Ok(());
            }
            if unlock_written {
                log::error!("Protection bits still set after unlock: {}", row);
                return Err(Error::UnprotectFailed);
            }

            row.unlock();
            let r = self.link.write_protection_row(&row).await;
            self.check(r)?;
            unlock_written = true;
            self.sink.on_status("NVRAM now unprotected, resetting");
        }
    }

    #[maybe_async]
    async fn connect(&mut self) -> Result<()> {
        self.state = FlashState::Disconnected;
        let clock = self.config.clock_khz;

        log::debug!("Connecting at {} kHz", clock);
        let r = self.link.reset().await;
        self.check(r)?;
        let r = self.link.connect().await;
        self.check(r)?;
        let r = self.link.configure_transfer(self.config.transfer()).await;
        self.check(r)?;
        let r = self.link.configure_link_mode(self.config.turnaround).await;
        self.check(r)?;
        let r = self.link.reset_link().await;
        self.check(r)?;
        let r = self.link.set_clock(clock).await;
        self.check(r)?;
        let r = self.link.reset_target_hardware().await;
        self.check(r)?;
        let r = self.link.reset_link().await;
        self.check(r)?;
        let r = self.link.prepare_target().await;
        self.check(r)
    }

    #[maybe_async]
    async fn select(&mut self) -> Result<()> {
        self.state = FlashState::Selecting;

        let r = self.link.select_target().await;
        let raw = match self.check(r)? {
            None | Some(0) => return Err(Error::NoTarget),
            Some(raw) => raw,
        };
        let device = target::find_by_device_id(raw).ok_or(Error::UnknownDevice(raw))?;

        log::info!("Found {} (DID {:#010x})", device.name, raw);
        self.sink.status_fmt(format_args!(
            "->{}, {}k",
            device.name,
            device.flash_size_kib()
        ));
        self.target = Some(device);
        Ok(())
    }

    /// Write the image, skipping blocks the target already holds
    #[maybe_async]
    pub async fn program(&mut self) -> Result<()> {
        self.state = FlashState::Programming;
        let total = self.image.total_size();
        let start = self.link.program_start_address();

        if let Some(device) = self.target {
            let capacity = device.flash_size.saturating_sub(start);
            if total > capacity {
                return Err(Error::ImageTooLarge {
                    size: total,
                    capacity,
                });
            }
        }

        if self.config.erase_before_program {
            log::info!("Erasing target flash");
            let r = self.link.erase_all().await;
            self.check(r)?;
        }

        log::info!("Programming {} bytes at {:#010x}", total, start);
        self.image.rewind()?;

        let mut file_buf = [0u8; BLOCK_SIZE];
        let mut flash_buf = [0u8; BLOCK_SIZE];
        let mut offset = 0u32;
        let mut skipped = 0u32;

        loop {
            let n = self.image.read_next(&mut file_buf)?;
            if n == 0 {
                break;
            }
            file_buf[n..].fill(PAD_BYTE);

            let addr = start + offset;
            let r = self.link.read_block(addr, &mut flash_buf).await;
            self.check(r)?;

            if flash_buf[..n] == file_buf[..n] {
                log::trace!("Block {:#010x} unchanged", addr);
                skipped += 1;
            } else {
                let r = self.link.program_block(addr, &file_buf).await;
                self.check(r)?;
            }

            // Auto-increment addressing needs whole blocks, even for a short tail
            offset += BLOCK_SIZE as u32;
            self.sink
                .on_progress(Phase::Programming, offset.min(total), total);
            self.scheduler.yield_now().await;
        }

        log::debug!("{} unchanged blocks skipped", skipped);
        Ok(())
    }

    /// Read every block back and compare it with the image
    #[maybe_async]
    pub async fn verify(&mut self) -> Result<()> {
        self.state = FlashState::Verifying;
        let total = self.image.total_size();
        let start = self.link.program_start_address();

        log::info!("Verifying {} bytes", total);
        self.image.rewind()?;

        let mut file_buf = [0u8; BLOCK_SIZE];
        let mut flash_buf = [0u8; BLOCK_SIZE];
        let mut offset = 0u32;

        loop {
            let n = self.image.read_next(&mut file_buf)?;
            if n == 0 {
                break;
            }

            let addr = start + offset;
            let r = self.link.read_block(addr, &mut flash_buf).await;
            self.check(r)?;

            if flash_buf[..n] != file_buf[..n] {
                return Err(Error::VerifyMismatch { addr });
            }

            offset += BLOCK_SIZE as u32;
            self.sink
                .on_progress(Phase::Verifying, offset.min(total), total);
            self.scheduler.yield_now().await;
        }

        Ok(())
    }

    /// Protect the boot region again and reset the target
    #[maybe_async]
    pub async fn protect(&mut self) -> Result<()> {
        if !self.config.protect_after {
            log::debug!("Leaving boot region unprotected");
            return Ok(());
        }
        self.state = FlashState::Protecting;

        let r = self.link.read_protection_row().await;
        let mut row = self.check(r)?;
        row.set_boot_prot(self.config.protect_level);
        log::info!("Boot region: {}", self.config.protect_level);

        let r = self.link.write_protection_row(&row).await;
        self.check(r)?;
        let r = self.link.reset_target_hardware().await;
        self.check(r)
    }

    /// Lower the clock and release the target, ignoring failures
    #[maybe_async]
    async fn teardown(&mut self) {
        self.route_diagnostics = false;
        self.forward_diagnostics();

        if let Err(e) = self.link.set_clock(self.config.clock_khz).await {
            log::debug!("Teardown: {}", e);
        }
        if let Err(e) = self.link.deselect().await {
            log::debug!("Teardown: {}", e);
        }
        if let Err(e) = self.link.disconnect().await {
            log::debug!("Teardown: {}", e);
        }

        self.forward_diagnostics();
    }

    fn fail(&mut self, e: Error) {
        self.state = FlashState::Failed;
        log::error!("Flash failed ({}): {}", e.tag(), e);
        self.sink.error_fmt(format_args!("{}", e));
    }

    /// Pass queued link diagnostics on and lift a link result into [`Error`]
    fn check<T>(&mut self, r: LinkResult<T>) -> Result<T> {
        self.forward_diagnostics();
        r.map_err(|e| {
            log::debug!("Link step failed: {}", e);
            Error::Link(e)
        })
    }

    fn forward_diagnostics(&mut self) {
        while let Some(msg) = self.link.take_diagnostic() {
            if self.route_diagnostics {
                self.sink.error_fmt(format_args!("link error: {}", msg));
            } else {
                log::debug!("Dropping link diagnostic: {}", msg);
            }
        }
    }
}

/// Run one attempt with a fresh [`Flasher`]
#[maybe_async]
pub async fn flash_image<L, F, S, Y>(
    link: &mut L,
    image: &mut CompositeImage<F>,
    sink: &mut S,
    scheduler: &mut Y,
    config: &FlashConfig,
) -> Result<()>
where
    L: DebugLink + ?Sized,
    F: SegmentFile,
    S: StatusSink,
    Y: Scheduler + ?Sized,
{
    Flasher::new(link, image, sink, scheduler, *config).run().await
}
