//! Control loop
//!
//! Single-threaded: each pass polls the volume for changes, then waits
//! briefly for a user request. A programming attempt runs to completion
//! inside the loop before polling resumes. Only the blocking stdin read
//! lives on its own thread, and it does nothing but forward lines.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use multiflash_core::flash::{flash_image, FlashConfig};
use multiflash_core::image::ImageSource;
use multiflash_core::link::DebugLink;
use multiflash_core::notify::ChangeNotifier;
use multiflash_core::status::{announce_discovery, StatusSink};
use multiflash_core::Result as FlashResult;

use super::ThreadYield;
use crate::volume::{DirSnapshot, DirVolume};

/// How often the volume is polled for changes
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A request from the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Flash,
    Quit,
}

fn parse_input(line: &str) -> Input {
    match line.trim() {
        "q" | "quit" | "exit" => Input::Quit,
        _ => Input::Flash,
    }
}

/// Forward stdin lines as requests; end of input quits
fn spawn_input() -> Receiver<Input> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let input = parse_input(&line);
            if tx.send(input).is_err() || input == Input::Quit {
                return;
            }
        }
        let _ = tx.send(Input::Quit);
    });
    rx
}

/// Volume, settle timer and link owned by the control loop
pub struct Session<L> {
    source: ImageSource<DirVolume>,
    notifier: ChangeNotifier,
    snapshot: DirSnapshot,
    link: L,
    config: FlashConfig,
}

impl<L: DebugLink> Session<L> {
    /// Create a session; call [`Session::rescan`] before the first request
    pub fn new(volume: DirVolume, link: L, config: FlashConfig, settle_ms: u64) -> Self {
        Self {
            source: ImageSource::new(volume),
            notifier: ChangeNotifier::new(settle_ms),
            snapshot: DirSnapshot::default(),
            link,
            config,
        }
    }

    /// Scan the volume and report the result
    pub fn rescan(&mut self, sink: &mut dyn StatusSink) {
        self.snapshot = self.take_snapshot();
        let report = self.source.rescan();
        log::debug!("Rescanned volume: {:?}", report);
        announce_discovery(sink, self.source.image(), report);
    }

    /// Feed directory changes into the settle timer and rescan once the
    /// volume has been quiet for the settle window
    ///
    /// Returns whether a rescan happened.
    pub fn poll_volume(&mut self, now_ms: u64, sink: &mut dyn StatusSink) -> bool {
        let snapshot = self.take_snapshot();
        if snapshot != self.snapshot {
            log::trace!(
                "Volume changed at {} ms ({} files)",
                now_ms,
                snapshot.file_count()
            );
            self.snapshot = snapshot;
            self.notifier.note_flush(now_ms);
        }

        if self.notifier.changed(now_ms) {
            self.rescan(sink);
            true
        } else {
            false
        }
    }

    /// Handle a flash request
    ///
    /// Refused with a status line while the volume is still being written.
    /// Returns `None` when refused.
    pub fn request_flash(
        &mut self,
        now_ms: u64,
        mut sink: &mut dyn StatusSink,
    ) -> Option<FlashResult<()>> {
        if self.notifier.changing(now_ms) {
            sink.on_status("volume is changing, try again");
            return None;
        }

        Some(flash_image(
            &mut self.link,
            self.source.image_mut(),
            &mut sink,
            &mut ThreadYield,
            &self.config,
        ))
    }

    #[cfg(test)]
    fn link(&self) -> &L {
        &self.link
    }

    fn take_snapshot(&mut self) -> DirSnapshot {
        match self.source.volume_mut().snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::debug!("Volume snapshot failed: {}", e);
                DirSnapshot::default()
            }
        }
    }
}

/// Run the control loop until the user quits
pub fn run_loop<L: DebugLink>(
    session: &mut Session<L>,
    sink: &mut dyn StatusSink,
) -> Result<(), Box<dyn std::error::Error>> {
    let epoch = Instant::now();
    let now_ms = || epoch.elapsed().as_millis() as u64;
    let input = spawn_input();

    session.rescan(sink);
    sink.on_status("press Enter to flash, q to quit");

    loop {
        session.poll_volume(now_ms(), sink);

        match input.recv_timeout(POLL_INTERVAL) {
            Ok(Input::Flash) => match session.request_flash(now_ms(), sink) {
                Some(Ok(())) => log::info!("Attempt complete"),
                Some(Err(e)) => log::debug!("Attempt failed: {}", e.tag()),
                None => {}
            },
            Ok(Input::Quit) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    log::info!("Leaving control loop");
    Ok(())
}
