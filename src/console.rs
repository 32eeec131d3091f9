//! Console status sink
//!
//! Mirrors what the programmer prints on its serial console. Progress is
//! drawn either with indicatif bars (interactive terminals) or as the
//! serial-style `..10%..20%` trail.

use std::io::{self, Write};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use multiflash_core::image::ImageSummary;
use multiflash_core::status::{size_in_k, Phase, StatusSink};

/// How progress events are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// One indicatif bar per phase
    Bars,
    /// Percentage trail in 10% steps
    Text,
}

impl ProgressMode {
    /// Bars when stdout is a terminal, text otherwise
    pub fn detect() -> Self {
        if console_is_tty() {
            Self::Bars
        } else {
            Self::Text
        }
    }
}

fn console_is_tty() -> bool {
    use std::io::IsTerminal;
    io::stdout().is_terminal()
}

/// Create a progress bar with custom phase message
fn create_progress_bar_with_phase(total: u64, phase: Phase) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
            phase
        ));
    match style {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => log::debug!("Falling back to default progress style: {}", e),
    }
    pb
}

/// Serial-style percentage trail
#[derive(Debug, Default)]
struct PercentTrail {
    phase: Option<Phase>,
    next: u32,
}

impl PercentTrail {
    fn reset(&mut self) {
        self.phase = None;
        self.next = 0;
    }

    fn advance(&mut self, phase: Phase, done: u32, total: u32, out: &mut String) {
        if self.phase != Some(phase) {
            match phase {
                Phase::Programming => out.push_str("programming: "),
                Phase::Verifying => {
                    if self.phase.is_some() {
                        out.push('\n');
                    }
                    out.push_str("verifying:  ");
                }
                Phase::Complete => {
                    if self.phase.is_some() {
                        out.push('\n');
                    }
                    out.push_str("done\n");
                }
            }
            self.phase = Some(phase);
            self.next = 10;
        }

        if phase == Phase::Complete || total == 0 {
            return;
        }

        let pct = (u64::from(done) * 100 / u64::from(total)) as u32;
        while self.next <= pct.min(100) {
            out.push_str(&format!("..{}%", self.next));
            self.next += 10;
        }
    }
}

/// Writes status events to a console
pub struct ConsoleSink<W: Write = io::Stdout> {
    out: W,
    mode: ProgressMode,
    multi: MultiProgress,
    bar: Option<(Phase, ProgressBar)>,
    trail: PercentTrail,
}

impl ConsoleSink {
    /// Console on stdout
    pub fn stdout(mode: ProgressMode) -> Self {
        Self::new(io::stdout(), mode)
    }
}

impl<W: Write> ConsoleSink<W> {
    /// Console writing its lines to `out`
    pub fn new(out: W, mode: ProgressMode) -> Self {
        let multi = match mode {
            ProgressMode::Bars => MultiProgress::new(),
            ProgressMode::Text => MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        };
        Self {
            out,
            mode,
            multi,
            bar: None,
            trail: PercentTrail::default(),
        }
    }

    #[cfg(test)]
    fn into_inner(mut self) -> W {
        self.finish_bar();
        self.out
    }

    fn line(&mut self, text: &str) {
        let Self { out, multi, .. } = self;
        multi.suspend(|| {
            let _ = writeln!(out, "{}", text);
        });
    }

    fn finish_bar(&mut self) {
        if let Some((_, bar)) = self.bar.take() {
            bar.finish();
        }
    }

    fn bar_progress(&mut self, phase: Phase, done: u32, total: u32) {
        if phase == Phase::Complete {
            self.finish_bar();
            self.line("done");
            return;
        }

        let current = matches!(&self.bar, Some((p, _)) if *p == phase);
        if !current {
            self.finish_bar();
            let bar = self
                .multi
                .add(create_progress_bar_with_phase(u64::from(total), phase));
            self.bar = Some((phase, bar));
        }
        if let Some((_, bar)) = &self.bar {
            bar.set_length(u64::from(total));
            bar.set_position(u64::from(done));
        }
    }

    fn text_progress(&mut self, phase: Phase, done: u32, total: u32) {
        let mut chunk = String::new();
        self.trail.advance(phase, done, total, &mut chunk);
        if !chunk.is_empty() {
            let _ = self.out.write_all(chunk.as_bytes());
            let _ = self.out.flush();
        }
    }
}

impl<W: Write> StatusSink for ConsoleSink<W> {
    fn on_start(&mut self, label: &str) {
        self.finish_bar();
        self.trail.reset();
        self.line("");
        self.line(label);
        self.line(&"-".repeat(label.chars().count()));
    }

    fn on_status(&mut self, text: &str) {
        self.line(text);
    }

    fn on_error(&mut self, text: &str) {
        if self.trail.phase.is_some() && self.trail.phase != Some(Phase::Complete) {
            // Terminate a half-written percentage line first
            self.line("");
            self.trail.reset();
        }
        self.line(&format!("** {}", text));
    }

    fn on_clear(&mut self) {
        if let Some((_, bar)) = self.bar.take() {
            bar.finish_and_clear();
        }
        self.trail.reset();
    }

    fn on_images_discovered(&mut self, images: &ImageSummary<'_>) {
        let boot = segment_line("boot: ", images.boot_size, images.boot_name);
        let app = segment_line("app:  ", images.app_size, images.app_name);
        self.line(&boot);
        self.line(&app);
        self.line("");
    }

    fn on_progress(&mut self, phase: Phase, done: u32, total: u32) {
        match self.mode {
            ProgressMode::Bars => self.bar_progress(phase, done, total),
            ProgressMode::Text => self.text_progress(phase, done, total),
        }
    }
}

fn segment_line(label: &str, size: u32, name: &str) -> String {
    if name.is_empty() {
        format!("> {}---  no binary", label)
    } else {
        format!("> {}{:3}k {}", label, size_in_k(size), name)
    }
}
