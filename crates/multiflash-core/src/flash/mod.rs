//! Flash orchestration
//!
//! [`Flasher`] drives one target through connect, unlock, program, verify
//! and protect, pulling data from a [`CompositeImage`](crate::image::CompositeImage)
//! and reporting to a [`StatusSink`](crate::status::StatusSink).
//!
//! Programming and verifying walk the image in [`BLOCK_SIZE`] strides and
//! call [`Scheduler::yield_now`] after every block, so the runtime's
//! background services (USB stack, UI) keep running during a long attempt.

mod config;
mod flasher;
mod scheduler;

pub use crate::link::BLOCK_SIZE;
pub use config::FlashConfig;
pub use flasher::{flash_image, FlashState, Flasher};
pub use scheduler::{NoYield, Scheduler};
