//! multiflash-core - Image discovery and flash orchestration
//!
//! This crate holds the logic of a standalone field programmer: a device
//! that shows up as a USB drive, takes `boot*.bin` / `app*.bin` images
//! dropped onto it, and programs them into a target microcontroller over
//! a debug link. It is `no_std` so it can run on the programmer itself.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`, serde derives)
//! - `alloc` - Enable heap allocation (status sink fan-out)
//! - `is_sync` - Compile link-facing code as blocking instead of `async`
//!
//! # Example
//!
//! ```ignore
//! use multiflash_core::flash::{flash_image, FlashConfig, NoYield};
//! use multiflash_core::image::ImageSource;
//! use multiflash_core::status::LogSink;
//!
//! let mut source = ImageSource::new(volume);
//! let report = source.rescan();
//! if report.is_ready() {
//!     flash_image(&mut link, source.image_mut(), &mut LogSink, &mut NoYield, &FlashConfig::default())?;
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
// Allow async fn in traits - we use maybe-async for dual sync/async support
#![allow(async_fn_in_trait)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod error;
pub mod flash;
pub mod fuse;
pub mod image;
pub mod link;
pub mod notify;
pub mod status;
pub mod target;

#[cfg(test)]
mod testutil;

pub use error::{Error, Result};
