//! Target protection (user row) handling
//!
//! The target keeps its boot-region write protection and region lock bits
//! in a persistent user row. Programming needs all of them released; once
//! the image is verified the boot region is protected again.

mod types;

pub use types::*;
