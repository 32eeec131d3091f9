//! Protection row types
//!
//! Layout of the 64-bit NVM user row on SAM D21 class targets:
//!
//! ```text
//! word 0  bits  2:0   BOOTPROT  boot region protection size code
//! word 1  bits 31:16  LOCK      region lock mask, 1 = unlocked
//! ```
//!
//! All other bits (EEPROM size, BOD33, watchdog defaults) are carried
//! through untouched.

use core::fmt;

/// Number of words in the user row
pub const USER_ROW_WORDS: usize = 2;

/// Value of a user row word that has never been written
pub const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// Factory default user row contents
///
/// Used when the row is found fully erased, so the target keeps sane
/// brown-out and watchdog settings once it is written back.
pub const FACTORY_DEFAULT: [u32; USER_ROW_WORDS] = [0xD8E0_C7FA, 0xFFFF_FC5D];

/// Lock mask with every region unlocked
pub const LOCK_ALL_UNLOCKED: u16 = 0xFFFF;

const BOOTPROT_MASK: u32 = 0b111;
const LOCK_SHIFT: u32 = 16;

/// Boot region protection code
///
/// The protected size halves for each step up, with 7 meaning nothing is
/// protected.
///
/// | code | protected |
/// |------|-----------|
/// | 7    | 0         |
/// | 6    | 512 B     |
/// | 5    | 1 KiB     |
/// | ...  | ...       |
/// | 0    | 32 KiB    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "std",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "u8", into = "u8")
)]
pub struct BootProt(u8);

impl BootProt {
    /// No boot region protection
    pub const NONE: Self = Self(7);
    /// Smallest protected boot region (512 bytes)
    pub const NARROWEST: Self = Self(6);
    /// Largest protected boot region (32 KiB)
    pub const WIDEST: Self = Self(0);

    /// Create from a raw 3-bit code, ignoring higher bits
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & BOOTPROT_MASK as u8)
    }

    /// Raw 3-bit code
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Number of bytes protected at the start of flash
    pub const fn protected_bytes(self) -> u32 {
        if self.0 >= 7 {
            0
        } else {
            512 << (6 - self.0)
        }
    }
}

impl TryFrom<u8> for BootProt {
    type Error = InvalidBootProt;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        if u32::from(bits) > BOOTPROT_MASK {
            return Err(InvalidBootProt(bits));
        }
        Ok(Self(bits))
    }
}

impl From<BootProt> for u8 {
    fn from(prot: BootProt) -> Self {
        prot.0
    }
}

/// A boot protection code outside 0..=7
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidBootProt(pub u8);

impl fmt::Display for InvalidBootProt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid boot protection code {} (expected 0-7)", self.0)
    }
}

impl Default for BootProt {
    fn default() -> Self {
        Self::NARROWEST
    }
}

impl fmt::Display for BootProt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.protected_bytes() {
            0 => write!(f, "unprotected"),
            n if n >= 1024 => write!(f, "{} KiB protected", n / 1024),
            n => write!(f, "{} bytes protected", n),
        }
    }
}

/// Contents of the target's user row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserRow {
    /// Raw row words, lowest address first
    pub words: [u32; USER_ROW_WORDS],
}

impl UserRow {
    /// Create from raw words
    pub const fn new(words: [u32; USER_ROW_WORDS]) -> Self {
        Self { words }
    }

    /// A row that has never been written
    pub const fn erased() -> Self {
        Self::new([ERASED_WORD; USER_ROW_WORDS])
    }

    /// The factory default row
    pub const fn factory_default() -> Self {
        Self::new(FACTORY_DEFAULT)
    }

    /// Check whether the row is in its untouched erased state
    pub fn is_erased(&self) -> bool {
        self.words.iter().all(|&w| w == ERASED_WORD)
    }

    /// Boot region protection code
    pub fn boot_prot(&self) -> BootProt {
        BootProt::from_bits((self.words[0] & BOOTPROT_MASK) as u8)
    }

    /// Set the boot region protection code
    pub fn set_boot_prot(&mut self, prot: BootProt) {
        self.words[0] = (self.words[0] & !BOOTPROT_MASK) | (prot.bits() as u32 & BOOTPROT_MASK);
    }

    /// Region lock mask (bit set = region unlocked)
    pub fn lock(&self) -> u16 {
        (self.words[1] >> LOCK_SHIFT) as u16
    }

    /// Set the region lock mask
    pub fn set_lock(&mut self, lock: u16) {
        self.words[1] = (self.words[1] & 0x0000_FFFF) | ((lock as u32) << LOCK_SHIFT);
    }

    /// Check whether the row allows programming all of flash
    pub fn is_unlocked(&self) -> bool {
        self.boot_prot() == BootProt::NONE && self.lock() == LOCK_ALL_UNLOCKED
    }

    /// Release boot protection and every region lock
    pub fn unlock(&mut self) {
        self.set_boot_prot(BootProt::NONE);
        self.set_lock(LOCK_ALL_UNLOCKED);
    }

    /// Check whether the region with the given index is locked
    pub fn region_locked(&self, region: u32) -> bool {
        region < 16 && self.lock() & (1 << region) == 0
    }
}

impl Default for UserRow {
    fn default() -> Self {
        Self::factory_default()
    }
}

impl fmt::Display for UserRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X} {:08X}", self.words[0], self.words[1])
    }
}
