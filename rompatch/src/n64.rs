//! N64 cartridge header fields used to tie an APS patch to its source image.
//!
//! Images come in two byte orders: the native big-endian dump and the
//! pair-swapped layout written by Doctor V64 backup units. Header fields are
//! always compared in native order.

use std::fmt;

/// First four bytes of a native (big-endian) N64 image.
pub const N64_MAGIC: [u8; 4] = [0x80, 0x37, 0x12, 0x40];

/// Number of leading image bytes holding every field in [`CartInfo`].
pub const HEADER_LEN: usize = 0x40;

const CRC_OFFSET: usize = 0x10;
const CART_ID_OFFSET: usize = 0x3C;
const TERRITORY_OFFSET: usize = 0x3E;

/// Byte order of an N64 image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DumpLayout {
    /// 16-bit pairs swapped, as dumped by a Doctor V64.
    Doctor,
    /// Native big-endian order.
    Normal,
}

impl DumpLayout {
    /// Detects the layout from the start of an image.
    ///
    /// Anything that does not begin with [`N64_MAGIC`] is taken to be a
    /// Doctor dump.
    #[must_use]
    pub fn detect(image: &[u8]) -> Self {
        if image.starts_with(&N64_MAGIC) {
            Self::Normal
        } else {
            Self::Doctor
        }
    }

    /// Returns the APS dump-format byte for this layout.
    #[must_use]
    pub const fn flag(self) -> u8 {
        match self {
            Self::Doctor => 0,
            Self::Normal => 1,
        }
    }

    /// Parses an APS dump-format byte.
    #[must_use]
    pub const fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            0 => Some(Self::Doctor),
            1 => Some(Self::Normal),
            _ => None,
        }
    }

    /// Rewrites `data` in place from this layout into native order.
    pub fn normalize(self, data: &mut [u8]) {
        match self {
            Self::Normal => {}
            Self::Doctor => {
                for pair in data.chunks_exact_mut(2) {
                    pair.swap(0, 1);
                }
            }
        }
    }
}

impl fmt::Display for DumpLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Doctor => f.write_str("Doctor V64 (byte-swapped)"),
            Self::Normal => f.write_str("normal (big-endian)"),
        }
    }
}

/// Identifying fields of an N64 cartridge image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartInfo {
    pub layout: DumpLayout,
    pub cart_id: [u8; 2],
    pub territory: u8,
    pub crc: [u8; 8],
}

impl CartInfo {
    /// Reads the cartridge fields from the first [`HEADER_LEN`] bytes of an image.
    ///
    /// Returns `None` if `image` is shorter than that.
    #[must_use]
    pub fn read(image: &[u8]) -> Option<Self> {
        let mut header: [u8; HEADER_LEN] = image.get(..HEADER_LEN)?.try_into().ok()?;
        let layout = DumpLayout::detect(&header);

        layout.normalize(&mut header);

        let mut crc = [0u8; 8];
        crc.copy_from_slice(&header[CRC_OFFSET..CRC_OFFSET + 8]);

        Some(Self {
            layout,
            cart_id: [header[CART_ID_OFFSET], header[CART_ID_OFFSET + 1]],
            territory: header[TERRITORY_OFFSET],
            crc,
        })
    }
}
