use crate::n64::{CartInfo, DumpLayout};
use std::borrow::Cow;
use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::{DESCRIPTION_LEN, ENCODING_SIMPLE, MAGIC, PATCH_TYPE_N64};

/// On-disk APS header, 78 bytes.
#[derive(Debug, Clone, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub(crate) struct ApsHeaderRaw {
    magic: [u8; 5],                      // 0x00 - "APS10"
    patch_type: u8,                      // 0x05 - 1 = N64
    encoding: u8,                        // 0x06 - 0 = simple
    description: [u8; DESCRIPTION_LEN], // 0x07 - space padded
    dump_format: u8,                     // 0x39 - 0 = Doctor V64, 1 = normal
    cart_id: [u8; 2],                    // 0x3A
    territory: u8,                       // 0x3C
    crc: [u8; 8],                        // 0x3D - image bytes 0x10..0x18
    padding: [u8; 5],                    // 0x45
    target_size: U32,                    // 0x4A - size of the patched image
}                                        // 0x4E - records follow

pub(crate) const HEADER_SIZE: usize = size_of::<ApsHeaderRaw>();

/// Parsed APS header.
#[derive(Debug, Clone)]
#[must_use]
pub struct ApsHeader {
    raw: ApsHeaderRaw,
}

impl ApsHeader {
    /// Builds the header for a patch created from an image described by `cart`.
    ///
    /// `description` is cut to [`DESCRIPTION_LEN`] bytes.
    pub fn new(description: &str, cart: &CartInfo, target_size: u32) -> Self {
        let mut padded = [b' '; DESCRIPTION_LEN];
        let bytes = description.as_bytes();
        let n = bytes.len().min(DESCRIPTION_LEN);
        padded[..n].copy_from_slice(&bytes[..n]);

        let mut magic = [0u8; 5];
        magic.copy_from_slice(MAGIC);

        Self {
            raw: ApsHeaderRaw {
                magic,
                patch_type: PATCH_TYPE_N64,
                encoding: ENCODING_SIMPLE,
                description: padded,
                dump_format: cart.layout.flag(),
                cart_id: cart.cart_id,
                territory: cart.territory,
                crc: cart.crc,
                padding: [0; 5],
                target_size: U32::new(target_size),
            },
        }
    }

    pub(crate) fn from_raw(raw: ApsHeaderRaw) -> Self {
        Self { raw }
    }

    #[must_use]
    pub fn magic(&self) -> &[u8] {
        &self.raw.magic
    }

    #[must_use]
    pub const fn patch_type(&self) -> u8 {
        self.raw.patch_type
    }

    #[must_use]
    pub const fn encoding(&self) -> u8 {
        self.raw.encoding
    }

    /// Returns the description without its padding.
    #[must_use]
    pub fn description(&self) -> Cow<'_, str> {
        let bytes = &self.raw.description;
        let len = bytes
            .iter()
            .rposition(|&b| b != b' ' && b != 0)
            .map_or(0, |i| i + 1);

        String::from_utf8_lossy(&bytes[..len])
    }

    /// Returns the raw dump-format byte.
    #[must_use]
    pub const fn dump_format(&self) -> u8 {
        self.raw.dump_format
    }

    /// Returns the layout of the image the patch was made from, if the flag is known.
    #[must_use]
    pub const fn dump_layout(&self) -> Option<DumpLayout> {
        DumpLayout::from_flag(self.raw.dump_format)
    }

    #[must_use]
    pub const fn cart_id(&self) -> [u8; 2] {
        self.raw.cart_id
    }

    #[must_use]
    pub const fn territory(&self) -> u8 {
        self.raw.territory
    }

    #[must_use]
    pub const fn crc(&self) -> [u8; 8] {
        self.raw.crc
    }

    /// Returns the size the image must have once patched.
    #[must_use]
    pub fn target_size(&self) -> u32 {
        self.raw.target_size.get()
    }

    /// Returns the encoded header.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.raw.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart() -> CartInfo {
        CartInfo {
            layout: DumpLayout::Normal,
            cart_id: *b"ZL",
            territory: b'P',
            crc: [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88],
        }
    }

    #[test]
    fn header_is_78_bytes() {
        assert_eq!(HEADER_SIZE, 78);
    }

    #[test]
    fn encodes_fields_at_fixed_offsets() {
        let header = ApsHeader::new("Translation", &cart(), 0x0200_0000);
        let bytes = header.as_bytes();

        assert_eq!(&bytes[..5], b"APS10");
        assert_eq!(bytes[5], 1);
        assert_eq!(bytes[6], 0);
        assert_eq!(&bytes[7..18], b"Translation");
        assert!(bytes[18..0x39].iter().all(|&b| b == b' '));
        assert_eq!(bytes[0x39], 1);
        assert_eq!(&bytes[0x3A..0x3C], b"ZL");
        assert_eq!(bytes[0x3C], b'P');
        assert_eq!(&bytes[0x3D..0x45], &cart().crc);
        assert_eq!(&bytes[0x45..0x4A], &[0; 5]);
        assert_eq!(&bytes[0x4A..0x4E], &[0x00, 0x00, 0x00, 0x02]);
    }

    #[test]
    fn long_description_is_cut() {
        let long = "x".repeat(80);
        let header = ApsHeader::new(&long, &cart(), 0);
        assert_eq!(header.description().len(), DESCRIPTION_LEN);
    }

    #[test]
    fn description_padding_is_trimmed() {
        let header = ApsHeader::new("  hack  ", &cart(), 0);
        assert_eq!(header.description(), "  hack");
    }
}
